/// Positional `%s` template, filled left to right.
///
/// Used for the classifier's user prompt (one site) and the important-email
/// notification (four sites). Values are inserted verbatim. `%%` is a literal
/// `%`; any other `%` is kept as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatTemplate {
    parts: Vec<String>,
}

impl FormatTemplate {
    pub fn new(raw: &str) -> Self {
        let mut parts = Vec::new();
        let mut current = String::new();
        let mut chars = raw.chars().peekable();
        while let Some(c) = chars.next() {
            match (c, chars.peek().copied()) {
                ('%', Some('%')) => {
                    chars.next();
                    current.push('%');
                }
                ('%', Some('s')) => {
                    chars.next();
                    parts.push(std::mem::take(&mut current));
                }
                _ => current.push(c),
            }
        }
        parts.push(current);
        FormatTemplate { parts }
    }

    /// Number of substitution sites.
    pub fn sites(&self) -> usize {
        self.parts.len() - 1
    }

    /// Fills the sites in order. Missing values render as empty strings and
    /// surplus values are ignored.
    pub fn render(&self, values: &[&str]) -> String {
        let mut out = String::new();
        for (index, part) in self.parts.iter().enumerate() {
            if index > 0 {
                out.push_str(values.get(index - 1).copied().unwrap_or(""));
            }
            out.push_str(part);
        }
        out
    }
}
