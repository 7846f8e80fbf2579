use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use inbox_triage::classifier::{EmailClassifier, OpenAiClient};
use inbox_triage::config::{mask_secret, Config, NotificationBackend};
use inbox_triage::email::{InboxScanner, Mailbox, MessageProcessor, NotificationTemplate};
use inbox_triage::gmail_client::GmailClient;
use inbox_triage::notifier;
use inbox_triage::prompts::PromptConfig;

#[derive(Parser)]
#[command(name = "inbox-triage")]
#[command(about = "Gmail triage agent: classifies unread mail with a language model, notifies important messages and trashes the rest")]
#[command(version)]
struct Args {
    /// Configuration file (YAML)
    #[arg(short, long, default_value = "configs/config.yaml")]
    config: PathBuf,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,

    /// Classify only: no notification, no mark-read, no trash
    #[arg(short, long)]
    dry_run: bool,

    /// Maximum number of messages handled per cycle (default: unlimited)
    #[arg(short = 'l', long)]
    limit: Option<NonZeroUsize>,

    /// Validate the configuration and prompts without connecting
    #[arg(long)]
    check_config: bool,

    /// Run the Gmail OAuth2 flow, store the token and exit
    #[arg(long)]
    authorize: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    dotenv::dotenv().ok();

    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Invalid configuration: {}", e);
            return Err(e).context(format!("Unable to load configuration from {}", args.config.display()));
        }
    };

    let prompts = match PromptConfig::load(&config.files.prompts_file) {
        Ok(prompts) => prompts,
        Err(e) => {
            error!("❌ Invalid prompts file: {}", e);
            return Err(e).context(format!("Unable to load prompts from {}", config.files.prompts_file));
        }
    };

    if args.check_config {
        print_config_summary(&config);
        return Ok(());
    }

    let gmail = Arc::new(
        GmailClient::new(&config.files)
            .await
            .context("Unable to connect to Gmail API")?,
    );

    // Runs the consent flow when no usable token is stored
    gmail.authorize().await.context("Gmail authorization failed")?;

    if args.authorize {
        println!("✅ Token stored in {}", config.files.token_file);
        return Ok(());
    }

    let mailbox: Arc<dyn Mailbox> = gmail;
    let model = Arc::new(OpenAiClient::new(&config).context("Unable to create chat-completion client")?);
    let classifier = EmailClassifier::new(
        model,
        Arc::new(prompts),
        config.max_tokens(),
        config.openai.temperature,
    );
    let notifier = notifier::from_config(&config).context("Unable to create notifier")?;
    let template = NotificationTemplate::new(&config.notification.important_email_template);

    let processor = MessageProcessor::new(Arc::clone(&mailbox), classifier, notifier, template)
        .with_dry_run(args.dry_run);
    let scanner = InboxScanner::new(mailbox, processor, config.poll_interval()).with_limit(args.limit);

    if args.dry_run {
        info!("🧪 DRY-RUN mode: verdicts are printed, nothing is sent or modified");
    }

    if args.once {
        let report = scanner.run_cycle(&CancellationToken::new()).await;
        info!("✅ Single cycle finished: {} of {} message(s) handled", report.handled(), report.listed);
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    spawn_shutdown_listener(shutdown.clone());

    info!("⏸️  Press Ctrl+C to stop the agent");
    scanner.run(shutdown).await;

    Ok(())
}

fn print_config_summary(config: &Config) {
    println!("✅ Configuration valid!");
    println!("📧 Gmail API OAuth2");
    println!("🔑 Credentials: {}", config.files.credentials_file);
    println!("💾 Token file: {}", config.files.token_file);
    println!("📝 Prompts: {}", config.files.prompts_file);
    println!("⏱️  Poll interval: {}s", config.polling.interval_seconds);
    println!(
        "🤖 Model: {} @ {} (max_tokens={}, temperature={}, key={})",
        config.openai.model,
        config.openai.endpoint,
        config.openai.max_tokens,
        config.openai.temperature,
        mask_secret(&config.credentials.openai_api_key)
    );
    match config.notification.backend {
        NotificationBackend::Telegram => {
            if let Some(telegram) = &config.telegram {
                println!(
                    "💬 Telegram chat {} (token {})",
                    telegram.chat_id,
                    mask_secret(&telegram.bot_token)
                );
            }
        }
        NotificationBackend::Slack => {
            if let Some(slack) = &config.slack {
                println!("💬 Slack channel {} (token {})", slack.channel_id, mask_secret(&slack.bot_token));
            }
        }
    }
}

fn spawn_shutdown_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("🛑 Shutdown requested, finishing the current message...");
        shutdown.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            warn!("Unable to listen for SIGTERM: {}", e);
            ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
