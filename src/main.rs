mod commands;
mod gateway;

use clap::{Parser, Subcommand};
use parley_channels::whatsapp::WhatsAppWebSession;
use parley_core::{
    config::{Config, LoggingConfig, ProviderKind},
    error::ParleyError,
    message::{ChatContext, Message, Sender},
    traits::Provider,
};
use parley_providers::{anthropic::AnthropicProvider, gemini::GeminiProvider, openai::OpenAiProvider};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;

use gateway::{GenerateOutcome, Orchestrator, ReplyPipeline, EXIT_CONFIG, EXIT_OK, EXIT_RUNTIME};

#[derive(Parser)]
#[command(
    name = "parley",
    version,
    about = "Parley: AI reply helper for WhatsApp Web"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Read settings from this .env file (default: ./.env if present).
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open WhatsApp Web and start helping with the open conversation.
    Start {
        /// Start with the helper enabled.
        #[arg(long)]
        enable: bool,
    },
    /// Show the configuration and check the LLM provider.
    Status,
    /// Draft a reply to a single message, without a browser.
    Ask {
        /// The message to reply to.
        #[arg(trailing_var_arg = true)]
        message: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.env_file.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return exit(EXIT_CONFIG);
        }
    };
    let _guard = init_logging(&config.logging);

    let result = match cli.command {
        Commands::Start { enable } => start(config, enable).await,
        Commands::Status => status(&config).await,
        Commands::Ask { message } => ask(&config, &message.join(" ")).await,
    };

    match result {
        Ok(code) => exit(code),
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            exit(EXIT_RUNTIME)
        }
    }
}

fn exit(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

/// Environment first, then the `.env` file.
fn load_config(env_file: Option<&Path>) -> Result<Config, ParleyError> {
    let default_file = Path::new(".env");
    let env_file = match env_file {
        Some(path) => Some(path),
        None if default_file.is_file() => Some(default_file),
        None => None,
    };
    Config::from_env(env_file)
}

/// Console logging on stderr plus a plain-text log file.
///
/// `RUST_LOG` overrides `LOG_LEVEL`. The returned guard flushes the file
/// writer on drop.
fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level))
    };
    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(filter());

    let path = Path::new(&logging.file);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = path.file_name().map(|n| n.to_os_string());

    match (std::fs::create_dir_all(dir), file_name) {
        (Ok(()), Some(file_name)) => {
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter());
            tracing_subscriber::registry().with(console).with(file).init();
            Some(guard)
        }
        (result, _) => {
            tracing_subscriber::registry().with(console).init();
            match result {
                Err(e) => warn!("file logging disabled, cannot create {}: {e}", dir.display()),
                Ok(()) => warn!("file logging disabled, LOG_FILE has no file name"),
            }
            None
        }
    }
}

/// Build the configured provider.
fn build_provider(config: &Config) -> anyhow::Result<Arc<dyn Provider>> {
    let p = &config.provider;
    let provider: Arc<dyn Provider> = match p.kind {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::from_config(
            p.openai.base_url.clone(),
            p.openai.api_key.clone(),
            p.openai.model.clone(),
            p.timeout_secs,
        )?),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::from_config(
            p.anthropic.api_key.clone(),
            p.anthropic.model.clone(),
            p.timeout_secs,
        )?),
        ProviderKind::Gemini => Arc::new(GeminiProvider::from_config(
            p.gemini.api_key.clone(),
            p.gemini.model.clone(),
            p.timeout_secs,
        )?),
    };
    Ok(provider)
}

/// Forward terminal lines to the runtime from a plain thread.
///
/// The channel closes when stdin reaches end of file.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn start(config: Config, enable: bool) -> anyhow::Result<i32> {
    if let Err(e) = config.validate() {
        eprintln!("{e}");
        return Ok(EXIT_CONFIG);
    }
    let provider = build_provider(&config)?;
    info!(
        "starting parley with {} ({})",
        provider.name(),
        config.provider.selected_model()
    );

    println!("Parley: opening WhatsApp Web...");
    let session = WhatsAppWebSession::new(config.browser.clone());
    let orchestrator = Orchestrator::new(config, provider, Box::new(session), enable);
    Ok(orchestrator.run(spawn_stdin_reader()).await)
}

async fn status(config: &Config) -> anyhow::Result<i32> {
    let p = &config.provider;
    let h = &config.helper;
    let b = &config.browser;

    println!("Parley: status\n");
    println!("Provider:        {} ({})", p.kind, p.selected_model());
    println!("Persona:         {} / tone: {}", h.persona, h.response_tone);
    println!("Max reply:       {} chars", h.max_response_length);
    println!("Context window:  {} messages", h.max_messages_to_read);
    println!(
        "Human approval:  {}",
        if h.human_approval { "required" } else { "off" }
    );
    println!(
        "Safety filter:   {}{}",
        if h.enable_safety_filter { "on" } else { "off" },
        if h.safety_blocklist.is_empty() {
            String::new()
        } else {
            format!(" (+{} blocked terms)", h.safety_blocklist.len())
        }
    );
    println!("Poll interval:   {}s", h.poll_interval_secs);
    println!("WebDriver:       {}", b.webdriver_url);
    println!("Session dir:     {}", b.session_dir);
    println!(
        "Sending:         {}",
        if b.draft_only { "draft only" } else { "press Enter" }
    );
    println!();

    if let Err(e) = config.validate() {
        println!("{e}");
        return Ok(EXIT_CONFIG);
    }

    let provider = build_provider(config)?;
    let available = provider.is_available().await;
    println!(
        "  {}: {}",
        provider.name(),
        if available { "reachable" } else { "not reachable" }
    );
    Ok(if available { EXIT_OK } else { EXIT_RUNTIME })
}

async fn ask(config: &Config, message: &str) -> anyhow::Result<i32> {
    if message.trim().is_empty() {
        anyhow::bail!("no message provided. Usage: parley ask <message>");
    }
    if let Err(e) = config.validate() {
        eprintln!("{e}");
        return Ok(EXIT_CONFIG);
    }

    let provider = build_provider(config)?;
    let pipeline = ReplyPipeline::new(provider, &config.helper);
    let context = ChatContext::from_recent(
        vec![Message::new(Sender::Peer, message)],
        config.helper.max_messages_to_read,
    );

    match pipeline.generate(&context, config.helper.persona).await {
        GenerateOutcome::Ready(candidate) => {
            println!("{}", candidate.text);
            Ok(EXIT_OK)
        }
        GenerateOutcome::Blocked(category) => {
            println!("Reply withheld by the safety filter ({category}).");
            Ok(EXIT_RUNTIME)
        }
        GenerateOutcome::Failed(e) => Err(e.into()),
    }
}
