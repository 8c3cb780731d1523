//! Interactive text front-end for haruko.

use clap::{Parser, Subcommand};
use haruko::config::{ProviderConfig, ProviderKind};
use haruko::conversation::Message;
use haruko::{Assistant, AssistantConfig, Collaborators, TurnEvent, TurnRequest};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SESSION: &str = "cli";

/// Haruko: a conversational home assistant, typed.
#[derive(Parser)]
#[command(name = "haruko-chat", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Replace configured providers with a scripted offline provider.
    #[arg(long)]
    offline: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Read utterances from stdin and answer each one.
    Chat,

    /// Answer a single utterance and exit.
    Ask {
        /// The utterance.
        text: Vec<String>,
    },

    /// List registered commands.
    Tools,

    /// Write the default configuration file.
    InitConfig {
        /// Destination, defaults to the platform config directory.
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("haruko=info")),
        )
        .init();

    let cli = Cli::parse();

    if let Some(Command::InitConfig { path }) = &cli.command {
        let path = path.clone().unwrap_or_else(AssistantConfig::default_config_path);
        AssistantConfig::default().save_to_file(&path)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => AssistantConfig::from_file(path)?,
        None => {
            let path = AssistantConfig::default_config_path();
            if path.exists() {
                AssistantConfig::from_file(&path)?
            } else {
                AssistantConfig::default()
            }
        }
    };
    if cli.offline {
        config.providers = vec![offline_provider()];
    }

    let assistant = Arc::new(Assistant::from_config(&config, Collaborators::default())?);
    info!(providers = config.providers.len(), "assistant ready");

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => run_chat(assistant).await,
        Command::Ask { text } => {
            let request = TurnRequest::new(Message::user(text.join(" "))).with_session(SESSION);
            print_turn(&assistant, request).await?;
            Ok(())
        }
        Command::Tools => {
            for usage in assistant.registry().usage_lines() {
                println!("{usage}");
            }
            Ok(())
        }
        Command::InitConfig { .. } => Ok(()),
    }
}

fn offline_provider() -> ProviderConfig {
    ProviderConfig {
        name: "offline".to_owned(),
        kind: ProviderKind::Static,
        fragments: vec![
            "I'm running offline, ".to_owned(),
            "so I can only say this.".to_owned(),
        ],
        ..ProviderConfig::default()
    }
}

async fn run_chat(assistant: Arc<Assistant>) -> anyhow::Result<()> {
    println!("Haruko v{}", env!("CARGO_PKG_VERSION"));
    println!("Type a message. Ctrl+C stops the current reply, Ctrl+D quits.\n");

    let for_signal = Arc::clone(&assistant);
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if for_signal.cancel(SESSION) {
                info!("reply cancelled");
            } else {
                std::process::exit(130);
            }
        }
    });

    let mut history: Vec<Message> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim().to_owned();
        if line.is_empty() {
            continue;
        }
        let request = TurnRequest::new(Message::user(line.clone()))
            .with_session(SESSION)
            .with_history(history.clone());
        let reply = print_turn(&assistant, request).await?;
        history.push(Message::user(line));
        history.push(Message::assistant(reply));
    }
    Ok(())
}

/// Stream one turn to stdout; returns the visible text.
async fn print_turn(assistant: &Assistant, request: TurnRequest) -> anyhow::Result<String> {
    let mut events = assistant.handle(request);
    let mut reply = String::new();
    let mut stdout = std::io::stdout();
    while let Some(event) = events.next().await {
        match event {
            TurnEvent::Text(text) => {
                print!("{text}");
                stdout.flush()?;
                reply.push_str(&text);
            }
            TurnEvent::Cancelled(marker) => {
                if !reply.is_empty() && !reply.ends_with('\n') {
                    println!();
                }
                print!("{marker}");
            }
            TurnEvent::ToolResult(result) => {
                let status = if result.ok { "ok" } else { "failed" };
                eprintln!("\n  [{status}] {}", result.command);
            }
            TurnEvent::Provider { pass, name } => {
                tracing::debug!(pass, provider = %name, "pass started");
            }
            TurnEvent::State(_) => {}
        }
    }
    println!();
    Ok(reply)
}
