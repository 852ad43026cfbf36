use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use diaschat::chat::{ChatApp, render_transcript, run_interactive};
use diaschat::config::{CliOverrides, Config, load_config};
use diaschat::providers::{LlmProvider, ProviderFactory};
use diaschat::session::{SessionManager, retention_days};
use diaschat::utils::DiasError;

#[derive(Parser)]
#[command(name = "diaschat")]
#[command(about = "diaschat - terminal chat with a persistent history")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Show debug logs on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (default: ~/.diaschat/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// History file (default: ./chat_history.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub history: Option<PathBuf>,

    /// Model to request from the provider
    #[arg(long, global = true, value_name = "NAME")]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat
    Chat,
    /// Send one message and print the reply
    Ask {
        /// The message to send
        message: String,
    },
    /// Print the conversation log
    History,
    /// Remove every message from the log
    Clear,
    /// Remove messages older than the retention window
    Prune {
        /// Retention window in days (default: config, else 5)
        #[arg(long)]
        days: Option<u32>,
    },
    /// Display version information
    Version,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            config_path: self.config.clone(),
            history_path: self.history.clone(),
            model: self.model.clone(),
        }
    }
}

/// Runs the parsed command and returns the process exit code
pub fn run(cli: Cli) -> i32 {
    let Some(command) = cli.command.as_ref() else {
        print_help();
        return 0;
    };

    if matches!(command, Commands::Version) {
        print_version();
        return 0;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: failed to start async runtime: {}", e);
            return 1;
        }
    };

    match runtime.block_on(execute(&cli)) {
        Ok(()) => 0,
        Err(e) => {
            report_error(&e);
            1
        }
    }
}

async fn execute(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(&cli.overrides()).context("Failed to load configuration")?;

    match cli.command {
        Some(Commands::Chat) => {
            let provider = build_provider(&config)?;
            let app = ChatApp::open(&config, provider).await;
            run_interactive(app).await?;
        }
        Some(Commands::Ask { ref message }) => {
            let provider = build_provider(&config)?;
            let mut app = ChatApp::open(&config, provider).await;

            let result = app.ask(message).await;
            // The user turn is kept even when the provider fails
            app.save().await?;

            let reply = result?;
            println!("{}", reply.content);
        }
        // Maintenance commands read the file as it is; `prune_on_start`
        // applies to chat sessions only
        Some(Commands::History) => {
            let session = SessionManager::open_or_recover(config.history_path()).await;
            print!("{}", render_transcript(session.messages()));
        }
        Some(Commands::Clear) => {
            let path = config.history_path();
            let mut session = SessionManager::open_or_recover(&path).await;
            let removed = session.len();
            session.clear();
            session.save(&path).await.map_err(DiasError::from)?;
            println!("Cleared {} messages.", removed);
        }
        Some(Commands::Prune { days }) => {
            let path = config.history_path();
            let days = days.unwrap_or_else(|| config.retention_days());
            let mut session = SessionManager::open_or_recover(&path).await;
            let result = session.prune(retention_days(days));
            session.save(&path).await.map_err(DiasError::from)?;
            println!(
                "Removed {} of {} messages older than {} days ({} undated kept).",
                result.removed, result.scanned, days, result.undated_kept
            );
        }
        Some(Commands::Version) => print_version(),
        None => print_help(),
    }

    Ok(())
}

fn build_provider(config: &Config) -> Result<Arc<dyn LlmProvider>, DiasError> {
    let provider_config = config
        .provider_config
        .as_ref()
        .ok_or_else(|| DiasError::config("no completion provider configured"))?;
    Ok(ProviderFactory::create(provider_config)?)
}

fn report_error(error: &anyhow::Error) {
    eprintln!("error: {:#}", error);
    if let Some(suggestion) = error
        .downcast_ref::<DiasError>()
        .and_then(DiasError::suggestion)
    {
        eprintln!("  {}", suggestion);
    }
}

pub fn extract_command_from_error(error_msg: &str) -> String {
    // "error: unrecognized subcommand 'invalid_command'"
    if let Some(start) = error_msg.find('\'') {
        if let Some(end) = error_msg[start + 1..].find('\'') {
            return error_msg[start + 1..start + 1 + end].to_string();
        }
    }
    "unknown".to_string()
}

pub fn print_version() {
    println!("diaschat {}", env!("CARGO_PKG_VERSION"));
}

pub fn print_help() {
    println!("diaschat - terminal chat with a persistent history");
    println!();
    println!("Usage: diaschat [OPTIONS] <COMMAND>");
    println!();
    println!("Commands:");
    println!("  chat     Start an interactive chat");
    println!("  ask      Send one message and print the reply");
    println!("  history  Print the conversation log");
    println!("  clear    Remove every message from the log");
    println!("  prune    Remove messages older than the retention window");
    println!("  version  Display version information");
    println!("  help     Print this message or the help of the given subcommand(s)");
    println!();
    println!("Options:");
    println!("  -v, --verbose         Show debug logs on stderr");
    println!("      --config <PATH>   Config file (default: ~/.diaschat/config.json)");
    println!("      --history <PATH>  History file (default: ./chat_history.json)");
    println!("      --model <NAME>    Model to request from the provider");
    println!("  -V, --version         Print version");
    println!("  -h, --help            Print help");
}
