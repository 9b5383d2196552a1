//! agentwire CLI, the main entry point.
//!
//! Commands:
//! - `serve`   start the HTTP gateway
//! - `ask`     run one turn in-process
//! - `chat`    send one turn to a running gateway
//! - `tools`   list the registered tools
//! - `config`  show, locate or validate the configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "agentwire",
    about = "Tool-calling chat agent with a streaming HTTP gateway",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.agentwire/config.toml)
    #[arg(short, long, global = true, env = "AGENTWIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one turn in-process and print the streamed reply
    Ask {
        /// The message to send
        message: String,

        /// Persist the turn into this chat
        #[arg(long)]
        chat_id: Option<String>,

        /// Caller identity passed to tools
        #[arg(long, env = "AGENTWIRE_USER")]
        user: Option<String>,
    },

    /// Send one turn to a running gateway
    Chat {
        /// The message to send
        message: String,

        /// Gateway base URL
        #[arg(long, default_value = "http://127.0.0.1:42618")]
        url: String,

        /// Persist the turn into this chat
        #[arg(long)]
        chat_id: Option<String>,

        /// Caller identity sent as x-user-id
        #[arg(long, env = "AGENTWIRE_USER")]
        user: Option<String>,
    },

    /// List the registered tools
    Tools,

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (API key redacted)
    Show,
    /// Print the config file path
    Path,
    /// Load and validate the configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Ask {
            message,
            chat_id,
            user,
        } => commands::ask::run(config_path, message, chat_id, user).await?,
        Commands::Chat {
            message,
            url,
            chat_id,
            user,
        } => commands::chat::run(&url, message, chat_id, user).await?,
        Commands::Tools => commands::tools::run(config_path)?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path)?,
            ConfigAction::Path => commands::config_cmd::path(config_path),
            ConfigAction::Validate => commands::config_cmd::validate(config_path)?,
        },
    }

    Ok(())
}
