//! Wayfarer CLI - the main entry point.
//!
//! Commands:
//! - `onboard`  - Write the default config
//! - `agent`    - Interactive chat or single-message mode
//! - `gateway`  - Start the HTTP API server
//! - `memory`   - Inspect or reset a session on a running gateway

use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(
    name = "wayfarer",
    about = "Wayfarer — a city-information chat agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file
    Onboard,

    /// Chat with the agent
    Agent {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Session to chat in
        #[arg(long, default_value = "default")]
        session: String,

        /// Render thinking, tool calls, and answer tokens as they arrive
        #[arg(long)]
        stream: bool,
    },

    /// Start the HTTP gateway server
    Gateway {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Session memory on a running gateway
    Memory {
        #[command(subcommand)]
        action: MemoryAction,

        /// Gateway base URL (defaults to the configured host and port)
        #[arg(long, global = true, env = "WAYFARER_GATEWAY_URL")]
        url: Option<String>,
    },
}

#[derive(Subcommand)]
enum MemoryAction {
    /// Show the summary, recent messages, and stats
    Show {
        #[arg(long, default_value = "default")]
        session: String,
    },
    /// Clear a session's history and summary
    Clear {
        #[arg(long, default_value = "default")]
        session: String,
    },
    /// Force a summarization pass
    Summarize {
        #[arg(long, default_value = "default")]
        session: String,
    },
    /// Set the summarization threshold (all sessions unless --session is given)
    Threshold {
        #[arg(allow_negative_numbers = true)]
        value: i64,
        #[arg(long)]
        session: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(false)
            .init(),
    }

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Agent {
            message,
            session,
            stream,
        } => commands::agent::run(message, session, stream, cli.verbose).await?,
        Commands::Gateway { port } => commands::gateway::run(port).await?,
        Commands::Memory { action, url } => {
            let client = commands::memory::MemoryClient::from_config(url)?;
            match action {
                MemoryAction::Show { session } => client.show(&session).await?,
                MemoryAction::Clear { session } => client.clear(&session).await?,
                MemoryAction::Summarize { session } => client.summarize(&session).await?,
                MemoryAction::Threshold { value, session } => {
                    client.threshold(value, session.as_deref()).await?
                }
            }
        }
    }

    Ok(())
}
