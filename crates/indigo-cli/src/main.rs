//! Indigo - a conversational scheduling assistant for Google Calendar
//!
//! - `indigo serve` - streaming API server for the browser extension
//! - `indigo chat` - terminal harness that prints every node update
//! - `indigo auth` - authorize Indigo against a Google account

use anyhow::Result;
use clap::{Parser, Subcommand};

use indigo_core::constants::server::DEFAULT_THREAD_ID;
use indigo_core::paths;
use indigo_core::IndigoConfig;

mod auth;
mod chat;
mod serve;

/// Indigo - scheduling assistant
#[derive(Parser)]
#[command(name = "indigo")]
#[command(about = "A conversational scheduling assistant for your calendar", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the streaming API server
    ///
    /// Serves `GET /stream?thread_id=<id>&message=<text>` as server-sent
    /// events, one per completed agent node.
    Serve {
        /// Port to listen on (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat with Indigo in the terminal
    Chat {
        /// Conversation thread to continue
        #[arg(short, long, default_value = DEFAULT_THREAD_ID)]
        thread: String,
    },

    /// Authorize Indigo to manage your Google Calendar
    ///
    /// Reads the OAuth client from ~/.indigo/credentials.json, opens the
    /// browser and saves the resulting token to ~/.indigo/tokens/token.json.
    Auth {
        /// Local port for the OAuth callback
        #[arg(short, long, default_value_t = indigo_core::auth::DEFAULT_CALLBACK_PORT)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = IndigoConfig::load()?;

    match cli.command {
        // Serve mode logs to stdout
        Commands::Serve { port } => serve::run(config, port).await,
        Commands::Chat { thread } => {
            init_file_logging()?;
            chat::run(config, &thread).await
        }
        Commands::Auth { port } => {
            init_file_logging()?;
            auth::run(&config, port).await
        }
    }
}

/// Log to ~/.indigo/logs/indigo.log so the terminal stays readable
fn init_file_logging() -> Result<()> {
    let log_dir = paths::logs_dir();
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Failed to create log directory: {}", e);
    }

    #[cfg(unix)]
    let null_device = "/dev/null";
    #[cfg(windows)]
    let null_device = "NUL";

    let log_file = match std::fs::File::create(log_dir.join("indigo.log")) {
        Ok(file) => file,
        Err(e) => {
            eprintln!(
                "Failed to create log file: {}, falling back to null device",
                e
            );
            std::fs::File::create(null_device)?
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}
