use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::api;
use crate::core::AppConfig;

pub mod chat;

#[derive(Subcommand)]
enum Command {
    /// Run the API server
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "2222")]
        port: String,
    },
    /// Schedule a meeting from the terminal
    Chat {
        /// Identifies whose calendar is being scheduled
        #[arg(long, default_value = "local")]
        user: String,

        /// IANA timezone, e.g. America/New_York. Defaults to
        /// SCHEDULER_TIMEZONE.
        #[arg(long)]
        timezone: Option<String>,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();

    // Handle each sub command
    match args.command {
        Some(Command::Serve { host, port }) => {
            api::serve(host, port, AppConfig::default()).await;
        }
        Some(Command::Chat { user, timezone }) => {
            chat::run(&user, timezone.as_deref()).await?;
        }
        None => {}
    }

    Ok(())
}
