use std::sync::Arc;

use anyhow::{Result, anyhow};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::agent::{Scheduler, SessionRegistry};
use crate::core::{AppConfig, init_tracing};
use crate::time::parse_timezone;

pub async fn run(user: &str, timezone: Option<&str>) -> Result<()> {
    // Keep the terminal for the conversation, only warnings and up
    init_tracing(&format!("{}=warn", env!("CARGO_CRATE_NAME")));

    let config = AppConfig::default();
    let timezone = match timezone {
        Some(name) => parse_timezone(name).ok_or_else(|| anyhow!("Unknown timezone {}", name))?,
        None => config.timezone,
    };

    let scheduler = Arc::new(Scheduler::from_config(&config));
    let registry = SessionRegistry::new(scheduler, config.session_ttl);
    let session = registry.create(user, timezone).await;

    let mut rl = DefaultEditor::new()?;
    println!("What would you like to schedule? ({})", timezone.name());

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line)?;
                match registry.process(&session.id, line).await {
                    Some(outcome) => println!("{}", outcome.text),
                    None => break,
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    registry.remove(&session.id).await;
    Ok(())
}
