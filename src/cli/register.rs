//! Register command: install the configured version and activate it

use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{CommandContext, GlobalOptions, OutputFormat};
use crate::config::Config;
use crate::error::Result;
use crate::output::{json, table};
use crate::worker::{ClientMessage, RegisterOutcome};

/// Display format for a registration result
#[derive(Tabled, Serialize)]
struct RegisterDisplay {
    #[tabled(rename = "VERSION")]
    version: String,

    #[tabled(rename = "STATUS")]
    status: String,

    #[tabled(rename = "ASSETS")]
    assets: usize,

    /// Partitions deleted by activation
    #[tabled(rename = "REMOVED")]
    removed: String,
}

fn join_removed(removed: &[String]) -> String {
    if removed.is_empty() {
        "-".to_string()
    } else {
        removed.join(", ")
    }
}

impl RegisterDisplay {
    fn new(config: &Config, outcome: RegisterOutcome) -> Self {
        match outcome {
            RegisterOutcome::Unchanged { version } => Self {
                version,
                status: "unchanged".to_string(),
                assets: config.manifest.len(),
                removed: join_removed(&[]),
            },
            RegisterOutcome::Activated { install, activate } => Self {
                version: install.version,
                status: "activated".to_string(),
                assets: install.assets,
                removed: join_removed(&activate.removed),
            },
            RegisterOutcome::Waiting { install } => Self {
                version: install.version,
                status: "waiting".to_string(),
                assets: install.assets,
                removed: join_removed(&[]),
            },
        }
    }
}

/// Run the register command
pub async fn run(opts: &GlobalOptions, skip_waiting: bool) -> Result<()> {
    let ctx = CommandContext::controlled(opts).await?;
    let outcome = ctx.registration.register((*ctx.config).clone()).await?;
    let mut display = RegisterDisplay::new(&ctx.config, outcome);

    if skip_waiting && ctx.registration.waiting().await.is_some() {
        ctx.registration
            .post_message(ClientMessage::SkipWaiting)
            .await?;
        display.status = "activated".to_string();
    }

    match ctx.format {
        OutputFormat::Json => println!("{}", json::format_json(&display)?),
        OutputFormat::Table => println!("{}", table::format_table(&[display])),
        OutputFormat::Pretty => {
            println!(
                "{} {} {} ({} assets)",
                "✓".green(),
                display.version.bold(),
                display.status,
                display.assets
            );
            if display.removed != "-" {
                println!("  removed {}", display.removed.dimmed());
            }
            if display.status == "waiting" {
                println!(
                    "  {}",
                    "pass --skip-waiting to take over from the running worker".dimmed()
                );
            }
        }
    }

    Ok(())
}
