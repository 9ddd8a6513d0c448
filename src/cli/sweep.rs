//! Sweep commands: one-shot retention sweep and the periodic ticker

use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{CommandContext, GlobalOptions, OutputFormat};
use crate::error::{Error, Result};
use crate::output::{json, table};
use crate::worker::{Event, EventOutcome, SweepReport, Sweeper};

/// Display format for a sweep result
#[derive(Tabled, Serialize)]
struct SweepDisplay {
    #[tabled(rename = "PARTITION")]
    partition: String,

    #[tabled(rename = "SCANNED")]
    scanned: usize,

    #[tabled(rename = "REMOVED")]
    removed: usize,
}

/// Run one sweep now
pub async fn run(opts: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::controlled(opts).await?;
    let worker = ctx.active_worker().await?;

    let report = match worker.dispatch(Event::Sweep).await? {
        EventOutcome::Swept(report) => report,
        other => return Err(Error::Other(format!("unexpected sweep outcome: {:?}", other))),
    };

    print_report(&ctx, &report)
}

fn print_report(ctx: &CommandContext, report: &SweepReport) -> Result<()> {
    let display = SweepDisplay {
        partition: ctx.config.dynamic_partition(),
        scanned: report.scanned,
        removed: report.removed,
    };

    match ctx.format {
        OutputFormat::Json => println!("{}", json::format_json(&display)?),
        OutputFormat::Table => println!("{}", table::format_table(&[display])),
        OutputFormat::Pretty => println!(
            "{} Swept {}: {} scanned, {} removed",
            "✓".green(),
            display.partition.bold(),
            display.scanned,
            display.removed
        ),
    }
    Ok(())
}

/// Sweep on the configured interval until Ctrl-C
pub async fn watch(opts: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::controlled(opts).await?;
    let worker = ctx.active_worker().await?;
    let period = ctx.config.sweep_interval();

    eprintln!(
        "Sweeping {} every {}s (Ctrl-C to stop)",
        ctx.config.dynamic_partition(),
        period.as_secs()
    );

    let sweeper = Sweeper::spawn(worker, period);
    tokio::signal::ctrl_c().await?;

    let cycles = sweeper.cycles();
    sweeper.stop().await;
    eprintln!("Stopped after {} sweeps", cycles);

    Ok(())
}
