//! Cache management commands

use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use crate::cache::{CacheStore, PartitionStats};
use crate::cli::context::{cache_dir, load_config, open_storage};
use crate::cli::{GlobalOptions, OutputFormat};
use crate::error::Result;
use crate::output::{json, table};

/// Display format for a partition
#[derive(Tabled, Serialize)]
struct PartitionDisplay {
    #[tabled(rename = "PARTITION")]
    name: String,

    #[tabled(rename = "ENTRIES")]
    entries: usize,

    #[tabled(rename = "SIZE")]
    size: String,

    #[tabled(rename = "CURRENT")]
    current: bool,
}

impl PartitionDisplay {
    fn new(stats: PartitionStats, current: &[String]) -> Self {
        Self {
            current: current.contains(&stats.name),
            size: format_size(stats.size_bytes),
            entries: stats.entries,
            name: stats.name,
        }
    }
}

/// Show partitions with entry counts and sizes
pub async fn status(opts: &GlobalOptions) -> Result<()> {
    let config = load_config(opts)?;
    let storage = open_storage(opts)?;
    let current = [config.static_partition(), config.dynamic_partition()];

    let stats = storage.stats().await?;
    let total: usize = stats.iter().map(|s| s.size_bytes).sum();
    let rows: Vec<PartitionDisplay> = stats
        .into_iter()
        .map(|s| PartitionDisplay::new(s, &current))
        .collect();

    match opts.format {
        OutputFormat::Json => println!("{}", json::format_json(&rows)?),
        OutputFormat::Table => println!("{}", table::format_table(&rows)),
        OutputFormat::Pretty => {
            let path = cache_dir(opts)?;

            println!("{}", "Cache Status".bold());
            println!("────────────────────────────────────────");
            println!("Location:       {}", path.display());
            println!("Version:        {}", config.version);
            println!("Partitions:     {}", rows.len());
            println!("Total size:     {}", format_size(total));

            if !rows.is_empty() {
                println!();
            }
            for row in &rows {
                let marker = if row.current {
                    "●".green().to_string()
                } else {
                    "○".dimmed().to_string()
                };
                println!(
                    "{} {:<32} {:>5} entries  {}",
                    marker, row.name, row.entries, row.size
                );
            }
        }
    }

    Ok(())
}

/// Delete every partition
pub fn clear(opts: &GlobalOptions) -> Result<()> {
    let storage = open_storage(opts)?;
    let stats = storage.clear_all()?;

    match opts.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "partitions_removed": stats.partitions_removed,
                "entries_removed": stats.entries_removed,
                "success": true,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ => {
            if stats.partitions_removed > 0 {
                println!(
                    "Cleared {} partitions ({} entries)",
                    stats.partitions_removed, stats.entries_removed
                );
            } else {
                println!("Cache was already empty");
            }
        }
    }

    Ok(())
}

/// Show cache path
pub fn path(opts: &GlobalOptions) -> Result<()> {
    println!("{}", cache_dir(opts)?.display());
    Ok(())
}

/// Format bytes as human-readable size
fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;
    const GB: usize = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
