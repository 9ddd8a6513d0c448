//! Version command

use serde::Serialize;

use crate::cli::{CommandContext, GlobalOptions, OutputFormat};
use crate::error::Result;
use crate::output::json;
use crate::worker::{ClientMessage, MessageReply};

#[derive(Serialize)]
struct VersionDisplay {
    tool: String,
    /// Cache version answered by the active worker; `None` when uncontrolled
    cache_version: Option<String>,
}

/// Print the tool version and the active cache version
pub async fn run(opts: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::controlled(opts).await?;

    let cache_version = match ctx.registration.active().await {
        Some(_) => match ctx.registration.post_message(ClientMessage::GetVersion).await? {
            MessageReply::Version(v) => Some(v),
            MessageReply::Ack => None,
        },
        None => None,
    };

    let display = VersionDisplay {
        tool: env!("CARGO_PKG_VERSION").to_string(),
        cache_version,
    };

    match ctx.format {
        OutputFormat::Json => println!("{}", json::format_json(&display)?),
        _ => {
            println!("swcache version {}", display.tool);
            match &display.cache_version {
                Some(v) => println!("cache version {}", v),
                None => println!("cache version {} (not installed)", ctx.config.version),
            }
        }
    }

    Ok(())
}
