//! Fetch command: run one request through the active worker

use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{CommandContext, GlobalOptions, OutputFormat};
use crate::error::Result;
use crate::output::{json, table};
use crate::worker::{InterceptedRequest, RequestCategory, ResponseSource, Served};

/// Display format for a served response
#[derive(Tabled, Serialize)]
struct FetchDisplay {
    #[tabled(rename = "URL")]
    url: String,

    #[tabled(rename = "STATUS")]
    status: u16,

    #[tabled(rename = "SOURCE")]
    source: String,

    #[tabled(rename = "POLICY")]
    policy: String,

    #[tabled(rename = "TYPE")]
    content_type: String,

    #[tabled(rename = "BYTES")]
    bytes: usize,

    #[tabled(skip)]
    body: String,
}

impl FetchDisplay {
    fn new(url: String, served: Served) -> Self {
        Self {
            url,
            status: served.response.status,
            source: source_label(served.source).to_string(),
            policy: policy_label(served.category).to_string(),
            content_type: served
                .response
                .header("content-type")
                .unwrap_or("-")
                .to_string(),
            bytes: served.response.body.len(),
            body: served.response.body_text(),
        }
    }
}

fn source_label(source: ResponseSource) -> &'static str {
    match source {
        ResponseSource::Network => "network",
        ResponseSource::Cache => "cache",
        ResponseSource::Offline => "offline",
    }
}

fn policy_label(category: Option<RequestCategory>) -> &'static str {
    match category {
        Some(RequestCategory::Navigation) => "navigation",
        Some(RequestCategory::Api) => "api",
        Some(RequestCategory::Static) => "static",
        None => "passthrough",
    }
}

/// Run the fetch command
pub async fn run(
    opts: &GlobalOptions,
    target: &str,
    accept: Option<&str>,
    method: &str,
) -> Result<()> {
    let ctx = CommandContext::controlled(opts).await?;
    let url = ctx.config.resolve(target)?;

    let mut request = InterceptedRequest::new(method, url.clone());
    if let Some(accept) = accept {
        request = request.with_accept(accept);
    }

    let served = ctx.registration.fetch(request).await?;

    // Let background cache writes land before the process exits
    if let Some(worker) = ctx.registration.active().await {
        worker.wait_until_idle().await;
    }

    let display = FetchDisplay::new(url.to_string(), served);

    match ctx.format {
        OutputFormat::Json => println!("{}", json::format_json(&display)?),
        OutputFormat::Table => println!("{}", table::format_table(&[display])),
        OutputFormat::Pretty => {
            let status = if (200..300).contains(&display.status) {
                display.status.to_string().green()
            } else {
                display.status.to_string().yellow()
            };
            println!(
                "{} {} {}",
                status,
                display.url.bold(),
                format!("({}, {})", display.source, display.policy).dimmed()
            );
            if !display.body.is_empty() {
                println!();
                println!("{}", display.body);
            }
        }
    }

    Ok(())
}
