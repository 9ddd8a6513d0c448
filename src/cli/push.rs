//! Push command: render the notification a push message would show

use colored::Colorize;
use serde::Serialize;

use crate::cli::{CommandContext, GlobalOptions, OutputFormat};
use crate::error::{Error, Result};
use crate::output::json;
use crate::worker::notify::Notification;
use crate::worker::{ClickOutcome, Event, EventOutcome, NotificationClick, PushEvent};

#[derive(Serialize)]
struct PushDisplay {
    #[serde(flatten)]
    notification: Notification,
    #[serde(skip_serializing_if = "Option::is_none")]
    click: Option<ClickOutcome>,
}

/// An empty action means a click on the notification body
fn click_for(notification: Notification, action: &str) -> NotificationClick {
    NotificationClick {
        action: Some(action).filter(|a| !a.is_empty()).map(str::to_string),
        notification,
    }
}

fn describe_click(outcome: ClickOutcome, url: &str) -> String {
    match outcome {
        ClickOutcome::Dismissed => "dismissed".to_string(),
        ClickOutcome::Focused(id) => format!("focused client {} at {}", id, url),
        ClickOutcome::Opened(id) => format!("opened {} in client {}", url, id),
    }
}

/// Deliver a push message to the active worker and print its notification
pub async fn run(opts: &GlobalOptions, body: Option<&str>, click: Option<&str>) -> Result<()> {
    let ctx = CommandContext::controlled(opts).await?;
    let worker = ctx.active_worker().await?;

    let event = Event::Push(PushEvent {
        data: body.map(str::to_string),
    });
    let notification = match worker.dispatch(event).await? {
        EventOutcome::Notification(n) => n,
        other => return Err(Error::Other(format!("unexpected push outcome: {:?}", other))),
    };

    let click = match click {
        Some(action) => {
            let event = Event::NotificationClick(click_for(notification.clone(), action));
            match worker.dispatch(event).await? {
                EventOutcome::Click(outcome) => Some(outcome),
                other => {
                    return Err(Error::Other(format!("unexpected click outcome: {:?}", other)));
                }
            }
        }
        None => None,
    };

    let display = PushDisplay {
        notification,
        click,
    };

    match ctx.format {
        OutputFormat::Json => println!("{}", json::format_json(&display)?),
        _ => {
            let notification = &display.notification;
            println!("{}", notification.title.bold());
            println!("{}", notification.body);
            let actions: Vec<&str> = notification
                .actions
                .iter()
                .map(|a| a.title.as_str())
                .collect();
            println!(
                "{}",
                format!("[{}] → {}", actions.join(" | "), notification.url).dimmed()
            );
            if let Some(outcome) = display.click {
                println!("{} {}", "✓".green(), describe_click(outcome, &notification.url));
            }
        }
    }

    Ok(())
}
