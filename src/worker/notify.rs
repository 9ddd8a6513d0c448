//! Push delivery and notification clicks

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Serialize;

use super::clients::{ClientId, ClientRegistry};
use crate::config::NotificationText;

/// Action id that only dismisses the notification
pub const ACTION_CLOSE: &str = "close";
/// Action id that opens the app
pub const ACTION_EXPLORE: &str = "explore";

/// Incoming push message
#[derive(Debug, Clone, Default)]
pub struct PushEvent {
    /// Plain-text payload, if the sender attached one
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

/// Notification shown for a push message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    /// Page opened on click
    pub url: String,
    pub arrived_at: DateTime<Utc>,
    pub actions: Vec<NotificationAction>,
}

/// User interaction with a displayed notification
#[derive(Debug, Clone)]
pub struct NotificationClick {
    /// Action button pressed; `None` for a click on the body
    pub action: Option<String>,
    pub notification: Notification,
}

/// What a notification click did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClickOutcome {
    Dismissed,
    Focused(ClientId),
    Opened(ClientId),
}

/// Build the notification for a push event
pub fn build_notification(event: &PushEvent, text: &NotificationText) -> Notification {
    let body = event
        .data
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| text.default_body.clone());

    Notification {
        title: text.title.clone(),
        body,
        icon: text.icon.clone(),
        badge: text.icon.clone(),
        vibrate: vec![100, 50, 100],
        url: text.open_url.clone(),
        arrived_at: Utc::now(),
        actions: vec![
            NotificationAction {
                action: ACTION_EXPLORE.to_string(),
                title: "開く".to_string(),
            },
            NotificationAction {
                action: ACTION_CLOSE.to_string(),
                title: "閉じる".to_string(),
            },
        ],
    }
}

/// Focus an open page at the notification's URL, or open one.
pub async fn handle_click(
    click: &NotificationClick,
    clients: &ClientRegistry,
    origin: &Url,
    controller: Option<&str>,
) -> ClickOutcome {
    if click.action.as_deref() == Some(ACTION_CLOSE) {
        return ClickOutcome::Dismissed;
    }

    let target = origin
        .join(&click.notification.url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| origin.to_string());

    if let Some(id) = clients.find_by_url(&target).await
        && clients.focus(id).await
    {
        log::debug!("Notification click focused client {}", id);
        return ClickOutcome::Focused(id);
    }

    let id = clients
        .open_window(target, controller.map(str::to_string))
        .await;
    log::debug!("Notification click opened client {}", id);
    ClickOutcome::Opened(id)
}
