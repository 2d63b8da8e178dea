//! Discord webhook notification manager
//!
//! Sends per-database backup outcomes to a Discord-compatible webhook.
//! Delivery is best effort: failures are logged and never reach the caller.

use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::NotificationConfig;
use crate::model::{EventStatus, NotificationEvent};
use crate::stages::NotifyStage;

/// Longest detail text placed in an embed field
const MAX_DETAIL_CHARS: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum NotifyFailure {
    #[error("Failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Failed to send webhook: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Webhook answered with status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
}

/// Notification manager for sending Discord webhooks
pub struct NotificationManager {
    config: NotificationConfig,
}

/// Discord embed color codes (decimal)
#[derive(Debug, Clone, Copy)]
pub enum NotificationColor {
    /// Red - for failures
    Failure = 15158332,    // #E74C3C
    /// Green - for success
    Success = 3066993,     // #2ECC71
}

impl NotificationColor {
    fn as_decimal(&self) -> u32 {
        *self as u32
    }
}

/// Discord webhook payload
#[derive(Debug, Serialize)]
pub struct DiscordPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

#[derive(Debug, Serialize)]
struct DiscordEmbed {
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    color: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<DiscordField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    footer: Option<DiscordFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
}

#[derive(Debug, Serialize)]
struct DiscordField {
    name: String,
    value: String,
    inline: bool,
}

#[derive(Debug, Serialize)]
struct DiscordFooter {
    text: String,
}

impl NotificationManager {
    /// Create a new notification manager
    pub fn new(config: NotificationConfig) -> Self {
        Self { config }
    }

    /// Check if notifications are enabled for an event type
    pub fn is_enabled(&self, status: EventStatus) -> bool {
        if self.config.webhook_url.trim().is_empty() {
            return false;
        }
        self.config.notify_on.contains(&status)
    }

    /// Send a notification if enabled
    ///
    /// Returns `Ok(false)` when the event type is not enabled.
    pub fn send(&self, event: &NotificationEvent) -> Result<bool, NotifyFailure> {
        if !self.is_enabled(event.status) {
            debug!(
                "Notification type {:?} not enabled, skipping",
                event.status
            );
            return Ok(false);
        }

        let payload = self.build_payload(event);
        self.send_webhook(&payload)?;

        info!(
            "Sent {:?} notification for database '{}'",
            event.status, event.target.id
        );

        Ok(true)
    }

    /// Build Discord webhook payload
    pub fn build_payload(&self, event: &NotificationEvent) -> DiscordPayload {
        let (color, emoji, outcome) = match event.status {
            EventStatus::Failure => (NotificationColor::Failure, "\u{274C}", "Backup failed"), // Red X
            EventStatus::Success => (NotificationColor::Success, "\u{2705}", "Backup completed"), // Green check
        };

        let title = format!("{} {}: {}", emoji, self.config.project_name, event.target.id);

        let mut fields = vec![
            DiscordField {
                name: "Database".to_string(),
                value: event.target.id.clone(),
                inline: true,
            },
            DiscordField {
                name: "Status".to_string(),
                value: outcome.to_string(),
                inline: true,
            },
        ];

        if !event.detail.is_empty() {
            let detail = truncate_chars(&event.detail, MAX_DETAIL_CHARS);
            let value = match event.status {
                EventStatus::Failure => format!("```\n{}\n```", detail),
                EventStatus::Success => detail,
            };
            fields.push(DiscordField {
                name: "Detail".to_string(),
                value,
                inline: false,
            });
        }

        let embed = DiscordEmbed {
            title,
            description: Some(format!("{} for database '{}'", outcome, event.target.id)),
            color: color.as_decimal(),
            fields,
            footer: Some(DiscordFooter {
                text: "db-backup-manager".to_string(),
            }),
            timestamp: Some(Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()),
        };

        DiscordPayload {
            username: Some(self.config.project_name.clone()),
            content: None,
            embeds: vec![embed],
        }
    }

    /// Send webhook to Discord; only `204 No Content` counts as delivered
    fn send_webhook(&self, payload: &DiscordPayload) -> Result<(), NotifyFailure> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .build()
            .map_err(NotifyFailure::Client)?;

        let response = client
            .post(&self.config.webhook_url)
            .json(payload)
            .send()
            .map_err(NotifyFailure::Request)?;

        let status = response.status();
        if status == reqwest::StatusCode::NO_CONTENT {
            debug!("Discord webhook sent successfully");
            Ok(())
        } else {
            let body = response.text().unwrap_or_default();
            Err(NotifyFailure::UnexpectedStatus {
                status: status.as_u16(),
                body: truncate_chars(&body, MAX_DETAIL_CHARS),
            })
        }
    }
}

impl NotifyStage for NotificationManager {
    fn notify(&self, event: &NotificationEvent) {
        if let Err(e) = self.send(event) {
            warn!(
                "Failed to send {:?} notification for '{}': {}",
                event.status, event.target.id, e
            );
        }
    }
}

/// Shorten `text` to at most `max` characters, marking the cut
fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}
