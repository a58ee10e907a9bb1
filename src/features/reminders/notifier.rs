//! # Reminder Notifications
//!
//! The surface a fired reminder reports to. The daemon either logs the
//! notification or posts it to a webhook that relays it to the device.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tap action that opens today's question
pub const OPEN_TODAY_ACTION: &str = "open_today_question";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// What the client does when the notification is tapped
    pub tap_action: String,
}

impl Notification {
    pub fn daily_question() -> Self {
        Self {
            title: "Question of the Day".to_string(),
            body: "You haven't answered today's question yet. Take a minute and share your answer!"
                .to_string(),
            tap_action: OPEN_TODAY_ACTION.to_string(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Writes notifications to the log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        info!(
            "🔔 {}: {} [{}]",
            notification.title, notification.body, notification.tap_action
        );
        Ok(())
    }
}

/// Posts notifications as JSON to a webhook
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .with_context(|| format!("Failed to reach notification webhook {}", self.url))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Notification webhook {} returned {}",
                self.url,
                response.status()
            ));
        }
        debug!("Delivered notification '{}' to webhook", notification.title);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_question_notification() {
        let notification = Notification::daily_question();
        assert_eq!(notification.title, "Question of the Day");
        assert_eq!(notification.tap_action, OPEN_TODAY_ACTION);
    }

    #[test]
    fn test_notification_serializes_tap_action() {
        let json = serde_json::to_value(Notification::daily_question()).unwrap();
        assert_eq!(json["tap_action"], OPEN_TODAY_ACTION);
        assert!(json["body"].as_str().unwrap().contains("today's question"));
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        assert!(LogNotifier
            .notify(&Notification::daily_question())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_webhook_unreachable_is_error() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/notify", Duration::from_millis(500))
            .unwrap();
        assert!(notifier.notify(&Notification::daily_question()).await.is_err());
    }
}
