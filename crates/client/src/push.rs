//! Push messages and notification delivery.

use async_trait::async_trait;
use orc_core::Error;
use serde::{Deserialize, Serialize};

/// Payload carried by a push message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PushPayload {
    pub title: String,
    #[serde(default)]
    pub body: String,
}

impl PushPayload {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self { title: title.into(), body: body.into() }
    }
}

/// A notification ready to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
}

impl Notification {
    pub fn from_payload(payload: PushPayload, icon: &str) -> Self {
        Self { title: payload.title, body: payload.body, icon: icon.to_string() }
    }
}

/// Something that can put a notification in front of the user.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, notification: Notification) -> Result<(), Error>;
}

/// Emits each notification as a structured log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn show(&self, notification: Notification) -> Result<(), Error> {
        tracing::info!(
            title = %notification.title,
            body = %notification.body,
            icon = %notification.icon,
            "notification"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_wire_format() {
        let payload: PushPayload = serde_json::from_str(r#"{"title":"Reminder","body":"Oil change tomorrow"}"#).unwrap();
        assert_eq!(payload, PushPayload::new("Reminder", "Oil change tomorrow"));
    }

    #[test]
    fn test_payload_body_optional() {
        let payload: PushPayload = serde_json::from_str(r#"{"title":"Ping"}"#).unwrap();
        assert_eq!(payload.body, "");
    }

    #[test]
    fn test_payload_requires_title() {
        assert!(serde_json::from_str::<PushPayload>(r#"{"body":"x"}"#).is_err());
    }

    #[test]
    fn test_notification_carries_icon() {
        let n = Notification::from_payload(PushPayload::new("A", "B"), "/pwa-192x192.png");
        assert_eq!(n.icon, "/pwa-192x192.png");
        assert_eq!(n.title, "A");
    }

    #[tokio::test]
    async fn test_tracing_notifier_succeeds() {
        TracingNotifier.show(Notification::from_payload(PushPayload::new("A", "B"), "/i.png")).await.unwrap();
    }
}
