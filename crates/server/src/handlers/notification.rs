//! Push and notification-click boundary.
//!
//! Both handlers are stateless: one event in, platform actions out.

use roadcache_core::NotificationConfig;
use serde::{Deserialize, Serialize};

use super::PlatformAction;

/// Options passed to the platform's notification display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOptions {
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    /// Stable grouping tag so a new notification replaces the previous one.
    pub tag: String,
    pub require_interaction: bool,
}

/// A push delivery: show a notification with the payload text, or the
/// configured default when the push carried no payload.
pub fn handle_push(payload: Option<&str>, config: &NotificationConfig) -> PlatformAction {
    tracing::info!(has_payload = payload.is_some(), "push received");
    let body = payload.map_or_else(|| config.default_body.clone(), str::to_string);
    PlatformAction::ShowNotification {
        title: config.title.clone(),
        options: NotificationOptions {
            body,
            icon: config.icon.clone(),
            badge: config.badge.clone(),
            vibrate: config.vibrate.clone(),
            tag: config.tag.clone(),
            require_interaction: config.require_interaction,
        },
    }
}

/// A click on a shown notification: dismiss it and bring the application up.
pub fn handle_notification_click(tag: Option<String>, start_url: &str) -> Vec<PlatformAction> {
    tracing::info!(tag = tag.as_deref().unwrap_or(""), "notification clicked");
    vec![PlatformAction::CloseNotification { tag }, PlatformAction::OpenWindow { url: start_url.to_string() }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_push_with_payload() {
        let config = NotificationConfig::default();
        let action = handle_push(Some("Now playing: Track 3"), &config);
        match action {
            PlatformAction::ShowNotification { title, options } => {
                assert_eq!(title, config.title);
                assert_eq!(options.body, "Now playing: Track 3");
                assert_eq!(options.tag, "music-player");
                assert_eq!(options.vibrate, vec![200, 100, 200]);
                assert!(!options.require_interaction);
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_push_without_payload_uses_default() {
        let config = NotificationConfig::default();
        let PlatformAction::ShowNotification { options, .. } = handle_push(None, &config) else {
            panic!("expected a notification");
        };
        assert_eq!(options.body, config.default_body);
    }

    #[test]
    fn test_show_notification_wire_shape() {
        let config = NotificationConfig::default();
        let value = serde_json::to_value(handle_push(Some("hi"), &config)).unwrap();
        assert_eq!(value["type"], "show_notification");
        assert_eq!(value["options"]["body"], "hi");
        assert_eq!(value["options"]["icon"], "car-music-icon.png");
        assert_eq!(value["options"]["badge"], "car-music-icon.png");
        assert_eq!(value["options"]["vibrate"], json!([200, 100, 200]));
        assert_eq!(value["options"]["tag"], "music-player");
        assert_eq!(value["options"]["requireInteraction"], false);
    }

    #[test]
    fn test_click_closes_then_opens() {
        let actions = handle_notification_click(Some("music-player".into()), "http://localhost:8080/index.html");
        assert_eq!(
            actions,
            vec![
                PlatformAction::CloseNotification { tag: Some("music-player".into()) },
                PlatformAction::OpenWindow { url: "http://localhost:8080/index.html".into() },
            ]
        );
    }
}
