use serde::{Deserialize, Serialize};

use crate::types::PostInsights;

/// Incoming WebSocket message from client
#[derive(Debug, Deserialize)]
pub struct WebSocketMessage {
    pub action: String,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

impl WebSocketMessage {
    /// Topic named by the message: an explicit `topic`, or a `postId`
    /// expanded with the insights prefix.
    pub fn topic(&self, insights_prefix: &str) -> Option<String> {
        if let Some(topic) = self.str_field("topic") {
            return Some(topic.to_string());
        }
        self.str_field("postId")
            .map(|post_id| format!("{}{}", insights_prefix, post_id))
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.data
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Actions a client may send on the `$default` route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebSocketAction {
    Subscribe,
    Unsubscribe,
}

impl WebSocketAction {
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "subscribe" => Some(Self::Subscribe),
            "unsubscribe" => Some(Self::Unsubscribe),
            _ => None,
        }
    }
}

/// Message pushed to subscribed clients
#[derive(Debug, Serialize)]
pub struct BroadcastMessage {
    pub r#type: String,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

impl BroadcastMessage {
    pub fn new(message_type: &str, data: serde_json::Value) -> Self {
        Self {
            r#type: message_type.to_string(),
            data,
        }
    }

    pub fn insights_updated(insights: &PostInsights) -> Result<Self, serde_json::Error> {
        Ok(Self::new("insights_updated", serde_json::to_value(insights)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_topic_from_message() {
        let explicit: WebSocketMessage =
            serde_json::from_value(json!({"action": "subscribe", "topic": "/topic/insights/p9"})).unwrap();
        assert_eq!(explicit.topic("/topic/insights/").as_deref(), Some("/topic/insights/p9"));

        let shorthand: WebSocketMessage =
            serde_json::from_value(json!({"action": "subscribe", "postId": "p9"})).unwrap();
        assert_eq!(shorthand.topic("/topic/insights/").as_deref(), Some("/topic/insights/p9"));

        let blank: WebSocketMessage =
            serde_json::from_value(json!({"action": "subscribe", "topic": "  "})).unwrap();
        assert_eq!(blank.topic("/topic/insights/"), None);
    }

    #[test]
    fn test_action_names() {
        assert_eq!(WebSocketAction::parse("subscribe"), Some(WebSocketAction::Subscribe));
        assert_eq!(WebSocketAction::parse("unsubscribe"), Some(WebSocketAction::Unsubscribe));
        assert_eq!(WebSocketAction::parse("create_project"), None);
    }

    #[test]
    fn test_insights_broadcast_shape() {
        let mut insights = PostInsights::new("p1");
        insights.views = 4;

        let message = BroadcastMessage::insights_updated(&insights).unwrap();
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["type"], "insights_updated");
        assert_eq!(value["postId"], "p1");
        assert_eq!(value["views"], 4);
    }
}
