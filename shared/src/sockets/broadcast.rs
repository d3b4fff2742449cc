use async_trait::async_trait;
use aws_sdk_apigatewaymanagement::Client as ApiGatewayManagementClient;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::connections::SubscriptionStore;
use super::messages::BroadcastMessage;
use crate::error::ChannelError;

/// Fire-and-forget delivery of a message to everyone listening on a topic.
#[async_trait]
pub trait LiveChannel: Send + Sync {
    async fn publish(&self, topic: &str, message: &BroadcastMessage) -> Result<(), ChannelError>;
}

/// Pushes to subscribed WebSocket connections through the API Gateway
/// Management API.
pub struct ApiGatewayChannel {
    client: ApiGatewayManagementClient,
    subscriptions: Arc<dyn SubscriptionStore>,
}

impl ApiGatewayChannel {
    pub fn new(client: ApiGatewayManagementClient, subscriptions: Arc<dyn SubscriptionStore>) -> Self {
        Self {
            client,
            subscriptions,
        }
    }
}

#[async_trait]
impl LiveChannel for ApiGatewayChannel {
    async fn publish(&self, topic: &str, message: &BroadcastMessage) -> Result<(), ChannelError> {
        let connection_ids = self.subscriptions.subscribers(topic).await?;
        let message_json = serde_json::to_string(message)?;

        tracing::info!("Broadcasting to {} connections on {}", connection_ids.len(), topic);

        for connection_id in connection_ids {
            let result = self
                .client
                .post_to_connection()
                .connection_id(&connection_id)
                .data(message_json.as_bytes().to_vec().into())
                .send()
                .await;

            let Err(e) = result else { continue };

            let gone = e
                .as_service_error()
                .is_some_and(|service_err| service_err.is_gone_exception());

            if gone {
                tracing::info!("Connection {} is gone, removing it", connection_id);
                if let Err(remove_err) = self.subscriptions.remove_connection(&connection_id).await {
                    tracing::warn!(
                        "Failed to remove stale connection {}: {}",
                        connection_id,
                        remove_err
                    );
                }
            } else {
                tracing::warn!("Failed to send to connection {}: {}", connection_id, e);
            }
        }

        Ok(())
    }
}

/// Used when no WebSocket endpoint is configured.
pub struct NoopChannel;

#[async_trait]
impl LiveChannel for NoopChannel {
    async fn publish(&self, topic: &str, message: &BroadcastMessage) -> Result<(), ChannelError> {
        tracing::debug!("No WebSocket endpoint configured, dropping {} on {}", message.r#type, topic);
        Ok(())
    }
}

/// Records everything published. Can be told to fail.
#[derive(Default)]
pub struct MemoryChannel {
    published: Mutex<Vec<(String, serde_json::Value)>>,
    failing: AtomicBool,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<(String, serde_json::Value)> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl LiveChannel for MemoryChannel {
    async fn publish(&self, topic: &str, message: &BroadcastMessage) -> Result<(), ChannelError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ChannelError::Delivery(format!("channel down for {}", topic)));
        }

        let payload = serde_json::to_value(message)?;
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((topic.to_string(), payload));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_channel_records_in_order() {
        let channel = MemoryChannel::new();
        channel
            .publish("a", &BroadcastMessage::new("insights_updated", json!({"views": 1})))
            .await
            .unwrap();
        channel
            .publish("b", &BroadcastMessage::new("insights_updated", json!({"views": 2})))
            .await
            .unwrap();

        let published = channel.published();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].0, "a");
        assert_eq!(published[1].1["views"], 2);
        assert_eq!(published[1].1["type"], "insights_updated");
    }

    #[tokio::test]
    async fn test_failing_channel_records_nothing() {
        let channel = MemoryChannel::new();
        channel.set_failing(true);

        let result = channel
            .publish("a", &BroadcastMessage::new("insights_updated", json!({})))
            .await;

        assert!(matches!(result, Err(ChannelError::Delivery(_))));
        assert!(channel.published().is_empty());
    }

    #[tokio::test]
    async fn test_noop_channel_accepts_everything() {
        let result = NoopChannel
            .publish("a", &BroadcastMessage::new("insights_updated", json!({})))
            .await;
        assert!(result.is_ok());
    }
}
