use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;

use crate::store::{DynamoStore, StoreResult};

/// WebSocket connection stored in DynamoDB
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub connection_id: String,
    pub user_id: String,
    pub connected_at: String,
}

impl Connection {
    pub fn new(connection_id: &str, user_id: &str) -> Self {
        Self {
            connection_id: connection_id.to_string(),
            user_id: user_id.to_string(),
            connected_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Who is connected and which topics they listen to.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn save_connection(&self, connection: Connection) -> StoreResult<()>;

    /// Drops the connection together with all of its subscriptions.
    async fn remove_connection(&self, connection_id: &str) -> StoreResult<()>;

    async fn subscribe(&self, connection_id: &str, topic: &str) -> StoreResult<()>;

    async fn unsubscribe(&self, connection_id: &str, topic: &str) -> StoreResult<()>;

    /// Connection ids subscribed to `topic`.
    async fn subscribers(&self, topic: &str) -> StoreResult<Vec<String>>;
}

fn connection_pk(connection_id: &str) -> String {
    format!("CONNECTION#{}", connection_id)
}

fn topic_sk(topic: &str) -> String {
    format!("TOPIC#{}", topic)
}

#[async_trait]
impl SubscriptionStore for DynamoStore {
    async fn save_connection(&self, connection: Connection) -> StoreResult<()> {
        let pk = connection_pk(&connection.connection_id);

        self.client()
            .put_item()
            .table_name(self.table_name())
            .item("PK", AttributeValue::S(pk.clone()))
            .item("SK", AttributeValue::S(pk))
            .item("connection_id", AttributeValue::S(connection.connection_id.clone()))
            .item("user_id", AttributeValue::S(connection.user_id.clone()))
            .item("connected_at", AttributeValue::S(connection.connected_at))
            .item("entity_type", AttributeValue::S("connection".to_string()))
            .send()
            .await?;

        tracing::info!(
            "Connection saved: {} (user: {})",
            connection.connection_id,
            connection.user_id
        );
        Ok(())
    }

    async fn remove_connection(&self, connection_id: &str) -> StoreResult<()> {
        let pk = connection_pk(connection_id);
        let mut sort_keys = Vec::new();
        let mut start_key = None;

        // Read every page before deleting.
        loop {
            let result = self
                .client()
                .query()
                .table_name(self.table_name())
                .key_condition_expression("PK = :pk")
                .expression_attribute_values(":pk", AttributeValue::S(pk.clone()))
                .projection_expression("SK")
                .set_exclusive_start_key(start_key.take())
                .send()
                .await?;

            for item in result.items() {
                if let Some(sk) = item.get("SK").and_then(|v| v.as_s().ok()) {
                    sort_keys.push(sk.clone());
                }
            }

            match result.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        for sk in sort_keys {
            self.client()
                .delete_item()
                .table_name(self.table_name())
                .key("PK", AttributeValue::S(pk.clone()))
                .key("SK", AttributeValue::S(sk))
                .send()
                .await?;
        }

        tracing::info!("Connection removed: {}", connection_id);
        Ok(())
    }

    async fn subscribe(&self, connection_id: &str, topic: &str) -> StoreResult<()> {
        self.client()
            .put_item()
            .table_name(self.table_name())
            .item("PK", AttributeValue::S(connection_pk(connection_id)))
            .item("SK", AttributeValue::S(topic_sk(topic)))
            .item("connection_id", AttributeValue::S(connection_id.to_string()))
            .item("topic", AttributeValue::S(topic.to_string()))
            .item("entity_type", AttributeValue::S("subscription".to_string()))
            .send()
            .await?;

        tracing::info!("Connection {} subscribed to {}", connection_id, topic);
        Ok(())
    }

    async fn unsubscribe(&self, connection_id: &str, topic: &str) -> StoreResult<()> {
        self.client()
            .delete_item()
            .table_name(self.table_name())
            .key("PK", AttributeValue::S(connection_pk(connection_id)))
            .key("SK", AttributeValue::S(topic_sk(topic)))
            .send()
            .await?;

        tracing::info!("Connection {} unsubscribed from {}", connection_id, topic);
        Ok(())
    }

    async fn subscribers(&self, topic: &str) -> StoreResult<Vec<String>> {
        let mut connection_ids = Vec::new();
        let mut start_key = None;

        loop {
            let result = self
                .client()
                .scan()
                .table_name(self.table_name())
                .filter_expression("entity_type = :type AND topic = :topic")
                .expression_attribute_values(":type", AttributeValue::S("subscription".to_string()))
                .expression_attribute_values(":topic", AttributeValue::S(topic.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await?;

            for item in result.items() {
                if let Some(conn_id) = item.get("connection_id").and_then(|v| v.as_s().ok()) {
                    connection_ids.push(conn_id.clone());
                }
            }

            match result.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(connection_ids)
    }
}
