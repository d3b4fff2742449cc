use aws_lambda_events::event::dynamodb::{Event, EventRecord};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::Serialize;
use skillshare_shared::{config::Config, AppState};
use std::collections::BTreeSet;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let aws = aws_config::load_from_env().await;
    let state = AppState::from_config(Config::from_env(), &aws);

    run(service_fn(move |event: LambdaEvent<Event>| {
        let state = Arc::clone(&state);
        async move { function_handler(event, state).await }
    }))
    .await
}

async fn function_handler(event: LambdaEvent<Event>, state: Arc<AppState>) -> Result<(), Error> {
    tracing::info!("DynamoDB Stream event received with {} records", event.payload.records.len());

    let posts = affected_posts(&event.payload.records);

    for post_id in posts {
        let outcome = state.insights.sync_insights(&post_id).await;
        if outcome.is_healthy() {
            tracing::info!("Reconciled insights for post {}", post_id);
        } else {
            tracing::error!("Reconciliation for post {} ended {}", post_id, outcome.kind());
        }
    }

    Ok(())
}

/// Posts whose like or comment rows were inserted or removed, once each.
fn affected_posts(records: &[EventRecord]) -> BTreeSet<String> {
    records
        .iter()
        .filter_map(|record| match post_of_record(record) {
            Ok(post_id) => post_id,
            Err(e) => {
                tracing::error!("Failed to process record {}: {}", record.event_id, e);
                None
            }
        })
        .collect()
}

fn post_of_record(record: &EventRecord) -> Result<Option<String>, Error> {
    let event_name = record.event_name.as_str();
    if event_name != "INSERT" && event_name != "REMOVE" {
        return Ok(None);
    }

    // Keys are always present. Fall back to whichever image the event carries.
    let image = if !record.change.keys.is_empty() {
        &record.change.keys
    } else if record.change.new_image.is_empty() {
        &record.change.old_image
    } else {
        &record.change.new_image
    };

    let pk = image.get("PK").and_then(attribute_string).ok_or("Missing PK")?;
    let sk = image.get("SK").and_then(attribute_string).ok_or("Missing SK")?;

    Ok(post_of_keys(&pk, &sk))
}

fn post_of_keys(pk: &str, sk: &str) -> Option<String> {
    let post_id = pk.strip_prefix("POST#")?;
    if post_id.is_empty() {
        return None;
    }

    if sk.starts_with("LIKE#") || sk.starts_with("COMMENT#") {
        Some(post_id.to_string())
    } else {
        None
    }
}

/// String value of a stream attribute, tagged (`{"S": ".."}`) or plain.
fn attribute_string<A: Serialize>(attr: &A) -> Option<String> {
    match serde_json::to_value(attr).ok()? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Object(map) => map.get("S").and_then(|v| v.as_str()).map(|s| s.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_runtime::Context;
    use serde_json::json;
    use skillshare_shared::store::{InsightsStore, MemoryStore};

    fn record_json(event_name: &str, keys: serde_json::Value) -> serde_json::Value {
        json!({
            "awsRegion": "eu-west-1",
            "eventID": format!("{}-{}", event_name, keys),
            "eventName": event_name,
            "eventVersion": "1.1",
            "eventSource": "aws:dynamodb",
            "eventSourceARN": "arn:aws:dynamodb:eu-west-1:123456789012:table/skillshare/stream/2024-01-01T00:00:00.000",
            "dynamodb": {
                "ApproximateCreationDateTime": 1700000000.0,
                "Keys": keys,
                "SequenceNumber": "100",
                "SizeBytes": 40,
                "StreamViewType": "KEYS_ONLY"
            }
        })
    }

    fn record(event_name: &str, pk: &str, sk: &str) -> EventRecord {
        serde_json::from_value(record_json(
            event_name,
            json!({"PK": {"S": pk}, "SK": {"S": sk}}),
        ))
        .unwrap()
    }

    #[test]
    fn test_only_like_and_comment_rows_count() {
        assert_eq!(post_of_keys("POST#p1", "LIKE#u1"), Some("p1".to_string()));
        assert_eq!(post_of_keys("POST#p1", "COMMENT#c1"), Some("p1".to_string()));
        assert_eq!(post_of_keys("POST#p1", "INSIGHTS"), None);
        assert_eq!(post_of_keys("USER#u1", "FOLLOWER#u2"), None);
        assert_eq!(post_of_keys("CONNECTION#c1", "TOPIC#/topic/insights/p1"), None);
        assert_eq!(post_of_keys("POST#", "LIKE#u1"), None);
    }

    #[test]
    fn test_attribute_string_shapes() {
        assert_eq!(attribute_string(&json!("POST#p1")), Some("POST#p1".to_string()));
        assert_eq!(attribute_string(&json!({"S": "POST#p1"})), Some("POST#p1".to_string()));
        assert_eq!(attribute_string(&json!({"N": "3"})), None);
    }

    #[test]
    fn test_batch_is_deduplicated() {
        let records = vec![
            record("INSERT", "POST#p1", "LIKE#u1"),
            record("INSERT", "POST#p1", "LIKE#u2"),
            record("REMOVE", "POST#p1", "COMMENT#c1"),
            record("MODIFY", "POST#p2", "LIKE#u1"),
            record("INSERT", "POST#p3", "INSIGHTS"),
            record("INSERT", "POST#p4", "COMMENT#c9"),
        ];

        let posts: Vec<_> = affected_posts(&records).into_iter().collect();
        assert_eq!(posts, vec!["p1".to_string(), "p4".to_string()]);
    }

    #[test]
    fn test_record_without_keys_is_skipped() {
        let broken: EventRecord = serde_json::from_value(record_json("INSERT", json!({}))).unwrap();

        assert!(post_of_record(&broken).is_err());
        assert!(affected_posts(&[broken]).is_empty());
    }

    #[tokio::test]
    async fn test_batch_reconciles_each_post_once() {
        let store = Arc::new(MemoryStore::new());
        store.add_like("p1", "u1");
        store.add_like("p1", "u2");
        store.add_comment("p2", "c1");
        let (state, channel) = AppState::in_memory(store.clone());

        let payload: Event = serde_json::from_value(json!({
            "Records": [
                record_json("INSERT", json!({"PK": {"S": "POST#p1"}, "SK": {"S": "LIKE#u1"}})),
                record_json("INSERT", json!({"PK": {"S": "POST#p1"}, "SK": {"S": "LIKE#u2"}})),
                record_json("INSERT", json!({"PK": {"S": "POST#p2"}, "SK": {"S": "COMMENT#c1"}})),
                record_json("INSERT", json!({"PK": {"S": "USER#u1"}, "SK": {"S": "PROFILE"}})),
            ]
        }))
        .unwrap();

        function_handler(LambdaEvent::new(payload, Context::default()), state)
            .await
            .unwrap();

        let p1 = store.find_by_post_id("p1").await.unwrap().unwrap();
        let p2 = store.find_by_post_id("p2").await.unwrap().unwrap();
        assert_eq!(p1.like_count, 2);
        assert_eq!(p2.comment_count, 1);

        let topics: Vec<_> = channel.published().into_iter().map(|(topic, _)| topic).collect();
        assert_eq!(topics, vec!["/topic/insights/p1".to_string(), "/topic/insights/p2".to_string()]);
    }
}
