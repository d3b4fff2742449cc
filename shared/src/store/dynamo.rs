use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, Select};
use aws_sdk_dynamodb::Client as DynamoClient;
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use super::{CommentStore, FollowStore, InsightsStore, LikeStore, StoreResult, UserStore};
use crate::error::StoreError;
use crate::types::{PostInsights, User};

type Item = HashMap<String, AttributeValue>;

const USER_ENTITY: &str = "user";
const INSIGHTS_ENTITY: &str = "post_insights";
const PROFILE_SK: &str = "PROFILE";
const INSIGHTS_SK: &str = "INSIGHTS";

/// All stores over one DynamoDB table (single-table layout, `PK`/`SK` keys).
#[derive(Clone)]
pub struct DynamoStore {
    client: DynamoClient,
    table_name: String,
}

impl DynamoStore {
    pub fn new(client: DynamoClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub fn client(&self) -> &DynamoClient {
        &self.client
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Scan the whole table, following `LastEvaluatedKey` until exhausted.
    async fn scan_all(
        &self,
        filter: &str,
        names: &[(&str, &str)],
        values: &[(&str, AttributeValue)],
    ) -> StoreResult<Vec<Item>> {
        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let mut request = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression(filter)
                .set_exclusive_start_key(start_key.take());

            for (k, v) in names {
                request = request.expression_attribute_names(*k, *v);
            }
            for (k, v) in values {
                request = request.expression_attribute_values(*k, v.clone());
            }

            let output = request.send().await?;
            items.extend(output.items.unwrap_or_default());

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(items)
    }

    /// Count the items in partition `pk` whose sort key starts with `sk_prefix`.
    async fn count_with_prefix(&self, pk: String, sk_prefix: &str) -> StoreResult<u64> {
        let mut total = 0u64;
        let mut start_key: Option<Item> = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
                .expression_attribute_values(":pk", AttributeValue::S(pk.clone()))
                .expression_attribute_values(":sk_prefix", AttributeValue::S(sk_prefix.to_string()))
                .select(Select::Count)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await?;

            total += u64::try_from(output.count).unwrap_or(0);

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(total)
    }

    async fn find_user_by_attribute(&self, attribute: &str, value: &str) -> StoreResult<Option<User>> {
        let items = self
            .scan_all(
                "#type = :type AND #attr = :value",
                &[("#type", "entity_type"), ("#attr", attribute)],
                &[
                    (":type", AttributeValue::S(USER_ENTITY.to_string())),
                    (":value", AttributeValue::S(value.to_string())),
                ],
            )
            .await?;

        items.first().map(user_from_item).transpose()
    }
}

fn user_pk(id: &str) -> String {
    format!("USER#{}", id)
}

fn post_pk(post_id: &str) -> String {
    format!("POST#{}", post_id)
}

fn string_attr(item: &Item, name: &str) -> Option<String> {
    item.get(name).and_then(|v| v.as_s().ok()).map(|s| s.to_string())
}

fn number_attr<T: FromStr>(item: &Item, name: &str) -> Option<T> {
    item.get(name)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse().ok())
}

fn user_to_item(user: &User) -> Item {
    let mut item = Item::new();
    let pk = user_pk(&user.id);

    item.insert("PK".to_string(), AttributeValue::S(pk));
    item.insert("SK".to_string(), AttributeValue::S(PROFILE_SK.to_string()));
    item.insert("entity_type".to_string(), AttributeValue::S(USER_ENTITY.to_string()));
    item.insert("id".to_string(), AttributeValue::S(user.id.clone()));
    item.insert("username".to_string(), AttributeValue::S(user.username.clone()));
    item.insert(
        "username_lower".to_string(),
        AttributeValue::S(user.username.to_lowercase()),
    );

    let optional = [
        ("email", &user.email),
        ("password", &user.password),
        ("bio", &user.bio),
        ("role", &user.role),
        ("full_name", &user.full_name),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            item.insert(name.to_string(), AttributeValue::S(value.clone()));
        }
    }

    item.insert(
        "specializations".to_string(),
        AttributeValue::L(
            user.specializations
                .iter()
                .map(|s| AttributeValue::S(s.clone()))
                .collect(),
        ),
    );

    item
}

fn user_from_item(item: &Item) -> StoreResult<User> {
    let id = string_attr(item, "id").ok_or_else(|| StoreError::Malformed {
        entity: "user",
        message: "missing id".to_string(),
    })?;
    let username = string_attr(item, "username").ok_or_else(|| StoreError::Malformed {
        entity: "user",
        message: format!("user {} has no username", id),
    })?;

    let specializations: BTreeSet<String> = match item.get("specializations") {
        Some(AttributeValue::L(values)) => values
            .iter()
            .filter_map(|v| v.as_s().ok().cloned())
            .collect(),
        Some(AttributeValue::Ss(values)) => values.iter().cloned().collect(),
        _ => BTreeSet::new(),
    };

    Ok(User {
        id,
        username,
        email: string_attr(item, "email"),
        password: string_attr(item, "password"),
        bio: string_attr(item, "bio"),
        role: string_attr(item, "role"),
        full_name: string_attr(item, "full_name"),
        specializations,
    })
}

fn insights_to_item(insights: &PostInsights, id: &str) -> Item {
    let mut item = Item::new();

    item.insert("PK".to_string(), AttributeValue::S(post_pk(&insights.post_id)));
    item.insert("SK".to_string(), AttributeValue::S(INSIGHTS_SK.to_string()));
    item.insert("entity_type".to_string(), AttributeValue::S(INSIGHTS_ENTITY.to_string()));
    item.insert("id".to_string(), AttributeValue::S(id.to_string()));
    item.insert("post_id".to_string(), AttributeValue::S(insights.post_id.clone()));

    let counters = [
        ("views", insights.views),
        ("unique_viewers", insights.unique_viewers),
        ("like_count", insights.like_count),
        ("comment_count", insights.comment_count),
        ("share_count", insights.share_count),
    ];
    for (name, value) in counters {
        item.insert(name.to_string(), AttributeValue::N(value.to_string()));
    }
    item.insert(
        "engagement_rate".to_string(),
        AttributeValue::N(insights.engagement_rate.to_string()),
    );

    item
}

fn insights_from_item(item: &Item) -> StoreResult<PostInsights> {
    let post_id = string_attr(item, "post_id").ok_or_else(|| StoreError::Malformed {
        entity: "post_insights",
        message: "missing post_id".to_string(),
    })?;

    Ok(PostInsights {
        id: string_attr(item, "id"),
        post_id,
        views: number_attr(item, "views").unwrap_or(0),
        unique_viewers: number_attr(item, "unique_viewers").unwrap_or(0),
        like_count: number_attr(item, "like_count").unwrap_or(0),
        comment_count: number_attr(item, "comment_count").unwrap_or(0),
        share_count: number_attr(item, "share_count").unwrap_or(0),
        engagement_rate: number_attr(item, "engagement_rate").unwrap_or(0.0),
    })
}

#[async_trait]
impl UserStore for DynamoStore {
    async fn save(&self, user: User) -> StoreResult<User> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(user_to_item(&user)))
            .send()
            .await?;

        tracing::info!("User saved: {}", user.id);
        Ok(user)
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(user_pk(id)))
            .key("SK", AttributeValue::S(PROFILE_SK.to_string()))
            .send()
            .await?;

        result.item().map(user_from_item).transpose()
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.find_user_by_attribute("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.find_user_by_attribute("email", email).await
    }

    async fn find_by_username_containing(&self, fragment: &str) -> StoreResult<Vec<User>> {
        if fragment.is_empty() {
            return self.find_all().await;
        }

        let items = self
            .scan_all(
                "#type = :type AND contains(#username_lower, :fragment)",
                &[("#type", "entity_type"), ("#username_lower", "username_lower")],
                &[
                    (":type", AttributeValue::S(USER_ENTITY.to_string())),
                    (":fragment", AttributeValue::S(fragment.to_lowercase())),
                ],
            )
            .await?;

        items.iter().map(user_from_item).collect()
    }

    async fn find_all(&self) -> StoreResult<Vec<User>> {
        let items = self
            .scan_all(
                "#type = :type",
                &[("#type", "entity_type")],
                &[(":type", AttributeValue::S(USER_ENTITY.to_string()))],
            )
            .await?;

        items.iter().map(user_from_item).collect()
    }
}

#[async_trait]
impl FollowStore for DynamoStore {
    async fn count_by_followed_id(&self, user_id: &str) -> StoreResult<u64> {
        self.count_with_prefix(user_pk(user_id), "FOLLOWER#").await
    }

    async fn count_by_follower_id(&self, user_id: &str) -> StoreResult<u64> {
        self.count_with_prefix(user_pk(user_id), "FOLLOWING#").await
    }
}

#[async_trait]
impl InsightsStore for DynamoStore {
    async fn find_by_post_id(&self, post_id: &str) -> StoreResult<Option<PostInsights>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(post_pk(post_id)))
            .key("SK", AttributeValue::S(INSIGHTS_SK.to_string()))
            .consistent_read(true)
            .send()
            .await?;

        result.item().map(insights_from_item).transpose()
    }

    async fn save(&self, mut insights: PostInsights) -> StoreResult<PostInsights> {
        let id = insights
            .id
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone();

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(insights_to_item(&insights, &id)))
            .send()
            .await?;

        Ok(insights)
    }

    async fn delete_by_post_id(&self, post_id: &str) -> StoreResult<()> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(post_pk(post_id)))
            .key("SK", AttributeValue::S(INSIGHTS_SK.to_string()))
            .send()
            .await?;

        tracing::info!("Insights removed for post {}", post_id);
        Ok(())
    }
}

#[async_trait]
impl LikeStore for DynamoStore {
    async fn count_by_post_id(&self, post_id: &str) -> StoreResult<u64> {
        self.count_with_prefix(post_pk(post_id), "LIKE#").await
    }
}

#[async_trait]
impl CommentStore for DynamoStore {
    async fn count_by_post_id(&self, post_id: &str) -> StoreResult<u64> {
        self.count_with_prefix(post_pk(post_id), "COMMENT#").await
    }
}
