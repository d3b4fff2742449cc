//! Record stores the services depend on.
//!
//! Each trait is implemented twice: [`dynamo::DynamoStore`] against the single
//! DynamoDB table, and [`memory::MemoryStore`] for tests and local runs.

pub mod dynamo;
pub mod memory;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{PostInsights, User};

pub use dynamo::DynamoStore;
pub use memory::MemoryStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn save(&self, user: User) -> StoreResult<User>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Case-insensitive substring match on the username.
    async fn find_by_username_containing(&self, fragment: &str) -> StoreResult<Vec<User>>;

    async fn find_all(&self) -> StoreResult<Vec<User>>;
}

#[async_trait]
pub trait FollowStore: Send + Sync {
    /// Number of users following `user_id`.
    async fn count_by_followed_id(&self, user_id: &str) -> StoreResult<u64>;

    /// Number of users `user_id` follows.
    async fn count_by_follower_id(&self, user_id: &str) -> StoreResult<u64>;
}

#[async_trait]
pub trait InsightsStore: Send + Sync {
    async fn find_by_post_id(&self, post_id: &str) -> StoreResult<Option<PostInsights>>;

    async fn save(&self, insights: PostInsights) -> StoreResult<PostInsights>;

    async fn delete_by_post_id(&self, post_id: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait LikeStore: Send + Sync {
    async fn count_by_post_id(&self, post_id: &str) -> StoreResult<u64>;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn count_by_post_id(&self, post_id: &str) -> StoreResult<u64>;
}
