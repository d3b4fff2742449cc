use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{CommentStore, FollowStore, InsightsStore, LikeStore, StoreResult, UserStore};
use crate::error::StoreError;
use crate::sockets::connections::{Connection, SubscriptionStore};
use crate::types::{PostInsights, User};

/// Process-local implementation of every store.
///
/// `set_unavailable(true)` makes every call fail with
/// [`StoreError::Unavailable`], which is how the degrade paths are exercised.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<BTreeMap<String, User>>,
    // (follower, followed)
    follows: RwLock<BTreeSet<(String, String)>>,
    insights: RwLock<HashMap<String, PostInsights>>,
    likes: RwLock<HashMap<String, BTreeSet<String>>>,
    comments: RwLock<HashMap<String, BTreeSet<String>>>,
    connections: RwLock<BTreeMap<String, Connection>>,
    subscriptions: RwLock<BTreeMap<String, BTreeSet<String>>>,
    next_insights_id: AtomicU64,
    unavailable: AtomicBool,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }

    pub fn follow(&self, follower_id: &str, followed_id: &str) {
        write(&self.follows).insert((follower_id.to_string(), followed_id.to_string()));
    }

    pub fn add_like(&self, post_id: &str, user_id: &str) {
        write(&self.likes)
            .entry(post_id.to_string())
            .or_default()
            .insert(user_id.to_string());
    }

    pub fn remove_like(&self, post_id: &str, user_id: &str) {
        if let Some(users) = write(&self.likes).get_mut(post_id) {
            users.remove(user_id);
        }
    }

    pub fn add_comment(&self, post_id: &str, comment_id: &str) {
        write(&self.comments)
            .entry(post_id.to_string())
            .or_default()
            .insert(comment_id.to_string());
    }

    /// Topics a connection is subscribed to.
    pub fn topics_of(&self, connection_id: &str) -> BTreeSet<String> {
        read(&self.subscriptions)
            .get(connection_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_connection(&self, connection_id: &str) -> bool {
        read(&self.connections).contains_key(connection_id)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn save(&self, user: User) -> StoreResult<User> {
        self.check()?;
        write(&self.users).insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        self.check()?;
        Ok(read(&self.users).get(id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.check()?;
        Ok(read(&self.users)
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.check()?;
        Ok(read(&self.users)
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn find_by_username_containing(&self, fragment: &str) -> StoreResult<Vec<User>> {
        self.check()?;
        let needle = fragment.to_lowercase();
        Ok(read(&self.users)
            .values()
            .filter(|u| u.username.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn find_all(&self) -> StoreResult<Vec<User>> {
        self.check()?;
        Ok(read(&self.users).values().cloned().collect())
    }
}

#[async_trait]
impl FollowStore for MemoryStore {
    async fn count_by_followed_id(&self, user_id: &str) -> StoreResult<u64> {
        self.check()?;
        Ok(read(&self.follows)
            .iter()
            .filter(|(_, followed)| followed == user_id)
            .count() as u64)
    }

    async fn count_by_follower_id(&self, user_id: &str) -> StoreResult<u64> {
        self.check()?;
        Ok(read(&self.follows)
            .iter()
            .filter(|(follower, _)| follower == user_id)
            .count() as u64)
    }
}

#[async_trait]
impl InsightsStore for MemoryStore {
    async fn find_by_post_id(&self, post_id: &str) -> StoreResult<Option<PostInsights>> {
        self.check()?;
        Ok(read(&self.insights).get(post_id).cloned())
    }

    async fn save(&self, mut insights: PostInsights) -> StoreResult<PostInsights> {
        self.check()?;
        if insights.id.is_none() {
            let next = self.next_insights_id.fetch_add(1, Ordering::SeqCst) + 1;
            insights.id = Some(format!("insights-{}", next));
        }
        write(&self.insights).insert(insights.post_id.clone(), insights.clone());
        Ok(insights)
    }

    async fn delete_by_post_id(&self, post_id: &str) -> StoreResult<()> {
        self.check()?;
        write(&self.insights).remove(post_id);
        Ok(())
    }
}

#[async_trait]
impl LikeStore for MemoryStore {
    async fn count_by_post_id(&self, post_id: &str) -> StoreResult<u64> {
        self.check()?;
        Ok(read(&self.likes).get(post_id).map_or(0, |s| s.len() as u64))
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn count_by_post_id(&self, post_id: &str) -> StoreResult<u64> {
        self.check()?;
        Ok(read(&self.comments).get(post_id).map_or(0, |s| s.len() as u64))
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn save_connection(&self, connection: Connection) -> StoreResult<()> {
        self.check()?;
        write(&self.connections).insert(connection.connection_id.clone(), connection);
        Ok(())
    }

    async fn remove_connection(&self, connection_id: &str) -> StoreResult<()> {
        self.check()?;
        write(&self.connections).remove(connection_id);
        write(&self.subscriptions).remove(connection_id);
        Ok(())
    }

    async fn subscribe(&self, connection_id: &str, topic: &str) -> StoreResult<()> {
        self.check()?;
        write(&self.subscriptions)
            .entry(connection_id.to_string())
            .or_default()
            .insert(topic.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, connection_id: &str, topic: &str) -> StoreResult<()> {
        self.check()?;
        if let Some(topics) = write(&self.subscriptions).get_mut(connection_id) {
            topics.remove(topic);
        }
        Ok(())
    }

    async fn subscribers(&self, topic: &str) -> StoreResult<Vec<String>> {
        self.check()?;
        Ok(read(&self.subscriptions)
            .iter()
            .filter(|(_, topics)| topics.contains(topic))
            .map(|(connection_id, _)| connection_id.clone())
            .collect())
    }
}
