//! Per-post engagement counters.
//!
//! Every public operation catches store and channel failures at its boundary
//! and reports them through [`InsightsOutcome`] instead of an error. Callers
//! always get a record back.

pub mod engagement;
pub mod viewers;

use std::fmt::Display;
use std::sync::Arc;

use crate::sockets::{BroadcastMessage, LiveChannel};
use crate::store::{CommentStore, InsightsStore, LikeStore, StoreResult};
use crate::types::PostInsights;

pub use engagement::{engagement_rate, refresh_engagement_rate};
pub use viewers::ViewerRegistry;

/// Result of an insights operation.
#[derive(Debug, Clone, PartialEq)]
pub enum InsightsOutcome {
    /// Completed and persisted.
    Healthy(PostInsights),
    /// Could not complete. `insights` is the best value known, a zeroed
    /// record when nothing else is.
    Degraded { insights: PostInsights, cause: String },
    /// The direct update failed and a reconciliation from the like and
    /// comment stores replaced it.
    Repaired { insights: PostInsights, cause: String },
}

impl InsightsOutcome {
    pub fn insights(&self) -> &PostInsights {
        match self {
            InsightsOutcome::Healthy(insights)
            | InsightsOutcome::Degraded { insights, .. }
            | InsightsOutcome::Repaired { insights, .. } => insights,
        }
    }

    pub fn into_insights(self) -> PostInsights {
        match self {
            InsightsOutcome::Healthy(insights)
            | InsightsOutcome::Degraded { insights, .. }
            | InsightsOutcome::Repaired { insights, .. } => insights,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InsightsOutcome::Healthy(_) => "healthy",
            InsightsOutcome::Degraded { .. } => "degraded",
            InsightsOutcome::Repaired { .. } => "repaired",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, InsightsOutcome::Healthy(_))
    }
}

#[derive(Clone)]
pub struct InsightsService {
    store: Arc<dyn InsightsStore>,
    likes: Arc<dyn LikeStore>,
    comments: Arc<dyn CommentStore>,
    channel: Arc<dyn LiveChannel>,
    viewers: Arc<ViewerRegistry>,
    topic_prefix: String,
}

impl InsightsService {
    pub fn new(
        store: Arc<dyn InsightsStore>,
        likes: Arc<dyn LikeStore>,
        comments: Arc<dyn CommentStore>,
        channel: Arc<dyn LiveChannel>,
        viewers: Arc<ViewerRegistry>,
        topic_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            likes,
            comments,
            channel,
            viewers,
            topic_prefix: topic_prefix.into(),
        }
    }

    pub fn viewers(&self) -> &ViewerRegistry {
        &self.viewers
    }

    /// Broadcast topic for a post's insights.
    pub fn topic_for(&self, post_id: &str) -> String {
        format!("{}{}", self.topic_prefix, post_id)
    }

    /// Stored record, creating a zeroed one the first time a post is asked for.
    pub async fn get_insights(&self, post_id: &str) -> InsightsOutcome {
        if post_id.trim().is_empty() {
            return rejected(post_id, "postId must not be empty");
        }

        match self.load_or_create(post_id).await {
            Ok(insights) => InsightsOutcome::Healthy(insights),
            Err(e) => degraded(post_id, None, "fetching insights", e),
        }
    }

    /// Count a view. `uniqueViewers` only moves the first time `viewer_id`
    /// is seen for this post.
    pub async fn increment_views(&self, post_id: &str, viewer_id: &str) -> InsightsOutcome {
        if post_id.trim().is_empty() {
            return rejected(post_id, "postId must not be empty");
        }
        if viewer_id.trim().is_empty() {
            return rejected(post_id, "viewerId must not be empty");
        }

        // Held until the update is persisted and broadcast.
        let mut viewers = self.viewers.lock(post_id).await;

        let current = match self.load_or_create(post_id).await {
            Ok(insights) => insights,
            Err(e) => return degraded(post_id, None, "incrementing views", e),
        };

        let first_visit = !viewers.contains(viewer_id);
        let mut updated = current.clone();
        updated.views = updated.views.saturating_add(1);
        if first_visit {
            updated.unique_viewers = viewers.len() as u64 + 1;
        }
        refresh_engagement_rate(&mut updated);

        match self.store.save(updated).await {
            Ok(saved) => {
                if first_visit {
                    viewers.insert(viewer_id.to_string());
                }
                self.broadcast(&saved).await;
                InsightsOutcome::Healthy(saved)
            }
            Err(e) => degraded(post_id, Some(current), "incrementing views", e),
        }
    }

    /// Recompute like and comment counts from their own stores.
    pub async fn sync_insights(&self, post_id: &str) -> InsightsOutcome {
        if post_id.trim().is_empty() {
            return rejected(post_id, "postId must not be empty");
        }

        match self.reconcile(post_id).await {
            Ok(saved) => {
                tracing::debug!(
                    "Synced insights for post {}: likes={}, comments={}",
                    post_id,
                    saved.like_count,
                    saved.comment_count
                );
                self.broadcast(&saved).await;
                InsightsOutcome::Healthy(saved)
            }
            Err(e) => degraded(post_id, None, "syncing insights", e),
        }
    }

    pub async fn update_likes(&self, post_id: &str, like_count: u64) -> InsightsOutcome {
        if post_id.trim().is_empty() {
            return rejected(post_id, "postId must not be empty");
        }

        match self.apply(post_id, |insights| insights.like_count = like_count).await {
            Ok(saved) => {
                tracing::debug!("Updated likes for post {}: {}", post_id, like_count);
                self.broadcast(&saved).await;
                InsightsOutcome::Healthy(saved)
            }
            Err(e) => self.repair(post_id, "updating likes", e).await,
        }
    }

    pub async fn update_comments(&self, post_id: &str, comment_count: u64) -> InsightsOutcome {
        if post_id.trim().is_empty() {
            return rejected(post_id, "postId must not be empty");
        }

        match self
            .apply(post_id, |insights| insights.comment_count = comment_count)
            .await
        {
            Ok(saved) => {
                tracing::debug!("Updated comments for post {}: {}", post_id, comment_count);
                self.broadcast(&saved).await;
                InsightsOutcome::Healthy(saved)
            }
            Err(e) => self.repair(post_id, "updating comments", e).await,
        }
    }

    /// Remove the stored record and the post's viewer set.
    pub async fn delete_insights(&self, post_id: &str) -> InsightsOutcome {
        if post_id.trim().is_empty() {
            return rejected(post_id, "postId must not be empty");
        }

        // Same guard as increment_views, so a delete never interleaves with a
        // view update of this post.
        let mut viewers = self.viewers.lock(post_id).await;

        match self.store.delete_by_post_id(post_id).await {
            Ok(()) => {
                viewers.clear();
                tracing::info!("Deleted insights for post {}", post_id);
                InsightsOutcome::Healthy(PostInsights::new(post_id))
            }
            Err(e) => degraded(post_id, None, "deleting insights", e),
        }
    }

    async fn load_or_create(&self, post_id: &str) -> StoreResult<PostInsights> {
        match self.store.find_by_post_id(post_id).await? {
            Some(insights) => Ok(insights),
            None => {
                tracing::info!("Creating insights for post {}", post_id);
                self.store.save(PostInsights::new(post_id)).await
            }
        }
    }

    async fn apply<F>(&self, post_id: &str, update: F) -> StoreResult<PostInsights>
    where
        F: FnOnce(&mut PostInsights) + Send,
    {
        let mut insights = self.load_or_create(post_id).await?;
        update(&mut insights);
        refresh_engagement_rate(&mut insights);
        self.store.save(insights).await
    }

    async fn reconcile(&self, post_id: &str) -> StoreResult<PostInsights> {
        let mut insights = self.load_or_create(post_id).await?;
        insights.like_count = self.likes.count_by_post_id(post_id).await?;
        insights.comment_count = self.comments.count_by_post_id(post_id).await?;
        refresh_engagement_rate(&mut insights);
        self.store.save(insights).await
    }

    async fn repair(&self, post_id: &str, operation: &str, cause: impl Display) -> InsightsOutcome {
        tracing::error!("Error {} for post {}: {}", operation, post_id, cause);

        match self.sync_insights(post_id).await {
            InsightsOutcome::Healthy(insights) => InsightsOutcome::Repaired {
                insights,
                cause: cause.to_string(),
            },
            fallback => fallback,
        }
    }

    async fn broadcast(&self, insights: &PostInsights) {
        let topic = self.topic_for(&insights.post_id);

        let result = match BroadcastMessage::insights_updated(insights) {
            Ok(message) => self.channel.publish(&topic, &message).await,
            Err(e) => Err(e.into()),
        };

        if let Err(e) = result {
            tracing::error!("Error broadcasting insights for post {}: {}", insights.post_id, e);
        }
    }
}

fn degraded(
    post_id: &str,
    known: Option<PostInsights>,
    operation: &str,
    cause: impl Display,
) -> InsightsOutcome {
    tracing::error!("Error {} for post {}: {}", operation, post_id, cause);
    InsightsOutcome::Degraded {
        insights: known.unwrap_or_else(|| PostInsights::new(post_id)),
        cause: cause.to_string(),
    }
}

fn rejected(post_id: &str, reason: &str) -> InsightsOutcome {
    tracing::warn!("Rejected insights call: {}", reason);
    InsightsOutcome::Degraded {
        insights: PostInsights::new(post_id),
        cause: reason.to_string(),
    }
}
