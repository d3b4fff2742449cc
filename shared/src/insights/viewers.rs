use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Distinct viewer ids seen for one post since the process started.
pub type ViewerSet = HashSet<String>;

/// Per-post viewer sets, each behind its own async lock.
///
/// Holding a post's guard serializes every view update for that post, so the
/// caller can read, bump and persist the post's record without losing an
/// increment. Posts never contend with each other.
///
/// Sets live only in memory. After a restart unique-viewer detection starts
/// from empty for every post.
#[derive(Default)]
pub struct ViewerRegistry {
    posts: Mutex<HashMap<String, Arc<AsyncMutex<ViewerSet>>>>,
}

impl ViewerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the viewer set of `post_id`, creating it on first use.
    pub async fn lock(&self, post_id: &str) -> OwnedMutexGuard<ViewerSet> {
        let slot = {
            let mut posts = self.posts.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(posts.entry(post_id.to_string()).or_default())
        };
        slot.lock_owned().await
    }

    /// Drop what is known about one post. Waits for anyone holding the
    /// post's guard; the lock itself stays in place.
    pub async fn forget(&self, post_id: &str) {
        self.lock(post_id).await.clear();
    }

    pub async fn clear(&self) {
        let slots: Vec<_> = {
            let posts = self.posts.lock().unwrap_or_else(PoisonError::into_inner);
            posts.values().cloned().collect()
        };
        for slot in slots {
            slot.lock().await.clear();
        }
    }

    /// Number of distinct viewers tracked for `post_id`.
    pub async fn unique_count(&self, post_id: &str) -> usize {
        let slot = {
            let posts = self.posts.lock().unwrap_or_else(PoisonError::into_inner);
            posts.get(post_id).cloned()
        };
        match slot {
            Some(slot) => slot.lock().await.len(),
            None => 0,
        }
    }
}
