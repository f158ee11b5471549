use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use leadbot_core::domain::run::ThreadId;
use leadbot_core::domain::turn::ImagePayload;
use tokio::time::Instant;
use tracing::warn;

/// Short-lived per-thread photo storage so a later lead notification can include
/// the picture the customer sent earlier in the session.
#[async_trait]
pub trait PhotoCache: Send + Sync {
    async fn put(&self, thread_id: &ThreadId, photo: ImagePayload);
    async fn get(&self, thread_id: &ThreadId) -> Option<ImagePayload>;
    async fn purge_expired(&self) -> usize;
}

/// Single-process cache; entries are invisible to other instances.
pub struct InMemoryPhotoCache {
    ttl: Duration,
    entries: Mutex<HashMap<ThreadId, CachedPhoto>>,
}

struct CachedPhoto {
    photo: ImagePayload,
    stored_at: Instant,
}

impl InMemoryPhotoCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: Mutex::new(HashMap::new()) }
    }

    /// A panic elsewhere while holding the lock leaves the map itself intact, so the
    /// cache keeps serving from it.
    fn entries(&self) -> MutexGuard<'_, HashMap<ThreadId, CachedPhoto>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!(
                event_name = "agent.photo_cache.poisoned",
                "recovering poisoned photo cache lock"
            );
            poisoned.into_inner()
        })
    }

    fn is_live(&self, entry: &CachedPhoto, now: Instant) -> bool {
        now.duration_since(entry.stored_at) < self.ttl
    }

    fn purge_locked(&self, entries: &mut HashMap<ThreadId, CachedPhoto>, now: Instant) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| self.is_live(entry, now));
        before - entries.len()
    }
}

#[async_trait]
impl PhotoCache for InMemoryPhotoCache {
    async fn put(&self, thread_id: &ThreadId, photo: ImagePayload) {
        let now = Instant::now();
        let mut entries = self.entries();
        self.purge_locked(&mut entries, now);
        entries.insert(thread_id.clone(), CachedPhoto { photo, stored_at: now });
    }

    async fn get(&self, thread_id: &ThreadId) -> Option<ImagePayload> {
        let now = Instant::now();
        let entries = self.entries();
        entries
            .get(thread_id)
            .filter(|entry| self.is_live(entry, now))
            .map(|entry| entry.photo.clone())
    }

    async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries();
        self.purge_locked(&mut entries, now)
    }
}
