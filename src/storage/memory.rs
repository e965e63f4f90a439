// src/storage/memory.rs

use crate::error::{AppError, Result};
use crate::registry::{
    apply_changes, codec, ChangeSet, KeyRegistry, RegistryPolicy, UnixMillis, WindowBounds,
};
use crate::storage::{PurgeBatch, RegistryStore};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, trace};

#[derive(Debug, Clone)]
struct StoredEntry {
    document: String,
    expires_at: UnixMillis,
}

/// In-process registry store.
///
/// Documents are kept encoded so reads go through the same strict decoder as
/// the Redis store. Expiry follows the latest `now` seen by `apply`; the wall
/// clock is never consulted. Both `read` and `apply` treat an entry as gone
/// once its `expires_at` is at or before that horizon, and every `apply`
/// drops such entries while it holds the write lock.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Arc<RwLock<BTreeMap<String, StoredEntry>>>,
    observed_now: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a raw document as-is, bypassing the transition.
    pub async fn put_document(
        &self,
        registry_id: &str,
        document: impl Into<String>,
        expires_at: UnixMillis,
    ) {
        let mut entries = self.entries.write().await;
        entries.insert(
            registry_id.to_string(),
            StoredEntry {
                document: document.into(),
                expires_at,
            },
        );
    }

    /// Number of stored entries, expired ones included until the next `apply` sweeps them.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl RegistryStore for InMemoryStore {
    async fn read(&self, registry_id: &str) -> Result<Option<KeyRegistry>> {
        trace!("InMemoryStore::read: waiting for read lock");
        let entries = self.entries.read().await;
        trace!("InMemoryStore::read: got read lock");
        let horizon = self.observed_now.load(Ordering::SeqCst);

        match entries.get(registry_id) {
            Some(entry) if entry.expires_at > horizon => {
                codec::decode(registry_id, &entry.document).map(Some)
            }
            _ => Ok(None),
        }
    }

    async fn apply(
        &self,
        registry_id: &str,
        changes: &ChangeSet,
        now: UnixMillis,
        policy: &RegistryPolicy,
    ) -> Result<KeyRegistry> {
        // Reject an unusable `now` before it can move the store's clock.
        WindowBounds::at(now, policy.window_ms())?;

        trace!("InMemoryStore::apply: waiting for write lock");
        let mut entries = self.entries.write().await;
        trace!("InMemoryStore::apply: got write lock");
        let horizon = self.observed_now.fetch_max(now, Ordering::SeqCst).max(now);

        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > horizon);
        if entries.len() < before {
            debug!(swept = before - entries.len(), horizon, "Dropped expired registries");
        }

        let current = entries
            .get(registry_id)
            .map(|entry| codec::decode(registry_id, &entry.document))
            .transpose()?;

        let next = apply_changes(current, changes, now, policy)?;
        let document = codec::encode(&next)?;
        entries.insert(
            registry_id.to_string(),
            StoredEntry {
                document,
                expires_at: next.expires_at,
            },
        );
        Ok(next)
    }

    async fn purge_by_prefix(
        &self,
        prefix: &str,
        cursor: u64,
        batch_size: usize,
    ) -> Result<PurgeBatch> {
        if batch_size == 0 {
            return Err(AppError::validation("batch_size", "batch size must be positive"));
        }

        let mut entries = self.entries.write().await;
        // A non-zero cursor is one past the number of surviving keys already scanned.
        let skip = usize::try_from(cursor.saturating_sub(1)).unwrap_or(usize::MAX);
        let window: Vec<String> = entries.keys().skip(skip).take(batch_size).cloned().collect();

        let mut deleted = 0u64;
        for key in &window {
            if key.starts_with(prefix) {
                entries.remove(key);
                deleted += 1;
            }
        }

        let scanned = window.len() as u64;
        let consumed = skip as u64 + scanned - deleted;
        let next_cursor = if scanned == 0 || consumed >= entries.len() as u64 {
            0
        } else {
            consumed + 1
        };

        trace!(prefix, cursor, next_cursor, deleted, scanned, "InMemoryStore::purge_by_prefix");
        Ok(PurgeBatch {
            next_cursor,
            deleted,
            scanned,
        })
    }
}
