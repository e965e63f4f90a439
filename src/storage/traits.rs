// src/storage/traits.rs

use crate::error::Result;
use crate::registry::{ChangeSet, KeyRegistry, RegistryPolicy, UnixMillis};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One page of a prefix purge. `next_cursor == 0` means the scan is finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeBatch {
    pub next_cursor: u64,
    pub deleted: u64,
    pub scanned: u64,
}

impl PurgeBatch {
    pub fn is_complete(&self) -> bool {
        self.next_cursor == 0
    }
}

/// Shared store for registry documents.
///
/// `apply` is the only write path and must be all-or-nothing: a concurrent
/// reader observes either the previous document or the new one.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Fetch the current document. `None` means the registry was never
    /// written or its TTL lapsed, which is distinct from an empty registry.
    async fn read(&self, registry_id: &str) -> Result<Option<KeyRegistry>>;

    /// Run the registry transition against the stored document and commit it.
    async fn apply(
        &self,
        registry_id: &str,
        changes: &ChangeSet,
        now: UnixMillis,
        policy: &RegistryPolicy,
    ) -> Result<KeyRegistry>;

    /// Delete up to roughly `batch_size` registries whose id starts with
    /// `prefix`, resuming from `cursor` (start with `0`).
    async fn purge_by_prefix(&self, prefix: &str, cursor: u64, batch_size: usize)
        -> Result<PurgeBatch>;
}
