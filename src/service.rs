// src/service.rs

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::registry::{ChangeSet, KeyRegistry, RegistryPolicy, UnixMillis, WindowBounds};
use crate::storage::{InMemoryStore, PurgeBatch, RegistryStore};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

const MAX_REGISTRY_ID_LEN: usize = 256;

/// Entry point for every registry read and write.
///
/// Callers never read-modify-write a registry themselves: each change set is
/// handed to the store, which applies it atomically and returns the
/// authoritative snapshot.
#[derive(Clone)]
pub struct RegistryService {
    store: Arc<dyn RegistryStore>,
    policy: RegistryPolicy,
}

impl RegistryService {
    pub fn new(store: Arc<dyn RegistryStore>, policy: RegistryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn in_memory(policy: RegistryPolicy) -> Self {
        Self::new(Arc::new(InMemoryStore::new()), policy)
    }

    /// Picks the Redis store when `redis_url` is configured, memory otherwise.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let policy = config.registry_policy()?;

        if config.redis_url.is_some() {
            return Self::redis_backed(config, policy);
        }

        info!("No Redis URL configured. Registries will be kept in memory.");
        Ok(Self::in_memory(policy))
    }

    #[cfg(feature = "redis")]
    fn redis_backed(config: &AppConfig, policy: RegistryPolicy) -> Result<Self> {
        let store = crate::storage::RedisStore::from_config(config)?;
        Ok(Self::new(Arc::new(store), policy))
    }

    #[cfg(not(feature = "redis"))]
    fn redis_backed(_config: &AppConfig, _policy: RegistryPolicy) -> Result<Self> {
        Err(AppError::config_validation(
            "redis_url is set but the binary was built without the `redis` feature",
            Some("redis_url"),
        ))
    }

    pub fn policy(&self) -> &RegistryPolicy {
        &self.policy
    }

    /// Applies `changes` to the registry as one atomic unit at `now`.
    #[instrument(level = "debug", skip(self, changes), fields(registry.id = registry_id, changes = changes.len()))]
    pub async fn apply(
        &self,
        registry_id: &str,
        changes: &ChangeSet,
        now: UnixMillis,
    ) -> Result<KeyRegistry> {
        validate_registry_id(registry_id)?;
        WindowBounds::at(now, self.policy.window_ms())?;

        let started = Instant::now();
        let result = self.store.apply(registry_id, changes, now, &self.policy).await;

        match &result {
            Ok(registry) => {
                metrics::record_apply("ok", started.elapsed());
                for change in changes {
                    metrics::record_change(change.op_name());
                }
                debug!(keys = registry.len(), expires_at = registry.expires_at, "Change set applied");
            }
            Err(e) => {
                metrics::record_apply("error", started.elapsed());
                warn!(error = %e, retriable = e.is_retriable(), "Change set was not applied");
            }
        }
        result
    }

    /// Same as [`apply`](Self::apply) with `now` taken from the wall clock once.
    pub async fn apply_now(&self, registry_id: &str, changes: &ChangeSet) -> Result<KeyRegistry> {
        self.apply(registry_id, changes, now_millis()).await
    }

    /// Returns the stored snapshot, or `None` when the registry is absent.
    #[instrument(level = "debug", skip(self), fields(registry.id = registry_id))]
    pub async fn read(&self, registry_id: &str) -> Result<Option<KeyRegistry>> {
        validate_registry_id(registry_id)?;
        self.store.read(registry_id).await
    }

    /// Deletes one batch of registries whose id starts with `prefix`.
    #[instrument(skip(self))]
    pub async fn purge_by_prefix(
        &self,
        prefix: &str,
        cursor: u64,
        batch_size: usize,
    ) -> Result<PurgeBatch> {
        if prefix.is_empty() {
            return Err(AppError::validation("prefix", "purge prefix cannot be empty"));
        }
        if batch_size == 0 {
            return Err(AppError::validation("batch_size", "batch size must be positive"));
        }

        let batch = self.store.purge_by_prefix(prefix, cursor, batch_size).await?;
        metrics::record_purged(batch.deleted);
        debug!(
            next_cursor = batch.next_cursor,
            deleted = batch.deleted,
            scanned = batch.scanned,
            "Purge batch finished"
        );
        Ok(batch)
    }

    /// Runs the purge cursor to completion and returns the summed counts.
    pub async fn purge_all_by_prefix(&self, prefix: &str, batch_size: usize) -> Result<PurgeBatch> {
        let mut total = PurgeBatch::default();
        let mut cursor = 0;

        loop {
            let batch = self.purge_by_prefix(prefix, cursor, batch_size).await?;
            total.deleted += batch.deleted;
            total.scanned += batch.scanned;
            if batch.is_complete() {
                break;
            }
            cursor = batch.next_cursor;
        }

        info!(
            prefix,
            deleted = total.deleted,
            scanned = total.scanned,
            "Purge by prefix completed"
        );
        Ok(total)
    }
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> UnixMillis {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Registry ids are opaque but must be non-empty printable text without whitespace.
pub fn validate_registry_id(registry_id: &str) -> Result<()> {
    if registry_id.is_empty() {
        return Err(AppError::validation("registry_id", "registry id cannot be empty"));
    }
    if registry_id.len() > MAX_REGISTRY_ID_LEN {
        return Err(AppError::validation(
            "registry_id",
            format!("registry id is longer than {MAX_REGISTRY_ID_LEN} bytes"),
        ));
    }
    if registry_id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(AppError::validation(
            "registry_id",
            "registry id cannot contain whitespace or control characters",
        ));
    }
    Ok(())
}
