// src/storage/redis.rs

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::registry::{apply_changes, codec, ChangeSet, KeyRegistry, RegistryPolicy, UnixMillis};
use crate::storage::{PurgeBatch, RegistryStore, REGISTRY_NAMESPACE};
use async_trait::async_trait;
use deadpool_redis::{Config as PoolConfig, Connection as RedisConnection, Pool, Runtime};
use redis::AsyncCommands;
use tracing::{debug, info, instrument, trace, warn};

pub const DEFAULT_KEY_PREFIX: &str = "key_registry:";

/// Redis-backed registry store.
///
/// Each registry is one JSON string value. Writes use optimistic concurrency:
/// `WATCH` the key, read and transform the document, then commit with
/// `MULTI`/`EXEC`. A nil `EXEC` means another writer committed first and the
/// whole read-transform-write cycle is retried.
pub struct RedisStore {
    pool: Pool,
    key_prefix: String,
    max_cas_retries: u32,
}

impl RedisStore {
    pub fn new(pool: Pool, key_prefix: impl Into<String>, max_cas_retries: u32) -> Self {
        Self {
            pool,
            key_prefix: key_prefix.into(),
            max_cas_retries: max_cas_retries.max(1),
        }
    }

    /// Builds the connection pool from `redis_url`.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let redis_url = config
            .redis_url
            .as_deref()
            .ok_or_else(|| AppError::config_validation("redis_url is not set", Some("redis_url")))?;
        let pool = PoolConfig::from_url(redis_url).create_pool(Some(Runtime::Tokio1))?;
        let key_prefix = config
            .redis_key_prefix
            .clone()
            .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string());

        info!(redis.key_prefix = %key_prefix, "Redis registry store configured");
        Ok(Self::new(pool, key_prefix, config.registry.max_cas_retries))
    }

    fn registry_key(&self, registry_id: &str) -> String {
        format!("{}{}{}", self.key_prefix, REGISTRY_NAMESPACE, registry_id)
    }

    async fn get_connection(&self) -> Result<RedisConnection> {
        self.pool.get().await.map_err(Into::into)
    }

    /// One optimistic round. `Ok(None)` means the watched key changed underneath us.
    async fn try_apply(
        conn: &mut RedisConnection,
        key: &str,
        registry_id: &str,
        changes: &ChangeSet,
        now: UnixMillis,
        policy: &RegistryPolicy,
    ) -> Result<Option<KeyRegistry>> {
        let _: () = redis::cmd("WATCH").arg(key).query_async(conn).await?;
        let document: Option<String> = conn.get(key).await?;
        let current = document
            .as_deref()
            .map(|doc| codec::decode(registry_id, doc))
            .transpose()?;

        let next = apply_changes(current, changes, now, policy)?;
        let encoded = codec::encode(&next)?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .set(key, &encoded)
            .ignore()
            .cmd("PEXPIREAT")
            .arg(key)
            .arg(next.expires_at)
            .ignore();
        let committed: Option<()> = pipe.query_async(conn).await?;

        Ok(committed.map(|()| next))
    }
}

/// Escapes glob metacharacters so a literal prefix can be used in `MATCH`.
fn escape_glob(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl RegistryStore for RedisStore {
    async fn read(&self, registry_id: &str) -> Result<Option<KeyRegistry>> {
        trace!("RedisStore::read: start for registry '{}'", registry_id);
        let mut conn = self.get_connection().await?;
        let document: Option<String> = conn.get(self.registry_key(registry_id)).await?;
        document
            .as_deref()
            .map(|doc| codec::decode(registry_id, doc))
            .transpose()
    }

    #[instrument(level = "debug", skip(self, changes, policy), fields(changes = changes.len()))]
    async fn apply(
        &self,
        registry_id: &str,
        changes: &ChangeSet,
        now: UnixMillis,
        policy: &RegistryPolicy,
    ) -> Result<KeyRegistry> {
        let key = self.registry_key(registry_id);
        let mut conn = self.get_connection().await?;
        trace!("RedisStore::apply: got connection");

        for attempt in 1..=self.max_cas_retries {
            match Self::try_apply(&mut conn, &key, registry_id, changes, now, policy).await {
                Ok(Some(next)) => return Ok(next),
                Ok(None) => {
                    metrics::record_cas_conflict();
                    debug!(
                        registry.id = registry_id,
                        attempt, "Concurrent write detected, retrying apply"
                    );
                }
                Err(e) => {
                    // Leave no watch behind on a pooled connection.
                    let unwatch: redis::RedisResult<()> =
                        redis::cmd("UNWATCH").query_async(&mut conn).await;
                    if let Err(unwatch_err) = unwatch {
                        warn!(error = %unwatch_err, "UNWATCH failed after aborted apply");
                    }
                    return Err(e);
                }
            }
        }

        warn!(
            registry.id = registry_id,
            attempts = self.max_cas_retries,
            "Giving up on contended registry"
        );
        Err(AppError::StoreContention {
            registry_id: registry_id.to_string(),
            attempts: self.max_cas_retries,
        })
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

        let mut conn = self.get_connection().await?;
        let pattern = format!("{}*", escape_glob(&self.registry_key(prefix)));
        let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(&pattern)
            .arg("COUNT")
            .arg(batch_size)
            .query_async(&mut conn)
            .await?;

        let deleted: u64 = if keys.is_empty() {
            0
        } else {
            redis::cmd("UNLINK").arg(&keys).query_async(&mut conn).await?
        };

        trace!(pattern = %pattern, cursor, next_cursor, deleted, "RedisStore::purge_by_prefix");
        Ok(PurgeBatch {
            next_cursor,
            deleted,
            scanned: keys.len() as u64,
        })
    }
}
