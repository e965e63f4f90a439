// src/registry/transition.rs

//! The pure state transition behind every atomic apply.
//!
//! Order of a pass, all evaluated against one caller-supplied `now`:
//! 1. slide each key's two-bucket window,
//! 2. clear expired rate limits and breaker cooldowns,
//! 3. apply the change set in order, then re-sort by id descending,
//! 4. renew the registry TTL when less than a quarter of it remains.
//!
//! Nothing here touches a store or reads the wall clock.

use crate::error::{AppError, Result};
use crate::registry::changes::{Change, ChangeSet, KeyUpdate, NewKey};
use crate::registry::key_registry::KeyRegistry;
use crate::registry::key_state::{KeyId, KeyState};
use crate::registry::window::{UnixMillis, WindowBounds};
use std::num::NonZeroU64;
use std::time::Duration;
use tracing::debug;

/// Window size and entry lifetime shared by every key of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryPolicy {
    window_ms: NonZeroU64,
    ttl_ms: NonZeroU64,
}

impl RegistryPolicy {
    pub fn new(window: Duration, ttl: Duration) -> Result<Self> {
        Self::from_millis(
            u64::try_from(window.as_millis()).unwrap_or(u64::MAX),
            u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        )
    }

    pub fn from_millis(window_ms: u64, ttl_ms: u64) -> Result<Self> {
        let window_ms = NonZeroU64::new(window_ms)
            .ok_or_else(|| AppError::validation("window", "window size must be positive"))?;
        let ttl_ms = NonZeroU64::new(ttl_ms)
            .ok_or_else(|| AppError::validation("ttl", "registry ttl must be positive"))?;
        Ok(Self { window_ms, ttl_ms })
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms.get()
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms.get()
    }
}

/// Produces the registry that results from applying `changes` at `now`.
/// An absent registry starts out empty with `expires_at = 0`.
///
/// Fails only when `now` is so close to `u64::MAX` that its window bounds
/// cannot be represented; nothing is applied in that case.
pub fn apply_changes(
    current: Option<KeyRegistry>,
    changes: &ChangeSet,
    now: UnixMillis,
    policy: &RegistryPolicy,
) -> Result<KeyRegistry> {
    let bounds = WindowBounds::at(now, policy.window_ms())?;
    let mut registry = current.unwrap_or_default();

    for state in &mut registry.states {
        state.slide_windows(now, bounds);
    }
    for state in &mut registry.states {
        state.recover(now);
    }

    for change in changes {
        apply_change(&mut registry, change, now, bounds);
    }
    registry.sort_states();

    renew_ttl(&mut registry, now, policy.ttl_ms());
    Ok(registry)
}

fn apply_change(registry: &mut KeyRegistry, change: &Change, now: UnixMillis, bounds: WindowBounds) {
    match change {
        Change::Add(new_key) => add_key(registry, new_key, now, bounds),
        Change::Update(update) => update_key(registry, update, now),
        Change::RecordOutcome {
            id,
            success,
            latency_ms,
        } => record_outcome(registry, id, *success, *latency_ms, now),
        Change::Remove { id } => {
            if registry.remove(id).is_none() {
                debug!(key.id = %id, "Remove for unknown key ignored");
            }
        }
    }
}

fn add_key(registry: &mut KeyRegistry, new_key: &NewKey, now: UnixMillis, bounds: WindowBounds) {
    if registry.contains(&new_key.id) {
        debug!(key.id = %new_key.id, "Duplicate add ignored");
        return;
    }
    registry.states.push(KeyState::new(
        new_key.id.clone(),
        new_key.byok,
        new_key.secret_ref.clone(),
        new_key.disabled,
        now,
        bounds,
    ));
}

fn update_key(registry: &mut KeyRegistry, update: &KeyUpdate, now: UnixMillis) {
    let Some(state) = registry.get_mut(&update.id) else {
        debug!(key.id = %update.id, "Update for unknown key ignored");
        return;
    };
    if update.is_empty() {
        return;
    }

    if let Some(secret_ref) = &update.secret_ref {
        state.secret_ref = secret_ref.clone();
    }
    if let Some(disabled) = update.disabled {
        state.disabled = disabled;
    }
    if let Some(rate_limited) = update.rate_limited {
        state.rate_limited = rate_limited;
    }
    if let Some(until) = update.rate_limited_until {
        state.rate_limited_until = until;
    }
    if let Some(level) = update.circuit_breaker {
        state.circuit_breaker = level;
    }
    if let Some(until) = update.cooldown_until {
        state.cooldown_until = until;
    }
    state.last_used_at = now;
}

fn record_outcome(
    registry: &mut KeyRegistry,
    id: &KeyId,
    success: bool,
    latency_ms: u64,
    now: UnixMillis,
) {
    let Some(state) = registry.get_mut(id) else {
        debug!(key.id = %id, "Outcome for unknown key ignored");
        return;
    };
    state.last_used_at = now;
    if success {
        state.current_window.record_success(latency_ms);
    } else {
        state.current_window.record_failure();
    }
}

/// Extends the entry to `now + ttl` only once less than `ttl / 4` remains.
fn renew_ttl(registry: &mut KeyRegistry, now: UnixMillis, ttl_ms: u64) {
    if registry.expires_at.saturating_sub(now) < ttl_ms / 4 {
        registry.expires_at = now.saturating_add(ttl_ms);
    }
}
