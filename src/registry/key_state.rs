// src/registry/key_state.rs

use crate::registry::window::{UnixMillis, WindowBounds, WindowStats};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// Opaque, sortable key identifier. Generated ids are UUIDv7, so descending
/// order is newest-first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for KeyId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Reference to (or ciphertext of) the provider key material.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct SecretRef(SecretString);

impl SecretRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretRef([REDACTED])")
    }
}

impl PartialEq for SecretRef {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Serialize for SecretRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose())
    }
}

/// Circuit-breaker severity. Only `CLOSED` has fixed meaning; any other level
/// is set by the caller and reset to `CLOSED` when its cooldown passes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BreakerLevel(pub u8);

impl BreakerLevel {
    pub const CLOSED: Self = Self(0);
    pub const OPEN: Self = Self(1);

    pub fn is_closed(self) -> bool {
        self == Self::CLOSED
    }
}

/// Per-key health record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyState {
    pub id: KeyId,
    pub byok: bool,
    pub secret_ref: SecretRef,
    pub disabled: bool,
    pub last_used_at: UnixMillis,
    pub rate_limited: bool,
    pub rate_limited_until: UnixMillis,
    pub circuit_breaker: BreakerLevel,
    pub cooldown_until: UnixMillis,
    pub previous_window: WindowStats,
    pub current_window: WindowStats,
}

impl KeyState {
    /// Creates a healthy key with both windows stamped at `bounds`.
    pub fn new(
        id: KeyId,
        byok: bool,
        secret_ref: SecretRef,
        disabled: bool,
        now: UnixMillis,
        bounds: WindowBounds,
    ) -> Self {
        Self {
            id,
            byok,
            secret_ref,
            disabled,
            last_used_at: now,
            rate_limited: false,
            rate_limited_until: 0,
            circuit_breaker: BreakerLevel::CLOSED,
            cooldown_until: 0,
            previous_window: WindowStats::empty(bounds.previous),
            current_window: WindowStats::empty(bounds.current),
        }
    }

    /// Rolls the two-bucket window forward once the current bucket has expired.
    /// The old bucket is kept only when it is exactly the one before `bounds.current`.
    pub(crate) fn slide_windows(&mut self, now: UnixMillis, bounds: WindowBounds) {
        if now < self.current_window.expires_at {
            return;
        }

        self.previous_window = if self.current_window.expires_at == bounds.previous {
            self.current_window
        } else {
            WindowStats::empty(bounds.previous)
        };
        self.current_window = WindowStats::empty(bounds.current);
    }

    /// Clears rate limiting and the breaker once their deadlines have passed.
    pub(crate) fn recover(&mut self, now: UnixMillis) {
        if self.rate_limited && now >= self.rate_limited_until {
            self.rate_limited = false;
            self.rate_limited_until = 0;
        }
        if !self.circuit_breaker.is_closed() && now >= self.cooldown_until {
            self.circuit_breaker = BreakerLevel::CLOSED;
            self.cooldown_until = 0;
        }
    }

    /// Whether nothing currently marks the key as unusable.
    pub fn is_available(&self) -> bool {
        !self.disabled && !self.rate_limited && self.circuit_breaker.is_closed()
    }
}
