// src/registry/changes.rs

use crate::registry::key_state::{BreakerLevel, KeyId, SecretRef};
use crate::registry::window::UnixMillis;
use serde::{Deserialize, Serialize};

/// Insert a key unless one with the same id already exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewKey {
    pub id: KeyId,
    #[serde(default)]
    pub byok: bool,
    pub secret_ref: SecretRef,
    #[serde(default)]
    pub disabled: bool,
}

impl NewKey {
    pub fn new(id: impl Into<KeyId>, secret_ref: SecretRef) -> Self {
        Self {
            id: id.into(),
            byok: false,
            secret_ref,
            disabled: false,
        }
    }

    pub fn byok(mut self, byok: bool) -> Self {
        self.byok = byok;
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

/// Field-wise overwrite of an existing key. `None` leaves a field as it is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyUpdate {
    pub id: KeyId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limited: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limited_until: Option<UnixMillis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<BreakerLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_until: Option<UnixMillis>,
}

impl KeyUpdate {
    pub fn new(id: impl Into<KeyId>) -> Self {
        Self {
            id: id.into(),
            secret_ref: None,
            disabled: None,
            rate_limited: None,
            rate_limited_until: None,
            circuit_breaker: None,
            cooldown_until: None,
        }
    }

    pub fn secret_ref(mut self, secret_ref: SecretRef) -> Self {
        self.secret_ref = Some(secret_ref);
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = Some(disabled);
        self
    }

    pub fn rate_limited(mut self, rate_limited: bool) -> Self {
        self.rate_limited = Some(rate_limited);
        self
    }

    pub fn rate_limited_until(mut self, until: UnixMillis) -> Self {
        self.rate_limited_until = Some(until);
        self
    }

    pub fn circuit_breaker(mut self, level: BreakerLevel) -> Self {
        self.circuit_breaker = Some(level);
        self
    }

    pub fn cooldown_until(mut self, until: UnixMillis) -> Self {
        self.cooldown_until = Some(until);
        self
    }

    /// True when no field would be overwritten.
    pub fn is_empty(&self) -> bool {
        self.secret_ref.is_none()
            && self.disabled.is_none()
            && self.rate_limited.is_none()
            && self.rate_limited_until.is_none()
            && self.circuit_breaker.is_none()
            && self.cooldown_until.is_none()
    }
}

/// A single mutation. Unknown ids make `Update`, `RecordOutcome` and
/// `Remove` no-ops; a known id makes `Add` a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Change {
    Add(NewKey),
    Update(KeyUpdate),
    RecordOutcome {
        id: KeyId,
        success: bool,
        #[serde(default)]
        latency_ms: u64,
    },
    Remove {
        id: KeyId,
    },
}

impl Change {
    pub fn op_name(&self) -> &'static str {
        match self {
            Change::Add(_) => "add",
            Change::Update(_) => "update",
            Change::RecordOutcome { .. } => "record_outcome",
            Change::Remove { .. } => "remove",
        }
    }
}

/// Ordered batch of changes applied as one atomic unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet(Vec<Change>);

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change) {
        self.0.push(change);
    }

    pub fn add(mut self, new_key: NewKey) -> Self {
        self.push(Change::Add(new_key));
        self
    }

    pub fn update(mut self, update: KeyUpdate) -> Self {
        self.push(Change::Update(update));
        self
    }

    pub fn record_success(mut self, id: impl Into<KeyId>, latency_ms: u64) -> Self {
        self.push(Change::RecordOutcome {
            id: id.into(),
            success: true,
            latency_ms,
        });
        self
    }

    pub fn record_failure(mut self, id: impl Into<KeyId>) -> Self {
        self.push(Change::RecordOutcome {
            id: id.into(),
            success: false,
            latency_ms: 0,
        });
        self
    }

    pub fn remove(mut self, id: impl Into<KeyId>) -> Self {
        self.push(Change::Remove { id: id.into() });
        self
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Change>> for ChangeSet {
    fn from(changes: Vec<Change>) -> Self {
        Self(changes)
    }
}

impl FromIterator<Change> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = Change>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
