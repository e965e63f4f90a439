// src/registry/key_registry.rs

use crate::registry::key_state::{KeyId, KeyState};
use crate::registry::window::UnixMillis;
use serde::{Deserialize, Serialize};

/// All key states of one routing group plus the TTL of the stored entry.
///
/// An empty registry is a real, stored value; it is not the same as a
/// registry that has never been written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyRegistry {
    /// Sorted by `id`, descending.
    pub states: Vec<KeyState>,
    pub expires_at: UnixMillis,
}

impl KeyRegistry {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn get(&self, id: &KeyId) -> Option<&KeyState> {
        self.states.iter().find(|state| &state.id == id)
    }

    pub fn get_mut(&mut self, id: &KeyId) -> Option<&mut KeyState> {
        self.states.iter_mut().find(|state| &state.id == id)
    }

    pub fn contains(&self, id: &KeyId) -> bool {
        self.get(id).is_some()
    }

    pub(crate) fn remove(&mut self, id: &KeyId) -> Option<KeyState> {
        let index = self.states.iter().position(|state| &state.id == id)?;
        Some(self.states.remove(index))
    }

    pub(crate) fn sort_states(&mut self) {
        self.states.sort_by(|a, b| b.id.cmp(&a.id));
    }
}
