// src/registry/codec.rs

use crate::error::{AppError, Result};
use crate::registry::key_registry::KeyRegistry;
use std::collections::HashSet;

/// Serializes a registry into its persisted JSON document.
pub fn encode(registry: &KeyRegistry) -> Result<String> {
    serde_json::to_string(registry).map_err(|e| AppError::Serialization {
        message: format!("Failed to encode registry: {e}"),
    })
}

/// Strictly decodes a persisted document.
///
/// Unknown or missing fields and duplicate key ids are rejected, never repaired.
pub fn decode(registry_id: &str, document: &str) -> Result<KeyRegistry> {
    let registry: KeyRegistry =
        serde_json::from_str(document).map_err(|e| AppError::corrupt_registry(registry_id, e.to_string()))?;

    let mut seen = HashSet::with_capacity(registry.states.len());
    for state in &registry.states {
        if !seen.insert(&state.id) {
            return Err(AppError::corrupt_registry(
                registry_id,
                format!("duplicate key id '{}'", state.id),
            ));
        }
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::changes::{ChangeSet, NewKey};
    use crate::registry::key_state::SecretRef;
    use crate::registry::transition::{apply_changes, RegistryPolicy};

    fn sample() -> KeyRegistry {
        let policy = RegistryPolicy::from_millis(60_000, 600_000).unwrap();
        let changes = ChangeSet::new()
            .add(NewKey::new("a", SecretRef::new("enc:a")))
            .add(NewKey::new("b", SecretRef::new("enc:b")).byok(true))
            .record_success("a", 120);
        apply_changes(None, &changes, 1_000, &policy).unwrap()
    }

    #[test]
    fn document_survives_encode_and_decode() {
        let registry = sample();
        let document = encode(&registry).unwrap();
        assert!(document.contains("\"secret_ref\":\"enc:a\""));
        assert_eq!(decode("r", &document).unwrap(), registry);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["states"][0]["priority"] = serde_json::json!(3);
        let err = decode("r", &value.to_string()).unwrap_err();
        assert!(matches!(err, AppError::CorruptRegistry { .. }));
    }

    #[test]
    fn missing_fields_are_rejected() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["states"][0]
            .as_object_mut()
            .unwrap()
            .remove("rate_limited_until");
        let err = decode("r", &value.to_string()).unwrap_err();
        assert!(matches!(err, AppError::CorruptRegistry { .. }));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut value = serde_json::to_value(sample()).unwrap();
        let first = value["states"][0].clone();
        value["states"].as_array_mut().unwrap().push(first);
        let err = decode("reg-1", &value.to_string()).unwrap_err();
        assert!(err.to_string().contains("reg-1"));
    }
}
