//! The secret vault itself: `Create`, `Fetch`, `FetchAll`, `IncActivations`
//! (spec.md §4.7).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{VaultError, VaultResult};
use crate::PLACEHOLDER_PREFIX;

/// A single vault entry.
#[derive(Debug, Serialize, Deserialize)]
pub struct SecretEntry {
    /// Caller-assigned identifier.
    pub id: String,
    /// The real secret value. Never serialized unless the caller explicitly
    /// opts in (the control plane's `GET /api/secrets` omits it by default
    /// per spec.md §4.9's `{id:{placeholder, activations, value?}}`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// The non-secret placeholder token substituted into requests.
    pub placeholder: String,
    /// Monotonic count of successful substitutions (spec.md §3 invariant:
    /// "activations counter in the secret vault is monotonic
    /// non-decreasing").
    pub activations: u64,
}

struct VaultEntry {
    value: String,
    placeholder: String,
    activations: AtomicU64,
}

/// Purely in-memory secret store; restart resets all state (spec.md §4.7).
#[derive(Default)]
pub struct SecretVault {
    entries: RwLock<HashMap<String, VaultEntry>>,
}

impl SecretVault {
    /// Construct an empty vault.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or idempotently fetch) a secret, returning its placeholder.
    ///
    /// If `id` already exists with the same `value`, returns the existing
    /// placeholder. If it exists with a different value, returns
    /// [`VaultError::Conflict`].
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Conflict`] on a value mismatch for an existing id.
    pub fn create(&self, id: impl Into<String>, value: impl Into<String>) -> VaultResult<String> {
        let id = id.into();
        let value = value.into();

        {
            let entries = self.entries.read().expect("vault lock poisoned");
            if let Some(existing) = entries.get(&id) {
                if existing.value == value {
                    return Ok(existing.placeholder.clone());
                }
                return Err(VaultError::Conflict(id));
            }
        }

        let mut entries = self.entries.write().expect("vault lock poisoned");
        // Re-check under the write lock in case of a racing create.
        if let Some(existing) = entries.get(&id) {
            return if existing.value == value {
                Ok(existing.placeholder.clone())
            } else {
                Err(VaultError::Conflict(id))
            };
        }

        let existing_placeholders: Vec<&str> = entries.values().map(|e| e.placeholder.as_str()).collect();
        let placeholder = generate_placeholder(&value, &existing_placeholders);
        entries.insert(
            id,
            VaultEntry { value, placeholder: placeholder.clone(), activations: AtomicU64::new(0) },
        );
        Ok(placeholder)
    }

    /// Fetch a single entry by id, including its real value.
    #[must_use]
    pub fn fetch(&self, id: &str) -> Option<SecretEntry> {
        let entries = self.entries.read().expect("vault lock poisoned");
        entries.get(id).map(|e| SecretEntry {
            id: id.to_string(),
            value: Some(e.value.clone()),
            placeholder: e.placeholder.clone(),
            activations: e.activations.load(Ordering::Acquire),
        })
    }

    /// Fetch every entry, with real values redacted (placeholders and
    /// activation counts only), matching the control plane's
    /// `GET /api/secrets` response shape.
    #[must_use]
    pub fn fetch_all_redacted(&self) -> HashMap<String, SecretEntry> {
        let entries = self.entries.read().expect("vault lock poisoned");
        entries
            .iter()
            .map(|(id, e)| {
                (
                    id.clone(),
                    SecretEntry {
                        id: id.clone(),
                        value: None,
                        placeholder: e.placeholder.clone(),
                        activations: e.activations.load(Ordering::Acquire),
                    },
                )
            })
            .collect()
    }

    /// Find the entry whose placeholder matches `placeholder`, if any.
    #[must_use]
    pub fn find_by_placeholder(&self, placeholder: &str) -> Option<(String, String)> {
        let entries = self.entries.read().expect("vault lock poisoned");
        entries
            .iter()
            .find(|(_, e)| e.placeholder == placeholder)
            .map(|(id, e)| (id.clone(), e.value.clone()))
    }

    /// Every currently registered placeholder, used by the proxy to scan
    /// request/response bodies for substitution targets.
    #[must_use]
    pub fn placeholders(&self) -> Vec<(String, String)> {
        let entries = self.entries.read().expect("vault lock poisoned");
        entries.values().map(|e| (e.placeholder.clone(), e.value.clone())).collect()
    }

    /// Increment the activation counter for `id`. Called exactly once per
    /// successful full-request substitution (spec.md §4.6).
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotFound`] if `id` does not exist.
    pub fn inc_activations(&self, id: &str) -> VaultResult<u64> {
        let entries = self.entries.read().expect("vault lock poisoned");
        let entry = entries.get(id).ok_or_else(|| VaultError::NotFound(id.to_string()))?;
        Ok(entry.activations.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Increment the activation counter for whichever entry owns
    /// `placeholder`. Used by the proxy, which only sees placeholders, not
    /// vault ids.
    pub fn inc_activations_by_placeholder(&self, placeholder: &str) {
        let entries = self.entries.read().expect("vault lock poisoned");
        if let Some(entry) = entries.values().find(|e| e.placeholder == placeholder) {
            entry.activations.fetch_add(1, Ordering::AcqRel);
        }
    }
}

/// Generate a placeholder that is guaranteed not to equal `value` and not to
/// collide (by exact match or substring) with any existing placeholder.
fn generate_placeholder(value: &str, existing: &[&str]) -> String {
    loop {
        let candidate = format!("{PLACEHOLDER_PREFIX}{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        if candidate == value {
            continue;
        }
        if existing.iter().any(|p| candidate.contains(p) || p.contains(candidate.as_str())) {
            continue;
        }
        return candidate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_is_idempotent_for_same_value() {
        let vault = SecretVault::new();
        let p1 = vault.create("API_TOKEN", "12345678901234567890").unwrap();
        let p2 = vault.create("API_TOKEN", "12345678901234567890").unwrap();
        assert_eq!(p1, p2);
    }

    #[test]
    fn create_conflicts_on_value_mismatch() {
        let vault = SecretVault::new();
        vault.create("API_TOKEN", "value-a").unwrap();
        let err = vault.create("API_TOKEN", "value-b").unwrap_err();
        assert_eq!(err, VaultError::Conflict("API_TOKEN".to_string()));
    }

    #[test]
    fn placeholder_never_equals_value() {
        let vault = SecretVault::new();
        let placeholder = vault.create("K", "V").unwrap();
        assert_ne!(placeholder, "V");
    }

    #[test]
    fn activations_are_monotonic() {
        let vault = SecretVault::new();
        vault.create("K", "V").unwrap();
        assert_eq!(vault.inc_activations("K").unwrap(), 1);
        assert_eq!(vault.inc_activations("K").unwrap(), 2);
        assert_eq!(vault.fetch("K").unwrap().activations, 2);
    }

    #[test]
    fn fetch_all_redacted_omits_value() {
        let vault = SecretVault::new();
        vault.create("K", "V").unwrap();
        let all = vault.fetch_all_redacted();
        assert!(all["K"].value.is_none());
    }
}
