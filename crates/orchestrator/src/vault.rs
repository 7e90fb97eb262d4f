//! Credential vault contract and an in-memory implementation.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

/// Permission granted on vaulted credentials.
pub const READ_OPERATION: &str = "read";

/// Key under which a vaulted binding's reference replaces its credentials.
pub const CREDENTIAL_REF_KEY: &str = "credhub-ref";

/// Errors that can occur when talking to a credential vault.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VaultError {
    #[error("credential {name} not found in vault")]
    NotFound { name: String },

    #[error("vault request failed: {0}")]
    Request(String),
}

/// External credential store with per-actor read permissions.
#[async_trait]
pub trait CredentialVault: Send + Sync {
    /// Store `value` under `name`, replacing any previous value. Returns the
    /// vault's identifier for the stored version.
    async fn put(&self, name: &str, value: &Value) -> Result<String, VaultError>;

    /// Grant `actor` the given operations on `name`.
    async fn add_permission(
        &self,
        name: &str,
        actor: &str,
        operations: &[&str],
    ) -> Result<(), VaultError>;

    /// Remove every permission on `name`.
    async fn delete_permission(&self, name: &str) -> Result<(), VaultError>;

    async fn delete(&self, name: &str) -> Result<(), VaultError>;
}

/// Deterministic vault path for a binding's credentials.
pub fn credential_name(client_identifier: &str, service_name: &str, binding_id: &str) -> String {
    format!("/c/{client_identifier}/{service_name}/{binding_id}/secrets-and-services")
}

/// Vault actor for an application identity.
pub fn app_actor(app_guid: &str) -> String {
    format!("mtls-app:{app_guid}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    pub actor: String,
    pub operations: Vec<String>,
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    version: u64,
    permissions: Vec<Permission>,
}

/// A `CredentialVault` held in process memory.
#[derive(Debug, Default)]
pub struct MemoryVault {
    entries: Mutex<BTreeMap<String, Entry>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored value for `name`, if any.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.lock().get(name).map(|e| e.value.clone())
    }

    pub fn permissions(&self, name: &str) -> Vec<Permission> {
        self.lock()
            .get(name)
            .map(|e| e.permissions.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Entry>> {
        // Recover data even if mutex was poisoned by a panic in another thread
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CredentialVault for MemoryVault {
    async fn put(&self, name: &str, value: &Value) -> Result<String, VaultError> {
        let mut entries = self.lock();
        let entry = entries.entry(name.to_string()).or_insert_with(|| Entry {
            value: Value::Null,
            version: 0,
            permissions: Vec::new(),
        });
        entry.value = value.clone();
        entry.version += 1;
        Ok(format!("{name}@{}", entry.version))
    }

    async fn add_permission(
        &self,
        name: &str,
        actor: &str,
        operations: &[&str],
    ) -> Result<(), VaultError> {
        let mut entries = self.lock();
        let entry = entries.get_mut(name).ok_or_else(|| VaultError::NotFound {
            name: name.to_string(),
        })?;
        entry.permissions.retain(|p| p.actor != actor);
        entry.permissions.push(Permission {
            actor: actor.to_string(),
            operations: operations.iter().map(|op| op.to_string()).collect(),
        });
        Ok(())
    }

    async fn delete_permission(&self, name: &str) -> Result<(), VaultError> {
        let mut entries = self.lock();
        let entry = entries.get_mut(name).ok_or_else(|| VaultError::NotFound {
            name: name.to_string(),
        })?;
        entry.permissions.clear();
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), VaultError> {
        self.lock()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| VaultError::NotFound {
                name: name.to_string(),
            })
    }
}
