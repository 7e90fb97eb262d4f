//! In-process `RecordStore` backed by ordered maps.
//!
//! Used by tests, the CLI and local development. All three tables live
//! behind a single `RwLock`, so every call is atomic with respect to the
//! others and the create-time uniqueness check cannot race.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::record::{ProvisionRequestRecord, ServiceBindingRecord, ServiceInstanceRecord};
use crate::traits::RecordStore;

#[derive(Debug, Default)]
struct Tables {
    instances: BTreeMap<String, ServiceInstanceRecord>,
    bindings: BTreeMap<(String, String), ServiceBindingRecord>,
    provision_requests: BTreeMap<String, Vec<ProvisionRequestRecord>>,
}

/// A `RecordStore` that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: RwLock<Tables>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instance records currently stored.
    pub async fn instance_count(&self) -> usize {
        self.tables.read().await.instances.len()
    }

    /// Number of binding records currently stored.
    pub async fn binding_count(&self) -> usize {
        self.tables.read().await.bindings.len()
    }

    /// Full provision request history for an instance, oldest first.
    pub async fn provision_request_history(&self, instance_id: &str) -> Vec<ProvisionRequestRecord> {
        self.tables
            .read()
            .await
            .provision_requests
            .get(instance_id)
            .cloned()
            .unwrap_or_default()
    }
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn instance_exists(&self, instance_id: &str) -> Result<bool, StorageError> {
        Ok(self.tables.read().await.instances.contains_key(instance_id))
    }

    async fn get_instance(&self, instance_id: &str) -> Result<ServiceInstanceRecord, StorageError> {
        self.tables
            .read()
            .await
            .instances
            .get(instance_id)
            .cloned()
            .ok_or_else(|| StorageError::InstanceNotFound {
                instance_id: instance_id.to_string(),
            })
    }

    async fn create_instance(&self, mut record: ServiceInstanceRecord) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        if tables.instances.contains_key(&record.id) {
            return Err(StorageError::InstanceAlreadyExists {
                instance_id: record.id,
            });
        }
        let now = now_rfc3339();
        record.created_at = now.clone();
        record.updated_at = now;
        tables.instances.insert(record.id.clone(), record);
        Ok(())
    }

    async fn save_instance(&self, mut record: ServiceInstanceRecord) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        let existing =
            tables
                .instances
                .get_mut(&record.id)
                .ok_or_else(|| StorageError::InstanceNotFound {
                    instance_id: record.id.clone(),
                })?;
        record.created_at = existing.created_at.clone();
        record.updated_at = now_rfc3339();
        *existing = record;
        Ok(())
    }

    async fn delete_instance(&self, instance_id: &str) -> Result<(), StorageError> {
        self.tables
            .write()
            .await
            .instances
            .remove(instance_id)
            .map(|_| ())
            .ok_or_else(|| StorageError::InstanceNotFound {
                instance_id: instance_id.to_string(),
            })
    }

    async fn binding_exists(
        &self,
        instance_id: &str,
        binding_id: &str,
    ) -> Result<bool, StorageError> {
        let key = (instance_id.to_string(), binding_id.to_string());
        Ok(self.tables.read().await.bindings.contains_key(&key))
    }

    async fn get_binding(
        &self,
        instance_id: &str,
        binding_id: &str,
    ) -> Result<ServiceBindingRecord, StorageError> {
        let key = (instance_id.to_string(), binding_id.to_string());
        self.tables
            .read()
            .await
            .bindings
            .get(&key)
            .cloned()
            .ok_or_else(|| StorageError::BindingNotFound {
                instance_id: instance_id.to_string(),
                binding_id: binding_id.to_string(),
            })
    }

    async fn create_binding(&self, mut record: ServiceBindingRecord) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        let key = (record.instance_id.clone(), record.binding_id.clone());
        if tables.bindings.contains_key(&key) {
            return Err(StorageError::BindingAlreadyExists {
                instance_id: record.instance_id,
                binding_id: record.binding_id,
            });
        }
        record.created_at = now_rfc3339();
        tables.bindings.insert(key, record);
        Ok(())
    }

    async fn delete_binding(
        &self,
        instance_id: &str,
        binding_id: &str,
    ) -> Result<(), StorageError> {
        let key = (instance_id.to_string(), binding_id.to_string());
        self.tables
            .write()
            .await
            .bindings
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| StorageError::BindingNotFound {
                instance_id: instance_id.to_string(),
                binding_id: binding_id.to_string(),
            })
    }

    async fn create_provision_request(
        &self,
        mut record: ProvisionRequestRecord,
    ) -> Result<(), StorageError> {
        record.updated_at = now_rfc3339();
        self.tables
            .write()
            .await
            .provision_requests
            .entry(record.instance_id.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn save_provision_request(
        &self,
        mut record: ProvisionRequestRecord,
    ) -> Result<(), StorageError> {
        record.updated_at = now_rfc3339();
        let mut tables = self.tables.write().await;
        let history = tables
            .provision_requests
            .entry(record.instance_id.clone())
            .or_default();
        match history.last_mut() {
            Some(latest) => *latest = record,
            None => history.push(record),
        }
        Ok(())
    }

    async fn get_provision_request(
        &self,
        instance_id: &str,
    ) -> Result<ProvisionRequestRecord, StorageError> {
        self.tables
            .read()
            .await
            .provision_requests
            .get(instance_id)
            .and_then(|history| history.last())
            .cloned()
            .ok_or_else(|| StorageError::ProvisionRequestNotFound {
                instance_id: instance_id.to_string(),
            })
    }
}
