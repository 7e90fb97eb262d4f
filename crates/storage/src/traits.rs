use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{ProvisionRequestRecord, ServiceBindingRecord, ServiceInstanceRecord};

/// The persistence contract required by the broker orchestrator.
///
/// A `RecordStore` holds three record kinds: service instances, service
/// bindings and provision requests. There are no multi-record transactions;
/// every call is independently durable.
///
/// ## Uniqueness
///
/// `create_instance` and `create_binding` MUST check-and-insert atomically.
/// When several callers race to create the same key, exactly one succeeds
/// and the others receive `InstanceAlreadyExists` / `BindingAlreadyExists`.
/// The orchestrator relies on this as its only guard against double
/// provisioning.
///
/// ## Not found
///
/// Reads, saves and deletes of unknown keys return the structured
/// not-found variants, never `Backend`.
///
/// ## Timestamps
///
/// Implementations own `created_at` / `updated_at`; values passed in by
/// callers are overwritten.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    // ── Service instances ────────────────────────────────────────────────────

    async fn instance_exists(&self, instance_id: &str) -> Result<bool, StorageError>;

    /// Returns `Err(StorageError::InstanceNotFound)` if absent.
    async fn get_instance(&self, instance_id: &str) -> Result<ServiceInstanceRecord, StorageError>;

    /// Returns `Err(StorageError::InstanceAlreadyExists)` on a duplicate ID.
    async fn create_instance(&self, record: ServiceInstanceRecord) -> Result<(), StorageError>;

    /// Overwrite an existing instance record.
    ///
    /// Returns `Err(StorageError::InstanceNotFound)` if the record was
    /// deleted in the meantime.
    async fn save_instance(&self, record: ServiceInstanceRecord) -> Result<(), StorageError>;

    async fn delete_instance(&self, instance_id: &str) -> Result<(), StorageError>;

    // ── Service bindings ─────────────────────────────────────────────────────

    async fn binding_exists(
        &self,
        instance_id: &str,
        binding_id: &str,
    ) -> Result<bool, StorageError>;

    async fn get_binding(
        &self,
        instance_id: &str,
        binding_id: &str,
    ) -> Result<ServiceBindingRecord, StorageError>;

    /// Returns `Err(StorageError::BindingAlreadyExists)` on a duplicate
    /// (instance_id, binding_id).
    async fn create_binding(&self, record: ServiceBindingRecord) -> Result<(), StorageError>;

    async fn delete_binding(&self, instance_id: &str, binding_id: &str)
        -> Result<(), StorageError>;

    // ── Provision requests ───────────────────────────────────────────────────
    //
    // Requests are an append-only history per instance ID: an instance ID
    // that is deprovisioned and provisioned again keeps its older entries.

    /// Append a provision request to the instance's history.
    async fn create_provision_request(
        &self,
        record: ProvisionRequestRecord,
    ) -> Result<(), StorageError>;

    /// Overwrite the latest provision request for an instance, inserting
    /// one if the history is empty.
    async fn save_provision_request(
        &self,
        record: ProvisionRequestRecord,
    ) -> Result<(), StorageError>;

    /// The latest provision request for an instance.
    ///
    /// Returns `Err(StorageError::ProvisionRequestNotFound)` if none exists.
    async fn get_provision_request(
        &self,
        instance_id: &str,
    ) -> Result<ProvisionRequestRecord, StorageError>;
}
