/// All errors that can be returned by a RecordStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No instance record with the given ID.
    #[error("service instance not found: {instance_id}")]
    InstanceNotFound { instance_id: String },

    /// No binding record with the given (instance_id, binding_id).
    #[error("service binding not found: {instance_id}/{binding_id}")]
    BindingNotFound {
        instance_id: String,
        binding_id: String,
    },

    /// No provision request record for the given instance.
    #[error("provision request not found: {instance_id}")]
    ProvisionRequestNotFound { instance_id: String },

    /// Uniqueness violation on the instance ID.
    #[error("service instance already exists: {instance_id}")]
    InstanceAlreadyExists { instance_id: String },

    /// Uniqueness violation on (instance_id, binding_id).
    #[error("service binding already exists: {instance_id}/{binding_id}")]
    BindingAlreadyExists {
        instance_id: String,
        binding_id: String,
    },

    /// A backend-specific storage error (DB connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// True for the structured not-found variants, as opposed to transport
    /// or constraint failures.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::InstanceNotFound { .. }
                | StorageError::BindingNotFound { .. }
                | StorageError::ProvisionRequestNotFound { .. }
        )
    }

    /// True for uniqueness violations.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StorageError::InstanceAlreadyExists { .. } | StorageError::BindingAlreadyExists { .. }
        )
    }
}
