use std::fmt;

use broker_storage::{OperationKind, StorageError};

use crate::provider::ProviderError;
use crate::vault::VaultError;

/// Coarse classification of a [`BrokerError`], for the protocol layer to map
/// onto its own status convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    AsyncRequired,
    ProhibitedUpdate,
    Provider,
    Persistence,
    Vault,
    /// Provider action succeeded but the local record write failed.
    OrphanedExternalResource,
    /// Binding recorded, vault hand-off failed.
    CredentialHandoffFailed,
    /// External operation finished but local bookkeeping did not.
    StaleOperationState,
    Unsupported,
}

impl ErrorKind {
    /// True for the kinds that leave the system needing operator
    /// reconciliation.
    pub fn is_partial_failure(&self) -> bool {
        matches!(
            self,
            ErrorKind::OrphanedExternalResource
                | ErrorKind::CredentialHandoffFailed
                | ErrorKind::StaleOperationState
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::AsyncRequired => "async-required",
            ErrorKind::ProhibitedUpdate => "prohibited",
            ErrorKind::Provider => "provider",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Vault => "vault",
            ErrorKind::OrphanedExternalResource => "orphaned-external-resource",
            ErrorKind::CredentialHandoffFailed => "credential-handoff-failed",
            ErrorKind::StaleOperationState => "stale-operation-state",
            ErrorKind::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}

/// Every error the orchestrator returns to its caller.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("user supplied parameters must be valid JSON: {reason}")]
    InvalidParameters { reason: String },

    #[error("parameters for service {service_id} do not match its schema: {}", .errors.join("; "))]
    SchemaViolation {
        service_id: String,
        errors: Vec<String>,
    },

    #[error("an app_guid is required to bind service {service_id} while a credential vault is configured")]
    MissingAppIdentity { service_id: String },

    #[error("service instance {instance_id} does not exist")]
    InstanceNotFound { instance_id: String },

    #[error("service binding {binding_id} does not exist on instance {instance_id}")]
    BindingNotFound {
        instance_id: String,
        binding_id: String,
    },

    #[error("service {service_id} is not in the catalog")]
    ServiceNotFound { service_id: String },

    #[error("plan {plan_id} does not exist on service {service_id}")]
    PlanNotFound { service_id: String, plan_id: String },

    #[error("service instance {instance_id} already exists")]
    InstanceAlreadyExists { instance_id: String },

    #[error("service binding {binding_id} already exists on instance {instance_id}")]
    BindingAlreadyExists {
        instance_id: String,
        binding_id: String,
    },

    #[error("service instance {instance_id} has a {operation} operation in progress")]
    OperationInProgress {
        instance_id: String,
        operation: OperationKind,
    },

    #[error("this service plan requires client support for asynchronous service operations")]
    AsyncRequired,

    #[error("attempt to update {} may result in service instance re-creation and data loss", .changes.join(", "))]
    ProhibitedUpdate { changes: Vec<String> },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("credential vault error: {0}")]
    Vault(#[from] VaultError),

    /// The provider created or changed something that is no longer
    /// tracked locally.
    #[error("{action} succeeded at the provider but {what} failed: {source}. WARNING: {consequence}. Contact your operator for cleanup")]
    OrphanedResource {
        action: &'static str,
        what: &'static str,
        consequence: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("binding {binding_id} was recorded but the credential hand-off failed while trying to {step}: {source}. WARNING: the binding exists without usable credentials. Unbind and bind again, or contact your operator")]
    CredentialHandoff {
        binding_id: String,
        step: &'static str,
        #[source]
        source: VaultError,
    },

    #[error("{operation} of instance {instance_id} completed but the local record could not be reconciled: {reason}. WARNING: the instance keeps stale operation state. Contact your operator for cleanup")]
    CompletionFailed {
        instance_id: String,
        operation: OperationKind,
        reason: String,
    },

    #[error("the {operation} endpoint is unsupported")]
    Unsupported { operation: &'static str },
}

impl BrokerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrokerError::InvalidParameters { .. }
            | BrokerError::SchemaViolation { .. }
            | BrokerError::MissingAppIdentity { .. } => ErrorKind::Validation,
            BrokerError::InstanceNotFound { .. }
            | BrokerError::BindingNotFound { .. }
            | BrokerError::ServiceNotFound { .. }
            | BrokerError::PlanNotFound { .. } => ErrorKind::NotFound,
            BrokerError::InstanceAlreadyExists { .. }
            | BrokerError::BindingAlreadyExists { .. }
            | BrokerError::OperationInProgress { .. } => ErrorKind::Conflict,
            BrokerError::AsyncRequired => ErrorKind::AsyncRequired,
            BrokerError::ProhibitedUpdate { .. } => ErrorKind::ProhibitedUpdate,
            BrokerError::Provider(_) => ErrorKind::Provider,
            BrokerError::Storage(_) => ErrorKind::Persistence,
            BrokerError::Vault(_) => ErrorKind::Vault,
            BrokerError::OrphanedResource { .. } => ErrorKind::OrphanedExternalResource,
            BrokerError::CredentialHandoff { .. } => ErrorKind::CredentialHandoffFailed,
            BrokerError::CompletionFailed { .. } => ErrorKind::StaleOperationState,
            BrokerError::Unsupported { .. } => ErrorKind::Unsupported,
        }
    }

    pub(crate) fn orphaned(
        action: &'static str,
        what: &'static str,
        consequence: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        BrokerError::OrphanedResource {
            action,
            what,
            consequence,
            source: Box::new(source),
        }
    }
}
