//! The contract a concrete service provider implements.
//!
//! A provider is split into three capabilities:
//! - [`Provisioner`]: create, update and destroy instances
//! - [`Binder`]: issue and revoke credentials
//! - [`InstancePoller`]: observe and finish asynchronous operations
//!
//! [`ServiceProvider`] is implemented for anything that has all three, and
//! is what the registry stores per service. The orchestrator never inspects
//! the concrete type behind it.

use async_trait::async_trait;
use broker_storage::{ServiceBindingRecord, ServiceInstanceRecord};
use serde_json::{Map, Value};

use crate::types::{Binding, DeprovisionDetails};

/// Merged parameters handed to a provider: service defaults, user
/// parameters, plan properties and request context.
pub type Variables = Map<String, Value>;

/// Failure reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The provider's backing API is temporarily unreachable.
    #[error("service temporarily unavailable: {0}")]
    Unavailable(String),

    /// The provider's backing API answered with an HTTP error status.
    #[error("upstream API returned {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Any other failure, propagated as-is.
    #[error("{0}")]
    Failed(String),
}

/// What a provider reports after starting an action.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome<T> {
    /// The action finished before the call returned.
    Completed(T),
    /// The action continues in the background; poll with `operation_id`.
    Pending { operation_id: String, value: T },
}

impl<T> OperationOutcome<T> {
    pub fn pending(operation_id: impl Into<String>, value: T) -> Self {
        OperationOutcome::Pending {
            operation_id: operation_id.into(),
            value,
        }
    }

    pub fn operation_id(&self) -> Option<&str> {
        match self {
            OperationOutcome::Completed(_) => None,
            OperationOutcome::Pending { operation_id, .. } => Some(operation_id),
        }
    }

    pub fn into_value(self) -> T {
        match self {
            OperationOutcome::Completed(value) | OperationOutcome::Pending { value, .. } => value,
        }
    }
}

#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Whether provisioning (and updating) completes asynchronously.
    fn provisions_async(&self) -> bool;

    /// Whether deprovisioning completes asynchronously.
    fn deprovisions_async(&self) -> bool;

    /// Create the instance. The returned value becomes the instance's
    /// detail blob.
    async fn provision(&self, vars: &Variables) -> Result<OperationOutcome<Value>, ProviderError>;

    async fn update(&self, vars: &Variables) -> Result<OperationOutcome<()>, ProviderError>;

    async fn deprovision(
        &self,
        instance: &ServiceInstanceRecord,
        details: &DeprovisionDetails,
    ) -> Result<OperationOutcome<()>, ProviderError>;
}

#[async_trait]
pub trait Binder: Send + Sync {
    /// Create credentials for an instance. The returned value is persisted
    /// as the binding's detail blob.
    async fn bind(&self, vars: &Variables) -> Result<Value, ProviderError>;

    /// Turn a persisted binding into the credentials handed to the caller.
    async fn build_instance_credentials(
        &self,
        binding: &ServiceBindingRecord,
        instance: &ServiceInstanceRecord,
    ) -> Result<Binding, ProviderError>;

    async fn unbind(
        &self,
        instance: &ServiceInstanceRecord,
        binding: &ServiceBindingRecord,
    ) -> Result<(), ProviderError>;
}

#[async_trait]
pub trait InstancePoller: Send + Sync {
    /// Check the instance's outstanding operation. `Ok(true)` means done.
    async fn poll_instance(&self, instance: &ServiceInstanceRecord) -> Result<bool, ProviderError>;

    /// Refresh provider-owned fields of the detail blob (addresses, links)
    /// once an operation has finished.
    async fn refresh_instance_details(
        &self,
        instance: &mut ServiceInstanceRecord,
    ) -> Result<(), ProviderError>;
}

/// A provider with every capability the orchestrator needs.
pub trait ServiceProvider: Provisioner + Binder + InstancePoller {
    /// True if any lifecycle step can leave an operation outstanding.
    fn is_async(&self) -> bool {
        self.provisions_async() || self.deprovisions_async()
    }
}

impl<T: Provisioner + Binder + InstancePoller> ServiceProvider for T {}
