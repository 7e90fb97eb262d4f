//! The [`ServiceBroker`] orchestrator.
//!
//! Lifecycle operations are split across `instance`, `binding` and `poll`;
//! this module holds the shared state and the lookups they have in common.

use std::sync::Arc;

use broker_storage::{RecordStore, ServiceInstanceRecord};

use crate::definition::{CatalogService, ServicePlan};
use crate::error::BrokerError;
use crate::registry::{RegisteredService, Registry};
use crate::types::{Binding, LastOperation};
use crate::vault::CredentialVault;

const DEFAULT_CLIENT_IDENTIFIER: &str = "csb";

/// Orchestrates service lifecycle calls against a provider registry, a
/// record store and an optional credential vault.
///
/// Holds no per-call state and can be shared across tasks behind an `Arc`.
pub struct ServiceBroker {
    pub(crate) registry: Registry,
    pub(crate) store: Arc<dyn RecordStore>,
    pub(crate) vault: Option<Arc<dyn CredentialVault>>,
    pub(crate) client_identifier: String,
}

impl ServiceBroker {
    pub fn new(registry: Registry, store: Arc<dyn RecordStore>) -> Self {
        Self {
            registry,
            store,
            vault: None,
            client_identifier: DEFAULT_CLIENT_IDENTIFIER.to_string(),
        }
    }

    /// Hand binding credentials off to `vault` instead of returning them.
    /// `client_identifier` prefixes every credential name.
    pub fn with_vault(
        mut self,
        vault: Arc<dyn CredentialVault>,
        client_identifier: impl Into<String>,
    ) -> Self {
        self.vault = Some(vault);
        self.client_identifier = client_identifier.into();
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn has_vault(&self) -> bool {
        self.vault.is_some()
    }

    /// Catalog of every enabled service.
    pub fn services(&self) -> Vec<CatalogService> {
        self.registry.catalog()
    }

    pub async fn get_instance(&self, instance_id: &str) -> Result<ServiceInstanceRecord, BrokerError> {
        tracing::info!(instance_id, "get instance requested");
        Err(BrokerError::Unsupported {
            operation: "get instance",
        })
    }

    pub async fn get_binding(
        &self,
        instance_id: &str,
        binding_id: &str,
    ) -> Result<Binding, BrokerError> {
        tracing::info!(instance_id, binding_id, "get binding requested");
        Err(BrokerError::Unsupported {
            operation: "get binding",
        })
    }

    /// Bindings always complete synchronously, so there is never a binding
    /// operation to poll.
    pub async fn last_binding_operation(
        &self,
        instance_id: &str,
        binding_id: &str,
    ) -> Result<LastOperation, BrokerError> {
        tracing::info!(instance_id, binding_id, "last binding operation requested");
        Err(BrokerError::AsyncRequired)
    }

    pub(crate) fn resolve(
        &self,
        service_id: &str,
        plan_id: &str,
    ) -> Result<(&RegisteredService, &ServicePlan), BrokerError> {
        let service = self.registry.resolve(service_id)?;
        let plan = service.definition.resolve_plan(plan_id)?;
        Ok((service, plan))
    }

    /// Fetch an instance record, turning the store's not-found into
    /// [`BrokerError::InstanceNotFound`].
    pub(crate) async fn load_instance(
        &self,
        instance_id: &str,
    ) -> Result<ServiceInstanceRecord, BrokerError> {
        match self.store.get_instance(instance_id).await {
            Ok(record) => Ok(record),
            Err(e) if e.is_not_found() => Err(BrokerError::InstanceNotFound {
                instance_id: instance_id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for ServiceBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceBroker")
            .field("registry", &self.registry)
            .field("vault", &self.vault.is_some())
            .field("client_identifier", &self.client_identifier)
            .finish()
    }
}
