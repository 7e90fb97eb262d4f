//! Immutable service registry: resolves a service ID to its definition and
//! the provider that implements it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::definition::{CatalogService, ServiceDefinition};
use crate::error::BrokerError;
use crate::provider::ServiceProvider;

/// Errors raised while assembling a [`Registry`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("service {service_id} is registered more than once")]
    DuplicateService { service_id: String },

    #[error("service {service_id} is invalid: {}", .problems.join("; "))]
    InvalidDefinition {
        service_id: String,
        problems: Vec<String>,
    },
}

/// A service definition paired with its provider.
#[derive(Clone)]
pub struct RegisteredService {
    pub definition: ServiceDefinition,
    pub provider: Arc<dyn ServiceProvider>,
}

impl std::fmt::Debug for RegisteredService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredService")
            .field("definition", &self.definition.id)
            .field("provisions_async", &self.provider.provisions_async())
            .field("deprovisions_async", &self.provider.deprovisions_async())
            .finish()
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    services: Vec<RegisteredService>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        definition: ServiceDefinition,
        provider: Arc<dyn ServiceProvider>,
    ) -> Self {
        self.services.push(RegisteredService {
            definition,
            provider,
        });
        self
    }

    /// Check every definition and freeze the registry.
    pub fn build(self) -> Result<Registry, RegistryError> {
        let mut index = HashMap::with_capacity(self.services.len());
        for (i, service) in self.services.iter().enumerate() {
            let problems = service.definition.validate();
            if !problems.is_empty() {
                return Err(RegistryError::InvalidDefinition {
                    service_id: service.definition.id.clone(),
                    problems,
                });
            }
            if index.insert(service.definition.id.clone(), i).is_some() {
                return Err(RegistryError::DuplicateService {
                    service_id: service.definition.id.clone(),
                });
            }
        }
        Ok(Registry {
            services: self.services,
            index,
        })
    }
}

/// Lookup table from service ID to [`RegisteredService`], in registration
/// order. Built once, never mutated.
#[derive(Debug)]
pub struct Registry {
    services: Vec<RegisteredService>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Disabled services still resolve so their existing instances can be
    /// managed.
    pub fn resolve(&self, service_id: &str) -> Result<&RegisteredService, BrokerError> {
        self.index
            .get(service_id)
            .map(|&i| &self.services[i])
            .ok_or_else(|| BrokerError::ServiceNotFound {
                service_id: service_id.to_string(),
            })
    }

    pub fn enabled_services(&self) -> impl Iterator<Item = &RegisteredService> {
        self.services.iter().filter(|s| s.definition.enabled)
    }

    pub fn catalog(&self) -> Vec<CatalogService> {
        self.enabled_services()
            .map(|s| s.definition.catalog_entry())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
