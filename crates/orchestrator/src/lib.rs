//! Lifecycle orchestrator of a service broker.
//!
//! [`ServiceBroker`] turns provision, update, deprovision, bind, unbind and
//! last-operation calls into ordered interactions with a [`ServiceProvider`],
//! a [`broker_storage::RecordStore`] and an optional [`CredentialVault`],
//! keeping local records consistent with what the external systems were
//! asked to do. Failures that leave the two sides out of step are reported
//! as distinct partial-failure errors (see [`ErrorKind::is_partial_failure`]).

mod binding;
mod broker;
pub mod classify;
pub mod config;
pub mod definition;
mod error;
mod instance;
pub mod params;
mod poll;
pub mod provider;
pub mod registry;
pub mod types;
pub mod vault;

pub use broker::ServiceBroker;
pub use classify::{classify, ErrorClass};
pub use config::{BrokerConfig, ConfigError, VaultConfig};
pub use definition::{CatalogPlan, CatalogService, ServiceDefinition, ServicePlan};
pub use error::{BrokerError, ErrorKind};
pub use params::is_valid_or_empty_json;
pub use poll::CompletionAction;
pub use provider::{
    Binder, InstancePoller, OperationOutcome, ProviderError, Provisioner, ServiceProvider,
    Variables,
};
pub use registry::{RegisteredService, Registry, RegistryBuilder, RegistryError};
pub use types::{
    BindDetails, Binding, DeprovisionDetails, LastOperation, OperationResponse, OperationState,
    PollDetails, ProvisionDetails, UnbindDetails, UpdateDetails,
};
pub use vault::{CredentialVault, MemoryVault, VaultError};
