//! Bind and unbind, including the credential vault hand-off.

use std::sync::Arc;

use broker_storage::ServiceBindingRecord;
use serde_json::{Map, Value};

use crate::broker::ServiceBroker;
use crate::error::BrokerError;
use crate::params::ensure_valid_or_empty_json;
use crate::types::{BindDetails, Binding, UnbindDetails};
use crate::vault::{
    app_actor, credential_name, CredentialVault, VaultError, CREDENTIAL_REF_KEY, READ_OPERATION,
};

const UNTRACKED_BINDING: &str =
    "credentials were issued at the provider but the broker has no binding record for them";

impl ServiceBroker {
    /// Create credentials for an application on an existing instance.
    ///
    /// The service is the one the instance was provisioned under, whatever
    /// the request names; the plan comes from the request.
    ///
    /// The binding record is written before any credentials leave the
    /// broker. With a vault configured the credentials are stored there,
    /// the application is granted read access, and the caller only receives
    /// a reference to the vaulted entry.
    pub async fn bind(
        &self,
        instance_id: &str,
        binding_id: &str,
        details: &BindDetails,
    ) -> Result<Binding, BrokerError> {
        tracing::info!(
            instance_id,
            binding_id,
            service_id = %details.service_id,
            plan_id = %details.plan_id,
            "binding service instance"
        );

        if self.store.binding_exists(instance_id, binding_id).await? {
            return Err(BrokerError::BindingAlreadyExists {
                instance_id: instance_id.to_string(),
                binding_id: binding_id.to_string(),
            });
        }

        let instance = self.load_instance(instance_id).await?;
        if details.service_id != instance.service_id {
            tracing::debug!(
                instance_id,
                requested = %details.service_id,
                recorded = %instance.service_id,
                "bind request names another service; using the instance's"
            );
        }
        let (service, plan) = self.resolve(&instance.service_id, &details.plan_id)?;
        ensure_valid_or_empty_json(details.raw_parameters.as_deref())?;

        let vault = match &self.vault {
            Some(vault) => {
                let app_guid = details
                    .app_guid
                    .as_deref()
                    .filter(|guid| !guid.trim().is_empty())
                    .ok_or_else(|| BrokerError::MissingAppIdentity {
                        service_id: service.definition.id.clone(),
                    })?;
                Some((vault, app_guid))
            }
            None => None,
        };

        let vars = service
            .definition
            .bind_variables(&instance, binding_id, details, plan)?;
        let detail = service.provider.bind(&vars).await?;

        let other_details = serde_json::to_string(&detail).map_err(|e| {
            tracing::error!(instance_id, binding_id, error = %e, "could not serialize binding");
            BrokerError::orphaned("bind", "serializing the binding", UNTRACKED_BINDING, e)
        })?;
        let record = ServiceBindingRecord::new(
            instance_id,
            binding_id,
            &service.definition.id,
            other_details,
        );

        match self.store.create_binding(record.clone()).await {
            Ok(()) => {}
            Err(e) if e.is_conflict() => {
                tracing::warn!(
                    instance_id,
                    binding_id,
                    "binding was created concurrently; the provider credentials from this call may be orphaned"
                );
                return Err(BrokerError::BindingAlreadyExists {
                    instance_id: instance_id.to_string(),
                    binding_id: binding_id.to_string(),
                });
            }
            Err(e) => {
                tracing::error!(instance_id, binding_id, error = %e, "could not record binding");
                return Err(BrokerError::orphaned(
                    "bind",
                    "recording the binding",
                    UNTRACKED_BINDING,
                    e,
                ));
            }
        }

        let binding = service
            .provider
            .build_instance_credentials(&record, &instance)
            .await?;

        let Some((vault, app_guid)) = vault else {
            tracing::info!(instance_id, binding_id, "bound service instance");
            return Ok(binding);
        };

        let name = credential_name(&self.client_identifier, &service.definition.name, binding_id);
        let binding = hand_off(vault, &name, app_guid, binding)
            .await
            .map_err(|(step, source)| {
                tracing::error!(
                    instance_id,
                    binding_id,
                    credential = %name,
                    step,
                    error = %source,
                    "credential hand-off failed"
                );
                BrokerError::CredentialHandoff {
                    binding_id: binding_id.to_string(),
                    step,
                    source,
                }
            })?;

        tracing::info!(instance_id, binding_id, credential = %name, "bound service instance");
        Ok(binding)
    }

    /// Revoke a binding.
    ///
    /// With a vault configured, the read permission is revoked (failure is
    /// logged and ignored) and the vaulted secret deleted (failure aborts
    /// before the provider is touched). The binding record is deleted last.
    pub async fn unbind(
        &self,
        instance_id: &str,
        binding_id: &str,
        details: &UnbindDetails,
    ) -> Result<(), BrokerError> {
        tracing::info!(
            instance_id,
            binding_id,
            service_id = %details.service_id,
            plan_id = %details.plan_id,
            "unbinding service instance"
        );

        let binding = match self.store.get_binding(instance_id, binding_id).await {
            Ok(binding) => binding,
            Err(e) if e.is_not_found() => {
                return Err(BrokerError::BindingNotFound {
                    instance_id: instance_id.to_string(),
                    binding_id: binding_id.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        let instance = self.load_instance(instance_id).await?;
        let service = self.registry.resolve(&binding.service_id)?;

        if let Some(vault) = &self.vault {
            let name = credential_name(&self.client_identifier, &service.definition.name, binding_id);
            remove_vaulted_credentials(vault, &name).await?;
        }

        service.provider.unbind(&instance, &binding).await?;

        self.store
            .delete_binding(instance_id, binding_id)
            .await
            .map_err(|e| {
                tracing::error!(instance_id, binding_id, error = %e, "could not delete binding record");
                BrokerError::orphaned(
                    "unbind",
                    "deleting the binding record",
                    "the broker still lists a binding whose credentials were revoked at the provider",
                    e,
                )
            })?;

        tracing::info!(instance_id, binding_id, "unbound service instance");
        Ok(())
    }
}

/// Store `binding` under `name`, grant the app read access and return the
/// reference that replaces the raw credentials. Errors carry the failed step.
async fn hand_off(
    vault: &Arc<dyn CredentialVault>,
    name: &str,
    app_guid: &str,
    binding: Binding,
) -> Result<Binding, (&'static str, VaultError)> {
    vault
        .put(name, &Value::Object(binding.credentials))
        .await
        .map_err(|e| ("store credentials", e))?;
    vault
        .add_permission(name, &app_actor(app_guid), &[READ_OPERATION])
        .await
        .map_err(|e| ("grant read permission", e))?;

    let mut credentials = Map::new();
    credentials.insert(CREDENTIAL_REF_KEY.to_string(), Value::String(name.to_string()));
    Ok(Binding { credentials })
}

async fn remove_vaulted_credentials(
    vault: &Arc<dyn CredentialVault>,
    name: &str,
) -> Result<(), BrokerError> {
    if let Err(e) = vault.delete_permission(name).await {
        tracing::warn!(credential = %name, error = %e, "could not revoke credential permission, continuing");
    }
    match vault.delete(name).await {
        Ok(()) => Ok(()),
        // Nothing was stored, e.g. the hand-off failed at bind time.
        Err(VaultError::NotFound { .. }) => {
            tracing::warn!(credential = %name, "no vaulted credentials to delete");
            Ok(())
        }
        Err(e) => {
            tracing::error!(credential = %name, error = %e, "could not delete vaulted credentials");
            Err(e.into())
        }
    }
}
