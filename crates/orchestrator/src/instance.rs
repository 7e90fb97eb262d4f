//! Provision, update and deprovision.

use broker_storage::{
    OperationKind, PendingOperation, ProvisionRequestRecord, ServiceInstanceRecord,
};

use crate::broker::ServiceBroker;
use crate::error::BrokerError;
use crate::params::ensure_valid_or_empty_json;
use crate::provider::OperationOutcome;
use crate::types::{DeprovisionDetails, OperationResponse, ProvisionDetails, UpdateDetails};

const UNTRACKED_INSTANCE: &str =
    "the instance exists at the provider but is not tracked by the broker";
const UNRECORDED_REQUEST: &str =
    "the instance is tracked but the parameters it was requested with were not saved";

fn response_for(operation: Option<&PendingOperation>) -> OperationResponse {
    match operation {
        Some(op) => OperationResponse::pending(op.id.clone()),
        None => OperationResponse::completed(),
    }
}

fn in_progress(instance_id: &str, op: &PendingOperation) -> BrokerError {
    tracing::info!(instance_id, operation = %op.kind, operation_id = %op.id, "operation already in progress");
    BrokerError::OperationInProgress {
        instance_id: instance_id.to_string(),
        operation: op.kind,
    }
}

impl ServiceBroker {
    /// Create a service instance.
    ///
    /// Fails before any side effect if the instance already exists, the
    /// service or plan is unknown, the provider is asynchronous and the
    /// caller does not accept incomplete results, or the parameters are
    /// invalid. Once the provider has acted, a failure to record the result
    /// is reported as an orphaned resource.
    pub async fn provision(
        &self,
        instance_id: &str,
        details: &ProvisionDetails,
        accepts_incomplete: bool,
    ) -> Result<OperationResponse, BrokerError> {
        tracing::info!(
            instance_id,
            service_id = %details.service_id,
            plan_id = %details.plan_id,
            accepts_incomplete,
            "provisioning service instance"
        );

        if self.store.instance_exists(instance_id).await? {
            return Err(BrokerError::InstanceAlreadyExists {
                instance_id: instance_id.to_string(),
            });
        }

        let (service, plan) = self.resolve(&details.service_id, &details.plan_id)?;
        if service.provider.provisions_async() && !accepts_incomplete {
            return Err(BrokerError::AsyncRequired);
        }

        ensure_valid_or_empty_json(details.raw_parameters.as_deref())?;
        let vars = service
            .definition
            .provision_variables(instance_id, details, plan)?;

        let outcome = service.provider.provision(&vars).await?;
        let operation = outcome
            .operation_id()
            .map(|id| PendingOperation::new(id, OperationKind::Provision));
        let response = response_for(operation.as_ref());

        let other_details = serde_json::to_string(&outcome.into_value()).map_err(|e| {
            tracing::error!(instance_id, error = %e, "could not serialize instance details");
            BrokerError::orphaned(
                "provision",
                "serializing the instance details",
                UNTRACKED_INSTANCE,
                e,
            )
        })?;

        let mut record = ServiceInstanceRecord::new(instance_id, &service.definition.id, &plan.id);
        record.space_guid = details.space_guid.clone();
        record.organization_guid = details.organization_guid.clone();
        record.other_details = other_details;
        record.operation = operation;

        match self.store.create_instance(record).await {
            Ok(()) => {}
            Err(e) if e.is_conflict() => {
                tracing::warn!(
                    instance_id,
                    "instance was created concurrently; the provider resource from this call may be orphaned"
                );
                return Err(BrokerError::InstanceAlreadyExists {
                    instance_id: instance_id.to_string(),
                });
            }
            Err(e) => {
                tracing::error!(instance_id, error = %e, "could not record provisioned instance");
                return Err(BrokerError::orphaned(
                    "provision",
                    "recording the instance",
                    UNTRACKED_INSTANCE,
                    e,
                ));
            }
        }

        let request = ProvisionRequestRecord::new(
            instance_id,
            details.raw_parameters.clone().unwrap_or_default(),
        );
        if let Err(e) = self.store.create_provision_request(request).await {
            tracing::error!(instance_id, error = %e, "could not record provision request");
            return Err(BrokerError::orphaned(
                "provision",
                "recording the provision request",
                UNRECORDED_REQUEST,
                e,
            ));
        }

        tracing::info!(instance_id, is_async = response.is_async, "provisioned service instance");
        Ok(response)
    }

    /// Destroy a service instance.
    ///
    /// A synchronous deprovision deletes the record at once. An asynchronous
    /// one leaves the record in place with a pending operation; the poller
    /// deletes it when the provider reports completion.
    /// A deprovision that is already outstanding is not started again.
    pub async fn deprovision(
        &self,
        instance_id: &str,
        details: &DeprovisionDetails,
        accepts_incomplete: bool,
    ) -> Result<OperationResponse, BrokerError> {
        tracing::info!(instance_id, accepts_incomplete, "deprovisioning service instance");

        let mut instance = self.load_instance(instance_id).await?;
        let service = self.registry.resolve(&instance.service_id)?;
        if service.provider.deprovisions_async() && !accepts_incomplete {
            return Err(BrokerError::AsyncRequired);
        }
        if let Some(op) = instance
            .operation
            .as_ref()
            .filter(|op| op.kind == OperationKind::Deprovision)
        {
            return Err(in_progress(instance_id, op));
        }

        match service.provider.deprovision(&instance, details).await? {
            OperationOutcome::Completed(()) => {
                self.store.delete_instance(instance_id).await.map_err(|e| {
                    tracing::error!(instance_id, error = %e, "could not delete deprovisioned instance");
                    BrokerError::orphaned(
                        "deprovision",
                        "deleting the instance record",
                        "the broker still lists an instance that no longer exists at the provider",
                        e,
                    )
                })?;
                tracing::info!(instance_id, "deprovisioned service instance");
                Ok(OperationResponse::completed())
            }
            OperationOutcome::Pending { operation_id, .. } => {
                instance.operation = Some(PendingOperation::new(
                    operation_id.clone(),
                    OperationKind::Deprovision,
                ));
                self.store.save_instance(instance).await.map_err(|e| {
                    tracing::error!(instance_id, error = %e, "could not record pending deprovision");
                    BrokerError::orphaned(
                        "deprovision",
                        "recording the pending operation",
                        "the deprovision cannot be polled to completion and the instance record will not be removed",
                        e,
                    )
                })?;
                tracing::info!(instance_id, operation_id = %operation_id, "deprovision in progress");
                Ok(OperationResponse::pending(operation_id))
            }
        }
    }

    /// Change the plan or parameters of an existing instance.
    ///
    /// Refused with [`BrokerError::OperationInProgress`] while any
    /// asynchronous operation on the instance is still outstanding.
    pub async fn update(
        &self,
        instance_id: &str,
        details: &UpdateDetails,
        accepts_incomplete: bool,
    ) -> Result<OperationResponse, BrokerError> {
        tracing::info!(
            instance_id,
            plan_id = ?details.plan_id,
            accepts_incomplete,
            "updating service instance"
        );

        let mut instance = self.load_instance(instance_id).await?;
        let target_plan = details.plan_id.as_deref().unwrap_or(&instance.plan_id);
        let (service, plan) = self.resolve(&instance.service_id, target_plan)?;
        if service.provider.provisions_async() && !accepts_incomplete {
            return Err(BrokerError::AsyncRequired);
        }
        if let Some(op) = &instance.operation {
            return Err(in_progress(instance_id, op));
        }

        ensure_valid_or_empty_json(details.raw_parameters.as_deref())?;
        let changes = service
            .definition
            .prohibited_changes(&instance.plan_id, details)?;
        if !changes.is_empty() {
            tracing::info!(instance_id, ?changes, "rejected prohibited update");
            return Err(BrokerError::ProhibitedUpdate { changes });
        }

        let vars = service.definition.update_variables(&instance, details, plan)?;
        let outcome = service.provider.update(&vars).await?;

        instance.plan_id = plan.id.clone();
        instance.operation = outcome
            .operation_id()
            .map(|id| PendingOperation::new(id, OperationKind::Update));
        let response = response_for(instance.operation.as_ref());

        self.store.save_instance(instance).await.map_err(|e| {
            tracing::error!(instance_id, error = %e, "could not record updated instance");
            BrokerError::orphaned(
                "update",
                "saving the instance record",
                "the provider applied the change but the broker still records the previous plan",
                e,
            )
        })?;

        let request = ProvisionRequestRecord::new(
            instance_id,
            details.raw_parameters.clone().unwrap_or_default(),
        );
        self.store
            .save_provision_request(request)
            .await
            .map_err(|e| {
                tracing::error!(instance_id, error = %e, "could not record update request");
                BrokerError::orphaned(
                    "update",
                    "recording the update request",
                    UNRECORDED_REQUEST,
                    e,
                )
            })?;

        tracing::info!(instance_id, is_async = response.is_async, "updated service instance");
        Ok(response)
    }
}
