//! Last-operation polling and completion of asynchronous operations.

use broker_storage::{OperationKind, PendingOperation};

use crate::broker::ServiceBroker;
use crate::classify::{classify, ErrorClass};
use crate::error::BrokerError;
use crate::provider::ServiceProvider;
use crate::types::{LastOperation, OperationState, PollDetails};

/// Local bookkeeping applied once the provider reports an operation done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionAction {
    /// The instance is gone; drop its record.
    DeleteRecord,
    /// Refresh provider-owned details and clear the pending operation.
    RefreshDetails,
}

impl From<OperationKind> for CompletionAction {
    fn from(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Deprovision => CompletionAction::DeleteRecord,
            OperationKind::Provision | OperationKind::Update => CompletionAction::RefreshDetails,
        }
    }
}

impl ServiceBroker {
    /// Report the state of the instance's outstanding operation and, once
    /// the provider says it is done, finish it locally.
    ///
    /// Transient provider failures read as still in progress. Any other
    /// failure reads as failed and leaves the record untouched. An instance
    /// with nothing outstanding reports success without asking the provider.
    pub async fn last_operation(
        &self,
        instance_id: &str,
        details: &PollDetails,
    ) -> Result<LastOperation, BrokerError> {
        tracing::info!(
            instance_id,
            operation_data = ?details.operation_data,
            "polling last operation"
        );

        let instance = self.load_instance(instance_id).await?;
        let service = self.registry.resolve(&instance.service_id)?;
        if !service.provider.is_async() {
            return Err(BrokerError::AsyncRequired);
        }

        let Some(operation) = instance.operation.clone() else {
            return Ok(LastOperation::succeeded());
        };
        if let Some(token) = details.operation_data.as_deref() {
            if token != operation.id {
                tracing::debug!(
                    instance_id,
                    requested = token,
                    recorded = %operation.id,
                    "poll token differs from the recorded operation, polling the recorded one"
                );
            }
        }

        let done = match service.provider.poll_instance(&instance).await {
            Ok(done) => done,
            Err(err) => {
                let state = match classify(&err) {
                    ErrorClass::Transient => {
                        tracing::warn!(instance_id, error = %err, "transient error while polling");
                        OperationState::Pending
                    }
                    ErrorClass::Terminal => {
                        tracing::error!(instance_id, error = %err, "operation failed");
                        OperationState::Failed
                    }
                };
                return Ok(LastOperation::with_description(state, err.to_string()));
            }
        };
        if !done {
            return Ok(LastOperation::pending());
        }

        match CompletionAction::from(operation.kind) {
            CompletionAction::DeleteRecord => self.delete_completed(instance_id, &operation).await?,
            CompletionAction::RefreshDetails => {
                self.refresh_completed(service.provider.as_ref(), instance_id, &operation)
                    .await?
            }
        }

        tracing::info!(
            instance_id,
            operation = %operation.kind,
            operation_id = %operation.id,
            "operation succeeded"
        );
        Ok(LastOperation::succeeded())
    }

    async fn delete_completed(
        &self,
        instance_id: &str,
        operation: &PendingOperation,
    ) -> Result<(), BrokerError> {
        match self.store.delete_instance(instance_id).await {
            Ok(()) => Ok(()),
            // A concurrent poll finished first.
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(completion_failed(instance_id, operation, e)),
        }
    }

    async fn refresh_completed(
        &self,
        provider: &dyn ServiceProvider,
        instance_id: &str,
        operation: &PendingOperation,
    ) -> Result<(), BrokerError> {
        let mut instance = self
            .store
            .get_instance(instance_id)
            .await
            .map_err(|e| completion_failed(instance_id, operation, e))?;
        provider
            .refresh_instance_details(&mut instance)
            .await
            .map_err(|e| completion_failed(instance_id, operation, e))?;
        instance.operation = None;
        self.store
            .save_instance(instance)
            .await
            .map_err(|e| completion_failed(instance_id, operation, e))
    }
}

fn completion_failed(
    instance_id: &str,
    operation: &PendingOperation,
    cause: impl std::fmt::Display,
) -> BrokerError {
    tracing::error!(
        instance_id,
        operation = %operation.kind,
        error = %cause,
        "operation completed but its local record could not be updated"
    );
    BrokerError::CompletionFailed {
        instance_id: instance_id.to_string(),
        operation: operation.kind,
        reason: cause.to_string(),
    }
}
