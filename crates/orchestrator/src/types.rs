//! Request and response shapes of the orchestrator's lifecycle calls.
//!
//! These mirror the Open Service Broker request bodies closely enough that a
//! protocol layer can fill them straight from a parsed request.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvisionDetails {
    pub service_id: String,
    pub plan_id: String,
    #[serde(default)]
    pub organization_guid: String,
    #[serde(default)]
    pub space_guid: String,
    /// Raw user parameters exactly as received.
    #[serde(default)]
    pub raw_parameters: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateDetails {
    pub service_id: String,
    /// Target plan; `None` keeps the current plan.
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub raw_parameters: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeprovisionDetails {
    pub service_id: String,
    pub plan_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BindDetails {
    pub service_id: String,
    pub plan_id: String,
    /// Identity of the application the credentials are for.
    #[serde(default)]
    pub app_guid: Option<String>,
    #[serde(default)]
    pub raw_parameters: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnbindDetails {
    pub service_id: String,
    pub plan_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollDetails {
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub operation_data: Option<String>,
}

/// Result of provision, update and deprovision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResponse {
    pub is_async: bool,
    /// Opaque token to hand back on polls; set when `is_async`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_data: Option<String>,
}

impl OperationResponse {
    pub fn completed() -> Self {
        Self::default()
    }

    pub fn pending(operation_id: impl Into<String>) -> Self {
        Self {
            is_async: true,
            operation_data: Some(operation_id.into()),
        }
    }
}

/// Credentials returned from a successful bind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub credentials: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationState {
    #[serde(rename = "in progress")]
    Pending,
    #[serde(rename = "succeeded")]
    Succeeded,
    #[serde(rename = "failed")]
    Failed,
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationState::Pending)
    }
}

/// Answer to a last-operation poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastOperation {
    pub state: OperationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl LastOperation {
    pub fn pending() -> Self {
        Self {
            state: OperationState::Pending,
            description: None,
        }
    }

    pub fn succeeded() -> Self {
        Self {
            state: OperationState::Succeeded,
            description: None,
        }
    }

    pub fn with_description(state: OperationState, description: impl Into<String>) -> Self {
        Self {
            state,
            description: Some(description.into()),
        }
    }
}
