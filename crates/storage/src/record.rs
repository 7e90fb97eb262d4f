use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of asynchronous operation outstanding against an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Provision,
    Deprovision,
    Update,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Provision => "provision",
            OperationKind::Deprovision => "deprovision",
            OperationKind::Update => "update",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provision" => Ok(OperationKind::Provision),
            "deprovision" => Ok(OperationKind::Deprovision),
            "update" => Ok(OperationKind::Update),
            other => Err(format!("unknown operation kind '{other}'")),
        }
    }
}

/// An asynchronous provider operation that has been started but not yet
/// observed to complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOperation {
    /// Opaque token returned by the provider, used for polling.
    pub id: String,
    pub kind: OperationKind,
}

impl PendingOperation {
    pub fn new(id: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

/// One provisioned service instance.
///
/// `operation` is `Some` exactly while an asynchronous provision, update or
/// deprovision is outstanding for the instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstanceRecord {
    pub id: String,
    pub service_id: String,
    pub plan_id: String,
    pub space_guid: String,
    pub organization_guid: String,
    /// Provider-opaque serialized JSON.
    pub other_details: String,
    pub operation: Option<PendingOperation>,
    /// ISO 8601 / RFC 3339 timestamp string, maintained by the store.
    pub created_at: String,
    /// ISO 8601 / RFC 3339 timestamp string, maintained by the store.
    pub updated_at: String,
}

impl ServiceInstanceRecord {
    pub fn new(
        id: impl Into<String>,
        service_id: impl Into<String>,
        plan_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            service_id: service_id.into(),
            plan_id: plan_id.into(),
            space_guid: String::new(),
            organization_guid: String::new(),
            other_details: String::new(),
            operation: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    /// Parse `other_details` as JSON. An empty blob reads as `null`.
    pub fn details(&self) -> Result<serde_json::Value, serde_json::Error> {
        if self.other_details.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&self.other_details)
    }

    pub fn has_pending_operation(&self) -> bool {
        self.operation.is_some()
    }
}

/// Credentials handed out for one (instance, binding) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceBindingRecord {
    pub instance_id: String,
    pub binding_id: String,
    pub service_id: String,
    /// Serialized credential JSON as returned by the provider.
    pub other_details: String,
    /// ISO 8601 / RFC 3339 timestamp string, maintained by the store.
    pub created_at: String,
}

impl ServiceBindingRecord {
    pub fn new(
        instance_id: impl Into<String>,
        binding_id: impl Into<String>,
        service_id: impl Into<String>,
        other_details: impl Into<String>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            binding_id: binding_id.into(),
            service_id: service_id.into(),
            other_details: other_details.into(),
            created_at: String::new(),
        }
    }

    pub fn details(&self) -> Result<serde_json::Value, serde_json::Error> {
        if self.other_details.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&self.other_details)
    }
}

/// Raw user parameters submitted with the latest provision or update of an
/// instance. Kept for audit and support only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionRequestRecord {
    pub instance_id: String,
    pub request_details: String,
    /// ISO 8601 / RFC 3339 timestamp string, maintained by the store.
    pub updated_at: String,
}

impl ProvisionRequestRecord {
    pub fn new(instance_id: impl Into<String>, request_details: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            request_details: request_details.into(),
            updated_at: String::new(),
        }
    }
}
