//! Service and plan definitions: catalog metadata, parameter merging and
//! the update policy.

use broker_storage::ServiceInstanceRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BrokerError;
use crate::params::parse_parameters;
use crate::provider::Variables;
use crate::types::{BindDetails, ProvisionDetails, UpdateDetails};

fn default_true() -> bool {
    true
}

/// One plan of a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePlan {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub free: bool,
    /// Fixed variables for this plan. They override user parameters.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// A service offered by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub bindable: bool,
    #[serde(default)]
    pub plan_updateable: bool,
    /// Disabled services stay resolvable for existing instances but are
    /// left out of the catalog.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub plans: Vec<ServicePlan>,
    /// Provision variables used when neither the user nor the plan sets them.
    #[serde(default)]
    pub provision_defaults: Map<String, Value>,
    #[serde(default)]
    pub bind_defaults: Map<String, Value>,
    /// JSON Schema for user provision/update parameters.
    #[serde(default)]
    pub provision_input: Option<Value>,
    /// JSON Schema for user bind parameters.
    #[serde(default)]
    pub bind_input: Option<Value>,
    /// Parameters whose change would force the instance to be recreated.
    #[serde(default)]
    pub non_updatable_parameters: Vec<String>,
}

/// Catalog entry for one plan, as published to platforms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogPlan {
    pub id: String,
    pub name: String,
    pub description: String,
    pub free: bool,
}

/// Catalog entry for one service, as published to platforms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogService {
    pub id: String,
    pub name: String,
    pub description: String,
    pub bindable: bool,
    pub plan_updateable: bool,
    pub tags: Vec<String>,
    pub plans: Vec<CatalogPlan>,
}

impl ServiceDefinition {
    pub fn resolve_plan(&self, plan_id: &str) -> Result<&ServicePlan, BrokerError> {
        self.plans
            .iter()
            .find(|p| p.id == plan_id)
            .ok_or_else(|| BrokerError::PlanNotFound {
                service_id: self.id.clone(),
                plan_id: plan_id.to_string(),
            })
    }

    /// Merge user parameters for a new instance.
    ///
    /// Precedence, lowest first: service defaults, user parameters, plan
    /// properties, request context.
    pub fn provision_variables(
        &self,
        instance_id: &str,
        details: &ProvisionDetails,
        plan: &ServicePlan,
    ) -> Result<Variables, BrokerError> {
        let user = parse_parameters(details.raw_parameters.as_deref())?;
        self.validate_against(self.provision_input.as_ref(), &user)?;

        let mut vars = self.provision_defaults.clone();
        vars.extend(user);
        vars.extend(plan.properties.clone());
        vars.insert("instance_id".into(), instance_id.into());
        vars.insert("service_id".into(), self.id.clone().into());
        vars.insert("plan_id".into(), plan.id.clone().into());
        vars.insert("space_guid".into(), details.space_guid.clone().into());
        vars.insert(
            "organization_guid".into(),
            details.organization_guid.clone().into(),
        );
        Ok(vars)
    }

    /// Merge user parameters for an update of `instance` onto `plan`.
    ///
    /// Service defaults are not reapplied: an update only carries what the
    /// user asked to change plus the target plan's fixed properties.
    pub fn update_variables(
        &self,
        instance: &ServiceInstanceRecord,
        details: &UpdateDetails,
        plan: &ServicePlan,
    ) -> Result<Variables, BrokerError> {
        let user = parse_parameters(details.raw_parameters.as_deref())?;
        self.validate_against(self.provision_input.as_ref(), &user)?;

        let mut vars = user;
        vars.extend(plan.properties.clone());
        vars.insert("instance_id".into(), instance.id.clone().into());
        vars.insert("service_id".into(), self.id.clone().into());
        vars.insert("plan_id".into(), plan.id.clone().into());
        vars.insert(
            "previous_plan_id".into(),
            instance.plan_id.clone().into(),
        );
        vars.insert("instance_details".into(), instance_details(instance));
        Ok(vars)
    }

    /// Merge user parameters for a new binding on `instance`.
    pub fn bind_variables(
        &self,
        instance: &ServiceInstanceRecord,
        binding_id: &str,
        details: &BindDetails,
        plan: &ServicePlan,
    ) -> Result<Variables, BrokerError> {
        let user = parse_parameters(details.raw_parameters.as_deref())?;
        self.validate_against(self.bind_input.as_ref(), &user)?;

        let mut vars = self.bind_defaults.clone();
        vars.extend(user);
        vars.insert("instance_id".into(), instance.id.clone().into());
        vars.insert("binding_id".into(), binding_id.into());
        vars.insert("service_id".into(), self.id.clone().into());
        vars.insert("plan_id".into(), plan.id.clone().into());
        vars.insert(
            "app_guid".into(),
            details.app_guid.clone().map(Value::String).unwrap_or(Value::Null),
        );
        vars.insert("instance_details".into(), instance_details(instance));
        Ok(vars)
    }

    /// Names of the requested changes that the update policy forbids.
    /// An empty list means the update is allowed.
    pub fn prohibited_changes(
        &self,
        current_plan_id: &str,
        details: &UpdateDetails,
    ) -> Result<Vec<String>, BrokerError> {
        let mut changes = Vec::new();
        if let Some(plan_id) = &details.plan_id {
            if plan_id != current_plan_id && !self.plan_updateable {
                changes.push("plan_id".to_string());
            }
        }
        let user = parse_parameters(details.raw_parameters.as_deref())?;
        for name in &self.non_updatable_parameters {
            if user.contains_key(name) {
                changes.push(name.clone());
            }
        }
        Ok(changes)
    }

    pub fn is_update_allowed(
        &self,
        current_plan_id: &str,
        details: &UpdateDetails,
    ) -> Result<bool, BrokerError> {
        Ok(self.prohibited_changes(current_plan_id, details)?.is_empty())
    }

    pub fn catalog_entry(&self) -> CatalogService {
        CatalogService {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            bindable: self.bindable,
            plan_updateable: self.plan_updateable,
            tags: self.tags.clone(),
            plans: self
                .plans
                .iter()
                .map(|p| CatalogPlan {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    description: p.description.clone(),
                    free: p.free,
                })
                .collect(),
        }
    }

    /// Static problems with this definition, empty if it is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.id.trim().is_empty() {
            problems.push(format!("service '{}' has an empty id", self.name));
        }
        if self.name.trim().is_empty() {
            problems.push(format!("service {} has an empty name", self.id));
        }
        if self.plans.is_empty() {
            problems.push(format!("service {} has no plans", self.id));
        }
        for (i, plan) in self.plans.iter().enumerate() {
            if plan.id.trim().is_empty() {
                problems.push(format!("service {} plan '{}' has an empty id", self.id, plan.name));
            }
            if self.plans[..i].iter().any(|p| p.id == plan.id) {
                problems.push(format!("service {} has duplicate plan id {}", self.id, plan.id));
            }
            if self.plans[..i].iter().any(|p| p.name == plan.name) {
                problems.push(format!(
                    "service {} has duplicate plan name {}",
                    self.id, plan.name
                ));
            }
        }
        for (label, schema) in [
            ("provision_input", &self.provision_input),
            ("bind_input", &self.bind_input),
        ] {
            if let Some(schema) = schema {
                if let Err(e) = jsonschema::validator_for(schema) {
                    problems.push(format!("service {} {label} schema is invalid: {e}", self.id));
                }
            }
        }
        problems
    }

    fn validate_against(
        &self,
        schema: Option<&Value>,
        params: &Map<String, Value>,
    ) -> Result<(), BrokerError> {
        let Some(schema) = schema else {
            return Ok(());
        };
        let validator =
            jsonschema::validator_for(schema).map_err(|e| BrokerError::SchemaViolation {
                service_id: self.id.clone(),
                errors: vec![format!("service schema is invalid: {e}")],
            })?;
        let instance = Value::Object(params.clone());
        let errors: Vec<String> = validator
            .iter_errors(&instance)
            .map(|e| e.to_string())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(BrokerError::SchemaViolation {
                service_id: self.id.clone(),
                errors,
            })
        }
    }
}

fn instance_details(instance: &ServiceInstanceRecord) -> Value {
    instance
        .details()
        .unwrap_or_else(|_| Value::String(instance.other_details.clone()))
}
