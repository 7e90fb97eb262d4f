//! Shared fixtures for the orchestrator integration tests: a scripted fake
//! provider, a store and a vault that record calls and fail on demand.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use broker_orchestrator::{
    Binder, Binding, BrokerError, CredentialVault, DeprovisionDetails, ErrorKind,
    InstancePoller, MemoryVault, OperationOutcome, ProviderError, Provisioner, Registry,
    ServiceBroker, ServiceDefinition, ServiceProvider, Variables, VaultError,
};
use broker_storage::{
    MemoryRecordStore, ProvisionRequestRecord, RecordStore, ServiceBindingRecord,
    ServiceInstanceRecord, StorageError,
};
use serde_json::{json, Value};

pub const SERVICE_ID: &str = "svc-db";
pub const SERVICE_NAME: &str = "fake-db";
pub const PLAN_SMALL: &str = "plan-small";
pub const PLAN_LARGE: &str = "plan-large";

/// Ordered log of calls made to the provider, store and vault.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Calls whose name starts with `prefix`, in order.
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

// ── Fake provider ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct Script {
    provision: VecDeque<Result<OperationOutcome<Value>, ProviderError>>,
    update: VecDeque<Result<OperationOutcome<()>, ProviderError>>,
    deprovision: VecDeque<Result<OperationOutcome<()>, ProviderError>>,
    bind: VecDeque<Result<Value, ProviderError>>,
    unbind: VecDeque<ProviderError>,
    polls: VecDeque<Result<bool, ProviderError>>,
    refresh: VecDeque<ProviderError>,
}

/// Provider whose answers are queued by the test. With nothing queued it
/// succeeds, returning a pending token when it is asynchronous.
pub struct FakeProvider {
    is_async: bool,
    calls: CallLog,
    script: Mutex<Script>,
}

impl FakeProvider {
    pub fn new(is_async: bool, calls: CallLog) -> Self {
        Self {
            is_async,
            calls,
            script: Mutex::new(Script::default()),
        }
    }

    pub fn queue_provision(&self, result: Result<OperationOutcome<Value>, ProviderError>) {
        self.script.lock().unwrap().provision.push_back(result);
    }

    pub fn queue_update(&self, result: Result<OperationOutcome<()>, ProviderError>) {
        self.script.lock().unwrap().update.push_back(result);
    }

    pub fn queue_deprovision(&self, result: Result<OperationOutcome<()>, ProviderError>) {
        self.script.lock().unwrap().deprovision.push_back(result);
    }

    pub fn queue_bind(&self, result: Result<Value, ProviderError>) {
        self.script.lock().unwrap().bind.push_back(result);
    }

    pub fn fail_unbind(&self, err: ProviderError) {
        self.script.lock().unwrap().unbind.push_back(err);
    }

    pub fn queue_poll(&self, result: Result<bool, ProviderError>) {
        self.script.lock().unwrap().polls.push_back(result);
    }

    pub fn fail_refresh(&self, err: ProviderError) {
        self.script.lock().unwrap().refresh.push_back(err);
    }

    fn outcome<T>(&self, op: &str, value: T) -> OperationOutcome<T> {
        if self.is_async {
            OperationOutcome::pending(format!("op-{op}"), value)
        } else {
            OperationOutcome::Completed(value)
        }
    }
}

#[async_trait]
impl Provisioner for FakeProvider {
    fn provisions_async(&self) -> bool {
        self.is_async
    }

    fn deprovisions_async(&self) -> bool {
        self.is_async
    }

    async fn provision(&self, vars: &Variables) -> Result<OperationOutcome<Value>, ProviderError> {
        self.calls.push("provider.provision");
        if let Some(result) = self.script.lock().unwrap().provision.pop_front() {
            return result;
        }
        Ok(self.outcome(
            "provision",
            json!({"host": "10.0.0.1", "name": vars["instance_id"], "tier": vars.get("tier")}),
        ))
    }

    async fn update(&self, _vars: &Variables) -> Result<OperationOutcome<()>, ProviderError> {
        self.calls.push("provider.update");
        if let Some(result) = self.script.lock().unwrap().update.pop_front() {
            return result;
        }
        Ok(self.outcome("update", ()))
    }

    async fn deprovision(
        &self,
        _instance: &ServiceInstanceRecord,
        _details: &DeprovisionDetails,
    ) -> Result<OperationOutcome<()>, ProviderError> {
        self.calls.push("provider.deprovision");
        if let Some(result) = self.script.lock().unwrap().deprovision.pop_front() {
            return result;
        }
        Ok(self.outcome("deprovision", ()))
    }
}

#[async_trait]
impl Binder for FakeProvider {
    async fn bind(&self, vars: &Variables) -> Result<Value, ProviderError> {
        self.calls.push("provider.bind");
        if let Some(result) = self.script.lock().unwrap().bind.pop_front() {
            return result;
        }
        Ok(json!({
            "username": format!("user-{}", vars["binding_id"].as_str().unwrap_or_default()),
            "password": "s3cret",
            "host": vars["instance_details"]["host"],
        }))
    }

    async fn build_instance_credentials(
        &self,
        binding: &ServiceBindingRecord,
        _instance: &ServiceInstanceRecord,
    ) -> Result<Binding, ProviderError> {
        self.calls.push("provider.build_instance_credentials");
        match binding.details() {
            Ok(Value::Object(credentials)) => Ok(Binding { credentials }),
            Ok(other) => Err(ProviderError::Failed(format!("unexpected binding details {other}"))),
            Err(e) => Err(ProviderError::Failed(e.to_string())),
        }
    }

    async fn unbind(
        &self,
        _instance: &ServiceInstanceRecord,
        _binding: &ServiceBindingRecord,
    ) -> Result<(), ProviderError> {
        self.calls.push("provider.unbind");
        match self.script.lock().unwrap().unbind.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl InstancePoller for FakeProvider {
    async fn poll_instance(&self, _instance: &ServiceInstanceRecord) -> Result<bool, ProviderError> {
        self.calls.push("provider.poll_instance");
        self.script
            .lock()
            .unwrap()
            .polls
            .pop_front()
            .unwrap_or(Ok(true))
    }

    async fn refresh_instance_details(
        &self,
        instance: &mut ServiceInstanceRecord,
    ) -> Result<(), ProviderError> {
        self.calls.push("provider.refresh_instance_details");
        if let Some(err) = self.script.lock().unwrap().refresh.pop_front() {
            return Err(err);
        }
        let mut details = instance.details().unwrap_or(Value::Null);
        if !details.is_object() {
            details = json!({});
        }
        details["refreshed"] = json!(true);
        instance.other_details = details.to_string();
        Ok(())
    }
}

// ── Flaky store ───────────────────────────────────────────────────────────────

/// `MemoryRecordStore` that logs writes and fails the methods named in
/// `fail`. With `hide_existing` set, existence checks always say no, which
/// lets a test reach the store's uniqueness constraint directly.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryRecordStore,
    calls: CallLog,
    fail: Mutex<HashSet<&'static str>>,
    hide_existing: AtomicBool,
}

impl FlakyStore {
    pub fn new(calls: CallLog) -> Self {
        Self {
            calls,
            ..Self::default()
        }
    }

    pub fn fail(&self, method: &'static str) {
        self.fail.lock().unwrap().insert(method);
    }

    pub fn heal(&self, method: &'static str) {
        self.fail.lock().unwrap().remove(method);
    }

    pub fn hide_existing(&self) {
        self.hide_existing.store(true, Ordering::SeqCst);
    }

    fn check(&self, method: &'static str) -> Result<(), StorageError> {
        if self.fail.lock().unwrap().contains(method) {
            Err(StorageError::Backend(format!("{method}: connection refused")))
        } else {
            Ok(())
        }
    }

    fn write(&self, method: &'static str) -> Result<(), StorageError> {
        self.calls.push(format!("store.{method}"));
        self.check(method)
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn instance_exists(&self, instance_id: &str) -> Result<bool, StorageError> {
        self.check("instance_exists")?;
        if self.hide_existing.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.inner.instance_exists(instance_id).await
    }

    async fn get_instance(&self, instance_id: &str) -> Result<ServiceInstanceRecord, StorageError> {
        self.check("get_instance")?;
        self.inner.get_instance(instance_id).await
    }

    async fn create_instance(&self, record: ServiceInstanceRecord) -> Result<(), StorageError> {
        self.write("create_instance")?;
        self.inner.create_instance(record).await
    }

    async fn save_instance(&self, record: ServiceInstanceRecord) -> Result<(), StorageError> {
        self.write("save_instance")?;
        self.inner.save_instance(record).await
    }

    async fn delete_instance(&self, instance_id: &str) -> Result<(), StorageError> {
        self.write("delete_instance")?;
        self.inner.delete_instance(instance_id).await
    }

    async fn binding_exists(&self, instance_id: &str, binding_id: &str) -> Result<bool, StorageError> {
        self.check("binding_exists")?;
        if self.hide_existing.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.inner.binding_exists(instance_id, binding_id).await
    }

    async fn get_binding(
        &self,
        instance_id: &str,
        binding_id: &str,
    ) -> Result<ServiceBindingRecord, StorageError> {
        self.check("get_binding")?;
        self.inner.get_binding(instance_id, binding_id).await
    }

    async fn create_binding(&self, record: ServiceBindingRecord) -> Result<(), StorageError> {
        self.write("create_binding")?;
        self.inner.create_binding(record).await
    }

    async fn delete_binding(&self, instance_id: &str, binding_id: &str) -> Result<(), StorageError> {
        self.write("delete_binding")?;
        self.inner.delete_binding(instance_id, binding_id).await
    }

    async fn create_provision_request(
        &self,
        record: ProvisionRequestRecord,
    ) -> Result<(), StorageError> {
        self.write("create_provision_request")?;
        self.inner.create_provision_request(record).await
    }

    async fn save_provision_request(
        &self,
        record: ProvisionRequestRecord,
    ) -> Result<(), StorageError> {
        self.write("save_provision_request")?;
        self.inner.save_provision_request(record).await
    }

    async fn get_provision_request(
        &self,
        instance_id: &str,
    ) -> Result<ProvisionRequestRecord, StorageError> {
        self.check("get_provision_request")?;
        self.inner.get_provision_request(instance_id).await
    }
}

// ── Recording vault ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingVault {
    pub inner: MemoryVault,
    calls: CallLog,
    fail: Mutex<HashSet<&'static str>>,
}

impl RecordingVault {
    pub fn new(calls: CallLog) -> Self {
        Self {
            calls,
            ..Self::default()
        }
    }

    pub fn fail(&self, method: &'static str) {
        self.fail.lock().unwrap().insert(method);
    }

    fn enter(&self, method: &'static str) -> Result<(), VaultError> {
        self.calls.push(format!("vault.{method}"));
        if self.fail.lock().unwrap().contains(method) {
            Err(VaultError::Request(format!("{method}: vault sealed")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CredentialVault for RecordingVault {
    async fn put(&self, name: &str, value: &Value) -> Result<String, VaultError> {
        self.enter("put")?;
        self.inner.put(name, value).await
    }

    async fn add_permission(
        &self,
        name: &str,
        actor: &str,
        operations: &[&str],
    ) -> Result<(), VaultError> {
        self.enter("add_permission")?;
        self.inner.add_permission(name, actor, operations).await
    }

    async fn delete_permission(&self, name: &str) -> Result<(), VaultError> {
        self.enter("delete_permission")?;
        self.inner.delete_permission(name).await
    }

    async fn delete(&self, name: &str) -> Result<(), VaultError> {
        self.enter("delete")?;
        self.inner.delete(name).await
    }
}

// ── Harness ───────────────────────────────────────────────────────────────────

pub fn definition() -> ServiceDefinition {
    serde_json::from_value(json!({
        "id": SERVICE_ID,
        "name": SERVICE_NAME,
        "description": "A database that only exists in tests",
        "plan_updateable": true,
        "tags": ["sql"],
        "plans": [
            {"id": PLAN_SMALL, "name": "small", "properties": {"tier": "small"}},
            {"id": PLAN_LARGE, "name": "large", "properties": {"tier": "large"}}
        ],
        "provision_defaults": {"region": "us-central1"},
        "provision_input": {
            "type": "object",
            "properties": {
                "region": {"type": "string"},
                "backups": {"type": "boolean"}
            }
        },
        "bind_input": {
            "type": "object",
            "properties": {"role": {"enum": ["reader", "writer"]}}
        },
        "non_updatable_parameters": ["region"]
    }))
    .expect("fixture definition")
}

pub struct Harness {
    pub broker: Arc<ServiceBroker>,
    pub store: Arc<FlakyStore>,
    pub provider: Arc<FakeProvider>,
    /// Calls made to the provider of the service added with
    /// [`HarnessBuilder::second_service`].
    pub second_calls: CallLog,
    pub vault: Arc<RecordingVault>,
    pub calls: CallLog,
}

pub struct HarnessBuilder {
    definition: ServiceDefinition,
    second: Option<ServiceDefinition>,
    is_async: bool,
    with_vault: bool,
}

impl HarnessBuilder {
    pub fn asynchronous(mut self) -> Self {
        self.is_async = true;
        self
    }

    pub fn with_vault(mut self) -> Self {
        self.with_vault = true;
        self
    }

    /// Register another service with its own fake provider.
    pub fn second_service(mut self, definition: ServiceDefinition) -> Self {
        self.second = Some(definition);
        self
    }

    pub fn definition(mut self, f: impl FnOnce(&mut ServiceDefinition)) -> Self {
        f(&mut self.definition);
        self
    }

    pub fn build(self) -> Harness {
        let calls = CallLog::default();
        let provider = Arc::new(FakeProvider::new(self.is_async, calls.clone()));
        let store = Arc::new(FlakyStore::new(calls.clone()));
        let vault = Arc::new(RecordingVault::new(calls.clone()));

        let second_calls = CallLog::default();

        let mut registry = Registry::builder()
            .register(self.definition, provider.clone() as Arc<dyn ServiceProvider>);
        if let Some(second) = self.second {
            let other = Arc::new(FakeProvider::new(self.is_async, second_calls.clone()));
            registry = registry.register(second, other as Arc<dyn ServiceProvider>);
        }
        let registry = registry.build().expect("fixture registry");
        let mut broker = ServiceBroker::new(registry, store.clone());
        if self.with_vault {
            broker = broker.with_vault(vault.clone(), "csb");
        }

        Harness {
            broker: Arc::new(broker),
            store,
            provider,
            second_calls,
            vault,
            calls,
        }
    }
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            definition: definition(),
            second: None,
            is_async: false,
            with_vault: false,
        }
    }

    pub fn sync() -> Self {
        Self::builder().build()
    }

    pub fn asynchronous() -> Self {
        Self::builder().asynchronous().build()
    }
}

// ── Request helpers ───────────────────────────────────────────────────────────

pub fn provision_details(raw_parameters: Option<&str>) -> broker_orchestrator::ProvisionDetails {
    broker_orchestrator::ProvisionDetails {
        service_id: SERVICE_ID.into(),
        plan_id: PLAN_SMALL.into(),
        organization_guid: "org-1".into(),
        space_guid: "space-1".into(),
        raw_parameters: raw_parameters.map(str::to_string),
    }
}

pub fn deprovision_details() -> DeprovisionDetails {
    DeprovisionDetails {
        service_id: SERVICE_ID.into(),
        plan_id: PLAN_SMALL.into(),
    }
}

pub fn update_details(
    plan_id: Option<&str>,
    raw_parameters: Option<&str>,
) -> broker_orchestrator::UpdateDetails {
    broker_orchestrator::UpdateDetails {
        service_id: SERVICE_ID.into(),
        plan_id: plan_id.map(str::to_string),
        raw_parameters: raw_parameters.map(str::to_string),
    }
}

pub fn bind_details(app_guid: Option<&str>, raw_parameters: Option<&str>) -> broker_orchestrator::BindDetails {
    broker_orchestrator::BindDetails {
        service_id: SERVICE_ID.into(),
        plan_id: PLAN_SMALL.into(),
        app_guid: app_guid.map(str::to_string),
        raw_parameters: raw_parameters.map(str::to_string),
    }
}

pub fn unbind_details() -> broker_orchestrator::UnbindDetails {
    broker_orchestrator::UnbindDetails {
        service_id: SERVICE_ID.into(),
        plan_id: PLAN_SMALL.into(),
    }
}

pub fn poll_details() -> broker_orchestrator::PollDetails {
    broker_orchestrator::PollDetails::default()
}

/// Provision `instance_id` with no parameters, accepting async, and clear
/// the call log.
pub async fn provisioned(h: &Harness, instance_id: &str) {
    h.broker
        .provision(instance_id, &provision_details(None), true)
        .await
        .expect("provision fixture instance");
    h.calls.clear();
}

pub fn assert_kind<T: std::fmt::Debug>(result: Result<T, BrokerError>, kind: ErrorKind) -> BrokerError {
    match result {
        Ok(value) => panic!("expected {kind} error, got Ok({value:?})"),
        Err(err) => {
            assert_eq!(err.kind(), kind, "unexpected error: {err}");
            err
        }
    }
}
