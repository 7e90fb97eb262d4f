use std::future::Future;

use super::{make_binding, make_instance, TestResult};
use crate::{RecordStore, StorageError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    run_checks!(
        "error",
        factory,
        [
            get_missing_instance_is_not_found,
            save_missing_instance_is_not_found,
            delete_missing_instance_is_not_found,
            duplicate_instance_is_conflict,
            duplicate_instance_keeps_original,
            get_missing_binding_is_not_found,
            delete_missing_binding_is_not_found,
            duplicate_binding_is_conflict,
            get_missing_provision_request_is_not_found,
        ]
    )
}

async fn get_missing_instance_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_instance("nope").await {
        Err(StorageError::InstanceNotFound { instance_id }) if instance_id == "nope" => Ok(()),
        Err(e) => Err(format!("expected InstanceNotFound(nope), got {e}")),
        Ok(_) => Err("expected InstanceNotFound, got Ok".to_string()),
    }
}

async fn save_missing_instance_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.save_instance(make_instance("ghost")).await {
        Err(StorageError::InstanceNotFound { .. }) => {}
        Err(e) => return Err(format!("expected InstanceNotFound, got {e}")),
        Ok(()) => return Err("save of a missing instance succeeded".to_string()),
    }
    if s.instance_exists("ghost").await.map_err(|e| e.to_string())? {
        return Err("save of a missing instance created it".to_string());
    }
    Ok(())
}

async fn delete_missing_instance_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.delete_instance("nope").await {
        Err(StorageError::InstanceNotFound { .. }) => Ok(()),
        Err(e) => Err(format!("expected InstanceNotFound, got {e}")),
        Ok(()) => Err("delete of a missing instance succeeded".to_string()),
    }
}

async fn duplicate_instance_is_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create_instance(make_instance("i-1"))
        .await
        .map_err(|e| e.to_string())?;
    match s.create_instance(make_instance("i-1")).await {
        Err(StorageError::InstanceAlreadyExists { instance_id }) if instance_id == "i-1" => Ok(()),
        Err(e) => Err(format!("expected InstanceAlreadyExists(i-1), got {e}")),
        Ok(()) => Err("duplicate create succeeded".to_string()),
    }
}

/// A rejected duplicate must not overwrite the stored record.
async fn duplicate_instance_keeps_original<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create_instance(make_instance("i-1"))
        .await
        .map_err(|e| e.to_string())?;
    let mut dup = make_instance("i-1");
    dup.plan_id = "other-plan".to_string();
    let _ = s.create_instance(dup).await;

    let got = s.get_instance("i-1").await.map_err(|e| e.to_string())?;
    if got.plan_id != "test-plan" {
        return Err(format!(
            "duplicate create overwrote plan: got '{}'",
            got.plan_id
        ));
    }
    Ok(())
}

async fn get_missing_binding_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_binding("i-1", "b-1").await {
        Err(StorageError::BindingNotFound {
            instance_id,
            binding_id,
        }) if instance_id == "i-1" && binding_id == "b-1" => Ok(()),
        Err(e) => Err(format!("expected BindingNotFound(i-1/b-1), got {e}")),
        Ok(_) => Err("expected BindingNotFound, got Ok".to_string()),
    }
}

async fn delete_missing_binding_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.delete_binding("i-1", "b-1").await {
        Err(StorageError::BindingNotFound { .. }) => Ok(()),
        Err(e) => Err(format!("expected BindingNotFound, got {e}")),
        Ok(()) => Err("delete of a missing binding succeeded".to_string()),
    }
}

async fn duplicate_binding_is_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create_instance(make_instance("i-1"))
        .await
        .map_err(|e| e.to_string())?;
    s.create_binding(make_binding("i-1", "b-1"))
        .await
        .map_err(|e| e.to_string())?;
    match s.create_binding(make_binding("i-1", "b-1")).await {
        Err(e @ StorageError::BindingAlreadyExists { .. }) => {
            if e.is_conflict() {
                Ok(())
            } else {
                Err("BindingAlreadyExists not classified as conflict".to_string())
            }
        }
        Err(e) => Err(format!("expected BindingAlreadyExists, got {e}")),
        Ok(()) => Err("duplicate binding create succeeded".to_string()),
    }
}

async fn get_missing_provision_request_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_provision_request("i-1").await {
        Err(StorageError::ProvisionRequestNotFound { .. }) => Ok(()),
        Err(e) => Err(format!("expected ProvisionRequestNotFound, got {e}")),
        Ok(_) => Err("expected ProvisionRequestNotFound, got Ok".to_string()),
    }
}
