use std::future::Future;

use super::{make_instance, TestResult};
use crate::record::{OperationKind, PendingOperation};
use crate::RecordStore;

pub(super) async fn run_instance_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    run_checks!(
        "instance",
        factory,
        [
            exists_is_false_for_empty_store,
            create_then_exists,
            create_then_get_round_trips_fields,
            create_sets_timestamps,
            save_overwrites_mutable_fields,
            save_can_clear_pending_operation,
            delete_removes_record,
            instances_are_independent,
            recreate_after_delete,
        ]
    )
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn exists_is_false_for_empty_store<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let exists = s.instance_exists("i-1").await.map_err(|e| e.to_string())?;
    if exists {
        return Err("expected no instance in a fresh store".to_string());
    }
    Ok(())
}

async fn create_then_exists<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create_instance(make_instance("i-1"))
        .await
        .map_err(|e| e.to_string())?;
    let exists = s.instance_exists("i-1").await.map_err(|e| e.to_string())?;
    if !exists {
        return Err("expected instance to exist after create".to_string());
    }
    Ok(())
}

/// Every caller-owned field must survive a create/get cycle unchanged.
async fn create_then_get_round_trips_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut rec = make_instance("i-1");
    rec.operation = Some(PendingOperation::new("op-7", OperationKind::Provision));
    s.create_instance(rec.clone())
        .await
        .map_err(|e| e.to_string())?;

    let got = s.get_instance("i-1").await.map_err(|e| e.to_string())?;
    if got.id != rec.id
        || got.service_id != rec.service_id
        || got.plan_id != rec.plan_id
        || got.space_guid != rec.space_guid
        || got.organization_guid != rec.organization_guid
        || got.other_details != rec.other_details
        || got.operation != rec.operation
    {
        return Err(format!("round trip mismatch: stored {rec:?}, read {got:?}"));
    }
    Ok(())
}

async fn create_sets_timestamps<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create_instance(make_instance("i-1"))
        .await
        .map_err(|e| e.to_string())?;
    let got = s.get_instance("i-1").await.map_err(|e| e.to_string())?;
    if got.created_at.is_empty() || got.updated_at.is_empty() {
        return Err(format!(
            "expected timestamps to be set, got created_at={:?} updated_at={:?}",
            got.created_at, got.updated_at
        ));
    }
    Ok(())
}

async fn save_overwrites_mutable_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create_instance(make_instance("i-1"))
        .await
        .map_err(|e| e.to_string())?;

    let mut rec = s.get_instance("i-1").await.map_err(|e| e.to_string())?;
    let created_at = rec.created_at.clone();
    rec.plan_id = "bigger-plan".to_string();
    rec.other_details = r#"{"name":"db-1","ip":"10.0.0.9"}"#.to_string();
    rec.operation = Some(PendingOperation::new("op-1", OperationKind::Deprovision));
    s.save_instance(rec).await.map_err(|e| e.to_string())?;

    let got = s.get_instance("i-1").await.map_err(|e| e.to_string())?;
    if got.plan_id != "bigger-plan" {
        return Err(format!("expected plan 'bigger-plan', got '{}'", got.plan_id));
    }
    if !got.other_details.contains("10.0.0.9") {
        return Err(format!("details not saved: {}", got.other_details));
    }
    if got.operation != Some(PendingOperation::new("op-1", OperationKind::Deprovision)) {
        return Err(format!("operation not saved: {:?}", got.operation));
    }
    if got.created_at != created_at {
        return Err("save must not change created_at".to_string());
    }
    Ok(())
}

async fn save_can_clear_pending_operation<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut rec = make_instance("i-1");
    rec.operation = Some(PendingOperation::new("op-1", OperationKind::Provision));
    s.create_instance(rec).await.map_err(|e| e.to_string())?;

    let mut rec = s.get_instance("i-1").await.map_err(|e| e.to_string())?;
    rec.operation = None;
    s.save_instance(rec).await.map_err(|e| e.to_string())?;

    let got = s.get_instance("i-1").await.map_err(|e| e.to_string())?;
    if got.operation.is_some() {
        return Err(format!("expected operation cleared, got {:?}", got.operation));
    }
    Ok(())
}

async fn delete_removes_record<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create_instance(make_instance("i-1"))
        .await
        .map_err(|e| e.to_string())?;
    s.delete_instance("i-1").await.map_err(|e| e.to_string())?;

    if s.instance_exists("i-1").await.map_err(|e| e.to_string())? {
        return Err("instance still exists after delete".to_string());
    }
    match s.get_instance("i-1").await {
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(format!("expected not-found after delete, got {e}")),
        Ok(_) => Err("get succeeded after delete".to_string()),
    }
}

async fn instances_are_independent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create_instance(make_instance("i-1"))
        .await
        .map_err(|e| e.to_string())?;
    s.create_instance(make_instance("i-2"))
        .await
        .map_err(|e| e.to_string())?;
    s.delete_instance("i-1").await.map_err(|e| e.to_string())?;

    if !s.instance_exists("i-2").await.map_err(|e| e.to_string())? {
        return Err("deleting i-1 removed i-2".to_string());
    }
    Ok(())
}

async fn recreate_after_delete<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create_instance(make_instance("i-1"))
        .await
        .map_err(|e| e.to_string())?;
    s.delete_instance("i-1").await.map_err(|e| e.to_string())?;
    s.create_instance(make_instance("i-1"))
        .await
        .map_err(|e| format!("re-create after delete failed: {e}"))?;
    Ok(())
}
