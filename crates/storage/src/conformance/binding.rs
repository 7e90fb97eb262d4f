use std::future::Future;

use super::{make_binding, make_instance, TestResult};
use crate::RecordStore;

pub(super) async fn run_binding_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    run_checks!(
        "binding",
        factory,
        [
            create_then_get_round_trips_fields,
            exists_uses_composite_key,
            same_binding_id_on_different_instances,
            delete_removes_only_target,
        ]
    )
}

async fn create_then_get_round_trips_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create_instance(make_instance("i-1"))
        .await
        .map_err(|e| e.to_string())?;
    let rec = make_binding("i-1", "b-1");
    s.create_binding(rec.clone())
        .await
        .map_err(|e| e.to_string())?;

    let got = s.get_binding("i-1", "b-1").await.map_err(|e| e.to_string())?;
    if got.instance_id != rec.instance_id
        || got.binding_id != rec.binding_id
        || got.service_id != rec.service_id
        || got.other_details != rec.other_details
    {
        return Err(format!("round trip mismatch: stored {rec:?}, read {got:?}"));
    }
    if got.created_at.is_empty() {
        return Err("expected created_at to be set".to_string());
    }
    Ok(())
}

async fn exists_uses_composite_key<S, F, Fut>(factory: &F) -> Result<(), String>
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

    let hit = s
        .binding_exists("i-1", "b-1")
        .await
        .map_err(|e| e.to_string())?;
    let wrong_binding = s
        .binding_exists("i-1", "b-2")
        .await
        .map_err(|e| e.to_string())?;
    let wrong_instance = s
        .binding_exists("i-2", "b-1")
        .await
        .map_err(|e| e.to_string())?;

    if !hit || wrong_binding || wrong_instance {
        return Err(format!(
            "exists results: (i-1,b-1)={hit} (i-1,b-2)={wrong_binding} (i-2,b-1)={wrong_instance}"
        ));
    }
    Ok(())
}

/// Binding IDs are only unique within an instance.
async fn same_binding_id_on_different_instances<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for id in ["i-1", "i-2"] {
        s.create_instance(make_instance(id))
            .await
            .map_err(|e| e.to_string())?;
        s.create_binding(make_binding(id, "b-1"))
            .await
            .map_err(|e| format!("create binding on {id}: {e}"))?;
    }
    Ok(())
}

async fn delete_removes_only_target<S, F, Fut>(factory: &F) -> Result<(), String>
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
    s.create_binding(make_binding("i-1", "b-2"))
        .await
        .map_err(|e| e.to_string())?;

    s.delete_binding("i-1", "b-1")
        .await
        .map_err(|e| e.to_string())?;

    if s.binding_exists("i-1", "b-1")
        .await
        .map_err(|e| e.to_string())?
    {
        return Err("b-1 still exists after delete".to_string());
    }
    if !s
        .binding_exists("i-1", "b-2")
        .await
        .map_err(|e| e.to_string())?
    {
        return Err("deleting b-1 removed b-2".to_string());
    }
    Ok(())
}
