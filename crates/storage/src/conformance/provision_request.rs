use std::future::Future;

use super::TestResult;
use crate::record::ProvisionRequestRecord;
use crate::RecordStore;

pub(super) async fn run_provision_request_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    run_checks!(
        "provision_request",
        factory,
        [
            get_returns_latest_created,
            save_overwrites_latest,
            save_inserts_when_absent,
            empty_request_details_allowed,
        ]
    )
}

/// A re-provisioned instance ID appends a second request; reads see the newest.
async fn get_returns_latest_created<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create_provision_request(ProvisionRequestRecord::new("i-1", r#"{"size":1}"#))
        .await
        .map_err(|e| e.to_string())?;
    s.create_provision_request(ProvisionRequestRecord::new("i-1", r#"{"size":2}"#))
        .await
        .map_err(|e| format!("second create for same instance failed: {e}"))?;

    let got = s
        .get_provision_request("i-1")
        .await
        .map_err(|e| e.to_string())?;
    if got.request_details != r#"{"size":2}"# {
        return Err(format!(
            "expected latest request, got {}",
            got.request_details
        ));
    }
    Ok(())
}

async fn save_overwrites_latest<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create_provision_request(ProvisionRequestRecord::new("i-1", r#"{"size":1}"#))
        .await
        .map_err(|e| e.to_string())?;
    s.save_provision_request(ProvisionRequestRecord::new("i-1", r#"{"size":3}"#))
        .await
        .map_err(|e| e.to_string())?;

    let got = s
        .get_provision_request("i-1")
        .await
        .map_err(|e| e.to_string())?;
    if got.request_details != r#"{"size":3}"# {
        return Err(format!("expected overwritten request, got {}", got.request_details));
    }
    if got.updated_at.is_empty() {
        return Err("expected updated_at to be set".to_string());
    }
    Ok(())
}

async fn save_inserts_when_absent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.save_provision_request(ProvisionRequestRecord::new("i-9", "{}"))
        .await
        .map_err(|e| e.to_string())?;
    s.get_provision_request("i-9")
        .await
        .map_err(|e| format!("save did not insert: {e}"))?;
    Ok(())
}

async fn empty_request_details_allowed<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create_provision_request(ProvisionRequestRecord::new("i-1", ""))
        .await
        .map_err(|e| e.to_string())?;
    let got = s
        .get_provision_request("i-1")
        .await
        .map_err(|e| e.to_string())?;
    if !got.request_details.is_empty() {
        return Err(format!("expected empty details, got {}", got.request_details));
    }
    Ok(())
}
