//! Provision, update and deprovision against a scripted provider.

mod common;

use broker_orchestrator::{
    BrokerError, ErrorKind, OperationOutcome, OperationResponse, OperationState, ProviderError,
};
use broker_storage::{OperationKind, RecordStore};
use common::*;
use serde_json::json;

// ──────────────────────────────────────────────
// Provision
// ──────────────────────────────────────────────

#[tokio::test]
async fn sync_provision_records_instance_and_request() {
    let h = Harness::sync();
    let params = r#"{"backups":true}"#;

    let response = h
        .broker
        .provision("i-1", &provision_details(Some(params)), false)
        .await
        .unwrap();
    assert_eq!(response, OperationResponse::completed());

    let record = h.store.get_instance("i-1").await.unwrap();
    assert_eq!(record.service_id, SERVICE_ID);
    assert_eq!(record.plan_id, PLAN_SMALL);
    assert_eq!(record.space_guid, "space-1");
    assert_eq!(record.organization_guid, "org-1");
    assert!(record.operation.is_none());
    let details = record.details().unwrap();
    assert_eq!(details["host"], "10.0.0.1");
    assert_eq!(details["tier"], "small");

    let request = h.store.get_provision_request("i-1").await.unwrap();
    assert_eq!(request.request_details, params);
}

#[tokio::test]
async fn second_provision_conflicts_without_calling_provider() {
    let h = Harness::sync();
    provisioned(&h, "i-1").await;

    let err = assert_kind(
        h.broker
            .provision("i-1", &provision_details(Some(r#"{"region":"eu"}"#)), true)
            .await,
        ErrorKind::Conflict,
    );
    assert!(matches!(err, BrokerError::InstanceAlreadyExists { .. }));
    assert!(h.calls.matching("provider.").is_empty());
    assert_eq!(h.store.inner.instance_count().await, 1);
}

#[tokio::test]
async fn async_provider_rejects_caller_without_async_support() {
    let h = Harness::asynchronous();

    assert_kind(
        h.broker.provision("i-1", &provision_details(None), false).await,
        ErrorKind::AsyncRequired,
    );
    assert!(h.calls.calls().is_empty(), "{:?}", h.calls.calls());
    assert_eq!(h.store.inner.instance_count().await, 0);
}

#[tokio::test]
async fn async_provision_returns_token_and_records_pending_operation() {
    let h = Harness::asynchronous();

    let response = h
        .broker
        .provision("i-1", &provision_details(None), true)
        .await
        .unwrap();
    assert_eq!(response, OperationResponse::pending("op-provision"));

    let record = h.store.get_instance("i-1").await.unwrap();
    let op = record.operation.expect("pending operation");
    assert_eq!(op.id, "op-provision");
    assert_eq!(op.kind, OperationKind::Provision);
}

#[tokio::test]
async fn empty_and_null_parameters_are_accepted() {
    let h = Harness::sync();
    for (i, raw) in [None, Some(""), Some("   "), Some("null"), Some("{}"), Some(r#"{"region":"eu"}"#)]
        .into_iter()
        .enumerate()
    {
        let id = format!("i-{i}");
        h.broker
            .provision(&id, &provision_details(raw), false)
            .await
            .unwrap_or_else(|e| panic!("{raw:?} rejected: {e}"));
    }
    assert_eq!(h.store.inner.instance_count().await, 6);
}

#[tokio::test]
async fn malformed_parameters_fail_validation_before_provider() {
    let h = Harness::sync();

    let err = assert_kind(
        h.broker
            .provision("i-1", &provision_details(Some("{not json")), false)
            .await,
        ErrorKind::Validation,
    );
    assert!(matches!(err, BrokerError::InvalidParameters { .. }));
    assert!(h.calls.calls().is_empty());
}

#[tokio::test]
async fn schema_violation_fails_validation_before_provider() {
    let h = Harness::sync();

    let err = assert_kind(
        h.broker
            .provision("i-1", &provision_details(Some(r#"{"backups":"daily"}"#)), false)
            .await,
        ErrorKind::Validation,
    );
    assert!(matches!(err, BrokerError::SchemaViolation { .. }));
    assert!(h.calls.calls().is_empty());
}

#[tokio::test]
async fn non_object_parameters_fail_validation() {
    let h = Harness::sync();
    assert_kind(
        h.broker
            .provision("i-1", &provision_details(Some("[1,2]")), false)
            .await,
        ErrorKind::Validation,
    );
    assert!(h.calls.calls().is_empty());
}

#[tokio::test]
async fn unknown_service_or_plan_is_not_found() {
    let h = Harness::sync();

    let mut details = provision_details(None);
    details.service_id = "svc-unknown".into();
    let err = assert_kind(h.broker.provision("i-1", &details, true).await, ErrorKind::NotFound);
    assert!(matches!(err, BrokerError::ServiceNotFound { .. }));

    let mut details = provision_details(None);
    details.plan_id = "plan-unknown".into();
    let err = assert_kind(h.broker.provision("i-1", &details, true).await, ErrorKind::NotFound);
    assert!(matches!(err, BrokerError::PlanNotFound { .. }));
    assert!(h.calls.calls().is_empty());
}

#[tokio::test]
async fn provider_failure_propagates_and_writes_nothing() {
    let h = Harness::sync();
    h.provider
        .queue_provision(Err(ProviderError::Failed("quota exceeded".into())));

    let err = assert_kind(
        h.broker.provision("i-1", &provision_details(None), false).await,
        ErrorKind::Provider,
    );
    assert_eq!(err.to_string(), "quota exceeded");
    assert!(h.calls.matching("store.").is_empty());
}

#[tokio::test]
async fn record_write_failure_after_provider_is_an_orphaned_resource() {
    let h = Harness::sync();
    h.store.fail("create_instance");

    let err = assert_kind(
        h.broker.provision("i-1", &provision_details(None), false).await,
        ErrorKind::OrphanedExternalResource,
    );
    let msg = err.to_string();
    assert!(msg.contains("WARNING"), "{msg}");
    assert!(msg.contains("connection refused"), "{msg}");
    assert_eq!(h.calls.count("provider.provision"), 1);
}

#[tokio::test]
async fn request_write_failure_is_an_orphaned_resource() {
    let h = Harness::sync();
    h.store.fail("create_provision_request");

    assert_kind(
        h.broker.provision("i-1", &provision_details(None), false).await,
        ErrorKind::OrphanedExternalResource,
    );
    // The instance itself was recorded and can still be deprovisioned.
    assert!(h.store.instance_exists("i-1").await.unwrap());
}

#[tokio::test]
async fn existence_check_failure_is_a_persistence_error() {
    let h = Harness::sync();
    h.store.fail("instance_exists");

    assert_kind(
        h.broker.provision("i-1", &provision_details(None), false).await,
        ErrorKind::Persistence,
    );
    assert!(h.calls.calls().is_empty());
}

// ──────────────────────────────────────────────
// Deprovision
// ──────────────────────────────────────────────

#[tokio::test]
async fn sync_deprovision_deletes_record() {
    let h = Harness::sync();
    provisioned(&h, "i-1").await;

    let response = h
        .broker
        .deprovision("i-1", &deprovision_details(), false)
        .await
        .unwrap();
    assert!(!response.is_async);
    assert!(!h.store.instance_exists("i-1").await.unwrap());
    assert_eq!(
        h.calls.calls(),
        vec!["provider.deprovision", "store.delete_instance"]
    );
}

#[tokio::test]
async fn async_deprovision_keeps_record_with_pending_operation() {
    let h = Harness::asynchronous();
    provisioned(&h, "i-1").await;

    let response = h
        .broker
        .deprovision("i-1", &deprovision_details(), true)
        .await
        .unwrap();
    assert_eq!(response, OperationResponse::pending("op-deprovision"));

    let record = h.store.get_instance("i-1").await.unwrap();
    let op = record.operation.expect("pending deprovision");
    assert_eq!(op.kind, OperationKind::Deprovision);
    assert_eq!(op.id, "op-deprovision");
}

#[tokio::test]
async fn deprovision_unknown_instance_is_not_found() {
    let h = Harness::sync();
    let err = assert_kind(
        h.broker.deprovision("i-404", &deprovision_details(), true).await,
        ErrorKind::NotFound,
    );
    assert!(matches!(err, BrokerError::InstanceNotFound { .. }));
}

#[tokio::test]
async fn async_deprovision_requires_async_support() {
    let h = Harness::asynchronous();
    provisioned(&h, "i-1").await;

    assert_kind(
        h.broker.deprovision("i-1", &deprovision_details(), false).await,
        ErrorKind::AsyncRequired,
    );
    assert!(h.calls.calls().is_empty());
    assert!(h.store.instance_exists("i-1").await.unwrap());
}

#[tokio::test]
async fn deprovision_provider_failure_keeps_record() {
    let h = Harness::sync();
    provisioned(&h, "i-1").await;
    h.provider.queue_deprovision(Err(ProviderError::Upstream {
        status: 409,
        message: "instance has deletion protection".into(),
    }));

    assert_kind(
        h.broker.deprovision("i-1", &deprovision_details(), false).await,
        ErrorKind::Provider,
    );
    assert!(h.store.instance_exists("i-1").await.unwrap());
}

#[tokio::test]
async fn deprovision_delete_failure_is_an_orphaned_resource() {
    let h = Harness::sync();
    provisioned(&h, "i-1").await;
    h.store.fail("delete_instance");

    assert_kind(
        h.broker.deprovision("i-1", &deprovision_details(), false).await,
        ErrorKind::OrphanedExternalResource,
    );
}

// ──────────────────────────────────────────────
// Update
// ──────────────────────────────────────────────

#[tokio::test]
async fn update_changes_plan_and_overwrites_request() {
    let h = Harness::sync();
    provisioned(&h, "i-1").await;

    let response = h
        .broker
        .update(
            "i-1",
            &update_details(Some(PLAN_LARGE), Some(r#"{"backups":false}"#)),
            false,
        )
        .await
        .unwrap();
    assert!(!response.is_async);

    let record = h.store.get_instance("i-1").await.unwrap();
    assert_eq!(record.plan_id, PLAN_LARGE);
    assert!(record.operation.is_none());

    let history = h.store.inner.provision_request_history("i-1").await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].request_details, r#"{"backups":false}"#);
}

#[tokio::test]
async fn update_without_plan_keeps_current_plan() {
    let h = Harness::sync();
    provisioned(&h, "i-1").await;

    h.broker
        .update("i-1", &update_details(None, Some(r#"{"backups":true}"#)), false)
        .await
        .unwrap();
    assert_eq!(h.store.get_instance("i-1").await.unwrap().plan_id, PLAN_SMALL);
}

#[tokio::test]
async fn prohibited_plan_change_does_not_call_provider() {
    let h = Harness::builder()
        .definition(|d| d.plan_updateable = false)
        .build();
    provisioned(&h, "i-1").await;

    let err = assert_kind(
        h.broker
            .update("i-1", &update_details(Some(PLAN_LARGE), None), false)
            .await,
        ErrorKind::ProhibitedUpdate,
    );
    assert!(err.to_string().contains("plan_id"), "{err}");
    assert!(h.calls.calls().is_empty());
    assert_eq!(h.store.get_instance("i-1").await.unwrap().plan_id, PLAN_SMALL);
}

#[tokio::test]
async fn non_updatable_parameter_is_prohibited() {
    let h = Harness::sync();
    provisioned(&h, "i-1").await;

    let err = assert_kind(
        h.broker
            .update("i-1", &update_details(None, Some(r#"{"region":"asia"}"#)), false)
            .await,
        ErrorKind::ProhibitedUpdate,
    );
    assert!(err.to_string().contains("region"), "{err}");
    assert!(h.calls.calls().is_empty());
}

#[tokio::test]
async fn update_unknown_instance_is_not_found() {
    let h = Harness::sync();
    assert_kind(
        h.broker.update("i-404", &update_details(None, None), false).await,
        ErrorKind::NotFound,
    );
}

#[tokio::test]
async fn update_with_malformed_parameters_fails_validation() {
    let h = Harness::sync();
    provisioned(&h, "i-1").await;
    assert_kind(
        h.broker
            .update("i-1", &update_details(None, Some("{oops")), false)
            .await,
        ErrorKind::Validation,
    );
    assert!(h.calls.calls().is_empty());
}

#[tokio::test]
async fn async_update_requires_async_support() {
    let h = Harness::asynchronous();
    provisioned(&h, "i-1").await;
    assert_kind(
        h.broker
            .update("i-1", &update_details(Some(PLAN_LARGE), None), false)
            .await,
        ErrorKind::AsyncRequired,
    );
    assert!(h.calls.calls().is_empty());
}

#[tokio::test]
async fn async_update_records_pending_update() {
    let h = Harness::asynchronous();
    provisioned(&h, "i-1").await;
    h.broker.last_operation("i-1", &poll_details()).await.unwrap();
    h.provider
        .queue_update(Ok(OperationOutcome::pending("op-resize", ())));

    let response = h
        .broker
        .update("i-1", &update_details(Some(PLAN_LARGE), None), true)
        .await
        .unwrap();
    assert_eq!(response, OperationResponse::pending("op-resize"));

    let record = h.store.get_instance("i-1").await.unwrap();
    assert_eq!(record.plan_id, PLAN_LARGE);
    let op = record.operation.unwrap();
    assert_eq!(op.kind, OperationKind::Update);
    assert_eq!(op.id, "op-resize");
}

#[tokio::test]
async fn update_save_failure_is_an_orphaned_resource() {
    let h = Harness::sync();
    provisioned(&h, "i-1").await;
    h.store.fail("save_instance");

    assert_kind(
        h.broker
            .update("i-1", &update_details(Some(PLAN_LARGE), None), false)
            .await,
        ErrorKind::OrphanedExternalResource,
    );
    assert_eq!(h.calls.count("provider.update"), 1);
}

// ──────────────────────────────────────────────
// Interleaving with outstanding operations
// ──────────────────────────────────────────────

#[tokio::test]
async fn update_during_pending_deprovision_is_refused() {
    let h = Harness::asynchronous();
    provisioned(&h, "i-1").await;
    h.broker.last_operation("i-1", &poll_details()).await.unwrap();
    h.broker
        .deprovision("i-1", &deprovision_details(), true)
        .await
        .unwrap();
    h.calls.clear();
    h.provider.queue_update(Ok(OperationOutcome::Completed(())));

    let err = assert_kind(
        h.broker
            .update("i-1", &update_details(Some(PLAN_LARGE), None), true)
            .await,
        ErrorKind::Conflict,
    );
    assert!(matches!(
        err,
        BrokerError::OperationInProgress {
            operation: OperationKind::Deprovision,
            ..
        }
    ));
    assert!(h.calls.calls().is_empty(), "{:?}", h.calls.calls());

    let record = h.store.get_instance("i-1").await.unwrap();
    assert_eq!(record.plan_id, PLAN_SMALL);
    let op = record.operation.expect("deprovision still outstanding");
    assert_eq!(op.kind, OperationKind::Deprovision);
    assert_eq!(op.id, "op-deprovision");

    // The poller still owns the deletion.
    let op = h.broker.last_operation("i-1", &poll_details()).await.unwrap();
    assert_eq!(op.state, OperationState::Succeeded);
    assert_eq!(h.calls.count("provider.poll_instance"), 1);
    assert!(!h.store.instance_exists("i-1").await.unwrap());
}

#[tokio::test]
async fn update_during_pending_provision_is_refused() {
    let h = Harness::asynchronous();
    provisioned(&h, "i-1").await;

    let err = assert_kind(
        h.broker
            .update("i-1", &update_details(None, Some(r#"{"backups":true}"#)), true)
            .await,
        ErrorKind::Conflict,
    );
    assert!(matches!(
        err,
        BrokerError::OperationInProgress {
            operation: OperationKind::Provision,
            ..
        }
    ));
    assert_eq!(h.calls.count("provider.update"), 0);
    assert_eq!(
        h.store.get_instance("i-1").await.unwrap().operation.unwrap().kind,
        OperationKind::Provision
    );
}

#[tokio::test]
async fn second_deprovision_while_pending_is_refused() {
    let h = Harness::asynchronous();
    provisioned(&h, "i-1").await;
    h.broker
        .deprovision("i-1", &deprovision_details(), true)
        .await
        .unwrap();

    let err = assert_kind(
        h.broker.deprovision("i-1", &deprovision_details(), true).await,
        ErrorKind::Conflict,
    );
    assert!(matches!(err, BrokerError::OperationInProgress { .. }));
    assert_eq!(h.calls.count("provider.deprovision"), 1);
    let op = h.store.get_instance("i-1").await.unwrap().operation.unwrap();
    assert_eq!(op.id, "op-deprovision");
}

// ──────────────────────────────────────────────
// Catalog and unsupported endpoints
// ──────────────────────────────────────────────

#[tokio::test]
async fn services_lists_enabled_catalog() {
    let h = Harness::sync();
    let services = h.broker.services();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].name, SERVICE_NAME);
    assert_eq!(
        services[0].plans.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
        vec![PLAN_SMALL, PLAN_LARGE]
    );

    let hidden = Harness::builder().definition(|d| d.enabled = false).build();
    assert!(hidden.broker.services().is_empty());
}

#[tokio::test]
async fn disabled_service_still_manages_existing_instances() {
    let h = Harness::builder().definition(|d| d.enabled = false).build();
    provisioned(&h, "i-1").await;
    h.broker
        .deprovision("i-1", &deprovision_details(), false)
        .await
        .unwrap();
}

#[tokio::test]
async fn fetch_endpoints_are_unsupported() {
    let h = Harness::sync();
    provisioned(&h, "i-1").await;

    assert_kind(h.broker.get_instance("i-1").await, ErrorKind::Unsupported);
    assert_kind(h.broker.get_binding("i-1", "b-1").await, ErrorKind::Unsupported);
    assert_kind(
        h.broker.last_binding_operation("i-1", "b-1").await,
        ErrorKind::AsyncRequired,
    );
    assert_eq!(json!(h.calls.calls()), json!([]));
}
