//! Backend-agnostic checks of the [`RecordStore`] contract.
//!
//! A backend passes a factory that returns a fresh, empty store; every check
//! gets its own store. Areas covered: instance and binding CRUD,
//! provision-request history, structured error variants, and racing creates.
//!
//! ```ignore
//! #[tokio::test]
//! async fn sql_store_conforms() {
//!     let report = run_conformance_suite(|| async { SqlRecordStore::connect_test().await }).await;
//!     assert!(report.is_success(), "{report}");
//! }
//! ```

/// Run each named check against `factory` and record its outcome under
/// `category`, using the check function's name as the test name.
macro_rules! run_checks {
    ($category:literal, $factory:expr, [$($check:ident),+ $(,)?]) => {{
        vec![$(
            TestResult::from_result($category, stringify!($check), $check($factory).await),
        )+]
    }};
}

mod binding;
mod concurrent;
mod error;
mod instance;
mod provision_request;

use std::fmt;
use std::future::Future;

use crate::record::{ServiceBindingRecord, ServiceInstanceRecord};
use crate::RecordStore;

/// Outcome of one conformance check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    /// Contract area, e.g. "binding".
    pub category: &'static str,
    pub name: &'static str,
    /// Why the check failed; `None` if it passed.
    pub failure: Option<String>,
}

impl TestResult {
    fn from_result(category: &'static str, name: &'static str, result: Result<(), String>) -> Self {
        Self {
            category,
            name,
            failure: result.err(),
        }
    }

    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Every check's outcome from one suite run.
#[derive(Debug, Clone, Default)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
}

impl ConformanceReport {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    pub fn is_success(&self) -> bool {
        self.results.iter().all(TestResult::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| !r.passed())
    }
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "record store conformance: {} of {} checks failed",
            self.failed(),
            self.total()
        )?;
        for r in self.failures() {
            let reason = r.failure.as_deref().unwrap_or_default();
            writeln!(f, "  {}::{}: {}", r.category, r.name, reason)?;
        }
        Ok(())
    }
}

/// Run every check against a fresh store from `factory`.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut report = ConformanceReport::default();
    report.results.extend(instance::run_instance_tests(&factory).await);
    report.results.extend(binding::run_binding_tests(&factory).await);
    report
        .results
        .extend(provision_request::run_provision_request_tests(&factory).await);
    report.results.extend(error::run_error_tests(&factory).await);
    report.results.extend(concurrent::run_concurrent_tests(&factory).await);
    report
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

fn make_instance(id: &str) -> ServiceInstanceRecord {
    let mut rec = ServiceInstanceRecord::new(id, "test-service", "test-plan");
    rec.space_guid = "space-1".to_string();
    rec.organization_guid = "org-1".to_string();
    rec.other_details = r#"{"name":"db-1"}"#.to_string();
    rec
}

fn make_binding(instance_id: &str, binding_id: &str) -> ServiceBindingRecord {
    ServiceBindingRecord::new(
        instance_id,
        binding_id,
        "test-service",
        r#"{"username":"u","password":"p"}"#,
    )
}
