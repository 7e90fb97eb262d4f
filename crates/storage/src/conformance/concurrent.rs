use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinSet;

use super::{make_binding, make_instance, TestResult};
use crate::{RecordStore, StorageError};

const CONTENDERS: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    run_checks!(
        "concurrent",
        factory,
        [
            racing_instance_creates_admit_one,
            racing_binding_creates_admit_one,
            disjoint_instance_creates_all_land,
        ]
    )
}

/// Spawn `CONTENDERS` copies of `attempt` against one shared store and
/// collect each contender's index alongside its outcome.
async fn race<S, A, R>(
    store: &Arc<S>,
    attempt: A,
) -> Result<Vec<(usize, Result<(), StorageError>)>, String>
where
    S: RecordStore,
    A: Fn(Arc<S>, usize) -> R,
    R: Future<Output = Result<(), StorageError>> + Send + 'static,
{
    let mut set = JoinSet::new();
    for idx in 0..CONTENDERS {
        let fut = attempt(Arc::clone(store), idx);
        set.spawn(async move { (idx, fut.await) });
    }

    let mut outcomes = Vec::with_capacity(CONTENDERS);
    while let Some(joined) = set.join_next().await {
        outcomes.push(joined.map_err(|e| format!("contender panicked: {e}"))?);
    }
    Ok(outcomes)
}

/// Split race outcomes into the winning indices, failing on any error that
/// is not the expected conflict.
fn tally(
    outcomes: Vec<(usize, Result<(), StorageError>)>,
    is_conflict: impl Fn(&StorageError) -> bool,
) -> Result<Vec<usize>, String> {
    let mut winners = Vec::new();
    for (idx, outcome) in outcomes {
        match outcome {
            Ok(()) => winners.push(idx),
            Err(e) if is_conflict(&e) => {}
            Err(e) => return Err(format!("contender {idx} hit an unexpected error: {e}")),
        }
    }
    Ok(winners)
}

// ── Same instance id ─────────────────────────────────────────────────────────

/// The stored record must be the one written by the single winner.
async fn racing_instance_creates_admit_one<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);
    let outcomes = race(&store, |s, idx| async move {
        let mut rec = make_instance("i-contended");
        rec.plan_id = format!("plan-{idx}");
        s.create_instance(rec).await
    })
    .await?;

    let winners = tally(outcomes, |e| {
        matches!(e, StorageError::InstanceAlreadyExists { .. })
    })?;
    let [winner] = winners.as_slice() else {
        return Err(format!("{} creates succeeded, wanted exactly one", winners.len()));
    };

    let stored = store
        .get_instance("i-contended")
        .await
        .map_err(|e| format!("reading back the winner: {e}"))?;
    if stored.plan_id != format!("plan-{winner}") {
        return Err(format!(
            "contender {winner} won but the stored plan is {}",
            stored.plan_id
        ));
    }
    Ok(())
}

// ── Same (instance, binding) pair ────────────────────────────────────────────

async fn racing_binding_creates_admit_one<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);
    store
        .create_instance(make_instance("i-1"))
        .await
        .map_err(|e| format!("seeding instance: {e}"))?;

    let outcomes = race(&store, |s, _| async move {
        s.create_binding(make_binding("i-1", "b-contended")).await
    })
    .await?;

    let winners = tally(outcomes, |e| {
        matches!(e, StorageError::BindingAlreadyExists { .. })
    })?;
    match winners.len() {
        1 => Ok(()),
        n => Err(format!("{n} binding creates succeeded, wanted exactly one")),
    }
}

// ── Distinct ids ─────────────────────────────────────────────────────────────

/// Writes to different keys never report a conflict.
async fn disjoint_instance_creates_all_land<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);
    let outcomes = race(&store, |s, idx| async move {
        s.create_instance(make_instance(&format!("i-{idx}"))).await
    })
    .await?;

    let winners = tally(outcomes, |_| false)?;
    if winners.len() != CONTENDERS {
        return Err(format!(
            "only {} of {CONTENDERS} disjoint creates succeeded",
            winners.len()
        ));
    }

    for idx in 0..CONTENDERS {
        let id = format!("i-{idx}");
        let present = store
            .instance_exists(&id)
            .await
            .map_err(|e| format!("checking {id}: {e}"))?;
        if !present {
            return Err(format!("{id} is missing after its create succeeded"));
        }
    }
    Ok(())
}
