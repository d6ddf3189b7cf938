use crate::budget::MemoryBudget;
use crate::report::{BatchReport, PlanResult, PlanStatus};
use crate::runner::PlanRunner;
use admv_core::config::MAX_BATCH_SIZE;
use admv_core::error::AccelError;
use admv_planner::{AggregateRequest, Plan};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub struct ExecutorConfig {
    pub max_workers: usize,
    pub memory_limit_bytes: u64,
    pub plan_deadline: Duration,
}

impl ExecutorConfig {
    pub fn from_engine_config(config: &admv_core::EngineConfig) -> Self {
        Self {
            max_workers: config.resolved_threads(),
            memory_limit_bytes: config.memory_limit_bytes,
            plan_deadline: Duration::from_secs(30),
        }
    }
}

/// One query entering a batch: its id, the plan the planner emitted for
/// it, and the original aggregate requests (needed to render base-scan
/// SQL, which `Plan` alone doesn't carry — see `sql::plan_to_sql`).
pub struct BatchItem {
    pub query_id: String,
    pub plan: Plan,
    pub aggregates: Vec<AggregateRequest>,
}

/// Executes one query or a bounded batch (spec.md §4.4): per-worker engine
/// sessions bounded by a semaphore, a shared per-batch memory budget, and
/// superset-grouping so queries sharing an identical plan run once.
pub struct BatchExecutor<R: PlanRunner> {
    runner: Arc<R>,
    config: ExecutorConfig,
}

impl<R: PlanRunner + 'static> BatchExecutor<R> {
    pub fn new(runner: Arc<R>, config: ExecutorConfig) -> Self {
        Self { runner, config }
    }

    pub async fn execute_batch(&self, items: Vec<BatchItem>) -> Result<BatchReport, AccelError> {
        if items.len() > MAX_BATCH_SIZE {
            return Err(AccelError::Input(format!(
                "batch too large: {} queries exceeds the {MAX_BATCH_SIZE}-query limit",
                items.len()
            )));
        }

        let groups = group_by_superset(items);
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers.max(1)));
        let budget = Arc::new(MemoryBudget::new(self.config.memory_limit_bytes));
        let cancel = CancellationToken::new();

        let mut handles = Vec::new();
        for group in groups {
            let runner = self.runner.clone();
            let semaphore = semaphore.clone();
            let budget = budget.clone();
            let cancel = cancel.clone();
            let deadline = self.config.plan_deadline;
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
                run_group(runner, budget, cancel, deadline, group).await
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(group_results) => results.extend(group_results),
                Err(e) => warn!(error = %e, "batch worker task panicked"),
            }
        }
        Ok(BatchReport { results })
    }
}

async fn run_group<R: PlanRunner>(
    runner: Arc<R>,
    budget: Arc<MemoryBudget>,
    cancel: CancellationToken,
    deadline: Duration,
    group: Vec<BatchItem>,
) -> Vec<PlanResult> {
    let leader = &group[0];
    let started = Instant::now();

    // Reserve the plan's estimated footprint from source metadata *before*
    // running it (spec.md §8: "aborted before other plans start"). A group
    // that can't be estimated or doesn't fit the remaining budget fails on
    // its own; it never touches `cancel`, which would abort every other
    // group still in flight (spec.md §4.4: "other plans in the batch
    // continue").
    let footprint = match runner.estimate_bytes(&leader.plan).await {
        Ok(footprint) => footprint,
        Err(e) => {
            let compute_ms = started.elapsed().as_millis() as u64;
            return group
                .into_iter()
                .map(|item| PlanResult::failed(item.query_id, PlanStatus::EngineError, e.to_string(), compute_ms))
                .collect();
        }
    };

    if !budget.try_reserve(footprint) {
        let compute_ms = started.elapsed().as_millis() as u64;
        return group
            .into_iter()
            .map(|item| {
                PlanResult::failed(
                    item.query_id,
                    PlanStatus::Memory,
                    format!("plan needs an estimated {footprint} bytes, exceeding the remaining batch budget"),
                    compute_ms,
                )
            })
            .collect();
    }

    let outcome = tokio::select! {
        result = runner.run(&leader.plan, &leader.aggregates) => result,
        _ = tokio::time::sleep(deadline) => Err(AccelError::Timeout { elapsed_ms: deadline.as_millis() as u64 }),
        _ = cancel.cancelled() => Err(AccelError::Timeout { elapsed_ms: started.elapsed().as_millis() as u64 }),
    };

    budget.release(footprint);
    let compute_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(batches) => {
            // Every member of a superset group shares this exact result
            // set (spec.md §4.4: "the superset must reproduce each
            // member's result exactly"); only the leader paid engine time.
            group
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    let member_compute_ms = if i == 0 { compute_ms } else { 0 };
                    PlanResult::ok(item.query_id, batches.clone(), member_compute_ms)
                })
                .collect()
        }
        Err(e) => {
            let status = match &e {
                AccelError::Timeout { .. } => PlanStatus::Timeout,
                AccelError::MemoryLimitExceeded { .. } => PlanStatus::Memory,
                AccelError::SchemaDrift { .. } => PlanStatus::SchemaDrift,
                _ => PlanStatus::EngineError,
            };
            group
                .into_iter()
                .map(|item| PlanResult::failed(item.query_id, status, e.to_string(), compute_ms))
                .collect()
        }
    }
}

/// Groups batch items that share an identical plan and aggregate list
/// (spec.md §4.4's superset optimization, conservatively specialized to
/// exact duplicates rather than general supersets — see design notes).
fn group_by_superset(items: Vec<BatchItem>) -> Vec<Vec<BatchItem>> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<BatchItem>> = HashMap::new();

    for item in items {
        let key = format!("{:?}|{:?}", item.plan, item.aggregates);
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(item);
    }

    order.into_iter().map(|key| groups.remove(&key).unwrap()).collect()
}
