use crate::compare::compare_result_sets;
use admv_executor::PlanRunner;
use admv_planner::{plan as plan_query, PlanSource, PlannerConfig, QuerySignature};
use admv_registry::{Health, Registry, RegistrySnapshot};
use std::sync::Arc;
use tracing::{error, info};

/// A named query replayed against both the planner's normal choice and a
/// forced base scan (spec.md §4.5).
pub struct ValidationCase {
    pub query_id: String,
    pub signature: QuerySignature,
}

#[derive(Debug)]
pub struct ValidationOutcome {
    pub query_id: String,
    pub mv_name: Option<String>,
    pub passed: bool,
    pub detail: Option<String>,
}

/// Runs the correctness suite (spec.md §4.5): for every case whose normal
/// plan routes to an MV, replay against both that MV and a forced base
/// scan, compare row sets, and quarantine the MV in the registry on any
/// mismatch.
pub struct Validator<R: PlanRunner> {
    runner: Arc<R>,
    registry: Arc<Registry>,
}

impl<R: PlanRunner> Validator<R> {
    pub fn new(runner: Arc<R>, registry: Arc<Registry>) -> Self {
        Self { runner, registry }
    }

    pub async fn validate_suite(&self, cases: &[ValidationCase]) -> Vec<ValidationOutcome> {
        let snapshot = self.registry.snapshot();
        let mut outcomes = Vec::new();
        for case in cases {
            outcomes.push(self.validate_one(case, &snapshot).await);
        }
        outcomes
    }

    async fn validate_one(&self, case: &ValidationCase, snapshot: &RegistrySnapshot) -> ValidationOutcome {
        let planner_config = PlannerConfig::default();
        let chosen = plan_query(&case.signature, snapshot, &planner_config);

        let mv_name = match &chosen.source {
            PlanSource::Mv(name) => name.clone(),
            PlanSource::Base => {
                return ValidationOutcome {
                    query_id: case.query_id.clone(),
                    mv_name: None,
                    passed: true,
                    detail: None,
                };
            }
        };

        // An empty snapshot forces the planner's base-scan fallback path,
        // giving a ground-truth plan without duplicating its emission logic.
        let forced_base = plan_query(&case.signature, &RegistrySnapshot::default(), &planner_config);

        let mv_result = self.runner.run(&chosen, &case.signature.aggregates).await;
        let base_result = self.runner.run(&forced_base, &case.signature.aggregates).await;

        match (mv_result, base_result) {
            (Ok(mv_batches), Ok(base_batches)) => {
                match compare_result_sets(&mv_batches, &base_batches, &case.signature.dimensions) {
                    Ok(()) => {
                        info!(mv = %mv_name, query_id = %case.query_id, "validation passed");
                        ValidationOutcome {
                            query_id: case.query_id.clone(),
                            mv_name: Some(mv_name),
                            passed: true,
                            detail: None,
                        }
                    }
                    Err(detail) => {
                        self.quarantine(&mv_name, &detail);
                        ValidationOutcome {
                            query_id: case.query_id.clone(),
                            mv_name: Some(mv_name),
                            passed: false,
                            detail: Some(detail),
                        }
                    }
                }
            }
            (mv_result, base_result) => {
                let detail = format!(
                    "validation could not execute both plans: mv_ok={} base_ok={}",
                    mv_result.is_ok(),
                    base_result.is_ok()
                );
                ValidationOutcome {
                    query_id: case.query_id.clone(),
                    mv_name: Some(mv_name),
                    passed: false,
                    detail: Some(detail),
                }
            }
        }
    }

    fn quarantine(&self, mv_name: &str, reason: &str) {
        error!(mv = mv_name, reason, "quarantining mv after validation mismatch");
        if let Err(e) = self.registry.mark(mv_name, Health::Quarantined) {
            error!(mv = mv_name, error = %e, "failed to quarantine mv");
        }
    }
}

