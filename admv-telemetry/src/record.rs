use admv_executor::PlanStatus;
use admv_planner::{MatchType, PlanSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn match_type_str(m: MatchType) -> &'static str {
    match m {
        MatchType::Exact => "exact",
        MatchType::Partial => "partial",
        MatchType::Base => "base",
        MatchType::Sampled => "sampled",
    }
}

/// One routing decision's telemetry (spec.md §4.5): recorded for every
/// plan the executor runs, independent of whether it succeeded.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub recorded_at: DateTime<Utc>,
    pub query_id: String,
    pub source: String,
    pub score: i32,
    pub match_type: String,
    pub compute_ms: u64,
    pub io_ms: u64,
    pub rows_produced: u64,
    pub status: String,
    pub error: Option<String>,
}

impl TelemetryRecord {
    pub fn from_plan_result(
        query_id: &str,
        source: &PlanSource,
        score: i32,
        match_type: MatchType,
        result: &admv_executor::PlanResult,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        let source_label = match source {
            PlanSource::Mv(name) => name.clone(),
            PlanSource::Base => "base".to_string(),
        };
        Self {
            recorded_at,
            query_id: query_id.to_string(),
            source: source_label,
            score,
            match_type: match_type_str(match_type).to_string(),
            compute_ms: result.compute_ms,
            io_ms: result.io_ms,
            rows_produced: result.rows_produced,
            status: plan_status_str(result.status).to_string(),
            error: result.error.clone(),
        }
    }
}

fn plan_status_str(status: PlanStatus) -> &'static str {
    status.as_str()
}
