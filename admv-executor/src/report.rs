use datafusion::arrow::record_batch::RecordBatch;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanStatus {
    Ok,
    Memory,
    Timeout,
    EngineError,
    SchemaDrift,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Ok => "OK",
            PlanStatus::Memory => "MEMORY",
            PlanStatus::Timeout => "TIMEOUT",
            PlanStatus::EngineError => "ENGINE_ERROR",
            PlanStatus::SchemaDrift => "SCHEMA_DRIFT",
        }
    }
}

/// One plan's outcome within a batch (spec.md §4.4/§4.5). `compute_ms`
/// covers only in-engine execution up to result materialization in memory;
/// `io_ms` covers everything after, i.e. writing results out.
#[derive(Debug)]
pub struct PlanResult {
    pub query_id: String,
    pub status: PlanStatus,
    pub rows_produced: u64,
    pub compute_ms: u64,
    pub io_ms: u64,
    pub error: Option<String>,
    pub batches: Vec<RecordBatch>,
}

impl PlanResult {
    pub fn ok(query_id: impl Into<String>, batches: Vec<RecordBatch>, compute_ms: u64) -> Self {
        let rows_produced = batches.iter().map(|b| b.num_rows() as u64).sum();
        Self {
            query_id: query_id.into(),
            status: PlanStatus::Ok,
            rows_produced,
            compute_ms,
            io_ms: 0,
            error: None,
            batches,
        }
    }

    pub fn failed(query_id: impl Into<String>, status: PlanStatus, error: String, compute_ms: u64) -> Self {
        Self {
            query_id: query_id.into(),
            status,
            rows_produced: 0,
            compute_ms,
            io_ms: 0,
            error: Some(error),
            batches: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<PlanResult>,
}
