use thiserror::Error;

/// Error taxonomy shared by the planner, builder, executor and validator.
///
/// `PlanNoCandidate` is deliberately absent: the planner never raises it
/// externally, it only drives an automatic fallback to a base scan.
#[derive(Debug, Error)]
pub enum AccelError {
    #[error("malformed query: {0}")]
    Input(String),

    #[error("schema drift building {mv_name}: {reason}")]
    SchemaDrift { mv_name: String, reason: String },

    #[error("plan exceeded the memory budget ({used} > {limit} bytes)")]
    MemoryLimitExceeded { used: u64, limit: u64 },

    #[error("plan exceeded its deadline after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("columnar engine error: {0}")]
    Engine(#[source] anyhow::Error),

    #[error("integrity check failed for {mv_name}: {reason}")]
    Integrity { mv_name: String, reason: String },

    #[error("fatal error, refusing to start: {0}")]
    Fatal(String),
}

impl AccelError {
    /// The `error_kind` string surfaced on every query record (spec.md §7).
    pub fn kind(&self) -> &'static str {
        match self {
            AccelError::Input(_) => "InputError",
            AccelError::SchemaDrift { .. } => "SchemaDriftError",
            AccelError::MemoryLimitExceeded { .. } => "MemoryLimitExceeded",
            AccelError::Timeout { .. } => "Timeout",
            AccelError::Engine(_) => "EngineError",
            AccelError::Integrity { .. } => "IntegrityError",
            AccelError::Fatal(_) => "FatalError",
        }
    }
}

pub type Result<T> = std::result::Result<T, AccelError>;
