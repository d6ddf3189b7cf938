use crate::error::AccelError;
use clap::Args;

/// Default batch size limit enforced by the executor (spec.md §4.4).
pub const MAX_BATCH_SIZE: usize = 20;

/// Policy deciding when a `Healthy` MV should transition to `Stale`
/// (Design Note §9: "the source does not precisely specify when an MV
/// becomes STALE").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StalePolicy {
    /// Any new `day` partition observed past the MV's `source_watermark`
    /// marks it stale. The only policy implemented; the enum exists so a
    /// future policy doesn't require changing every call site.
    #[default]
    AnyNewPartition,
}

impl StalePolicy {
    pub fn is_stale(&self, source_watermark: chrono::NaiveDate, max_observed_day: chrono::NaiveDate) -> bool {
        match self {
            StalePolicy::AnyNewPartition => max_observed_day > source_watermark,
        }
    }
}

/// Environment knobs enumerated in spec.md §6. Flattened into the `admv`
/// binary's top-level `clap` command; library code never reads the
/// environment directly, mirroring how `telemetry-admin-cli` centralizes
/// its flags.
#[derive(Args, Clone, Debug)]
pub struct EngineConfig {
    /// Number of executor worker threads; defaults to the physical core count.
    #[arg(long, env = "ADMV_THREADS")]
    pub threads: Option<usize>,

    /// Per-batch memory budget, in bytes. Default: 4 GiB.
    #[arg(long, env = "ADMV_MEMORY_LIMIT_BYTES", default_value_t = 4 * 1024 * 1024 * 1024)]
    pub memory_limit_bytes: u64,

    /// Maximum number of queries accepted in a single batch submission.
    #[arg(long, env = "ADMV_BATCH_SIZE_LIMIT", default_value_t = MAX_BATCH_SIZE)]
    pub batch_size_limit: usize,

    /// Sampling rate used for approximate sampled base scans, 0 < r <= 1.
    #[arg(long, env = "ADMV_SAMPLING_RATE", default_value_t = 0.10)]
    pub sampling_rate: f64,

    /// Fixed to UTC; validated at startup, `FatalError` otherwise.
    #[arg(long, env = "ADMV_TIME_ZONE", default_value = "UTC")]
    pub time_zone: String,

    /// Root directory of the lake (`lake/events/day=YYYY-MM-DD/*.parquet`).
    #[arg(long, env = "ADMV_LAKE_ROOT", default_value = "lake")]
    pub lake_root: String,

    /// Root directory of the MV store (`mvs/<name>/{staging,ready,retired}`).
    #[arg(long, env = "ADMV_MV_ROOT", default_value = "mvs")]
    pub mv_root: String,
}

impl EngineConfig {
    pub fn resolved_threads(&self) -> usize {
        self.threads
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4))
    }

    /// Validates invariants that must hold before the engine is allowed to
    /// start (spec.md §7's `FatalError`).
    pub fn validate(&self) -> Result<(), AccelError> {
        if self.time_zone != "UTC" {
            return Err(AccelError::Fatal(format!(
                "time_zone must be UTC, got {:?}",
                self.time_zone
            )));
        }
        if self.batch_size_limit > MAX_BATCH_SIZE {
            return Err(AccelError::Fatal(format!(
                "batch_size_limit {} exceeds the hard cap of {MAX_BATCH_SIZE}",
                self.batch_size_limit
            )));
        }
        if !(0.0 < self.sampling_rate && self.sampling_rate <= 1.0) {
            return Err(AccelError::Fatal(format!(
                "sampling_rate must be in (0, 1], got {}",
                self.sampling_rate
            )));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: None,
            memory_limit_bytes: 4 * 1024 * 1024 * 1024,
            batch_size_limit: MAX_BATCH_SIZE,
            sampling_rate: 0.10,
            time_zone: "UTC".to_string(),
            lake_root: "lake".to_string(),
            mv_root: "mvs".to_string(),
        }
    }
}
