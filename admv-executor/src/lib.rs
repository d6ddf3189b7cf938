//! Batch executor (spec.md §4.4): bounded batches, per-worker engine
//! sessions, a shared memory budget, superset-grouping, and memory-only
//! timing split from result I/O.

pub mod batch;
pub mod budget;
pub mod report;
pub mod result_writer;
pub mod runner;
pub mod sql;

pub use batch::{BatchExecutor, BatchItem, ExecutorConfig};
pub use report::{BatchReport, PlanResult, PlanStatus};
pub use runner::{DataFusionPlanRunner, PlanRunner};
