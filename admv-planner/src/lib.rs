//! Deterministic query planner (spec.md §4.3): scores every healthy MV
//! against a query signature and emits an exact, partial (reaggregated),
//! base-scan, or sampled plan. Pure and synchronous — no I/O, no await.

pub mod plan;
pub mod planner;
pub mod scoring;
pub mod signature;

pub use plan::{Combiner, MatchType, Plan, PlanSource, ReaggregationRule};
pub use planner::{plan, PlannerConfig};
pub use signature::{AggregateRequest, OrderBy, QuerySignature, SortDirection};
