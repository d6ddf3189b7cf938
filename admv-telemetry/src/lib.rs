//! Routing telemetry and the MV correctness validator (spec.md §4.5).

pub mod compare;
pub mod record;
pub mod sink;
pub mod validator;

pub use record::TelemetryRecord;
pub use sink::{JsonlFileSink, NullSink, TelemetrySink};
pub use validator::{ValidationCase, ValidationOutcome, Validator};
