//! Safe MV builder (spec.md §4.2): per-name build locks, the aggregation
//! query generator, local sanity checks, a Parquet writer matching the
//! base lake's writer settings, and atomic staging-to-ready promotion.

pub mod builder;
pub mod locks;
pub mod promote;
pub mod query;
pub mod sanity;
pub mod spec;
pub mod writer;

pub use builder::build_mv;
pub use locks::BuildLocks;
pub use spec::BuildSpec;
