//! The partitioned lake collaborator (spec.md §2.1): the event data model,
//! canonical day-partition enumeration, and the DataFusion scan primitive
//! the planner's base-scan plans ultimately run against.

pub mod event;
pub mod partition;
pub mod scan;

pub use event::{Event, EventType};
pub use partition::{list_day_partitions, prune_to_range, DayPartition};
