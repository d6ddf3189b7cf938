use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};

/// Half-open time range `[begin, end)`, mirrored from the teacher's own
/// `TimeRange` (micromegas `analytics::time::TimeRange`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeRange {
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(begin: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { begin, end }
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.begin < other.end && other.begin < self.end
    }
}

/// Canonical day-partition directory format, e.g. `day=2025-09-10`.
pub const DAY_PARTITION_PREFIX: &str = "day=";

/// Parses a canonical `YYYY-MM-DD` string into a `NaiveDate`, rejecting any
/// other representation (spec.md §3's "all partitions use the canonical
/// date format" invariant).
pub fn parse_canonical_day(s: &str) -> Result<NaiveDate> {
    if s.len() != 10 {
        bail!("not a canonical YYYY-MM-DD date: {s:?}");
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("parsing day {s:?}"))
}

/// Formats a date as the canonical `day=YYYY-MM-DD` partition directory name.
pub fn day_partition_dir(day: NaiveDate) -> String {
    format!("{DAY_PARTITION_PREFIX}{}", day.format("%Y-%m-%d"))
}

/// Extracts the `NaiveDate` out of a `day=YYYY-MM-DD` partition directory
/// name, or `None` if the name isn't in canonical form.
pub fn day_from_partition_dir(dir_name: &str) -> Option<NaiveDate> {
    let day_str = dir_name.strip_prefix(DAY_PARTITION_PREFIX)?;
    parse_canonical_day(day_str).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_day_round_trips() {
        let day = parse_canonical_day("2025-09-10").unwrap();
        assert_eq!(day_partition_dir(day), "day=2025-09-10");
        assert_eq!(day_from_partition_dir("day=2025-09-10"), Some(day));
    }

    #[test]
    fn rejects_non_canonical_day() {
        assert!(parse_canonical_day("2025/09/10").is_err());
        assert!(parse_canonical_day("Sept-10-2025").is_err());
        assert_eq!(day_from_partition_dir("day=09-10-2025"), None);
        assert_eq!(day_from_partition_dir("not_a_partition"), None);
    }

    #[test]
    fn time_range_overlap() {
        let a = TimeRange::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            DateTime::parse_from_rfc3339("2025-01-02T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        );
        let b = TimeRange::new(
            DateTime::parse_from_rfc3339("2025-01-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            DateTime::parse_from_rfc3339("2025-01-03T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        );
        assert!(a.overlaps(&b));
        let c = TimeRange::new(
            DateTime::parse_from_rfc3339("2025-01-02T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            DateTime::parse_from_rfc3339("2025-01-03T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        );
        assert!(!a.overlaps(&c));
    }
}
