use admv_core::time::{day_from_partition_dir, day_partition_dir};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use object_store::{path::Path, ObjectStore};
use std::sync::Arc;
use tracing::warn;

/// A day partition directory discovered under `lake/events/`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct DayPartition {
    pub day: NaiveDate,
    pub dir: String,
}

/// Lists every canonical day partition under `events/`, skipping (and
/// warning about) any directory whose name isn't `day=YYYY-MM-DD` — spec.md
/// §8: "no other partitions exist"; non-canonical entries are quarantined
/// from consideration rather than causing the listing to fail outright.
pub async fn list_day_partitions(store: Arc<dyn ObjectStore>) -> Result<Vec<DayPartition>> {
    let prefix = Path::from("events");
    let listing = store
        .list_with_delimiter(Some(&prefix))
        .await
        .with_context(|| "listing lake/events/")?;

    let mut partitions = Vec::new();
    for common_prefix in listing.common_prefixes {
        let dir_name = common_prefix
            .filename()
            .map(str::to_string)
            .unwrap_or_default();
        match day_from_partition_dir(&dir_name) {
            Some(day) => partitions.push(DayPartition {
                day,
                dir: dir_name,
            }),
            None => warn!("quarantining non-canonical lake partition {dir_name:?}"),
        }
    }
    partitions.sort();
    Ok(partitions)
}

/// Restricts a partition listing to the days implied by a date predicate
/// range (partition pruning, spec.md §4.3).
pub fn prune_to_range<'a>(
    partitions: &'a [DayPartition],
    begin: NaiveDate,
    end_inclusive: NaiveDate,
) -> Vec<&'a DayPartition> {
    partitions
        .iter()
        .filter(|p| p.day >= begin && p.day <= end_inclusive)
        .collect()
}

/// Object-store relative path of a partition's parquet directory.
pub fn partition_path(dir: &str) -> Path {
    Path::from(format!("events/{dir}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::local::LocalFileSystem;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn lists_only_canonical_partitions() {
        let root = tempdir().unwrap();
        fs::create_dir_all(root.path().join("events/day=2025-09-10")).unwrap();
        fs::create_dir_all(root.path().join("events/day=2025-09-11")).unwrap();
        fs::create_dir_all(root.path().join("events/garbage")).unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalFileSystem::new_with_prefix(root.path()).unwrap());
        let partitions = list_day_partitions(store).await.unwrap();
        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[0].dir, "day=2025-09-10");
        assert_eq!(partitions[1].dir, "day=2025-09-11");
    }

    #[test]
    fn prune_is_inclusive_on_both_ends() {
        let partitions = vec![
            DayPartition { day: NaiveDate::parse_from_str("2025-09-09", "%Y-%m-%d").unwrap(), dir: "day=2025-09-09".into() },
            DayPartition { day: NaiveDate::parse_from_str("2025-09-10", "%Y-%m-%d").unwrap(), dir: "day=2025-09-10".into() },
            DayPartition { day: NaiveDate::parse_from_str("2025-09-12", "%Y-%m-%d").unwrap(), dir: "day=2025-09-12".into() },
        ];
        let begin = NaiveDate::parse_from_str("2025-09-10", "%Y-%m-%d").unwrap();
        let end = NaiveDate::parse_from_str("2025-09-12", "%Y-%m-%d").unwrap();
        let pruned = prune_to_range(&partitions, begin, end);
        assert_eq!(pruned.len(), 2);
        assert_eq!(pruned[0].dir, "day=2025-09-10");
        assert_eq!(pruned[1].dir, "day=2025-09-12");
    }
}
