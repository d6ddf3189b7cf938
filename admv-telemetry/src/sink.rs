use crate::record::TelemetryRecord;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Where routing telemetry goes once a plan finishes. Mirrors the
/// teacher's `Logger` seam: callers depend on the trait, not on whether
/// records land in a file, a channel, or nowhere.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn record(&self, record: TelemetryRecord) -> Result<()>;
}

/// Appends one JSON object per line to a file, serialized under a mutex so
/// concurrent executor workers never interleave partial lines.
pub struct JsonlFileSink {
    file: Mutex<tokio::fs::File>,
}

impl JsonlFileSink {
    pub async fn open(path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| "creating telemetry directory")?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("opening telemetry sink {}", path.display()))?;
        Ok(Self { file: Mutex::new(file) })
    }
}

#[async_trait]
impl TelemetrySink for JsonlFileSink {
    async fn record(&self, record: TelemetryRecord) -> Result<()> {
        let mut line = serde_json::to_vec(&record).with_context(|| "encoding telemetry record")?;
        line.push(b'\n');
        let mut file = self.file.lock().await;
        file.write_all(&line).await.with_context(|| "appending telemetry record")
    }
}

/// Discards every record. Used by tests and by callers who don't want a
/// telemetry sink wired up at all.
#[derive(Default)]
pub struct NullSink;

#[async_trait]
impl TelemetrySink for NullSink {
    async fn record(&self, _record: TelemetryRecord) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admv_executor::{PlanResult, PlanStatus};
    use admv_planner::{MatchType, PlanSource};
    use chrono::Utc;

    #[tokio::test]
    async fn jsonl_sink_appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.jsonl");
        let sink = JsonlFileSink::open(&path).await.unwrap();

        let result = PlanResult::ok("q1", vec![], 5);
        let record = crate::record::TelemetryRecord::from_plan_result(
            "q1",
            &PlanSource::Base,
            0,
            MatchType::Base,
            &result,
            Utc::now(),
        );
        sink.record(record).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("\"query_id\":\"q1\""));
    }

    #[tokio::test]
    async fn null_sink_discards_records() {
        let sink = NullSink;
        let result = PlanResult::failed("q1", PlanStatus::EngineError, "boom".to_string(), 0);
        let record = crate::record::TelemetryRecord::from_plan_result(
            "q1",
            &PlanSource::Base,
            0,
            MatchType::Base,
            &result,
            Utc::now(),
        );
        sink.record(record).await.unwrap();
    }
}
