use admv_core::error::AccelError;
use datafusion::arrow::csv::WriterBuilder;
use datafusion::arrow::record_batch::RecordBatch;
use std::io::BufWriter;
use std::path::Path;
use std::time::Instant;

/// Writes a plan's result batches to `final_path` as CSV, via a sibling
/// `.tmp` file renamed into place (spec.md §4.4: "partially written files
/// are never observable"). Returns the elapsed time as `io_ms`, measured
/// separately from the plan's `compute_ms` (spec.md §4.4's memory-only
/// timing split).
pub fn write_csv_atomically(final_path: &Path, batches: &[RecordBatch]) -> Result<u64, AccelError> {
    let started = Instant::now();
    let tmp_path = final_path.with_extension("csv.tmp");

    if let Some(parent) = final_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| engine_err(e, "creating result output directory"))?;
    }

    {
        let file = std::fs::File::create(&tmp_path)
            .map_err(|e| engine_err(e, "creating staging result file"))?;
        let mut writer = WriterBuilder::new().with_header(true).build(BufWriter::new(file));
        for batch in batches {
            writer
                .write(batch)
                .map_err(|e| AccelError::Engine(anyhow::anyhow!(e).context("writing csv batch")))?;
        }
    }

    std::fs::rename(&tmp_path, final_path)
        .map_err(|e| engine_err(e, "renaming staged result into place"))?;

    Ok(started.elapsed().as_millis() as u64)
}

fn engine_err(e: std::io::Error, context: &str) -> AccelError {
    AccelError::Engine(anyhow::anyhow!(e).context(context.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::arrow::array::StringArray;
    use datafusion::arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    #[test]
    fn writes_csv_and_leaves_no_tmp_file() {
        let dir = tempfile::tempdir().unwrap();
        let final_path = dir.path().join("out.csv");
        let schema = Arc::new(Schema::new(vec![Field::new("country", DataType::Utf8, false)]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(vec!["US"]))]).unwrap();

        write_csv_atomically(&final_path, &[batch]).unwrap();

        assert!(final_path.exists());
        assert!(!final_path.with_extension("csv.tmp").exists());
    }
}
