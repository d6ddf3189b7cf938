use admv_core::error::AccelError;
use anyhow::Context;
use datafusion::arrow::datatypes::SchemaRef;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::parquet::arrow::AsyncArrowWriter;
use datafusion::parquet::basic::Compression;
use datafusion::parquet::file::properties::{WriterProperties, WriterVersion};
use object_store::buffered::BufWriter;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::sync::Arc;

/// Writes one MV build's batches to a single Parquet file under the given
/// object store, using the same writer version and compression codec as
/// the base lake's own partition writer (PARQUET_2_0 / LZ4_RAW).
pub async fn write_mv_parquet(
    store: Arc<dyn ObjectStore>,
    path: &ObjectPath,
    schema: SchemaRef,
    batches: &[RecordBatch],
) -> Result<u64, AccelError> {
    let object_store_writer = BufWriter::new(store, path.clone());
    let props = WriterProperties::builder()
        .set_writer_version(WriterVersion::PARQUET_2_0)
        .set_compression(Compression::LZ4_RAW)
        .build();

    let mut arrow_writer = AsyncArrowWriter::try_new(object_store_writer, schema, Some(props))
        .map_err(|e| AccelError::Engine(anyhow::anyhow!(e).context("opening mv parquet writer")))?;

    for batch in batches {
        arrow_writer
            .write(batch)
            .await
            .map_err(|e| AccelError::Engine(anyhow::anyhow!(e).context("writing mv batch")))?;
    }

    let meta = arrow_writer
        .close()
        .await
        .map_err(|e| AccelError::Engine(anyhow::anyhow!(e).context("closing mv parquet writer")))?;

    u64::try_from(meta.file_metadata().num_rows())
        .context("parquet row count")
        .map_err(|e| AccelError::Engine(e))
}
