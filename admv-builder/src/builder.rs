use crate::locks::BuildLocks;
use crate::promote::{promote_atomically, MvLayout};
use crate::query::build_sql;
use crate::sanity::check_build_output;
use crate::spec::BuildSpec;
use crate::writer::write_mv_parquet;
use admv_core::error::AccelError;
use admv_registry::{schema_fingerprint, Health, MvDescriptor, Registry};
use chrono::{NaiveDate, Utc};
use datafusion::execution::context::SessionContext;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::path::Path;
use std::sync::Arc;

/// Drives one MV build end to end (spec.md §4.2): acquire the per-name
/// build lock, run the aggregation query against `events`, sanity-check
/// the output, write it to a staging directory, promote staging to ready
/// atomically, and register the result as `Healthy`. Any failure leaves
/// the registry untouched beyond the `Building` marker.
pub async fn build_mv(
    ctx: &SessionContext,
    mv_root: &Path,
    registry: &Registry,
    locks: &BuildLocks,
    spec: BuildSpec,
    source_watermark: NaiveDate,
) -> Result<Arc<MvDescriptor>, AccelError> {
    let _guard = locks.acquire(&spec.name).await;

    registry.ensure_placeholder(&spec.name, spec.grain);
    registry.mark(&spec.name, Health::Building)?;

    match run_build(ctx, mv_root, &spec, source_watermark).await {
        Ok(descriptor) => {
            registry.replace_with_transition_check(descriptor.clone())?;
            Ok(Arc::new(descriptor))
        }
        Err(e) => {
            // Leave the MV at `Building`; an operator or the next build
            // attempt decides whether to retry or quarantine. We never
            // auto-transition here since `Building -> Quarantined` could
            // hide a deeper problem if the previous `Healthy` copy was
            // silently abandoned.
            Err(e)
        }
    }
}

async fn run_build(
    ctx: &SessionContext,
    mv_root: &Path,
    spec: &BuildSpec,
    source_watermark: NaiveDate,
) -> Result<MvDescriptor, AccelError> {
    let sql = build_sql(spec);
    let dataframe = ctx
        .sql(&sql)
        .await
        .map_err(|e| AccelError::Engine(anyhow::anyhow!(e).context("planning mv build query")))?;
    let schema = Arc::new(dataframe.schema().as_arrow().clone());
    let batches = dataframe
        .collect()
        .await
        .map_err(|e| AccelError::Engine(anyhow::anyhow!(e).context("executing mv build query")))?;

    let measure_aliases: Vec<String> = spec.measures.keys().cloned().collect();
    let row_count = check_build_output(&spec.name, &batches, &spec.dimensions, &measure_aliases)?;

    let layout = MvLayout::new(mv_root, &spec.name);
    let build_id = uuid::Uuid::new_v4().to_string();
    let staging_dir = layout.staging_dir(&build_id);
    tokio::fs::create_dir_all(&staging_dir)
        .await
        .map_err(|e| AccelError::Engine(anyhow::anyhow!(e).context("creating staging directory")))?;

    let store: Arc<dyn ObjectStore> = Arc::new(
        LocalFileSystem::new_with_prefix(&staging_dir)
            .map_err(|e| AccelError::Engine(anyhow::anyhow!(e).context("opening staging store")))?,
    );
    let file_path = ObjectPath::from("part-0.parquet");
    let row_count_from_writer =
        write_mv_parquet(store.clone(), &file_path, schema, &batches).await?;
    debug_assert_eq!(row_count, row_count_from_writer);

    let byte_size = store
        .head(&file_path)
        .await
        .map_err(|e| AccelError::Engine(anyhow::anyhow!(e).context("stat-ing written mv file")))?
        .size;

    promote_atomically(&layout, &build_id).await?;

    let fingerprint = schema_fingerprint(spec.grain, &spec.dimensions, &spec.filters, &spec.measures);
    let relative_file = layout
        .ready_dir()
        .join("part-0.parquet")
        .to_string_lossy()
        .into_owned();

    let descriptor = MvDescriptor {
        name: spec.name.clone(),
        grain: spec.grain,
        dimensions: spec.dimensions.clone(),
        filters: spec.filters.clone(),
        measures: spec.measures.clone(),
        schema_fingerprint: fingerprint,
        files: vec![relative_file],
        row_count,
        byte_size: byte_size as u64,
        built_at: Utc::now(),
        source_watermark,
        health: Health::Healthy,
    };

    admv_registry::manifest::write_manifest(mv_root, &descriptor)?;
    Ok(descriptor)
}
