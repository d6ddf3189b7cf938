use crate::sql::plan_to_sql;
use admv_core::error::AccelError;
use admv_lake::scan::register_events_table;
use admv_planner::{AggregateRequest, Plan, PlanSource};
use admv_registry::MvDescriptor;
use anyhow::Context;
use async_trait::async_trait;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::datasource::listing::{ListingTable, ListingTableConfig, ListingTableUrl};
use datafusion::execution::context::SessionContext;
use futures::StreamExt;
use object_store::local::LocalFileSystem;
use object_store::ObjectStore;
use std::sync::Arc;

/// Runs one plan to completion against a dedicated, independently-owned
/// engine session (spec.md §4.2/§5: "engine sessions: strictly per-thread;
/// never transferred"). Abstracted behind a trait so the executor's
/// budgeting and grouping logic can be tested without a real engine.
#[async_trait]
pub trait PlanRunner: Send + Sync {
    async fn run(
        &self,
        plan: &Plan,
        aggregates: &[AggregateRequest],
    ) -> Result<Vec<RecordBatch>, AccelError>;

    /// Estimates `plan`'s output footprint in bytes from source metadata
    /// alone (row count x average row width for an MV, total file size for
    /// a base scan) without materializing any rows. The executor reserves
    /// this amount from the batch's memory budget before calling `run`
    /// (spec.md §8: "aborted before other plans start").
    async fn estimate_bytes(&self, plan: &Plan) -> Result<u64, AccelError>;
}

/// The production runner: builds a fresh `SessionContext` per call,
/// registers the base `events` table and, for MV plans, the MV's own
/// ready-directory parquet files, then runs the SQL `plan_to_sql` emits.
pub struct DataFusionPlanRunner {
    lake_root: String,
    mv_root: std::path::PathBuf,
}

impl DataFusionPlanRunner {
    pub fn new(lake_root: impl Into<String>, mv_root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            lake_root: lake_root.into(),
            mv_root: mv_root.into(),
        }
    }

    async fn register_mv_table(
        &self,
        ctx: &SessionContext,
        mv: &MvDescriptor,
    ) -> anyhow::Result<String> {
        let table_name = format!("mv_{}", mv.name);
        let mv_dir = self.mv_root.join(&mv.name).join("ready");
        let store: Arc<dyn ObjectStore> = Arc::new(
            LocalFileSystem::new_with_prefix(&mv_dir)
                .with_context(|| format!("opening mv ready dir {mv_dir:?}"))?,
        );
        let object_store_url = datafusion::execution::object_store::ObjectStoreUrl::parse(
            format!("admv-mv://{}/", mv.name),
        )?;
        ctx.register_object_store(object_store_url.as_ref(), store);

        let table_url = ListingTableUrl::parse(format!("admv-mv://{}/", mv.name))
            .with_context(|| "parsing mv table url")?;
        let options = lake_listing_options_for_mv();
        let config = ListingTableConfig::new(table_url)
            .with_listing_options(options)
            .infer_schema(&ctx.state())
            .await
            .with_context(|| "inferring mv schema")?;
        let table = ListingTable::try_new(config).with_context(|| "building mv ListingTable")?;
        ctx.register_table(&table_name, Arc::new(table))
            .with_context(|| "registering mv table")?;
        Ok(table_name)
    }
}

/// MVs are never Hive-partitioned: one ready directory holds a flat set of
/// parquet files for the whole materialized view.
fn lake_listing_options_for_mv() -> datafusion::datasource::listing::ListingOptions {
    datafusion::datasource::listing::ListingOptions::new(Arc::new(
        datafusion::datasource::file_format::parquet::ParquetFormat::default(),
    ))
    .with_file_extension(".parquet")
}

#[async_trait]
impl PlanRunner for DataFusionPlanRunner {
    async fn run(
        &self,
        plan: &Plan,
        aggregates: &[AggregateRequest],
    ) -> Result<Vec<RecordBatch>, AccelError> {
        let ctx = SessionContext::new();
        let object_store = admv_lake::scan::local_object_store(&self.lake_root)
            .map_err(|e| AccelError::Engine(e))?;
        register_events_table(&ctx, object_store)
            .await
            .map_err(|e| AccelError::Engine(e))?;

        let table_name = match &plan.source {
            PlanSource::Base => "events".to_string(),
            PlanSource::Mv(name) => {
                let manifest_path = admv_registry::manifest::manifest_path(&self.mv_root, name);
                let descriptor = admv_registry::manifest::read_manifest(&manifest_path)
                    .map_err(AccelError::Engine)?;
                self.register_mv_table(&ctx, &descriptor)
                    .await
                    .map_err(AccelError::Engine)?
            }
        };

        let sql = plan_to_sql(plan, aggregates, &table_name);
        let dataframe = ctx
            .sql(&sql)
            .await
            .map_err(|e| AccelError::Engine(anyhow::anyhow!(e).context("planning query")))?;
        dataframe
            .collect()
            .await
            .map_err(|e| AccelError::Engine(anyhow::anyhow!(e).context("executing query")))
    }

    async fn estimate_bytes(&self, plan: &Plan) -> Result<u64, AccelError> {
        match &plan.source {
            PlanSource::Mv(name) => {
                let manifest_path = admv_registry::manifest::manifest_path(&self.mv_root, name);
                let descriptor = admv_registry::manifest::read_manifest(&manifest_path).map_err(AccelError::Engine)?;
                Ok(descriptor.byte_size)
            }
            PlanSource::Base => {
                let store = admv_lake::scan::local_object_store(&self.lake_root).map_err(AccelError::Engine)?;
                let prefix = object_store::path::Path::from("events");
                let mut listing = store.list(Some(&prefix));
                let mut total = 0u64;
                while let Some(meta) = listing.next().await {
                    let meta = meta.map_err(|e| AccelError::Engine(anyhow::anyhow!(e).context("listing lake for budget estimate")))?;
                    total += meta.size as u64;
                }
                Ok(total)
            }
        }
    }
}
