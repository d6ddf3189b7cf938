use anyhow::{Context, Result};
use datafusion::arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use datafusion::datasource::file_format::parquet::ParquetFormat;
use datafusion::datasource::listing::{
    ListingOptions, ListingTable, ListingTableConfig, ListingTableUrl,
};
use datafusion::execution::context::SessionContext;
use object_store::local::LocalFileSystem;
use object_store::ObjectStore;
use std::sync::Arc;

/// Non-partition columns of an event row (spec.md §3). `day` is carried as
/// a Hive partition column (`day=YYYY-MM-DD` directories), not as a file
/// column, so it is excluded here and reinstated by DataFusion's listing
/// table as a dictionary-free `Utf8` partition column.
pub fn event_file_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(
            "timestamp",
            DataType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into())),
            false,
        ),
        Field::new("hour", DataType::UInt32, false),
        Field::new("minute", DataType::UInt32, false),
        Field::new("country", DataType::Utf8, false),
        Field::new("advertiser_id", DataType::Int64, false),
        Field::new("publisher_id", DataType::Int64, false),
        Field::new("user_id", DataType::Int64, false),
        Field::new("type", DataType::Utf8, false),
        Field::new("bid_price", DataType::Float64, false),
        Field::new("total_price", DataType::Float64, true),
    ]))
}

/// Builds a local-filesystem `ObjectStore` rooted at `lake_root`.
pub fn local_object_store(lake_root: &str) -> Result<Arc<dyn ObjectStore>> {
    Ok(Arc::new(
        LocalFileSystem::new_with_prefix(lake_root)
            .with_context(|| format!("opening lake root {lake_root:?}"))?,
    ))
}

/// The listing options used for both the base `events` table and any
/// partition-pruned subset of it: Parquet files, Hive-style `day=`
/// partitioning, inexact pushdown left to the executor (spec.md §4.3).
fn lake_listing_options() -> ListingOptions {
    ListingOptions::new(Arc::new(ParquetFormat::default()))
        .with_table_partition_cols(vec![("day".to_string(), DataType::Utf8)])
        .with_file_extension(".parquet")
}

/// Registers the full `events` table (every day partition) in `ctx`.
/// `object_store` must already be rooted at `lake_root` (see
/// [`local_object_store`]); the table then covers `lake_root/events/`.
/// DataFusion prunes files by `day` from predicates on the partition
/// column; this is the scan primitive spec.md §2 calls out as an external
/// collaborator.
pub async fn register_events_table(
    ctx: &SessionContext,
    object_store: Arc<dyn ObjectStore>,
) -> Result<()> {
    let object_store_url =
        datafusion::execution::object_store::ObjectStoreUrl::parse("admv-lake://events/")?;
    ctx.register_object_store(object_store_url.as_ref(), object_store);

    let table_url = ListingTableUrl::parse("admv-lake://events/events/")
        .with_context(|| "parsing lake table url")?;

    let options = lake_listing_options();
    let mut config = ListingTableConfig::new(table_url).with_listing_options(options);
    config = config
        .with_schema(event_file_schema())
        .infer_schema(&ctx.state())
        .await
        .with_context(|| "inferring lake schema")?;
    let table = ListingTable::try_new(config).with_context(|| "building events ListingTable")?;
    ctx.register_table("events", Arc::new(table))
        .with_context(|| "registering events table")?;
    Ok(())
}
