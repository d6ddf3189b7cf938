//! Thin CLI harness wiring the lake, registry, builder, planner, executor
//! and telemetry crates together. No output formatting beyond what the
//! libraries already produce: each command prints one line per unit of
//! work and relies on the CSV/JSONL files the libraries write for detail.

mod build_doc;
mod query_doc;

use admv_builder::{build_mv, BuildLocks};
use admv_core::EngineConfig;
use admv_executor::{result_writer, BatchExecutor, BatchItem, DataFusionPlanRunner, ExecutorConfig, PlanRunner, PlanResult, PlanStatus};
use admv_lake::scan::{local_object_store, register_events_table};
use admv_planner::{plan as plan_query, PlannerConfig};
use admv_registry::{manifest, Registry};
use admv_telemetry::{record::TelemetryRecord, JsonlFileSink, NullSink, TelemetrySink, ValidationCase, Validator};
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use datafusion::execution::context::SessionContext;
use serde_json::Value as JsonValue;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "admv", about = "ad-events query acceleration engine")]
struct Cli {
    #[command(flatten)]
    engine: EngineConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// (Re)build one materialized view from a build-spec JSON file.
    Build {
        spec: PathBuf,
        /// Latest `day` partition covered by the build's input (spec.md §4.1's `source_watermark`).
        #[arg(long)]
        watermark: NaiveDate,
    },
    /// Plan and run a single query from a query JSON file, writing the
    /// result as CSV.
    Query {
        query: PathBuf,
        out: PathBuf,
        #[arg(long, default_value = "q1")]
        query_id: String,
        #[arg(long)]
        telemetry: Option<PathBuf>,
    },
    /// Plan and run a bounded batch of queries from a JSONL file (one
    /// `{"query_id": ..., ...query doc}` object per line), writing one CSV
    /// per query into `out_dir`.
    Batch {
        queries: PathBuf,
        out_dir: PathBuf,
        #[arg(long)]
        telemetry: Option<PathBuf>,
    },
    /// Replay a JSONL suite of queries through both their chosen plan and a
    /// forced base scan, quarantining any MV whose results diverge.
    Validate { cases: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Cli::parse();
    args.engine.validate().map_err(|e| anyhow::anyhow!(e))?;

    let registry = Arc::new(Registry::from_descriptors(manifest::discover_manifests(Path::new(
        &args.engine.mv_root,
    ))));

    match args.command {
        Commands::Build { spec, watermark } => run_build(&args.engine, &registry, &spec, watermark).await?,
        Commands::Query { query, out, query_id, telemetry } => {
            run_query(&args.engine, &registry, &query, &out, &query_id, telemetry.as_deref()).await?
        }
        Commands::Batch { queries, out_dir, telemetry } => {
            run_batch(&args.engine, &registry, &queries, &out_dir, telemetry.as_deref()).await?
        }
        Commands::Validate { cases } => run_validate(&args.engine, registry.clone(), &cases).await?,
    }

    Ok(())
}

async fn run_build(config: &EngineConfig, registry: &Registry, spec_path: &Path, watermark: NaiveDate) -> Result<()> {
    let spec = build_doc::parse_build_file(spec_path)?;

    let ctx = SessionContext::new();
    let object_store = local_object_store(&config.lake_root)?;
    register_events_table(&ctx, object_store).await?;

    let locks = BuildLocks::new();
    let descriptor = build_mv(&ctx, Path::new(&config.mv_root), registry, &locks, spec, watermark)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    println!(
        "built {} ({} rows, {} bytes, health {:?})",
        descriptor.name, descriptor.row_count, descriptor.byte_size, descriptor.health
    );
    Ok(())
}

async fn open_sink(path: Option<&Path>) -> Result<Box<dyn TelemetrySink>> {
    match path {
        Some(p) => Ok(Box::new(JsonlFileSink::open(p).await?)),
        None => Ok(Box::new(NullSink)),
    }
}

async fn run_query(
    config: &EngineConfig,
    registry: &Registry,
    query_path: &Path,
    out_path: &Path,
    query_id: &str,
    telemetry_path: Option<&Path>,
) -> Result<()> {
    let (signature, aggregates) = query_doc::parse_query_file(query_path)?;
    let snapshot = registry.snapshot();
    let planner_config = PlannerConfig { sampling_rate: config.sampling_rate, ..PlannerConfig::default() };
    let chosen = plan_query(&signature, &snapshot, &planner_config);

    let runner = DataFusionPlanRunner::new(config.lake_root.clone(), PathBuf::from(&config.mv_root));
    let started = std::time::Instant::now();
    let result = runner.run(&chosen, &aggregates).await;
    let compute_ms = started.elapsed().as_millis() as u64;

    let sink = open_sink(telemetry_path).await?;

    match result {
        Ok(batches) => {
            let io_ms = result_writer::write_csv_atomically(out_path, &batches).map_err(|e| anyhow::anyhow!(e))?;
            let mut plan_result = PlanResult::ok(query_id, batches, compute_ms);
            plan_result.io_ms = io_ms;
            let record = TelemetryRecord::from_plan_result(
                query_id,
                &chosen.source,
                chosen.score,
                chosen.match_type,
                &plan_result,
                Utc::now(),
            );
            sink.record(record).await?;
            println!("{query_id}: {} rows -> {}", plan_result.rows_produced, out_path.display());
            Ok(())
        }
        Err(e) => {
            let plan_result = PlanResult::failed(query_id, PlanStatus::EngineError, e.to_string(), compute_ms);
            let record = TelemetryRecord::from_plan_result(
                query_id,
                &chosen.source,
                chosen.score,
                chosen.match_type,
                &plan_result,
                Utc::now(),
            );
            sink.record(record).await?;
            anyhow::bail!("query {query_id} failed: {e}")
        }
    }
}

fn read_jsonl(path: &Path) -> Result<Vec<JsonValue>> {
    let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = std::io::BufReader::new(file);
    let mut docs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        docs.push(serde_json::from_str(line).with_context(|| format!("parsing jsonl line: {line}"))?);
    }
    Ok(docs)
}

fn take_query_id(doc: &mut JsonValue) -> Result<String> {
    let obj = doc.as_object_mut().ok_or_else(|| anyhow::anyhow!("batch/validation entry must be a JSON object"))?;
    let id = obj
        .remove("query_id")
        .ok_or_else(|| anyhow::anyhow!("missing query_id"))?;
    id.as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("query_id must be a string"))
}

async fn run_batch(
    config: &EngineConfig,
    registry: &Registry,
    queries_path: &Path,
    out_dir: &Path,
    telemetry_path: Option<&Path>,
) -> Result<()> {
    std::fs::create_dir_all(out_dir).with_context(|| "creating batch output directory")?;

    let snapshot = registry.snapshot();
    let planner_config = PlannerConfig { sampling_rate: config.sampling_rate, ..PlannerConfig::default() };

    let mut items = Vec::new();
    let mut aggregates_by_id = std::collections::HashMap::new();
    for mut doc in read_jsonl(queries_path)? {
        let query_id = take_query_id(&mut doc)?;
        let (signature, aggregates) = query_doc::parse_query_value(doc)?;
        let plan = plan_query(&signature, &snapshot, &planner_config);
        aggregates_by_id.insert(query_id.clone(), (plan.source.clone(), plan.score, plan.match_type));
        items.push(BatchItem { query_id, plan, aggregates });
    }

    let runner = Arc::new(DataFusionPlanRunner::new(config.lake_root.clone(), PathBuf::from(&config.mv_root)));
    let executor = BatchExecutor::new(runner, ExecutorConfig::from_engine_config(config));
    let report = executor.execute_batch(items).await.map_err(|e| anyhow::anyhow!(e))?;

    let sink = open_sink(telemetry_path).await?;
    let mut ok_count = 0usize;
    let mut failed_count = 0usize;
    for result in report.results {
        let (source, score, match_type) = aggregates_by_id
            .get(&result.query_id)
            .cloned()
            .unwrap_or((admv_planner::PlanSource::Base, 0, admv_planner::MatchType::Base));

        if result.status == PlanStatus::Ok {
            ok_count += 1;
            let out_path = out_dir.join(format!("{}.csv", result.query_id));
            result_writer::write_csv_atomically(&out_path, &result.batches).map_err(|e| anyhow::anyhow!(e))?;
        } else {
            failed_count += 1;
        }

        let record = TelemetryRecord::from_plan_result(&result.query_id, &source, score, match_type, &result, Utc::now());
        sink.record(record).await?;
    }

    println!("batch complete: {ok_count} ok, {failed_count} failed");
    Ok(())
}

async fn run_validate(config: &EngineConfig, registry: Arc<Registry>, cases_path: &Path) -> Result<()> {
    let runner = Arc::new(DataFusionPlanRunner::new(config.lake_root.clone(), PathBuf::from(&config.mv_root)));
    let validator = Validator::new(runner, registry);

    let mut cases = Vec::new();
    for mut doc in read_jsonl(cases_path)? {
        let query_id = take_query_id(&mut doc)?;
        let (signature, _aggregates) = query_doc::parse_query_value(doc)?;
        cases.push(ValidationCase { query_id, signature });
    }

    let outcomes = validator.validate_suite(&cases).await;
    let mut passed = 0usize;
    let mut failed = 0usize;
    for outcome in &outcomes {
        if outcome.passed {
            passed += 1;
        } else {
            failed += 1;
            eprintln!(
                "FAIL {} against {:?}: {}",
                outcome.query_id,
                outcome.mv_name,
                outcome.detail.as_deref().unwrap_or("no detail")
            );
        }
    }
    println!("validation complete: {passed} passed, {failed} failed");
    Ok(())
}
