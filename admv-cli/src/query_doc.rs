use admv_core::model::{AggFunc, Grain, Op, Predicate, Value};
use admv_core::time::TimeRange;
use admv_planner::{AggregateRequest, OrderBy, QuerySignature, SortDirection};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::path::Path;

/// The declarative query wire format of spec.md §6. Deserialized through
/// raw `serde_json::Value` rather than the internal `admv_core::model`
/// types directly: the wire shape (`col`/`val` keys, bare strings vs.
/// `{AGG: column}` maps in `select`) doesn't line up with the typed model
/// field-for-field.
#[derive(Deserialize)]
struct QueryDoc {
    #[serde(default)]
    #[allow(dead_code)]
    from: Option<String>,
    select: Vec<JsonValue>,
    #[serde(rename = "where", default)]
    where_clauses: Vec<WhereDoc>,
    #[serde(default)]
    group_by: Vec<String>,
    #[serde(default)]
    order_by: Vec<OrderByDoc>,
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct WhereDoc {
    col: String,
    op: String,
    val: JsonValue,
}

#[derive(Deserialize)]
struct OrderByDoc {
    col: String,
    dir: String,
}

/// Parses one query document from a file on disk.
pub fn parse_query_file(path: &Path) -> Result<(QuerySignature, Vec<AggregateRequest>)> {
    let bytes = std::fs::read(path).with_context(|| format!("reading query file {}", path.display()))?;
    let doc: JsonValue = serde_json::from_slice(&bytes).with_context(|| "parsing query json")?;
    parse_query_value(doc)
}

/// Parses one query document already loaded as a JSON value, e.g. one line
/// of a batch/validation suite's JSONL.
pub fn parse_query_value(doc: JsonValue) -> Result<(QuerySignature, Vec<AggregateRequest>)> {
    let doc: QueryDoc = serde_json::from_value(doc).with_context(|| "parsing query json")?;

    let mut select_dimensions = Vec::new();
    let mut aggregates = Vec::new();
    for item in &doc.select {
        match item {
            JsonValue::String(dim) => select_dimensions.push(dim.clone()),
            JsonValue::Object(map) => {
                let (func_str, column) = map
                    .iter()
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("empty aggregate entry in select"))?;
                let func = parse_agg_func(func_str)?;
                let column = column
                    .as_str()
                    .ok_or_else(|| anyhow::anyhow!("aggregate column must be a string"))?;
                let (column, alias) = if column == "*" {
                    (None, format!("{}_star", func_str.to_lowercase()))
                } else {
                    (Some(column.to_string()), format!("{}_{}", func_str.to_lowercase(), column))
                };
                aggregates.push(AggregateRequest::new(func, column, alias));
            }
            other => bail!("unsupported select entry: {other}"),
        }
    }

    let mut filters = Vec::new();
    let mut time_range = None;
    for clause in &doc.where_clauses {
        let predicate = parse_predicate(clause)?;
        if predicate.column == "day" {
            if let Some(range) = time_range_from_day_predicate(&predicate) {
                time_range = Some(range);
            }
        }
        filters.push(predicate);
    }

    let order_by = doc
        .order_by
        .iter()
        .map(|o| {
            let direction = match o.dir.to_lowercase().as_str() {
                "asc" => SortDirection::Asc,
                "desc" => SortDirection::Desc,
                other => bail!("unknown order direction {other:?}"),
            };
            Ok(OrderBy { column: o.col.clone(), direction })
        })
        .collect::<Result<Vec<_>>>()?;

    let dimensions = if doc.group_by.is_empty() { select_dimensions } else { doc.group_by };
    let time_grain = time_grain_from_dimensions(&dimensions);

    let signature = QuerySignature {
        dimensions,
        time_grain,
        filters,
        aggregates: aggregates.clone(),
        order_by,
        limit: doc.limit,
        time_range,
        approximate_ok: false,
    };
    Ok((signature, aggregates))
}

/// Derives the query's required time grain from the columns it groups by,
/// finest wins (a query grouping by `minute` necessarily also groups by its
/// `hour` and `day`, so only the finest column is informative). `None`
/// means the query has no time dimension at all, i.e. `Grain::AllTime`.
fn time_grain_from_dimensions(dimensions: &[String]) -> Option<Grain> {
    if dimensions.iter().any(|d| d == "minute") {
        Some(Grain::Minute)
    } else if dimensions.iter().any(|d| d == "hour") {
        Some(Grain::Hour)
    } else if dimensions.iter().any(|d| d == "day") {
        Some(Grain::Day)
    } else if dimensions.iter().any(|d| d == "week") {
        Some(Grain::Week)
    } else {
        None
    }
}

fn parse_agg_func(s: &str) -> Result<AggFunc> {
    match s.to_uppercase().as_str() {
        "SUM" => Ok(AggFunc::Sum),
        "COUNT" => Ok(AggFunc::Count),
        "AVG" => Ok(AggFunc::Avg),
        "MIN" => Ok(AggFunc::Min),
        "MAX" => Ok(AggFunc::Max),
        other => bail!("unknown aggregate function {other:?}"),
    }
}

fn parse_op(s: &str) -> Result<Op> {
    match s {
        "eq" => Ok(Op::Eq),
        "neq" => Ok(Op::Neq),
        "lt" => Ok(Op::Lt),
        "lte" => Ok(Op::Lte),
        "gt" => Ok(Op::Gt),
        "gte" => Ok(Op::Gte),
        "between" => Ok(Op::Between),
        "in" => Ok(Op::In),
        other => bail!("unknown comparison op {other:?}"),
    }
}

fn parse_scalar(v: &JsonValue) -> Result<Value> {
    match v {
        JsonValue::String(s) => Ok(Value::Str(s.clone())),
        JsonValue::Number(n) if n.is_i64() => Ok(Value::Int(n.as_i64().unwrap())),
        JsonValue::Number(n) => Ok(Value::Float(
            n.as_f64().ok_or_else(|| anyhow::anyhow!("non-finite number literal"))?,
        )),
        other => bail!("unsupported scalar value {other}"),
    }
}

fn parse_predicate(clause: &WhereDoc) -> Result<Predicate> {
    let op = parse_op(&clause.op)?;
    let value = match (op, &clause.val) {
        (Op::Between, JsonValue::Array(items)) if items.len() == 2 => {
            Value::Pair(Box::new(parse_scalar(&items[0])?), Box::new(parse_scalar(&items[1])?))
        }
        (Op::In, JsonValue::Array(items)) => {
            Value::List(items.iter().map(parse_scalar).collect::<Result<Vec<_>>>()?)
        }
        (Op::Between, other) => bail!("between requires a two-element array, got {other}"),
        (Op::In, other) => bail!("in requires an array, got {other}"),
        (_, scalar) => parse_scalar(scalar)?,
    };
    Ok(Predicate::new(clause.col.clone(), op, value))
}

/// Narrows a `day BETWEEN a AND b` where-clause into the half-open
/// `TimeRange` the planner's base-scan bonus and partition pruning use.
/// `BETWEEN` is inclusive at both ends (spec.md §8), so the range extends
/// one day past `b` to cover it in full.
fn time_range_from_day_predicate(predicate: &Predicate) -> Option<TimeRange> {
    if predicate.op != Op::Between {
        return None;
    }
    let Value::Pair(a, b) = &predicate.value else {
        return None;
    };
    let (Value::Str(start), Value::Str(end)) = (a.as_ref(), b.as_ref()) else {
        return None;
    };
    let start = NaiveDate::parse_from_str(start, "%Y-%m-%d").ok()?;
    let end = NaiveDate::parse_from_str(end, "%Y-%m-%d").ok()?;
    let begin: DateTime<Utc> = start.and_hms_opt(0, 0, 0)?.and_utc();
    let end_exclusive: DateTime<Utc> = (end + chrono::Duration::days(1)).and_hms_opt(0, 0, 0)?.and_utc();
    Some(TimeRange::new(begin, end_exclusive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dimensions_and_aggregate_select_items() {
        let doc = serde_json::json!({
            "from": "events",
            "select": ["country", {"SUM": "bid_price"}],
            "where": [
                {"col": "type", "op": "eq", "val": "impression"},
                {"col": "day", "op": "between", "val": ["2025-09-10", "2025-09-12"]}
            ],
            "group_by": ["country"],
            "order_by": [{"col": "country", "dir": "asc"}]
        });

        let (signature, aggregates) = parse_query_value(doc).unwrap();
        assert_eq!(signature.dimensions, vec!["country".to_string()]);
        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates[0].alias, "sum_bid_price");
        assert_eq!(signature.filters.len(), 2);
        assert!(signature.time_range.is_some());
        assert!(signature.has_narrow_time_range());
    }

    #[test]
    fn count_star_gets_no_column() {
        let doc = serde_json::json!({
            "from": "events",
            "select": ["country", {"COUNT": "*"}]
        });
        let (_, aggregates) = parse_query_value(doc).unwrap();
        assert_eq!(aggregates[0].column, None);
        assert_eq!(aggregates[0].alias, "count_star");
    }

    #[test]
    fn grouping_by_day_derives_a_day_grain() {
        let doc = serde_json::json!({
            "from": "events",
            "select": [{"SUM": "bid_price"}],
            "group_by": ["day", "country"]
        });
        let (signature, _) = parse_query_value(doc).unwrap();
        assert_eq!(signature.time_grain, Some(Grain::Day));
    }

    #[test]
    fn grouping_by_minute_wins_over_coarser_time_columns() {
        let doc = serde_json::json!({
            "from": "events",
            "select": [{"SUM": "bid_price"}],
            "group_by": ["day", "hour", "minute"]
        });
        let (signature, _) = parse_query_value(doc).unwrap();
        assert_eq!(signature.time_grain, Some(Grain::Minute));
    }

    #[test]
    fn no_time_column_leaves_grain_unset() {
        let doc = serde_json::json!({
            "from": "events",
            "select": [{"SUM": "bid_price"}],
            "group_by": ["country"]
        });
        let (signature, _) = parse_query_value(doc).unwrap();
        assert_eq!(signature.time_grain, None);
    }

    #[test]
    fn in_op_builds_a_value_list() {
        let doc = serde_json::json!({
            "from": "events",
            "select": ["country"],
            "where": [{"col": "country", "op": "in", "val": ["US", "FR", "JP"]}]
        });
        let (signature, _) = parse_query_value(doc).unwrap();
        match &signature.filters[0].value {
            Value::List(items) => assert_eq!(items.len(), 3),
            other => panic!("expected a list value, got {other:?}"),
        }
    }
}
