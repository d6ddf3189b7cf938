use crate::signature::QuerySignature;
use admv_registry::MvDescriptor;

pub const GRAIN_MATCH: i32 = 30;
pub const GRAIN_COVERAGE: i32 = 20;
pub const DIMENSION_EXACT: i32 = 30;
pub const DIMENSION_SUPERSET: i32 = 20;
pub const FILTER_COMPATIBLE: i32 = 15;
pub const MEASURES_AVAILABLE: i32 = 20;
pub const NARROW_RANGE_BASE_BONUS: i32 = 25;

/// Whether every aggregate the query requests can be computed from `mv`'s
/// stored measures, honoring the `avg = sum/count` rule (spec.md §4.3: "an
/// MV that stores only `avg(x)` at a finer grain is ineligible").
fn measures_satisfied(mv: &MvDescriptor, query: &QuerySignature) -> bool {
    use admv_core::model::AggFunc;

    query.aggregates.iter().all(|agg| match agg.func {
        AggFunc::Avg => {
            mv.has_measure(AggFunc::Sum, agg.column.as_deref(), agg.filter.as_ref())
                && mv.has_measure(AggFunc::Count, agg.column.as_deref(), agg.filter.as_ref())
        }
        other => mv.has_measure(other, agg.column.as_deref(), agg.filter.as_ref()),
    })
}

/// Whether every top-level query filter can be honored by `mv`: either the
/// filtered column survives as one of the MV's dimensions or as one of its
/// grain's own time-bucket columns (`day`, `hour`, ...) — so it becomes a
/// residual filter on the aggregated output — or the MV was itself built
/// with an equivalent filter (so the rows the query would exclude were
/// never aggregated in).
fn filters_satisfied(mv: &MvDescriptor, query: &QuerySignature) -> bool {
    query.filters.iter().all(|f| {
        mv.dimensions.iter().any(|d| d == &f.column)
            || mv.grain.time_columns().contains(&f.column.as_str())
            || mv.filters.iter().any(|mv_f| mv_f.implies(f))
    })
}

/// Scores one healthy MV against a query signature (spec.md §4.3's table).
/// Returns `None` when the candidate must be eliminated outright: it
/// cannot supply the requested grain, dimensions, filters, or measures at
/// all, regardless of score.
pub fn score_candidate(mv: &MvDescriptor, query: &QuerySignature) -> Option<i32> {
    let required_grain = query.required_grain();
    let grain_score = if mv.grain == required_grain {
        GRAIN_MATCH
    } else if mv.grain.is_finer_than(required_grain) {
        GRAIN_COVERAGE
    } else {
        return None;
    };

    let dims_exact = mv.dimensions_equal(&query.dimensions);
    let dims_superset = mv.dimensions_are_superset_of(&query.dimensions);
    let dimension_score = if dims_exact {
        DIMENSION_EXACT
    } else if dims_superset {
        DIMENSION_SUPERSET
    } else {
        return None;
    };

    if !filters_satisfied(mv, query) {
        return None;
    }
    let filter_score = FILTER_COMPATIBLE;

    if !measures_satisfied(mv, query) {
        return None;
    }
    let measures_score = MEASURES_AVAILABLE;

    Some(grain_score + dimension_score + filter_score + measures_score)
}

/// Whether the winning MV can answer the query without any regrouping:
/// exact grain and exact dimensions, nothing to reaggregate.
pub fn is_exact_match(mv: &MvDescriptor, query: &QuerySignature) -> bool {
    mv.grain == query.required_grain() && mv.dimensions_equal(&query.dimensions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::AggregateRequest;
    use admv_core::model::{AggFunc, Grain};
    use admv_registry::{Health, MeasureRule};
    use chrono::{NaiveDate, Utc};
    use std::collections::BTreeMap;

    fn mv(grain: Grain, dimensions: Vec<&str>, measures: BTreeMap<String, MeasureRule>) -> MvDescriptor {
        MvDescriptor {
            name: "mv".to_string(),
            grain,
            dimensions: dimensions.into_iter().map(String::from).collect(),
            filters: vec![],
            measures,
            schema_fingerprint: 1,
            files: vec![],
            row_count: 100,
            byte_size: 1000,
            built_at: Utc::now(),
            source_watermark: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            health: Health::Healthy,
        }
    }

    fn query(dims: Vec<&str>, grain: Grain, aggs: Vec<AggregateRequest>) -> QuerySignature {
        QuerySignature {
            dimensions: dims.into_iter().map(String::from).collect(),
            time_grain: Some(grain),
            aggregates: aggs,
            ..Default::default()
        }
    }

    #[test]
    fn exact_match_sums_every_scoring_component() {
        let mut measures = BTreeMap::new();
        measures.insert("sum_bid".to_string(), MeasureRule::plain(AggFunc::Sum, "bid_price"));
        let candidate = mv(Grain::Day, vec!["country"], measures);
        let q = query(
            vec!["country"],
            Grain::Day,
            vec![AggregateRequest::new(AggFunc::Sum, Some("bid_price".into()), "sum_bid")],
        );
        assert_eq!(score_candidate(&candidate, &q), Some(95));
        assert!(is_exact_match(&candidate, &q));
    }

    #[test]
    fn coarser_grain_is_eliminated() {
        let candidate = mv(Grain::Day, vec!["country"], BTreeMap::new());
        let q = query(vec!["country"], Grain::Hour, vec![]);
        assert_eq!(score_candidate(&candidate, &q), None);
    }

    #[test]
    fn missing_dimension_is_eliminated() {
        let candidate = mv(Grain::Day, vec!["country"], BTreeMap::new());
        let q = query(vec!["country", "advertiser_id"], Grain::Day, vec![]);
        assert_eq!(score_candidate(&candidate, &q), None);
    }

    #[test]
    fn avg_requires_both_sum_and_count() {
        let mut measures = BTreeMap::new();
        measures.insert("sum_bid".to_string(), MeasureRule::plain(AggFunc::Sum, "bid_price"));
        let candidate = mv(Grain::Day, vec!["country"], measures);
        let q = query(
            vec!["country"],
            Grain::Day,
            vec![AggregateRequest::new(AggFunc::Avg, Some("bid_price".into()), "avg_bid")],
        );
        assert_eq!(score_candidate(&candidate, &q), None);
    }

    #[test]
    fn grain_time_bucket_column_satisfies_a_residual_filter() {
        use admv_core::model::{Op, Predicate, Value};

        let mut measures = BTreeMap::new();
        measures.insert("sum_bid".to_string(), MeasureRule::plain(AggFunc::Sum, "bid_price"));
        // `day` is never a declared dimension, only the grain's own time
        // bucket, yet a `day BETWEEN ...` query filter must not eliminate
        // this candidate.
        let candidate = mv(Grain::Day, vec!["country"], measures);
        let mut q = query(
            vec!["country"],
            Grain::Day,
            vec![AggregateRequest::new(AggFunc::Sum, Some("bid_price".into()), "sum_bid")],
        );
        q.filters.push(Predicate::new(
            "day",
            Op::Between,
            Value::Pair(
                Box::new(Value::Str("2025-09-10".into())),
                Box::new(Value::Str("2025-09-12".into())),
            ),
        ));
        assert!(score_candidate(&candidate, &q).is_some());
    }

    #[test]
    fn dimension_superset_scores_lower_than_exact() {
        let mut measures = BTreeMap::new();
        measures.insert("n".to_string(), MeasureRule::count_star());
        let candidate = mv(Grain::Day, vec!["country", "advertiser_id"], measures);
        let q = query(
            vec!["country"],
            Grain::Day,
            vec![AggregateRequest::new(AggFunc::Count, None, "n")],
        );
        assert_eq!(score_candidate(&candidate, &q), Some(85));
    }
}
