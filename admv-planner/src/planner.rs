use crate::plan::{Combiner, MatchType, Plan, PlanSource, ReaggregationRule};
use crate::scoring::{is_exact_match, score_candidate, NARROW_RANGE_BASE_BONUS};
use crate::signature::QuerySignature;
use admv_core::model::AggFunc;
use admv_registry::{MvDescriptor, RegistrySnapshot};
use std::sync::Arc;

/// Planner-wide knobs that are policy, not per-query data (spec.md §6's
/// `sampling_rate` and the high-cardinality dimensions that make a sampled
/// base scan preferable to an exhaustive one).
pub struct PlannerConfig {
    pub sampling_rate: f64,
    pub high_cardinality_dimensions: Vec<String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 0.10,
            high_cardinality_dimensions: vec!["user_id".to_string()],
        }
    }
}

struct Candidate {
    mv: Arc<MvDescriptor>,
    score: i32,
}

/// Picks the best healthy MV or falls back to a base scan for `query`
/// (spec.md §4.3). Pure and synchronous: no I/O, no suspension points.
pub fn plan(query: &QuerySignature, snapshot: &RegistrySnapshot, config: &PlannerConfig) -> Plan {
    let mut candidates: Vec<Candidate> = snapshot
        .list_healthy()
        .into_iter()
        .filter_map(|mv| score_candidate(&mv, query).map(|score| Candidate { mv, score }))
        .collect();

    candidates.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.mv.byte_size.cmp(&b.mv.byte_size))
            .then(a.mv.name.cmp(&b.mv.name))
    });

    let base_score = if query.has_narrow_time_range() {
        NARROW_RANGE_BASE_BONUS
    } else {
        0
    };

    let best_mv = candidates.first();
    let base_wins = match best_mv {
        None => true,
        Some(top) => base_score > top.score,
    };

    if base_wins {
        return base_plan(query, base_score, config);
    }

    mv_plan(&best_mv.unwrap().mv, best_mv.unwrap().score, query)
}

fn mv_plan(mv: &Arc<MvDescriptor>, score: i32, query: &QuerySignature) -> Plan {
    let exact = is_exact_match(mv, query);
    let match_type = if exact { MatchType::Exact } else { MatchType::Partial };

    // Regrouping by the query's own dimensions and recombining stored
    // measures is correct whether or not the MV already sits at that exact
    // grouping: when it does, every group has exactly one source row, so
    // the combiner (SUM of one sum, MIN of one min, ...) is an identity.
    // This lets the executor use one code path for both match types.
    let regroup_dimensions = query.dimensions.clone();
    let reaggregation_rules = query
        .aggregates
        .iter()
        .map(|agg| reaggregation_rule_for(mv, agg))
        .collect();

    // Filters whose column isn't one of the MV's own build filters become
    // residual post-filters applied to the (possibly regrouped) output.
    let residual_filters = query
        .filters
        .iter()
        .filter(|f| !mv.filters.iter().any(|mv_f| mv_f.implies(f)))
        .cloned()
        .collect();

    Plan {
        source: PlanSource::Mv(mv.name.clone()),
        match_type,
        score,
        projection: query.dimensions.clone(),
        residual_filters,
        regroup_dimensions,
        reaggregation_rules,
        partition_pruning_keys: Vec::new(),
        sampling_rate: None,
    }
}

fn reaggregation_rule_for(
    mv: &Arc<MvDescriptor>,
    agg: &crate::signature::AggregateRequest,
) -> ReaggregationRule {
    let find = |func: AggFunc| -> String {
        mv.measures
            .iter()
            .find(|(_, rule)| rule.satisfies(func, agg.column.as_deref(), agg.filter.as_ref()))
            .map(|(alias, _)| alias.clone())
            .expect("scoring guaranteed a satisfying measure exists")
    };

    let combiner = match agg.func {
        AggFunc::Sum => Combiner::SumOfSums { source_alias: find(AggFunc::Sum) },
        AggFunc::Count => Combiner::SumOfCounts { source_alias: find(AggFunc::Count) },
        AggFunc::Min => Combiner::MinOfMins { source_alias: find(AggFunc::Min) },
        AggFunc::Max => Combiner::MaxOfMaxes { source_alias: find(AggFunc::Max) },
        AggFunc::Avg => Combiner::AvgFromSumCount {
            sum_alias: find(AggFunc::Sum),
            count_alias: find(AggFunc::Count),
        },
    };

    ReaggregationRule {
        output_alias: agg.alias.clone(),
        combiner,
    }
}

fn base_plan(query: &QuerySignature, score: i32, config: &PlannerConfig) -> Plan {
    let high_cardinality_requested = query
        .dimensions
        .iter()
        .any(|d| config.high_cardinality_dimensions.contains(d));

    let (match_type, sampling_rate) = if query.approximate_ok && high_cardinality_requested {
        (MatchType::Sampled, Some(config.sampling_rate))
    } else {
        (MatchType::Base, None)
    };

    Plan {
        source: PlanSource::Base,
        match_type,
        score,
        projection: query.dimensions.clone(),
        residual_filters: query.filters.clone(),
        regroup_dimensions: Vec::new(),
        reaggregation_rules: Vec::new(),
        partition_pruning_keys: Vec::new(),
        sampling_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::AggregateRequest;
    use admv_core::model::Grain;
    use admv_registry::{Health, MeasureRule};
    use chrono::{NaiveDate, Utc};
    use std::collections::{BTreeMap, HashMap};

    fn snapshot_with(mvs: Vec<MvDescriptor>) -> RegistrySnapshot {
        let by_name = mvs
            .into_iter()
            .map(|d| (d.name.clone(), Arc::new(d)))
            .collect::<HashMap<_, _>>();
        RegistrySnapshot::new(by_name)
    }

    fn sample_mv(name: &str, grain: Grain, dims: Vec<&str>, byte_size: u64) -> MvDescriptor {
        let mut measures = BTreeMap::new();
        measures.insert("sum_bid".to_string(), MeasureRule::plain(AggFunc::Sum, "bid_price"));
        MvDescriptor {
            name: name.to_string(),
            grain,
            dimensions: dims.into_iter().map(String::from).collect(),
            filters: vec![],
            measures,
            schema_fingerprint: 1,
            files: vec![],
            row_count: 10,
            byte_size,
            built_at: Utc::now(),
            source_watermark: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            health: Health::Healthy,
        }
    }

    fn base_query() -> QuerySignature {
        QuerySignature {
            dimensions: vec!["country".to_string()],
            time_grain: Some(Grain::Day),
            aggregates: vec![AggregateRequest::new(AggFunc::Sum, Some("bid_price".into()), "sum_bid")],
            ..Default::default()
        }
    }

    #[test]
    fn picks_exact_match_mv() {
        let snapshot = snapshot_with(vec![sample_mv("rev_by_country_day", Grain::Day, vec!["country"], 500)]);
        let result = plan(&base_query(), &snapshot, &PlannerConfig::default());
        assert_eq!(result.source, PlanSource::Mv("rev_by_country_day".to_string()));
        assert_eq!(result.match_type, MatchType::Exact);
    }

    #[test]
    fn falls_back_to_base_when_no_candidate() {
        let snapshot = snapshot_with(vec![]);
        let result = plan(&base_query(), &snapshot, &PlannerConfig::default());
        assert_eq!(result.source, PlanSource::Base);
        assert_eq!(result.match_type, MatchType::Base);
    }

    #[test]
    fn tie_break_prefers_smaller_byte_size() {
        let snapshot = snapshot_with(vec![
            sample_mv("big", Grain::Day, vec!["country"], 5000),
            sample_mv("small", Grain::Day, vec!["country"], 100),
        ]);
        let result = plan(&base_query(), &snapshot, &PlannerConfig::default());
        assert_eq!(result.source, PlanSource::Mv("small".to_string()));
    }

    #[test]
    fn partial_match_emits_reaggregation_rules() {
        let snapshot = snapshot_with(vec![sample_mv(
            "rev_by_country_advertiser_day",
            Grain::Day,
            vec!["country", "advertiser_id"],
            500,
        )]);
        let result = plan(&base_query(), &snapshot, &PlannerConfig::default());
        assert_eq!(result.match_type, MatchType::Partial);
        assert_eq!(result.reaggregation_rules.len(), 1);
        assert_eq!(
            result.reaggregation_rules[0].combiner,
            Combiner::SumOfSums { source_alias: "sum_bid".to_string() }
        );
    }
}
