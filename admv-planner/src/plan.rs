use admv_core::model::Predicate;
use chrono::NaiveDate;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlanSource {
    Mv(String),
    Base,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchType {
    Exact,
    Partial,
    Base,
    Sampled,
}

/// How a query-level aggregate is recomputed from an MV's stored measures
/// when the MV must be regrouped to a coarser set of dimensions or a
/// coarser grain (spec.md §4.3's reaggregation rules).
#[derive(Clone, Debug, PartialEq)]
pub enum Combiner {
    SumOfSums { source_alias: String },
    SumOfCounts { source_alias: String },
    MinOfMins { source_alias: String },
    MaxOfMaxes { source_alias: String },
    AvgFromSumCount { sum_alias: String, count_alias: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReaggregationRule {
    pub output_alias: String,
    pub combiner: Combiner,
}

/// An execution plan (spec.md §3): the executor turns this into an actual
/// query against either the named MV's ready files or the base lake.
#[derive(Clone, Debug, PartialEq)]
pub struct Plan {
    pub source: PlanSource,
    pub match_type: MatchType,
    pub score: i32,
    pub projection: Vec<String>,
    pub residual_filters: Vec<Predicate>,
    pub regroup_dimensions: Vec<String>,
    pub reaggregation_rules: Vec<ReaggregationRule>,
    pub partition_pruning_keys: Vec<NaiveDate>,
    pub sampling_rate: Option<f64>,
}
