use admv_core::model::{AggFunc, Grain, Predicate};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A measure's computation rule (spec.md §3): a plain aggregate, or a
/// filtered aggregate such as `sum(bid_price) where type = 'purchase'`.
/// `column: None` is only valid with `func: Count` (`count(*)`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeasureRule {
    pub func: AggFunc,
    pub column: Option<String>,
    pub filter: Option<Predicate>,
}

impl MeasureRule {
    pub fn plain(func: AggFunc, column: impl Into<String>) -> Self {
        Self {
            func,
            column: Some(column.into()),
            filter: None,
        }
    }

    pub fn count_star() -> Self {
        Self {
            func: AggFunc::Count,
            column: None,
            filter: None,
        }
    }

    pub fn filtered(func: AggFunc, column: impl Into<String>, filter: Predicate) -> Self {
        Self {
            func,
            column: Some(column.into()),
            filter: Some(filter),
        }
    }

    /// Whether a query's requested filtered aggregate can be computed from
    /// this measure: function and column must match, and this measure's
    /// filter must imply the query's (spec.md §4.3).
    pub fn satisfies(&self, func: AggFunc, column: Option<&str>, query_filter: Option<&Predicate>) -> bool {
        if self.func != func || self.column.as_deref() != column {
            return false;
        }
        match (&self.filter, query_filter) {
            (None, None) => true,
            (Some(mv_f), Some(q_f)) => mv_f.implies(q_f),
            (Some(_), None) => false,
            (None, Some(_)) => false,
        }
    }
}

/// Health states of an MV (spec.md §3/§4.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Missing,
    Building,
    Healthy,
    Stale,
    Quarantined,
}

impl Health {
    /// Allowed transitions of the state machine in spec.md §4.1.
    pub fn can_transition_to(self, next: Health) -> bool {
        use Health::*;
        match next {
            Quarantined => true, // any state -> Quarantined on validator failure
            Building => matches!(self, Missing | Healthy | Stale),
            Healthy => matches!(self, Building),
            Stale => matches!(self, Healthy),
            Missing => false,
        }
    }
}

/// Immutable metadata describing one materialized view (spec.md §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MvDescriptor {
    pub name: String,
    pub grain: Grain,
    pub dimensions: Vec<String>,
    pub filters: Vec<Predicate>,
    pub measures: BTreeMap<String, MeasureRule>,
    pub schema_fingerprint: u64,
    pub files: Vec<String>,
    pub row_count: u64,
    pub byte_size: u64,
    pub built_at: DateTime<Utc>,
    pub source_watermark: NaiveDate,
    pub health: Health,
}

impl MvDescriptor {
    /// Every aggregate a query requests that this measure set can satisfy.
    pub fn has_measure(&self, func: AggFunc, column: Option<&str>, filter: Option<&Predicate>) -> bool {
        self.measures
            .values()
            .any(|m| m.satisfies(func, column, filter))
    }

    pub fn dimensions_are_superset_of(&self, requested: &[String]) -> bool {
        requested.iter().all(|d| self.dimensions.contains(d))
    }

    pub fn dimensions_equal(&self, requested: &[String]) -> bool {
        let mut a = self.dimensions.clone();
        let mut b = requested.to_vec();
        a.sort();
        b.sort();
        a == b
    }
}
