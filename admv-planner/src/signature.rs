use admv_core::model::{AggFunc, Grain, Predicate};
use admv_core::time::TimeRange;

/// One requested aggregate, e.g. `sum(bid_price) where type = 'purchase' as
/// total_purchase_revenue` (spec.md §3).
#[derive(Clone, Debug, PartialEq)]
pub struct AggregateRequest {
    pub func: AggFunc,
    pub column: Option<String>,
    pub alias: String,
    pub filter: Option<Predicate>,
}

impl AggregateRequest {
    pub fn new(func: AggFunc, column: Option<String>, alias: impl Into<String>) -> Self {
        Self {
            func,
            column,
            alias: alias.into(),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: Predicate) -> Self {
        self.filter = Some(filter);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub direction: SortDirection,
}

/// The planner's entire input (spec.md §3): a declarative query translated
/// from the wire format of §6 into typed form.
#[derive(Clone, Debug, Default)]
pub struct QuerySignature {
    pub dimensions: Vec<String>,
    pub time_grain: Option<Grain>,
    pub filters: Vec<Predicate>,
    pub aggregates: Vec<AggregateRequest>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    /// Narrowed from `filters` by the caller for the base-scan bonus and
    /// partition pruning; `None` means the query has no time bound.
    pub time_range: Option<TimeRange>,
    pub approximate_ok: bool,
}

impl QuerySignature {
    pub fn required_grain(&self) -> Grain {
        self.time_grain.unwrap_or(Grain::AllTime)
    }

    /// True when the query's time window is narrow enough to earn the
    /// base-scan partition-pruning bonus (spec.md §4.3: "≤ 7 days").
    pub fn has_narrow_time_range(&self) -> bool {
        self.time_range
            .map(|r| (r.end - r.begin).num_days() <= 7)
            .unwrap_or(false)
    }
}
