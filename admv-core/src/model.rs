use serde::{Deserialize, Serialize};
use std::fmt;

/// Time bucket of an MV (spec.md §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grain {
    AllTime,
    Week,
    Day,
    Hour,
    Minute,
}

impl Grain {
    /// Ordering from coarsest to finest; used to decide whether one grain
    /// is "finer than" another for reaggregation eligibility (spec.md
    /// §4.3's grain-coverage scoring rule).
    fn rank(&self) -> u8 {
        match self {
            Grain::AllTime => 0,
            Grain::Week => 1,
            Grain::Day => 2,
            Grain::Hour => 3,
            Grain::Minute => 4,
        }
    }

    /// True if `self` is strictly finer-grained than `required` (so rows
    /// at `self`'s grain can be reaggregated up to `required`).
    pub fn is_finer_than(&self, required: Grain) -> bool {
        self.rank() > required.rank()
    }

    /// The time-bucket columns an MV built at this grain carries alongside
    /// its declared dimensions (mirrors `admv_builder::query`'s
    /// `grain_group_columns`). A query filter on one of these columns is a
    /// residual filter the MV can still answer even though the column isn't
    /// one of the MV's own `dimensions`.
    pub fn time_columns(&self) -> &'static [&'static str] {
        match self {
            Grain::AllTime => &[],
            Grain::Week => &["week"],
            Grain::Day => &["day"],
            Grain::Hour => &["day", "hour"],
            Grain::Minute => &["day", "hour", "minute"],
        }
    }
}

impl fmt::Display for Grain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Grain::AllTime => "all-time",
            Grain::Week => "week",
            Grain::Day => "day",
            Grain::Hour => "hour",
            Grain::Minute => "minute",
        };
        f.write_str(s)
    }
}

/// Comparison operators recognized in `where` clauses (spec.md §3/§6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Between,
    In,
}

/// A scalar or compound value used on the right-hand side of a predicate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Pair(Box<Value>, Box<Value>),
    List(Vec<Value>),
}

impl Value {
    /// Renders the value as a SQL literal. Strings are single-quoted with
    /// embedded quotes escaped; this is the only place user-controlled
    /// scalars are interpolated into generated SQL text, so every call
    /// site in the planner/builder must go through it.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Str(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Pair(a, b) => format!("{} AND {}", a.to_sql_literal(), b.to_sql_literal()),
            Value::List(items) => {
                let rendered: Vec<String> = items.iter().map(Value::to_sql_literal).collect();
                format!("({})", rendered.join(", "))
            }
        }
    }
}

/// A single predicate: `column op value`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub column: String,
    pub op: Op,
    pub value: Value,
}

impl Predicate {
    pub fn new(column: impl Into<String>, op: Op, value: Value) -> Self {
        Self {
            column: column.into(),
            op,
            value,
        }
    }

    /// Renders the predicate as a SQL boolean expression.
    pub fn to_sql(&self) -> String {
        match self.op {
            Op::Eq => format!("{} = {}", self.column, self.value.to_sql_literal()),
            Op::Neq => format!("{} != {}", self.column, self.value.to_sql_literal()),
            Op::Lt => format!("{} < {}", self.column, self.value.to_sql_literal()),
            Op::Lte => format!("{} <= {}", self.column, self.value.to_sql_literal()),
            Op::Gt => format!("{} > {}", self.column, self.value.to_sql_literal()),
            Op::Gte => format!("{} >= {}", self.column, self.value.to_sql_literal()),
            Op::Between => {
                if let Value::Pair(a, b) = &self.value {
                    format!(
                        "{} BETWEEN {} AND {}",
                        self.column,
                        a.to_sql_literal(),
                        b.to_sql_literal()
                    )
                } else {
                    format!("{} BETWEEN {}", self.column, self.value.to_sql_literal())
                }
            }
            Op::In => format!("{} IN {}", self.column, self.value.to_sql_literal()),
        }
    }

    /// True if `self` implies `other` on the same column — used by the
    /// planner's filter-compatibility scoring rule and by measure-filter
    /// matching. Conservative: only exact equality of column+op+value
    /// counts as implication; anything else is assumed not implied.
    pub fn implies(&self, other: &Predicate) -> bool {
        self.column == other.column && self.op == other.op && self.value == other.value
    }
}

/// Aggregate functions recognized by spec.md §3/§6.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggFunc {
    Sum,
    Count,
    Avg,
    Min,
    Max,
}

impl fmt::Display for AggFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggFunc::Sum => "SUM",
            AggFunc::Count => "COUNT",
            AggFunc::Avg => "AVG",
            AggFunc::Min => "MIN",
            AggFunc::Max => "MAX",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grain_finer_than_is_strict() {
        assert!(Grain::Hour.is_finer_than(Grain::Day));
        assert!(!Grain::Day.is_finer_than(Grain::Day));
        assert!(!Grain::Day.is_finer_than(Grain::Hour));
    }

    #[test]
    fn between_renders_inclusive_sql() {
        let p = Predicate::new(
            "day",
            Op::Between,
            Value::Pair(
                Box::new(Value::Str("2024-01-01".into())),
                Box::new(Value::Str("2024-01-07".into())),
            ),
        );
        assert_eq!(p.to_sql(), "day BETWEEN '2024-01-01' AND '2024-01-07'");
    }

    #[test]
    fn quotes_are_escaped() {
        let v = Value::Str("O'Brien".into());
        assert_eq!(v.to_sql_literal(), "'O''Brien'");
    }

    #[test]
    fn predicate_implication_is_exact_match() {
        let a = Predicate::new("type", Op::Eq, Value::Str("impression".into()));
        let b = Predicate::new("type", Op::Eq, Value::Str("impression".into()));
        let c = Predicate::new("type", Op::Eq, Value::Str("click".into()));
        assert!(a.implies(&b));
        assert!(!a.implies(&c));
    }
}
