use crate::spec::BuildSpec;
use admv_core::model::{AggFunc, Grain};
use admv_registry::MeasureRule;

/// The time-bucket columns a grain groups by, and the columns the builder
/// must carry through into the MV's own schema so a coarser rebuild or a
/// reaggregation at query time can still find them (spec.md §4.3).
fn grain_group_columns(grain: Grain) -> Vec<&'static str> {
    match grain {
        Grain::AllTime => vec![],
        Grain::Week => vec!["date_trunc('week', CAST(day AS DATE)) AS week"],
        Grain::Day => vec!["day"],
        Grain::Hour => vec!["day", "hour"],
        Grain::Minute => vec!["day", "hour", "minute"],
    }
}

fn measure_sql(alias: &str, rule: &MeasureRule) -> String {
    let func = match rule.func {
        AggFunc::Sum => "SUM",
        AggFunc::Count => "COUNT",
        AggFunc::Avg => "AVG",
        AggFunc::Min => "MIN",
        AggFunc::Max => "MAX",
    };

    let target = match (&rule.column, rule.func) {
        (None, AggFunc::Count) => "*".to_string(),
        (Some(col), _) => match &rule.filter {
            None => col.clone(),
            Some(filter) if rule.func == AggFunc::Count => {
                format!("CASE WHEN {} THEN 1 ELSE NULL END", filter.to_sql())
            }
            Some(filter) => format!("CASE WHEN {} THEN {col} ELSE NULL END", filter.to_sql()),
        },
        (None, _) => unreachable!("only count(*) may omit a column"),
    };

    format!("{func}({target}) AS {alias}")
}

/// Builds the aggregation SQL DataFusion runs against the `events` table to
/// materialize an MV (spec.md §4.2): `GROUP BY` dimensions plus the grain's
/// time bucket, one projected expression per measure.
pub fn build_sql(spec: &BuildSpec) -> String {
    let mut select_exprs: Vec<String> = spec.dimensions.clone();
    select_exprs.extend(grain_group_columns(spec.grain).into_iter().map(String::from));
    let measure_start = select_exprs.len();
    for (alias, rule) in &spec.measures {
        select_exprs.push(measure_sql(alias, rule));
    }

    let mut sql = format!("SELECT {} FROM events", select_exprs.join(", "));

    if !spec.filters.is_empty() {
        let clauses: Vec<String> = spec.filters.iter().map(|p| p.to_sql()).collect();
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    let group_by = &select_exprs[..measure_start];
    if !group_by.is_empty() {
        sql.push_str(" GROUP BY ");
        // GROUP BY references plain column names; the week bucket expression
        // must be repeated verbatim since it isn't a column alias DataFusion
        // resolves in GROUP BY position.
        sql.push_str(&group_by.join(", "));
    }

    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use admv_core::model::{Op, Predicate, Value};

    #[test]
    fn builds_group_by_with_day_grain() {
        let spec = BuildSpec::new("rev_by_country_day", Grain::Day)
            .with_dimensions(vec!["country".to_string()])
            .with_measure("sum_bid_price", MeasureRule::plain(AggFunc::Sum, "bid_price"));
        let sql = build_sql(&spec);
        assert!(sql.contains("SELECT country, day, SUM(bid_price) AS sum_bid_price FROM events"));
        assert!(sql.contains("GROUP BY country, day"));
    }

    #[test]
    fn all_time_grain_has_no_group_by_time_bucket() {
        let spec = BuildSpec::new("counts_by_advertiser", Grain::AllTime)
            .with_dimensions(vec!["advertiser_id".to_string()])
            .with_measure("n", MeasureRule::count_star());
        let sql = build_sql(&spec);
        assert!(sql.contains("GROUP BY advertiser_id"));
        assert!(!sql.contains("day"));
    }

    #[test]
    fn filtered_measure_uses_case_when() {
        let filter = Predicate::new("type", Op::Eq, Value::Str("purchase".to_string()));
        let spec = BuildSpec::new("purchase_rev", Grain::Day)
            .with_dimensions(vec!["country".to_string()])
            .with_measure(
                "purchase_revenue",
                MeasureRule::filtered(AggFunc::Sum, "total_price", filter),
            );
        let sql = build_sql(&spec);
        assert!(sql.contains("CASE WHEN type = 'purchase' THEN total_price ELSE NULL END"));
    }

    #[test]
    fn top_level_where_clause_is_anded() {
        let spec = BuildSpec::new("us_only", Grain::Day)
            .with_dimensions(vec!["country".to_string()])
            .with_filters(vec![Predicate::new(
                "country",
                Op::Eq,
                Value::Str("US".to_string()),
            )])
            .with_measure("n", MeasureRule::count_star());
        let sql = build_sql(&spec);
        assert!(sql.contains("WHERE country = 'US'"));
    }
}
