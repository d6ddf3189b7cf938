use admv_planner::{AggregateRequest, Combiner, Plan, PlanSource, ReaggregationRule};

fn combiner_sql(rule: &ReaggregationRule) -> String {
    let alias = &rule.output_alias;
    match &rule.combiner {
        Combiner::SumOfSums { source_alias } => format!("SUM({source_alias}) AS {alias}"),
        Combiner::SumOfCounts { source_alias } => format!("SUM({source_alias}) AS {alias}"),
        Combiner::MinOfMins { source_alias } => format!("MIN({source_alias}) AS {alias}"),
        Combiner::MaxOfMaxes { source_alias } => format!("MAX({source_alias}) AS {alias}"),
        Combiner::AvgFromSumCount { sum_alias, count_alias } => {
            format!("SUM({sum_alias}) / SUM({count_alias}) AS {alias}")
        }
    }
}

fn base_aggregate_sql(agg: &AggregateRequest) -> String {
    use admv_core::model::AggFunc;
    let func = match agg.func {
        AggFunc::Sum => "SUM",
        AggFunc::Count => "COUNT",
        AggFunc::Avg => "AVG",
        AggFunc::Min => "MIN",
        AggFunc::Max => "MAX",
    };
    let target = match (&agg.column, agg.func) {
        (None, AggFunc::Count) => "*".to_string(),
        (Some(col), _) => match &agg.filter {
            None => col.clone(),
            Some(f) if agg.func == AggFunc::Count => {
                format!("CASE WHEN {} THEN 1 ELSE NULL END", f.to_sql())
            }
            Some(f) => format!("CASE WHEN {} THEN {col} ELSE NULL END", f.to_sql()),
        },
        (None, _) => unreachable!("only count(*) may omit a column"),
    };
    format!("{func}({target}) AS {}", agg.alias)
}

/// Translates a `Plan` into the SQL DataFusion actually runs. `aggregates`
/// is threaded in separately since `Plan` only carries the reaggregation
/// combiners, not the original request list needed for a base scan.
pub fn plan_to_sql(plan: &Plan, aggregates: &[AggregateRequest], mv_table_name: &str) -> String {
    match &plan.source {
        PlanSource::Mv(_) => {
            let mut select_exprs = plan.regroup_dimensions.clone();
            let measures: Vec<String> = plan.reaggregation_rules.iter().map(combiner_sql).collect();
            select_exprs.extend(measures);

            let mut sql = format!("SELECT {} FROM {mv_table_name}", select_exprs.join(", "));
            if !plan.residual_filters.is_empty() {
                let clauses: Vec<String> = plan.residual_filters.iter().map(|f| f.to_sql()).collect();
                sql.push_str(" WHERE ");
                sql.push_str(&clauses.join(" AND "));
            }
            if !plan.regroup_dimensions.is_empty() {
                sql.push_str(" GROUP BY ");
                sql.push_str(&plan.regroup_dimensions.join(", "));
            }
            sql
        }
        PlanSource::Base => {
            let mut select_exprs = plan.projection.clone();
            select_exprs.extend(aggregates.iter().map(base_aggregate_sql));

            let mut sql = format!("SELECT {} FROM events", select_exprs.join(", "));
            let mut where_clauses: Vec<String> =
                plan.residual_filters.iter().map(|f| f.to_sql()).collect();
            if let Some(rate) = plan.sampling_rate {
                where_clauses.push(format!("random() < {rate}"));
            }
            if !where_clauses.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&where_clauses.join(" AND "));
            }
            if !plan.projection.is_empty() {
                sql.push_str(" GROUP BY ");
                sql.push_str(&plan.projection.join(", "));
            }
            sql
        }
    }
}
