use datafusion::arrow::array::{Array, Float64Array, Int64Array, StringArray};
use datafusion::arrow::record_batch::RecordBatch;
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Str(String),
    Int(i64),
    Float(f64),
    Null,
}

impl Cell {
    fn from_column(column: &dyn Array, row: usize) -> Cell {
        if column.is_null(row) {
            return Cell::Null;
        }
        if let Some(a) = column.as_any().downcast_ref::<StringArray>() {
            return Cell::Str(a.value(row).to_string());
        }
        if let Some(a) = column.as_any().downcast_ref::<Int64Array>() {
            return Cell::Int(a.value(row));
        }
        if let Some(a) = column.as_any().downcast_ref::<Float64Array>() {
            return Cell::Float(a.value(row));
        }
        Cell::Null
    }

    fn dimension_key_part(&self) -> String {
        match self {
            Cell::Str(s) => s.clone(),
            Cell::Int(i) => i.to_string(),
            Cell::Float(f) => f.to_string(),
            Cell::Null => "<null>".to_string(),
        }
    }

    /// Relative tolerance 1e-9 for numeric measures (spec.md §4.5); exact
    /// match for everything else.
    fn matches_within_tolerance(&self, other: &Cell) -> bool {
        match (self, other) {
            (Cell::Float(a), Cell::Float(b)) => (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0),
            (Cell::Int(a), Cell::Int(b)) => a == b,
            (Cell::Str(a), Cell::Str(b)) => a == b,
            (Cell::Null, Cell::Null) => true,
            _ => false,
        }
    }
}

fn rows_of(batches: &[RecordBatch]) -> Vec<Vec<(String, Cell)>> {
    let mut rows = Vec::new();
    for batch in batches {
        let schema = batch.schema();
        for row in 0..batch.num_rows() {
            let mut cells = Vec::new();
            for (i, field) in schema.fields().iter().enumerate() {
                let cell = Cell::from_column(batch.column(i).as_ref(), row);
                cells.push((field.name().clone(), cell));
            }
            rows.push(cells);
        }
    }
    rows
}

fn dimension_key(cells: &[(String, Cell)], dimensions: &[String]) -> String {
    dimensions
        .iter()
        .map(|d| {
            cells
                .iter()
                .find(|(name, _)| name == d)
                .map(|(_, c)| c.dimension_key_part())
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join("\u{1}")
}

/// Compares the MV-routed result against a forced base-scan result as
/// multisets keyed by the query's grouping dimensions, with numeric
/// tolerances (spec.md §4.5). Returns `Ok(())` on a match, or the first
/// mismatch description found.
pub fn compare_result_sets(
    mv_batches: &[RecordBatch],
    base_batches: &[RecordBatch],
    dimensions: &[String],
) -> Result<(), String> {
    let mv_rows = rows_of(mv_batches);
    let base_rows = rows_of(base_batches);

    if mv_rows.len() != base_rows.len() {
        return Err(format!(
            "row count mismatch: mv={} base={}",
            mv_rows.len(),
            base_rows.len()
        ));
    }

    let mut base_by_key: HashMap<String, Vec<(String, Cell)>> = HashMap::new();
    for cells in &base_rows {
        base_by_key.insert(dimension_key(cells, dimensions), cells.clone());
    }

    for mv_cells in &mv_rows {
        let key = dimension_key(mv_cells, dimensions);
        let base_cells = base_by_key
            .get(&key)
            .ok_or_else(|| format!("mv group '{key}' has no matching base group"))?;

        for (name, mv_value) in mv_cells {
            if dimensions.contains(name) {
                continue;
            }
            let Some((_, base_value)) = base_cells.iter().find(|(n, _)| n == name) else {
                continue;
            };
            if !mv_value.matches_within_tolerance(base_value) {
                return Err(format!(
                    "measure '{name}' mismatch in group '{key}': mv={mv_value:?} base={base_value:?}"
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn batch(countries: Vec<&str>, sums: Vec<f64>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("country", DataType::Utf8, false),
            Field::new("sum_bid", DataType::Float64, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(countries)),
                Arc::new(Float64Array::from(sums)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn identical_results_match() {
        let a = batch(vec!["US", "FR"], vec![10.0, 5.0]);
        let b = batch(vec!["FR", "US"], vec![5.0, 10.0]);
        assert!(compare_result_sets(&[a], &[b], &["country".to_string()]).is_ok());
    }

    #[test]
    fn tiny_float_drift_within_tolerance_matches() {
        let a = batch(vec!["US"], vec![10.000000000001]);
        let b = batch(vec!["US"], vec![10.0]);
        assert!(compare_result_sets(&[a], &[b], &["country".to_string()]).is_ok());
    }

    #[test]
    fn real_mismatch_is_rejected() {
        let a = batch(vec!["US"], vec![10.0]);
        let b = batch(vec!["US"], vec![20.0]);
        assert!(compare_result_sets(&[a], &[b], &["country".to_string()]).is_err());
    }

    #[test]
    fn row_count_mismatch_is_rejected() {
        let a = batch(vec!["US", "FR"], vec![10.0, 5.0]);
        let b = batch(vec!["US"], vec![10.0]);
        assert!(compare_result_sets(&[a], &[b], &["country".to_string()]).is_err());
    }
}
