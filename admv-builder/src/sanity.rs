use admv_core::error::AccelError;
use datafusion::arrow::array::{Array, Float64Array};
use datafusion::arrow::datatypes::DataType;
use datafusion::arrow::record_batch::RecordBatch;

/// Local checks an MV build must pass before it is promoted (spec.md
/// §4.2): it must have produced at least one row, every dimension and
/// measure column the descriptor promises must actually be in the output
/// schema, dimension (key) columns must carry no nulls, and numeric
/// measures must be finite. A build failing any of these never reaches the
/// registry; the caller should leave the MV at its previous health.
pub fn check_build_output(
    mv_name: &str,
    batches: &[RecordBatch],
    dimensions: &[String],
    measure_aliases: &[String],
) -> Result<u64, AccelError> {
    let total_rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    if total_rows == 0 {
        return Err(AccelError::Integrity {
            mv_name: mv_name.to_string(),
            reason: "build produced zero rows".to_string(),
        });
    }

    if let Some(first) = batches.first() {
        let schema = first.schema();
        for required in dimensions.iter().chain(measure_aliases.iter()) {
            if schema.field_with_name(required).is_err() {
                return Err(AccelError::Integrity {
                    mv_name: mv_name.to_string(),
                    reason: format!("output is missing required column '{required}'"),
                });
            }
        }
    }

    for batch in batches {
        for dim in dimensions {
            let Some(column) = batch.column_by_name(dim) else {
                continue;
            };
            if column.null_count() > 0 {
                return Err(AccelError::Integrity {
                    mv_name: mv_name.to_string(),
                    reason: format!("dimension column '{dim}' contains nulls"),
                });
            }
        }
        for alias in measure_aliases {
            if let Some(column) = batch.column_by_name(alias) {
                if column.data_type() == &DataType::Float64 {
                    if let Some(floats) = column.as_any().downcast_ref::<Float64Array>() {
                        for i in 0..floats.len() {
                            if !floats.is_null(i) && !floats.value(i).is_finite() {
                                return Err(AccelError::Integrity {
                                    mv_name: mv_name.to_string(),
                                    reason: format!(
                                        "measure '{alias}' produced a non-finite value"
                                    ),
                                });
                            }
                        }
                    }
                }
            }
        }
    }

    Ok(total_rows as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::arrow::array::{Int64Array, StringArray};
    use datafusion::arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("country", DataType::Utf8, false),
            Field::new("n", DataType::Int64, false),
            Field::new("avg_bid", DataType::Float64, true),
        ]))
    }

    #[test]
    fn rejects_empty_output() {
        let err = check_build_output("mv", &[], &["country".to_string()], &["n".to_string()])
            .unwrap_err();
        assert_eq!(err.kind(), "IntegrityError");
    }

    #[test]
    fn rejects_non_finite_measure() {
        let batch = RecordBatch::try_new(
            schema(),
            vec![
                Arc::new(StringArray::from(vec!["US"])),
                Arc::new(Int64Array::from(vec![1])),
                Arc::new(Float64Array::from(vec![f64::INFINITY])),
            ],
        )
        .unwrap();
        let err = check_build_output(
            "mv",
            &[batch],
            &["country".to_string()],
            &["n".to_string(), "avg_bid".to_string()],
        )
        .unwrap_err();
        assert_eq!(err.kind(), "IntegrityError");
    }

    #[test]
    fn accepts_well_formed_output() {
        let batch = RecordBatch::try_new(
            schema(),
            vec![
                Arc::new(StringArray::from(vec!["US", "FR"])),
                Arc::new(Int64Array::from(vec![1, 2])),
                Arc::new(Float64Array::from(vec![1.5, 2.5])),
            ],
        )
        .unwrap();
        let rows = check_build_output(
            "mv",
            &[batch],
            &["country".to_string()],
            &["n".to_string(), "avg_bid".to_string()],
        )
        .unwrap();
        assert_eq!(rows, 2);
    }
}
