use crate::descriptor::MeasureRule;
use admv_core::model::{Grain, Predicate};
use std::collections::BTreeMap;
use xxhash_rust::xxh3::xxh3_64;

/// Computes the stable `schema_fingerprint` of an MV from
/// `(grain, dimensions, filters, measures)` (spec.md §3). Hashed with
/// `xxhash-rust` over a canonical `serde_json` encoding rather than
/// `std::hash::DefaultHasher`, whose output isn't guaranteed stable across
/// process restarts or builds — unacceptable for a fingerprint persisted
/// to `manifest.json` and compared across builder runs.
pub fn schema_fingerprint(
    grain: Grain,
    dimensions: &[String],
    filters: &[Predicate],
    measures: &BTreeMap<String, MeasureRule>,
) -> u64 {
    let mut sorted_dimensions = dimensions.to_vec();
    sorted_dimensions.sort();

    let canonical = (
        grain,
        sorted_dimensions,
        filters.to_vec(),
        measures.clone(),
    );
    let encoded = serde_json::to_vec(&canonical).expect("canonical encoding never fails");
    xxh3_64(&encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use admv_core::model::AggFunc;

    fn measures() -> BTreeMap<String, MeasureRule> {
        let mut m = BTreeMap::new();
        m.insert("sum_bid_price".to_string(), MeasureRule::plain(AggFunc::Sum, "bid_price"));
        m
    }

    #[test]
    fn fingerprint_is_stable_across_dimension_order() {
        let a = schema_fingerprint(
            Grain::Day,
            &["country".to_string(), "advertiser_id".to_string()],
            &[],
            &measures(),
        );
        let b = schema_fingerprint(
            Grain::Day,
            &["advertiser_id".to_string(), "country".to_string()],
            &[],
            &measures(),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_differs_on_grain() {
        let a = schema_fingerprint(Grain::Day, &[], &[], &measures());
        let b = schema_fingerprint(Grain::Hour, &[], &[], &measures());
        assert_ne!(a, b);
    }
}
