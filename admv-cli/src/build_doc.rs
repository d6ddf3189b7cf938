use admv_builder::BuildSpec;
use admv_core::model::{Grain, Predicate};
use admv_registry::MeasureRule;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// On-disk description of an MV to (re)build. Reuses `admv_core::model`'s
/// and `admv_registry::MeasureRule`'s own `Deserialize` impls directly —
/// unlike the query document, this shape already matches the internal
/// types field-for-field.
#[derive(Deserialize)]
struct BuildDoc {
    name: String,
    grain: Grain,
    #[serde(default)]
    dimensions: Vec<String>,
    #[serde(default)]
    filters: Vec<Predicate>,
    #[serde(default)]
    measures: BTreeMap<String, MeasureRule>,
}

pub fn parse_build_file(path: &Path) -> Result<BuildSpec> {
    let bytes = std::fs::read(path).with_context(|| format!("reading build spec {}", path.display()))?;
    let doc: BuildDoc = serde_json::from_slice(&bytes).with_context(|| "parsing build spec json")?;

    let mut spec = BuildSpec::new(doc.name, doc.grain)
        .with_dimensions(doc.dimensions)
        .with_filters(doc.filters);
    for (alias, rule) in doc.measures {
        spec = spec.with_measure(alias, rule);
    }
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_a_build_spec_with_plain_and_filtered_measures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{
                "name": "rev_by_country_day",
                "grain": "day",
                "dimensions": ["country"],
                "filters": [{{"column": "type", "op": "eq", "value": "impression"}}],
                "measures": {{
                    "sum_bid": {{"func": "sum", "column": "bid_price", "filter": null}},
                    "row_count": {{"func": "count", "column": null, "filter": null}}
                }}
            }}"#
        )
        .unwrap();

        let spec = parse_build_file(&path).unwrap();
        assert_eq!(spec.name, "rev_by_country_day");
        assert_eq!(spec.dimensions, vec!["country".to_string()]);
        assert_eq!(spec.measures.len(), 2);
    }
}
