use admv_core::model::{Grain, Predicate};
use admv_registry::MeasureRule;
use std::collections::BTreeMap;

/// A request to (re)build one named MV (spec.md §4.2). Everything the
/// builder needs is here; it performs no discovery of its own beyond
/// scanning the lake for the given time range.
#[derive(Clone, Debug)]
pub struct BuildSpec {
    pub name: String,
    pub grain: Grain,
    pub dimensions: Vec<String>,
    pub filters: Vec<Predicate>,
    pub measures: BTreeMap<String, MeasureRule>,
}

impl BuildSpec {
    pub fn new(name: impl Into<String>, grain: Grain) -> Self {
        Self {
            name: name.into(),
            grain,
            dimensions: Vec::new(),
            filters: Vec::new(),
            measures: BTreeMap::new(),
        }
    }

    pub fn with_dimensions(mut self, dimensions: Vec<String>) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_filters(mut self, filters: Vec<Predicate>) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_measure(mut self, alias: impl Into<String>, rule: MeasureRule) -> Self {
        self.measures.insert(alias.into(), rule);
        self
    }
}
