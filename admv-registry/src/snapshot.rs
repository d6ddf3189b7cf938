use crate::descriptor::{Health, MvDescriptor};
use std::collections::HashMap;
use std::sync::Arc;

/// An immutable point-in-time view of the registry (Design Note §9:
/// "shared mutable registry -> snapshot + epoch"). The planner never sees
/// the live `Registry`, only a cloned `Arc<RegistrySnapshot>`: a reader
/// that obtained a snapshot before a swap may safely finish its query
/// against the old descriptors (spec.md §4.1).
#[derive(Clone, Debug, Default)]
pub struct RegistrySnapshot {
    by_name: Arc<HashMap<String, Arc<MvDescriptor>>>,
}

impl RegistrySnapshot {
    pub fn new(by_name: HashMap<String, Arc<MvDescriptor>>) -> Self {
        Self {
            by_name: Arc::new(by_name),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<MvDescriptor>> {
        self.by_name.get(name).cloned()
    }

    /// MVs invisible to the planner (spec.md §4.1: "a QUARANTINED MV is
    /// invisible to the planner") are excluded here, not filtered at every
    /// call site.
    pub fn list_healthy(&self) -> Vec<Arc<MvDescriptor>> {
        self.by_name
            .values()
            .filter(|d| d.health == Health::Healthy)
            .cloned()
            .collect()
    }

    pub fn all(&self) -> impl Iterator<Item = &Arc<MvDescriptor>> {
        self.by_name.values()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
