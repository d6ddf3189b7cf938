use crate::descriptor::{Health, MvDescriptor};
use crate::snapshot::RegistrySnapshot;
use admv_core::error::AccelError;
use admv_core::model::Grain;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// The authoritative in-memory MV catalog (spec.md §4.1). Readers take a
/// cheap `Arc` clone of the current snapshot under a brief read lock and
/// never hold the lock across I/O or planning. Writers (the builder and the
/// validator) build a new snapshot from the old one and swap it in with a
/// single write-lock acquisition, so a reader mid-query is never blocked on
/// a build and never observes a half-updated descriptor set.
pub struct Registry {
    inner: RwLock<Arc<RegistrySnapshot>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Arc::new(RegistrySnapshot::default())),
        }
    }

    pub fn from_descriptors(descriptors: Vec<MvDescriptor>) -> Self {
        let by_name = descriptors
            .into_iter()
            .map(|d| (d.name.clone(), Arc::new(d)))
            .collect::<HashMap<_, _>>();
        Self {
            inner: RwLock::new(Arc::new(RegistrySnapshot::new(by_name))),
        }
    }

    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.inner.read().expect("registry lock poisoned").clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<MvDescriptor>> {
        self.snapshot().get(name)
    }

    pub fn list_healthy(&self) -> Vec<Arc<MvDescriptor>> {
        self.snapshot().list_healthy()
    }

    /// Registers a newly built descriptor, rejecting it if another
    /// `Healthy` descriptor already shares the same `schema_fingerprint`
    /// under a different name (spec.md §4.1: two MVs must never silently
    /// answer the same shape of query, which would make planner tie-breaks
    /// nondeterministic from the caller's perspective).
    pub fn register(&self, descriptor: MvDescriptor) -> Result<(), AccelError> {
        let mut guard = self.inner.write().expect("registry lock poisoned");
        for existing in guard.all() {
            if existing.name != descriptor.name
                && existing.health == Health::Healthy
                && existing.schema_fingerprint == descriptor.schema_fingerprint
            {
                return Err(AccelError::SchemaDrift {
                    mv_name: descriptor.name.clone(),
                    reason: format!(
                        "schema_fingerprint {} already owned by healthy MV '{}'",
                        descriptor.schema_fingerprint, existing.name
                    ),
                });
            }
        }

        let mut by_name: HashMap<String, Arc<MvDescriptor>> =
            guard.all().map(|d| (d.name.clone(), d.clone())).collect();
        info!(mv = %descriptor.name, health = ?descriptor.health, "registering mv descriptor");
        by_name.insert(descriptor.name.clone(), Arc::new(descriptor));
        *guard = Arc::new(RegistrySnapshot::new(by_name));
        Ok(())
    }

    /// Inserts a placeholder `Missing` descriptor for `name` if the registry
    /// doesn't already know about it, so the builder always has something
    /// to `mark(name, Health::Building)` before a first-ever build.
    pub fn ensure_placeholder(&self, name: &str, grain: Grain) {
        let mut guard = self.inner.write().expect("registry lock poisoned");
        if guard.get(name).is_some() {
            return;
        }
        let placeholder = MvDescriptor {
            name: name.to_string(),
            grain,
            dimensions: Vec::new(),
            filters: Vec::new(),
            measures: BTreeMap::new(),
            schema_fingerprint: 0,
            files: Vec::new(),
            row_count: 0,
            byte_size: 0,
            built_at: chrono::Utc::now(),
            source_watermark: chrono::NaiveDate::from_ymd_opt(1970, 1, 1).unwrap(),
            health: Health::Missing,
        };
        let mut by_name: HashMap<String, Arc<MvDescriptor>> =
            guard.all().map(|d| (d.name.clone(), d.clone())).collect();
        by_name.insert(name.to_string(), Arc::new(placeholder));
        *guard = Arc::new(RegistrySnapshot::new(by_name));
    }

    /// Replaces `descriptor` for its name after validating that its
    /// predecessor's health may legally transition into the new
    /// descriptor's health, and that no other `Healthy` MV already owns its
    /// `schema_fingerprint`. Used by the builder to promote a finished
    /// build from `Building` to `Healthy`.
    pub fn replace_with_transition_check(&self, descriptor: MvDescriptor) -> Result<(), AccelError> {
        let mut guard = self.inner.write().expect("registry lock poisoned");

        if let Some(current) = guard.get(&descriptor.name) {
            if !current.health.can_transition_to(descriptor.health) {
                return Err(AccelError::Integrity {
                    mv_name: descriptor.name.clone(),
                    reason: format!(
                        "illegal transition {:?} -> {:?}",
                        current.health, descriptor.health
                    ),
                });
            }
        }

        for existing in guard.all() {
            if existing.name != descriptor.name
                && existing.health == Health::Healthy
                && descriptor.health == Health::Healthy
                && existing.schema_fingerprint == descriptor.schema_fingerprint
            {
                return Err(AccelError::SchemaDrift {
                    mv_name: descriptor.name.clone(),
                    reason: format!(
                        "schema_fingerprint {} already owned by healthy MV '{}'",
                        descriptor.schema_fingerprint, existing.name
                    ),
                });
            }
        }

        let mut by_name: HashMap<String, Arc<MvDescriptor>> =
            guard.all().map(|d| (d.name.clone(), d.clone())).collect();
        info!(mv = %descriptor.name, health = ?descriptor.health, "promoting mv descriptor");
        by_name.insert(descriptor.name.clone(), Arc::new(descriptor));
        *guard = Arc::new(RegistrySnapshot::new(by_name));
        Ok(())
    }

    /// Transitions a named MV's health, validating against the state
    /// machine of `Health::can_transition_to`. Used by the builder to mark
    /// `Building`, and by the validator to mark `Stale`/`Quarantined`.
    pub fn mark(&self, name: &str, next: Health) -> Result<(), AccelError> {
        let mut guard = self.inner.write().expect("registry lock poisoned");
        let current = guard
            .get(name)
            .ok_or_else(|| AccelError::Input(format!("unknown mv '{name}'")))?;

        if !current.health.can_transition_to(next) {
            return Err(AccelError::Integrity {
                mv_name: name.to_string(),
                reason: format!("illegal transition {:?} -> {:?}", current.health, next),
            });
        }

        if current.health == next {
            return Ok(());
        }

        warn!(mv = name, from = ?current.health, to = ?next, "mv health transition");
        let mut updated = (*current).clone();
        updated.health = next;

        let mut by_name: HashMap<String, Arc<MvDescriptor>> =
            guard.all().map(|d| (d.name.clone(), d.clone())).collect();
        by_name.insert(name.to_string(), Arc::new(updated));
        *guard = Arc::new(RegistrySnapshot::new(by_name));
        Ok(())
    }

    /// Removes a descriptor outright, e.g. after its files are deleted
    /// during retirement cleanup. Not part of the health state machine.
    pub fn remove(&self, name: &str) {
        let mut guard = self.inner.write().expect("registry lock poisoned");
        let mut by_name: HashMap<String, Arc<MvDescriptor>> =
            guard.all().map(|d| (d.name.clone(), d.clone())).collect();
        by_name.remove(name);
        *guard = Arc::new(RegistrySnapshot::new(by_name));
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admv_core::model::Grain;
    use chrono::{NaiveDate, Utc};
    use std::collections::BTreeMap;

    fn descriptor(name: &str, fingerprint: u64, health: Health) -> MvDescriptor {
        MvDescriptor {
            name: name.to_string(),
            grain: Grain::Day,
            dimensions: vec!["country".to_string()],
            filters: vec![],
            measures: BTreeMap::new(),
            schema_fingerprint: fingerprint,
            files: vec![],
            row_count: 0,
            byte_size: 0,
            built_at: Utc::now(),
            source_watermark: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            health,
        }
    }

    #[test]
    fn rejects_duplicate_fingerprint_among_healthy_mvs() {
        let registry = Registry::new();
        registry
            .register(descriptor("rev_by_country_day", 42, Health::Healthy))
            .unwrap();

        let err = registry
            .register(descriptor("rev_by_country_day_v2", 42, Health::Healthy))
            .unwrap_err();
        assert_eq!(err.kind(), "SchemaDriftError");
    }

    #[test]
    fn allows_duplicate_fingerprint_when_other_is_quarantined() {
        let registry = Registry::new();
        registry
            .register(descriptor("old", 7, Health::Quarantined))
            .unwrap();
        registry.register(descriptor("new", 7, Health::Healthy)).unwrap();
        assert_eq!(registry.list_healthy().len(), 1);
    }

    #[test]
    fn mark_rejects_illegal_transition() {
        let registry = Registry::new();
        registry.register(descriptor("mv", 1, Health::Missing)).unwrap();
        let err = registry.mark("mv", Health::Healthy).unwrap_err();
        assert_eq!(err.kind(), "IntegrityError");
    }

    #[test]
    fn mark_allows_legal_transition_chain() {
        let registry = Registry::new();
        registry.register(descriptor("mv", 1, Health::Missing)).unwrap();
        registry.mark("mv", Health::Building).unwrap();
        registry.mark("mv", Health::Healthy).unwrap();
        registry.mark("mv", Health::Stale).unwrap();
        registry.mark("mv", Health::Quarantined).unwrap();
        assert!(registry.get("mv").unwrap().health == Health::Quarantined);
    }

    #[test]
    fn ensure_placeholder_is_idempotent() {
        let registry = Registry::new();
        registry.ensure_placeholder("mv", Grain::Day);
        registry.mark("mv", Health::Building).unwrap();
        registry.ensure_placeholder("mv", Grain::Day);
        assert_eq!(registry.get("mv").unwrap().health, Health::Building);
    }

    #[test]
    fn replace_with_transition_check_rejects_same_fingerprint() {
        let registry = Registry::new();
        registry
            .register(descriptor("existing", 11, Health::Healthy))
            .unwrap();
        registry.ensure_placeholder("new", Grain::Day);
        registry.mark("new", Health::Building).unwrap();

        let err = registry
            .replace_with_transition_check(descriptor("new", 11, Health::Healthy))
            .unwrap_err();
        assert_eq!(err.kind(), "SchemaDriftError");
    }

    #[test]
    fn replace_with_transition_check_promotes_building_to_healthy() {
        let registry = Registry::new();
        registry.ensure_placeholder("mv", Grain::Day);
        registry.mark("mv", Health::Building).unwrap();
        registry
            .replace_with_transition_check(descriptor("mv", 5, Health::Healthy))
            .unwrap();
        assert_eq!(registry.get("mv").unwrap().health, Health::Healthy);
    }
}
