use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One build lock per MV name, so two concurrent build requests for the
/// same MV serialize while builds of different MVs proceed in parallel
/// (spec.md §4.2: "at most one in-flight build per MV name").
#[derive(Default)]
pub struct BuildLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl BuildLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, name: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().expect("build-locks map poisoned");
        locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Acquires the build lock for `name`, blocking other builders of the
    /// same MV until the returned guard is dropped.
    pub async fn acquire(&self, name: &str) -> OwnedMutexGuard<()> {
        self.lock_for(name).lock_owned().await
    }
}
