use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{Store, StoreError};
use crate::model::item::WorkItem;

/// In-process store. Useful for tests and for embedding the engine in a host
/// that persists elsewhere.
///
/// Reads and writes can be made to fail on demand to exercise the
/// store-unavailable paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<Vec<WorkItem>>,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_items(items: Vec<WorkItem>) -> Self {
        Self {
            items: Mutex::new(items),
            ..Self::default()
        }
    }

    /// Make subsequent loads fail until switched off again.
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent saves fail until switched off again.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Copy of the current contents, bypassing failure injection.
    #[must_use]
    pub fn contents(&self) -> Vec<WorkItem> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn offline(what: &str) -> StoreError {
        StoreError::Unavailable {
            path: PathBuf::from("memory"),
            source: io::Error::other(format!("{what} disabled")),
        }
    }
}

impl Store for MemoryStore {
    fn load(&self) -> Result<Vec<WorkItem>, StoreError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(Self::offline("load"));
        }
        Ok(self.contents())
    }

    fn save(&self, items: &[WorkItem]) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Self::offline("save"));
        }
        *self.items.lock().unwrap_or_else(PoisonError::into_inner) = items.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::model::item::{Kind, WorkItem};
    use crate::store::{Store, StoreError};
    use chrono::Utc;

    #[test]
    fn empty_store_loads_empty_collection() {
        let store = MemoryStore::new();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn save_replaces_whole_collection() {
        let now = Utc::now();
        let store = MemoryStore::with_items(vec![WorkItem::new(
            "a",
            Kind::Request,
            "alice",
            "ops",
            now,
        )]);
        store
            .save(&[WorkItem::new("b", Kind::Project, "bob", "it", now)])
            .unwrap();

        let ids: Vec<_> = store.load().unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["b"]);
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn injected_failures_surface_as_unavailable() {
        let store = MemoryStore::new();
        store.fail_saves(true);
        assert!(matches!(
            store.save(&[]),
            Err(StoreError::Unavailable { .. })
        ));
        assert_eq!(store.save_count(), 0);

        store.fail_loads(true);
        assert!(store.load().is_err());
        store.fail_loads(false);
        assert!(store.load().is_ok());
    }
}
