//! Single serialization point over a [`Store`].
//!
//! Every mutation, whether a sweep or a controller call, runs as
//! load-entire-collection → compute → save-entire-collection while holding
//! the ledger's mutex and the store's exclusive guard. Two steps never
//! interleave, so neither can silently overwrite the other's result.

use std::sync::{Arc, Mutex, PoisonError};

use crate::lock::LockMode;
use crate::model::item::WorkItem;
use crate::store::{Store, StoreError};

/// What a transaction body decided to do with the collection it was handed.
#[derive(Debug)]
pub enum Commit<T> {
    /// Persist the (mutated) collection, then return the value.
    Write(T),
    /// Nothing changed; skip the save.
    Discard(T),
}

pub struct Ledger {
    store: Arc<dyn Store>,
    gate: Mutex<()>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger").finish_non_exhaustive()
    }
}

impl Ledger {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            gate: Mutex::new(()),
        }
    }

    /// Read-only copy of the current collection.
    pub fn snapshot(&self) -> Result<Vec<WorkItem>, StoreError> {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        let _guard = self.store.guard(LockMode::Shared)?;
        self.store.load()
    }

    /// Run one read-modify-write step.
    ///
    /// If `body` fails, nothing is written. If the save fails, the store keeps
    /// its previous contents and the error is returned.
    pub fn transact<T, E>(
        &self,
        body: impl FnOnce(&mut Vec<WorkItem>) -> Result<Commit<T>, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        let _guard = self.store.guard(LockMode::Exclusive)?;

        let mut items = self.store.load()?;
        match body(&mut items)? {
            Commit::Write(value) => {
                self.store.save(&items)?;
                Ok(value)
            }
            Commit::Discard(value) => Ok(value),
        }
    }
}
