//! Store adapters: whole-collection load and save, nothing else.
//!
//! The engine never writes a single record; it hands the adapter the entire
//! resulting collection. Adapters must make each `save` all-or-nothing.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use std::path::PathBuf;

use crate::error::ErrorCode;
use crate::lock::{LockError, LockMode, StoreLock};
use crate::model::item::WorkItem;

/// Persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable at {}: {source}", .path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store at {} holds unreadable data: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("store lock failed: {0}")]
    Lock(#[from] LockError),
}

impl StoreError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Unavailable { .. } => ErrorCode::StoreUnavailable,
            Self::Corrupt { .. } => ErrorCode::CorruptStore,
            Self::Lock(err) => err.code(),
        }
    }
}

/// Held across one load/compute/save step.
///
/// Adapters without cross-process concerns hand out an empty guard.
#[derive(Debug, Default)]
pub struct StoreGuard {
    _lock: Option<StoreLock>,
}

impl StoreGuard {
    #[must_use]
    pub const fn none() -> Self {
        Self { _lock: None }
    }

    #[must_use]
    pub fn holding(lock: StoreLock) -> Self {
        Self { _lock: Some(lock) }
    }
}

/// The persistence collaborator consumed by the engine.
pub trait Store: Send + Sync {
    /// Read the entire collection. An absent or empty store is an empty collection.
    fn load(&self) -> Result<Vec<WorkItem>, StoreError>;

    /// Replace the entire collection.
    fn save(&self, items: &[WorkItem]) -> Result<(), StoreError>;

    /// Guard the backing medium for the duration of one logical step.
    fn guard(&self, _mode: LockMode) -> Result<StoreGuard, StoreError> {
        Ok(StoreGuard::none())
    }
}
