use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::NamedTempFile;
use tracing::debug;

use super::{Store, StoreError, StoreGuard};
use crate::lock::{LockMode, StoreLock};
use crate::model::item::WorkItem;

/// A JSON array of work items on disk.
///
/// Saves go to a temp file in the same directory and are renamed over the
/// target, so readers only ever see a complete collection.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
}

impl JsonFileStore {
    pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_name = path.file_name().unwrap_or_default().to_os_string();
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);
        Self {
            path,
            lock_path,
            lock_timeout: Self::DEFAULT_LOCK_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    fn unavailable(&self, source: io::Error) -> StoreError {
        StoreError::Unavailable {
            path: self.path.clone(),
            source,
        }
    }

    fn write_atomically(&self, items: &[WorkItem]) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let tmp = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, items).map_err(io::Error::other)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }
}

impl Store for JsonFileStore {
    fn load(&self) -> Result<Vec<WorkItem>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "store file absent, starting empty");
                return Ok(Vec::new());
            }
            Err(err) => return Err(self.unavailable(err)),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, items: &[WorkItem]) -> Result<(), StoreError> {
        self.write_atomically(items)
            .map_err(|err| self.unavailable(err))?;
        debug!(path = %self.path.display(), count = items.len(), "store saved");
        Ok(())
    }

    fn guard(&self, mode: LockMode) -> Result<StoreGuard, StoreError> {
        // Readers of a store that was never written must not create it.
        if mode == LockMode::Shared && !self.path.exists() {
            return Ok(StoreGuard::none());
        }
        let lock = StoreLock::acquire(&self.lock_path, self.lock_timeout, mode)?;
        Ok(StoreGuard::holding(lock))
    }
}

#[cfg(test)]
mod tests {
    use super::JsonFileStore;
    use crate::lock::LockMode;
    use crate::model::item::{Kind, Status, WorkItem};
    use crate::store::{Store, StoreError};
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn sample() -> Vec<WorkItem> {
        let created = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        let mut done = WorkItem::new("r-2", Kind::Request, "alice", "ops", created);
        done.status = Status::Completed;
        done.last_status_update = Some(created);
        vec![
            WorkItem::new("r-1", Kind::Request, "alice", "ops", created).with_title("Badge"),
            done,
        ]
    }

    #[test]
    fn absent_file_is_empty_collection() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("items.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn blank_file_is_empty_collection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        std::fs::write(&path, "  \n").unwrap();
        assert!(JsonFileStore::new(&path).load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load_preserves_items() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/items.json"));
        let items = sample();
        store.save(&items).unwrap();

        assert_eq!(store.load().unwrap(), items);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1, "temp file left behind: {leftovers:?}");
    }

    #[test]
    fn garbage_is_reported_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            JsonFileStore::new(&path).load(),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn unreadable_path_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be.
        let path = dir.path().join("items.json");
        std::fs::create_dir(&path).unwrap();
        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(StoreError::Unavailable { .. })));
        assert!(matches!(
            store.save(&sample()),
            Err(StoreError::Unavailable { .. })
        ));
    }

    #[test]
    fn exclusive_guard_blocks_second_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        let first = JsonFileStore::new(&path);
        let second = JsonFileStore::new(&path).with_lock_timeout(Duration::from_millis(20));
        assert_eq!(first.lock_path(), dir.path().join("items.json.lock"));

        let held = first.guard(LockMode::Exclusive).unwrap();
        assert!(matches!(
            second.guard(LockMode::Exclusive),
            Err(StoreError::Lock(_))
        ));
        drop(held);
        assert!(second.guard(LockMode::Exclusive).is_ok());
    }

    #[test]
    fn reading_an_unwritten_store_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join(".lapse/items.json"));

        let guard = store.guard(LockMode::Shared).unwrap();
        assert!(store.load().unwrap().is_empty());
        drop(guard);
        assert!(!dir.path().join(".lapse").exists());

        store.save(&sample()).unwrap();
        let _guard = store.guard(LockMode::Shared).unwrap();
        assert!(store.lock_path().exists());
    }
}
