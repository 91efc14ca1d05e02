use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fd_lock::RwLock;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("unable to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("unable to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("corrupt store {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("store lock poisoned")]
    Poisoned,
}

/// Durable string key/value mapping holding configuration and controller state.
///
/// Every call is a complete read or write of one key; callers never hold a
/// lock across calls. Concurrent writers are last-writer-wins per key.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
    fn entries(&self) -> Result<BTreeMap<String, String>, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    map: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            map: Mutex::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let map = self.map.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut map = self.map.lock().map_err(|_| StoreError::Poisoned)?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut map = self.map.lock().map_err(|_| StoreError::Poisoned)?;
        map.remove(key);
        Ok(())
    }

    fn entries(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let map = self.map.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(map.clone())
    }
}

/// A flat JSON object on disk.
///
/// Each write takes an exclusive lock on `<path>.lock`, re-reads the file,
/// applies one change and replaces the file via rename. Processes sharing the
/// file (a `watch` loop next to a `tap`) never drop each other's keys, and a
/// crash never leaves a half-written store behind.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_path = path.clone().into_os_string();
        lock_path.push(".lock");
        Self {
            path,
            lock_path: PathBuf::from(lock_path),
        }
    }

    /// `<config dir>/pc-power/state.json`, or `./pc-power-state.json` when the
    /// platform has no config dir.
    pub fn default_path() -> PathBuf {
        match dirs::config_dir() {
            Some(dir) => dir.join("pc-power").join("state.json"),
            None => PathBuf::from("pc-power-state.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }

    fn write_err(&self, e: io::Error) -> StoreError {
        StoreError::Write {
            path: self.display_path(),
            source: e,
        }
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(StoreError::Read {
                    path: self.display_path(),
                    source: e,
                })
            }
        };
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&text).map_err(|e| StoreError::Corrupt {
            path: self.display_path(),
            source: e,
        })
    }

    /// Caller holds the file lock.
    fn save(&self, map: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(map)
            .map_err(|e| self.write_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        let mut tmp = NamedTempFile::new_in(self.parent_dir()).map_err(|e| self.write_err(e))?;
        tmp.write_all(text.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| self.write_err(e))?;
        tmp.persist(&self.path)
            .map_err(|e| self.write_err(e.error))?;
        Ok(())
    }

    fn update<F>(&self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        fs::create_dir_all(self.parent_dir()).map_err(|e| self.write_err(e))?;
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(|e| self.write_err(e))?;
        let mut lock = RwLock::new(lock_file);
        let _guard = lock.write().map_err(|e| self.write_err(e))?;

        let mut map = self.load()?;
        f(&mut map);
        self.save(&map)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|map| {
            map.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|map| {
            map.remove(key);
        })
    }

    fn entries(&self) -> Result<BTreeMap<String, String>, StoreError> {
        self.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let store = FileStore::open(&path);
        assert_eq!(store.get("pc_status").unwrap(), None);
        store.set("pc_status", "pending_wol").unwrap();
        store.set("shutdown_fail_count", "2").unwrap();

        let reopened = FileStore::open(&path);
        assert_eq!(
            reopened.get("pc_status").unwrap().as_deref(),
            Some("pending_wol")
        );
        reopened.remove("shutdown_fail_count").unwrap();
        assert_eq!(store.get("shutdown_fail_count").unwrap(), None);
        assert_eq!(store.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_file_store_reports_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "not json").unwrap();

        let err = FileStore::open(&path).get("pc_status").unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn test_file_store_handles_do_not_lose_each_others_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        let writers: Vec<_> = ["a", "b"]
            .into_iter()
            .map(|prefix| {
                let store = FileStore::open(&path);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        store.set(&format!("{prefix}{i}"), "1").unwrap();
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }

        let entries = FileStore::open(&path).entries().unwrap();
        assert_eq!(entries.len(), 200);
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n != "state.json" && n != "state.json.lock")
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[test]
    fn test_memory_store_seeded_entries() {
        let store = MemoryStore::with_entries([("pc_ip", "10.0.0.5")]);
        assert_eq!(store.get("pc_ip").unwrap().as_deref(), Some("10.0.0.5"));
        store.remove("pc_ip").unwrap();
        assert!(store.entries().unwrap().is_empty());
    }
}
