// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use tracing::debug;

/// Assigned sound references, one per channel.
pub const SOUNDS_KEY: &str = "sounds";

/// The working pattern.
pub const SEQUENCE_KEY: &str = "sequence";

/// The working tempo.
pub const BPM_KEY: &str = "bpm";

/// The saved project library.
pub const PROJECTS_KEY: &str = "projects";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid store key {0:?}")]
    InvalidKey(String),

    #[error("unable to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Key/value storage for working state. Values are opaque JSON blobs.
pub trait PersistenceStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn save(&self, key: &str, blob: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Stores each key as `<key>.json` in a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates the store, creating the directory if needed.
    pub fn new(dir: &Path) -> Result<FileStore, StoreError> {
        fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(FileStore {
            dir: dir.to_path_buf(),
        })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl PersistenceStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn save(&self, key: &str, blob: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        // Staged next to the target, then renamed into place.
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, blob)
            .and_then(|_| fs::rename(&staging, &path))
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
        debug!(key, path = %path.display(), "Saved");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}

/// Keeps everything in memory. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

impl PersistenceStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn save(&self, key: &str, blob: &str) -> Result<(), StoreError> {
        self.entries.lock().insert(key.to_string(), blob.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_file_store() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = FileStore::new(&dir.path().join("state"))?;

        assert_eq!(store.load(BPM_KEY)?, None);
        store.save(BPM_KEY, "96")?;
        assert_eq!(store.load(BPM_KEY)?, Some("96".to_string()));
        assert!(dir.path().join("state").join("bpm.json").exists());

        store.save(BPM_KEY, "100")?;
        assert_eq!(store.load(BPM_KEY)?, Some("100".to_string()));

        store.remove(BPM_KEY)?;
        assert_eq!(store.load(BPM_KEY)?, None);
        store.remove(BPM_KEY)?;
        Ok(())
    }

    #[test]
    fn test_file_store_rejects_paths() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = FileStore::new(dir.path())?;

        for key in ["", "../bpm", "a/b", "bpm.json"] {
            assert!(matches!(
                store.save(key, "1"),
                Err(StoreError::InvalidKey(_))
            ));
        }
        Ok(())
    }

    #[test]
    fn test_memory_store() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        store.save(SOUNDS_KEY, "[]")?;
        assert_eq!(store.load(SOUNDS_KEY)?, Some("[]".to_string()));
        store.remove(SOUNDS_KEY)?;
        assert_eq!(store.load(SOUNDS_KEY)?, None);
        Ok(())
    }
}
