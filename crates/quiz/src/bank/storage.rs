use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

pub const QUESTIONS_KEY: &str = "questions";
pub const THEME_KEY: &str = "theme";
pub const SCENE_KEY: &str = "scene";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to write key {key} at {path}: {source}")]
    Write {
        key: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to remove key {key} at {path}: {source}")]
    Remove {
        key: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Durable key-value port over plain string values. Absence and
/// unreadability both surface as `None`; callers treat that as "use
/// defaults" and never as fatal.
pub trait QuizStorage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// One file per key under a state directory. Writes go through a temp
/// file plus rename so a crash mid-write never leaves a half blob.
#[derive(Debug, Clone)]
pub struct FileStorage {
    state_dir: PathBuf,
}

impl FileStorage {
    pub fn new(state_dir: PathBuf) -> Self {
        Self { state_dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.state_dir.join(key)
    }
}

impl QuizStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(value) => Some(value),
            Err(error) if error.kind() == io::ErrorKind::NotFound => None,
            Err(error) => {
                warn!(key, path = %path.display(), %error, "treating unreadable entry as absent");
                None
            }
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        write_text_atomic(&path, value).map_err(|source| StorageError::Write {
            key: key.to_string(),
            path,
            source,
        })
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Remove {
                key: key.to_string(),
                path,
                source,
            }),
        }
    }
}

fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_path_for(path);
    fs::write(&tmp_path, text)?;

    match fs::remove_file(path) {
        Ok(()) => {}
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => {
            let _ = fs::remove_file(&tmp_path);
            return Err(error);
        }
    }
    if let Err(error) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("entry");
    let tmp_name = format!("{file_name}.tmp");
    match path.parent() {
        Some(parent) => parent.join(tmp_name),
        None => PathBuf::from(tmp_name),
    }
}

/// In-memory stand-in for tests and headless tooling.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let mut storage = Self::default();
        storage
            .entries
            .insert(key.to_string(), value.to_string());
        storage
    }
}

impl QuizStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_storage_round_trips_and_overwrites() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut storage = FileStorage::new(dir.path().to_path_buf());

        assert_eq!(storage.get("questions"), None);
        storage.set("questions", "[1]").expect("first write");
        assert_eq!(storage.get("questions").as_deref(), Some("[1]"));
        storage.set("questions", "[1,2]").expect("overwrite");
        assert_eq!(storage.get("questions").as_deref(), Some("[1,2]"));
    }

    #[test]
    fn file_storage_leaves_no_temp_files_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut storage = FileStorage::new(dir.path().to_path_buf());
        storage.set("theme", "campfire").expect("write");

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .expect("read dir")
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn removing_an_absent_key_is_not_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut storage = FileStorage::new(dir.path().to_path_buf());
        storage.remove("scene").expect("remove absent");

        storage.set("scene", "forest").expect("write");
        storage.remove("scene").expect("remove present");
        assert_eq!(storage.get("scene"), None);
    }

    #[test]
    fn memory_storage_behaves_like_the_file_port() {
        let mut storage = MemoryStorage::with_entry("theme", "forest");
        assert_eq!(storage.get("theme").as_deref(), Some("forest"));
        storage.set("theme", "mono-dark").expect("set");
        assert_eq!(storage.get("theme").as_deref(), Some("mono-dark"));
        storage.remove("theme").expect("remove");
        assert_eq!(storage.get("theme"), None);
    }
}
