//! Хранилище ключ-значение
//!
//! Прогресс, избранное и настройки хранятся как JSON-строки под
//! строковыми ключами. Хранилище передаётся менеджерам как
//! `Arc<dyn KeyValueStore>`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use crate::error::{LessonError, Result};

/// Хранилище строковых значений по строковым ключам
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Все ключи в порядке возрастания
    fn keys(&self) -> Result<Vec<String>>;

    /// Удалить ключ; возвращает `true`, если он существовал
    fn remove(&self, key: &str) -> Result<bool>;
}

/// Прочитать JSON-значение
///
/// Повреждённое значение считается отсутствующим.
pub fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            log::warn!("Ignoring corrupt value under '{}': {}", key, e);
            Ok(None)
        }
    }
}

/// Записать значение как JSON
pub fn write_json<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

/// Хранилище в памяти
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.lock().keys().cloned().collect())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.entries.lock().remove(key).is_some())
    }
}

/// Хранилище в одном JSON-файле
///
/// Каждое изменение переписывает файл целиком через временный файл
/// и переименование.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Открыть хранилище; отсутствующий файл создаётся при первой записи
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    log::warn!("Store file {} is corrupt, starting empty: {}", path.display(), e);
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        log::debug!("Opened store {} with {} keys", path.display(), entries.len());
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| LessonError::Storage(format!("Invalid store path: {}", self.path.display())))?
            .to_string_lossy();
        let temp_path = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        let json = serde_json::to_string_pretty(entries)?;
        fs::write(&temp_path, json)?;
        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.lock().keys().cloned().collect())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_none() {
            return Ok(false);
        }
        self.persist(&entries)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        speed: f32,
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.is_empty());

        store.set("b", "2").unwrap();
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap(), Some("1".to_string()));
        assert_eq!(store.keys().unwrap(), vec!["a", "b"]);

        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_json_helpers_treat_corrupt_value_as_missing() {
        let store = MemoryStore::new();
        write_json(&store, "sample", &Sample { speed: 1.25 }).unwrap();
        let value: Option<Sample> = read_json(&store, "sample").unwrap();
        assert_eq!(value, Some(Sample { speed: 1.25 }));

        store.set("sample", "{not json").unwrap();
        let value: Option<Sample> = read_json(&store, "sample").unwrap();
        assert_eq!(value, None);

        let missing: Option<Sample> = read_json(&store, "missing").unwrap();
        assert_eq!(missing, None);
    }

    #[test]
    fn test_file_store_persists_between_opens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        {
            let store = JsonFileStore::open(&path).unwrap();
            store.set("nce_playback_speed", "1.5").unwrap();
            store.set("other", "x").unwrap();
            assert!(store.remove("other").unwrap());
        }

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get("nce_playback_speed").unwrap(), Some("1.5".to_string()));
        assert_eq!(store.keys().unwrap(), vec!["nce_playback_speed"]);

        // Временные файлы не остаются
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_corrupt_file_opens_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "definitely not json").unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        assert!(store.keys().unwrap().is_empty());

        store.set("k", "v").unwrap();
        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("k").unwrap(), Some("v".to_string()));
    }
}
