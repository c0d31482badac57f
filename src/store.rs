//! Persisted puzzle state.
//!
//! Two layers:
//! - `KeyValueStore`: the raw capability (get/set/remove by string key) with
//!   a file-per-key implementation and an in-memory one.
//! - `load_record` / `save_record` / `clear_record`: versioned JSON records on
//!   top of it. Anything that does not parse, carries another version, or
//!   fails its own shape check is treated as absent.

use crate::debug_log;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const SAVED_AT_FIELD: &str = "savedAt";
const VERSION_FIELD: &str = "version";

pub trait KeyValueStore {
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&self, key: &str) -> io::Result<()>;
}

/// One `<key>.json` file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        // Write-then-rename so a crash never leaves half a record behind
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Store that lives for one process; used in tests and when no data
/// directory can be found.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// A puzzle state that can be written to and read back from a store.
pub trait Persisted: Serialize + DeserializeOwned {
    const STORAGE_KEY: &'static str;
    const VERSION: u32;

    /// Shape check run after a successful parse. Records failing it are
    /// dropped as if they were never saved.
    fn is_valid(&self) -> bool;
}

/// Read `T` from the store. Missing, unreadable, foreign-version and
/// malformed records all come back as `None`.
pub fn load_record<T: Persisted>(store: &dyn KeyValueStore) -> Option<T> {
    let raw = match store.get(T::STORAGE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            log::warn!("Failed to read '{}': {}", T::STORAGE_KEY, e);
            return None;
        }
    };
    let record = decode_record::<T>(&raw);
    if record.is_none() {
        debug_log!("Discarding unusable record for '{}'", T::STORAGE_KEY);
    }
    record
}

fn decode_record<T: Persisted>(raw: &str) -> Option<T> {
    let Value::Object(mut fields) = serde_json::from_str::<Value>(raw).ok()? else {
        return None;
    };
    let version = fields.remove(VERSION_FIELD)?.as_u64()?;
    if version != u64::from(T::VERSION) {
        return None;
    }
    fields.remove(SAVED_AT_FIELD);
    let state: T = serde_json::from_value(Value::Object(fields)).ok()?;
    state.is_valid().then_some(state)
}

fn encode_record<T: Persisted>(state: &T, saved_at: i64) -> Option<String> {
    let Value::Object(body) = serde_json::to_value(state).ok()? else {
        return None;
    };
    let mut fields = Map::new();
    fields.insert(VERSION_FIELD.to_string(), Value::from(T::VERSION));
    fields.extend(body);
    fields.insert(SAVED_AT_FIELD.to_string(), Value::from(saved_at));
    serde_json::to_string(&Value::Object(fields)).ok()
}

/// Fire-and-forget write. Failures are logged and otherwise ignored so the
/// in-memory game keeps going.
pub fn save_record<T: Persisted>(store: &dyn KeyValueStore, state: &T) {
    let Some(encoded) = encode_record(state, chrono::Utc::now().timestamp_millis()) else {
        log::warn!("Failed to encode '{}'", T::STORAGE_KEY);
        return;
    };
    if let Err(e) = store.set(T::STORAGE_KEY, &encoded) {
        log::warn!("Failed to save '{}': {}", T::STORAGE_KEY, e);
    }
}

pub fn clear_record<T: Persisted>(store: &dyn KeyValueStore) {
    clear_key(store, T::STORAGE_KEY);
}

pub fn clear_key(store: &dyn KeyValueStore, key: &str) {
    if let Err(e) = store.remove(key) {
        log::warn!("Failed to clear '{}': {}", key, e);
    }
}
