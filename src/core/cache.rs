//! Last-entered quantities, persisted per project.
//!
//! Mirrors the document's `localStorage` layer: one entry per project under
//! `<prefix>_<project>`, value is the JSON object of the quantity map. Reads
//! never fail: absent or malformed entries load as empty, and entries whose
//! value is not a number are dropped so the caller falls back to the seed for
//! that key. Writes never surface errors to the caller.

use crate::core::model::QuantityInput;
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const EMISSIONS_PREFIX: &str = "apu_data";

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// String entries kept in one JSON object file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    pub fn open(path: &Path) -> Self {
        let entries = match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "ignoring unreadable cache file");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        FileStore {
            path: path.to_path_buf(),
            entries,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        let text = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&tmp, text).with_context(|| format!("failed to write {}", tmp.display()))?;
        match fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to move cache to {}", self.path.display()))
        {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                Err(e)
            }
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }
}

pub struct QuantityCache<S> {
    store: S,
    prefix: String,
}

impl<S: KeyValueStore> QuantityCache<S> {
    pub fn new(store: S, prefix: &str) -> Self {
        QuantityCache {
            store,
            prefix: prefix.to_string(),
        }
    }

    pub fn key(&self, project: &str) -> String {
        format!("{}_{}", self.prefix, project)
    }

    pub fn load(&self, project: &str) -> QuantityInput {
        let key = self.key(project);
        let Some(raw) = self.store.get(&key) else {
            return QuantityInput::new();
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map
                .into_iter()
                .filter_map(|(k, v)| match v.as_f64() {
                    Some(q) if q.is_finite() => Some((k, q)),
                    _ => {
                        debug!(key = %key, entry = %k, "dropping non-numeric cached quantity");
                        None
                    }
                })
                .collect(),
            Ok(_) => {
                debug!(key = %key, "discarding cached quantities that are not an object");
                QuantityInput::new()
            }
            Err(e) => {
                debug!(key = %key, error = %e, "discarding malformed cached quantities");
                QuantityInput::new()
            }
        }
    }

    pub fn save(&mut self, project: &str, quantities: &QuantityInput) {
        let key = self.key(project);
        let result = serde_json::to_string(quantities)
            .map_err(anyhow::Error::from)
            .and_then(|raw| self.store.set(&key, raw));
        if let Err(e) = result {
            debug!(key = %key, error = %e, "cache write skipped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> QuantityInput {
        let mut q = QuantityInput::new();
        q.insert("hormigon_mortero".to_string(), 333.73);
        q.insert("diesel_obra".to_string(), -12.5);
        q.insert("transporte_excavado".to_string(), 0.0);
        q
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }

        fn set(&mut self, _key: &str, _value: String) -> Result<()> {
            anyhow::bail!("storage unavailable")
        }
    }

    #[test]
    fn round_trip_in_memory() {
        let mut cache = QuantityCache::new(MemoryStore::new(), EMISSIONS_PREFIX);
        cache.save("logroño", &sample());
        assert_eq!(cache.load("logroño"), sample());
        assert!(cache.load("mera").is_empty());
    }

    #[test]
    fn key_pattern_uses_prefix_and_project() {
        let cache = QuantityCache::new(MemoryStore::new(), EMISSIONS_PREFIX);
        assert_eq!(cache.key("rumiñahui"), "apu_data_rumiñahui");
    }

    #[test]
    fn malformed_entry_loads_empty() {
        let mut store = MemoryStore::new();
        store.set("apu_data_mera", "not json {".to_string()).unwrap();
        store.set("apu_data_logroño", "[1,2,3]".to_string()).unwrap();
        let cache = QuantityCache::new(store, EMISSIONS_PREFIX);
        assert!(cache.load("mera").is_empty());
        assert!(cache.load("logroño").is_empty());
    }

    #[test]
    fn non_numeric_entries_are_dropped_individually() {
        let mut store = MemoryStore::new();
        store
            .set(
                "apu_data_rumiñahui",
                r#"{"asfalto":"mucho","hormigon_mortero":5,"pvc_tuberia":null,"diesel_obra":"12"}"#
                    .to_string(),
            )
            .unwrap();
        let cache = QuantityCache::new(store, EMISSIONS_PREFIX);
        let loaded = cache.load("rumiñahui");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["hormigon_mortero"], 5.0);
    }

    #[test]
    fn unavailable_store_fails_silently() {
        let mut cache = QuantityCache::new(BrokenStore, EMISSIONS_PREFIX);
        cache.save("logroño", &sample());
        assert!(cache.load("logroño").is_empty());
    }

    #[test]
    fn file_store_persists_across_opens() {
        let dir = std::env::temp_dir().join(format!("carbon-report-cache-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cache.json");
        let _ = fs::remove_file(&path);

        let mut cache = QuantityCache::new(FileStore::open(&path), EMISSIONS_PREFIX);
        cache.save("mera", &sample());
        drop(cache);

        let reopened = QuantityCache::new(FileStore::open(&path), EMISSIONS_PREFIX);
        assert_eq!(reopened.load("mera"), sample());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_cache_file_opens_empty() {
        let dir = std::env::temp_dir().join(format!("carbon-report-corrupt-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cache.json");
        fs::write(&path, "\u{0}garbage").unwrap();
        let cache = QuantityCache::new(FileStore::open(&path), EMISSIONS_PREFIX);
        assert!(cache.load("logroño").is_empty());
        let _ = fs::remove_dir_all(&dir);
    }
}
