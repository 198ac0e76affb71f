//! Ephemeral selection cache.
//!
//! Mirrors the current selection to a string key-value store (browser
//! `sessionStorage`, or memory) so a reload does not lose a multi-record
//! selection. Best-effort only: a missing, corrupt or stale entry is removed
//! and reads as absent.

use crate::model::Record;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const CURRENT_AGREEMENT_KEY: &str = "currentAgreement";
pub const INPUT_MODE_KEY: &str = "inputMode";
pub const PARSED_DATA_KEY: &str = "parsedData";

const ENVELOPE_VERSION: u32 = 1;

/// A string key-value store scoped to the browser session.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    /// Writes may silently fail (quota, private browsing).
    fn set(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str);
}

/// In-process store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

/// How the current record was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    File,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    /// Entries older than this are treated as absent.
    pub max_age_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_ms: 12 * 60 * 60 * 1000,
        }
    }
}

/// Whatever could be recovered from the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoredSelection {
    pub current: Option<Record>,
    pub input_mode: Option<InputMode>,
    pub parsed: Vec<Record>,
}

impl RestoredSelection {
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.input_mode.is_none() && self.parsed.is_empty()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    version: u32,
    saved_at_ms: u64,
    value: T,
}

pub struct SelectionCache<S> {
    store: S,
    config: CacheConfig,
}

impl<S: KeyValueStore> SelectionCache<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, CacheConfig::default())
    }

    pub fn with_config(store: S, config: CacheConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn save_current(&mut self, record: &Record, mode: InputMode, now_ms: u64) {
        self.put(CURRENT_AGREEMENT_KEY, record, now_ms);
        self.put(INPUT_MODE_KEY, &mode, now_ms);
    }

    pub fn save_parsed(&mut self, records: &[Record], now_ms: u64) {
        self.put(PARSED_DATA_KEY, &records, now_ms);
    }

    /// Read back every entry, dropping the ones that cannot be used.
    pub fn restore(&mut self, now_ms: u64) -> RestoredSelection {
        RestoredSelection {
            current: self.take(CURRENT_AGREEMENT_KEY, now_ms),
            input_mode: self.take(INPUT_MODE_KEY, now_ms),
            parsed: self
                .take::<Vec<Record>>(PARSED_DATA_KEY, now_ms)
                .unwrap_or_default(),
        }
    }

    pub fn clear(&mut self) {
        for key in [CURRENT_AGREEMENT_KEY, INPUT_MODE_KEY, PARSED_DATA_KEY] {
            self.store.remove(key);
        }
    }

    fn put<T: Serialize>(&mut self, key: &str, value: &T, now_ms: u64) {
        let envelope = Envelope {
            version: ENVELOPE_VERSION,
            saved_at_ms: now_ms,
            value,
        };
        match serde_json::to_string(&envelope) {
            Ok(json) => self.store.set(key, &json),
            Err(err) => log::warn!("cannot cache {key}: {err}"),
        }
    }

    fn take<T: DeserializeOwned>(&mut self, key: &str, now_ms: u64) -> Option<T> {
        let raw = self.store.get(key)?;
        let envelope = match serde_json::from_str::<Envelope<T>>(&raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                log::warn!("discarding corrupt {key} entry: {err}");
                self.store.remove(key);
                return None;
            }
        };
        if envelope.version != ENVELOPE_VERSION {
            log::warn!("discarding {key} entry with version {}", envelope.version);
            self.store.remove(key);
            return None;
        }
        if now_ms.saturating_sub(envelope.saved_at_ms) > self.config.max_age_ms {
            log::debug!("discarding stale {key} entry");
            self.store.remove(key);
            return None;
        }
        Some(envelope.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn jane() -> Record {
        Record::new("Jane Smith", "Office Chair", "CH002")
    }

    #[test]
    fn round_trip_selection() {
        let mut cache = SelectionCache::new(MemoryStore::new());
        cache.save_parsed(&[jane(), Record::new("Bob", "Laptop", "LP1")], 1_000);
        cache.save_current(&jane(), InputMode::File, 1_000);

        let restored = cache.restore(2_000);
        assert_eq!(restored.current, Some(jane()));
        assert_eq!(restored.input_mode, Some(InputMode::File));
        assert_eq!(restored.parsed.len(), 2);
    }

    #[test]
    fn corrupt_entry_is_removed() {
        let mut store = MemoryStore::new();
        store.set(PARSED_DATA_KEY, "{not json");
        store.set(INPUT_MODE_KEY, r#"{"version":1,"savedAtMs":0,"value":"carrier-pigeon"}"#);
        let mut cache = SelectionCache::new(store);

        let restored = cache.restore(10);
        assert!(restored.is_empty());
        assert!(cache.store().is_empty());
    }

    #[test]
    fn stale_entry_is_dropped() {
        let config = CacheConfig { max_age_ms: 100 };
        let mut cache = SelectionCache::with_config(MemoryStore::new(), config);
        cache.save_current(&jane(), InputMode::Manual, 0);

        assert_eq!(cache.restore(50).input_mode, Some(InputMode::Manual));
        assert!(cache.restore(500).current.is_none());
        assert!(cache.store().is_empty());
    }

    #[test]
    fn clear_removes_all_keys() {
        let mut cache = SelectionCache::new(MemoryStore::new());
        cache.save_current(&jane(), InputMode::File, 0);
        cache.save_parsed(&[jane()], 0);
        cache.clear();
        assert!(cache.store().is_empty());
    }
}
