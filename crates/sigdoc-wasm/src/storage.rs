//! `sessionStorage`-backed key/value store for the selection cache.

use sigdoc_core::{KeyValueStore, MemoryStore};

/// Tab-scoped storage. Falls back to memory when `sessionStorage` is
/// unavailable (sandboxed iframes, some private modes, native builds).
pub enum BrowserStore {
    Session(web_sys::Storage),
    Memory(MemoryStore),
}

impl BrowserStore {
    pub fn detect() -> Self {
        #[cfg(target_arch = "wasm32")]
        {
            if let Some(storage) = web_sys::window().and_then(|w| w.session_storage().ok().flatten())
            {
                return BrowserStore::Session(storage);
            }
            log::warn!("sessionStorage unavailable; selection will not survive reload");
        }
        BrowserStore::Memory(MemoryStore::new())
    }
}

impl KeyValueStore for BrowserStore {
    fn get(&self, key: &str) -> Option<String> {
        match self {
            BrowserStore::Session(storage) => storage.get_item(key).ok().flatten(),
            BrowserStore::Memory(store) => store.get(key),
        }
    }

    fn set(&mut self, key: &str, value: &str) {
        match self {
            BrowserStore::Session(storage) => {
                if storage.set_item(key, value).is_err() {
                    log::warn!("sessionStorage write for `{key}` failed");
                }
            }
            BrowserStore::Memory(store) => store.set(key, value),
        }
    }

    fn remove(&mut self, key: &str) {
        match self {
            BrowserStore::Session(storage) => {
                let _ = storage.remove_item(key);
            }
            BrowserStore::Memory(store) => store.remove(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn native_builds_use_memory() {
        let mut store = BrowserStore::detect();
        assert!(matches!(store, BrowserStore::Memory(_)));
        store.set("inputMode", "\"file\"");
        assert_eq!(store.get("inputMode").as_deref(), Some("\"file\""));
        store.remove("inputMode");
        assert_eq!(store.get("inputMode"), None);
    }
}
