use crate::storage::LocalStorage;

pub const API_KEY_STORAGE_KEY: &str = "careerpal_gemini_api_key_v1";
pub const DEV_KEY_ENV: &str = "GEMINI_API_KEY";

/// Holder of the single API secret. Blank values count as absent.
pub trait CredentialStore: Send {
    fn get(&self) -> String;
    fn set(&mut self, value: &str);
    fn clear(&mut self);

    fn has_key(&self) -> bool {
        !self.get().is_empty()
    }
}

/// Key persisted in [`LocalStorage`], with an optional fallback consulted only
/// when nothing is stored.
#[derive(Debug, Clone)]
pub struct StoredCredential {
    storage: LocalStorage,
    fallback: Option<String>,
}

impl StoredCredential {
    pub fn new(storage: LocalStorage) -> Self {
        Self {
            storage,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Option<String>) -> Self {
        self.fallback = fallback.filter(|k| !k.trim().is_empty());
        self
    }

    /// Picks up `GEMINI_API_KEY` in debug builds; release builds never read it.
    pub fn with_dev_fallback(self) -> Self {
        let fallback = if cfg!(debug_assertions) {
            std::env::var(DEV_KEY_ENV).ok()
        } else {
            None
        };
        self.with_fallback(fallback)
    }
}

impl CredentialStore for StoredCredential {
    fn get(&self) -> String {
        if let Some(stored) = self.storage.get_item(API_KEY_STORAGE_KEY) {
            let stored = stored.trim();
            if !stored.is_empty() {
                return stored.to_string();
            }
        }
        self.fallback
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    }

    fn set(&mut self, value: &str) {
        self.storage.set_item(API_KEY_STORAGE_KEY, value.trim());
    }

    fn clear(&mut self) {
        self.storage.remove_item(API_KEY_STORAGE_KEY);
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCredential {
    value: Option<String>,
}

impl MemoryCredential {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(key: &str) -> Self {
        let mut store = Self::new();
        store.set(key);
        store
    }
}

impl CredentialStore for MemoryCredential {
    fn get(&self) -> String {
        self.value
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    }

    fn set(&mut self, value: &str) {
        self.value = Some(value.trim().to_string());
    }

    fn clear(&mut self) {
        self.value = None;
    }
}
