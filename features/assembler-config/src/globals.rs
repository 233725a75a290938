use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, OnceLock, PoisonError, RwLock},
};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::ConfigError;

static SHARED: OnceLock<Globals> = OnceLock::new();

/// A store for named values declared by components.
///
/// Values can be registered and retrieved by key from any resolution context
/// sharing the store. [`Globals::shared`] is the process-wide default.
#[derive(Clone, Default)]
pub struct Globals {
    values: Arc<RwLock<HashMap<String, Value>>>,
}

impl fmt::Debug for Globals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<&String> = values.keys().collect();
        keys.sort();
        f.debug_tuple("Globals").field(&keys).finish()
    }
}

impl Globals {
    /// Initializes an empty, isolated store
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide store
    pub fn shared() -> Globals {
        SHARED.get_or_init(Globals::new).clone()
    }

    /// Retrieve a global by key
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Retrieve a global by key, deserialized as `T`
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.get(key)
            .map(|value| {
                serde_json::from_value(value).map_err(|e| ConfigError::Deserialize {
                    key: key.to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Add a global to the store.
    ///
    /// Adding a key again with an equal value is a no-op, the same component may be
    /// registered by several contexts. A different value returns a
    /// [`ConfigError::GlobalConflict`].
    pub fn add(&self, key: impl Into<String>, value: Value) -> Result<&Self, ConfigError> {
        let key = key.into();
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);

        match values.get(&key) {
            Some(existing) if *existing == value => {}
            Some(_) => return Err(ConfigError::GlobalConflict { key }),
            None => {
                tracing::debug!("Registered global '{key}'");
                values.insert(key, value);
            }
        }

        Ok(self)
    }

    /// Removes every global
    pub fn reset(&self) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
