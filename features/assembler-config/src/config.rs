use std::{ops::Deref, sync::Arc};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ConfigError;

/// Key used in errors when the whole configuration is deserialized at once
const WHOLE_CONFIGURATION: &str = "<configuration>";

/// Key/value configuration attached to a component.
///
/// Every component carries a base configuration (declared with its definition or
/// with its injection), which is merged with the configuration passed at build time.
///
/// # Example
/// ```rust
/// use assembler_config::config::Configuration;
///
/// let base = Configuration::new().with("host", "localhost").with("port", 8080);
/// let runtime = Configuration::new().with("port", 9090).with("tls", true);
///
/// let merged = base.merge(Some(&runtime));
/// assert_eq!(merged.get::<u16>("port").unwrap(), Some(9090));
/// assert_eq!(merged.get::<String>("host").unwrap().as_deref(), Some("localhost"));
/// assert_eq!(merged.get::<bool>("tls").unwrap(), Some(true));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration(Map<String, Value>);

impl Configuration {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builds a configuration out of a JSON object
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            other => Err(ConfigError::NotAnObject(other.to_string())),
        }
    }

    /// Sets a value, returning the configuration for chaining
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Reads a single value as `T`.
    ///
    /// Returns `Ok(None)` if the key is absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.0
            .get(key)
            .map(|value| {
                serde_json::from_value(value.clone()).map_err(|e| ConfigError::Deserialize {
                    key: key.to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()
    }

    /// Deserializes the whole configuration into `T`
    pub fn extract<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        serde_json::from_value(Value::Object(self.0.clone())).map_err(|e| {
            ConfigError::Deserialize {
                key: WHOLE_CONFIGURATION.to_string(),
                message: e.to_string(),
            }
        })
    }

    /// Merges a runtime configuration over this one.
    ///
    /// Keys present in `runtime` win, keys only present in `runtime` are added.
    /// The merge is shallow: nested objects are replaced, not merged.
    pub fn merge(&self, runtime: Option<&Configuration>) -> Configuration {
        let mut merged = self.clone();
        if let Some(runtime) = runtime {
            for (key, value) in &runtime.0 {
                merged.0.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Configuration {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// A typed view over a [`Configuration`]
///
/// Lets a component read its merged configuration as a plain struct
///
/// # Example
/// ```rust
/// use assembler_config::config::{Config, Configuration};
///
/// #[derive(serde::Deserialize)]
/// struct ServerConfig {
///     host: String,
///     port: u16,
/// }
///
/// let configuration = Configuration::new().with("host", "localhost").with("port", 8080);
/// let config = Config::<ServerConfig>::from_configuration(&configuration).unwrap();
/// assert_eq!(config.port, 8080);
/// ```
pub struct Config<T> {
    inner: Arc<T>,
}
impl<T> Deref for Config<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
impl<T> Clone for Config<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}
impl<T> Config<T> {
    pub fn inner(&self) -> Arc<T> {
        self.inner.clone()
    }

    pub fn into_inner(self) -> Arc<T> {
        self.inner
    }
}
impl<T: DeserializeOwned> Config<T> {
    pub fn from_configuration(configuration: &Configuration) -> Result<Self, ConfigError> {
        Ok(Config {
            inner: Arc::new(configuration.extract()?),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn merge_lets_runtime_values_win() {
        let base = Configuration::new().with("a", 1).with("b", "base");
        let runtime = Configuration::new().with("b", "runtime").with("c", true);

        let merged = base.merge(Some(&runtime));

        assert_eq!(merged.value("a"), Some(&json!(1)));
        assert_eq!(merged.value("b"), Some(&json!("runtime")));
        assert_eq!(merged.value("c"), Some(&json!(true)));
        // Base is left untouched
        assert_eq!(base.value("b"), Some(&json!("base")));
    }

    #[test]
    fn merge_without_runtime_is_a_copy() {
        let base = Configuration::new().with("a", 1);
        assert_eq!(base.merge(None), base);
    }

    #[test]
    fn from_value_rejects_non_objects() {
        assert!(Configuration::from_value(json!({"a": 1})).is_ok());
        assert!(Configuration::from_value(Value::Null).unwrap().is_empty());
        assert_eq!(
            Configuration::from_value(json!([1, 2])),
            Err(ConfigError::NotAnObject("[1,2]".to_string()))
        );
    }

    #[test]
    fn get_reports_the_offending_key() {
        let configuration = Configuration::new().with("port", "not-a-number");
        let err = configuration.get::<u16>("port").unwrap_err();
        assert!(matches!(err, ConfigError::Deserialize { key, .. } if key == "port"));
        assert_eq!(configuration.get::<u16>("missing"), Ok(None));
    }

    #[test]
    fn typed_config_reads_the_whole_map() {
        #[derive(serde::Deserialize)]
        struct Limits {
            max: u32,
            #[serde(default)]
            strict: bool,
        }

        let configuration: Configuration = [("max", json!(10))].into_iter().collect();
        let config = Config::<Limits>::from_configuration(&configuration).unwrap();
        assert_eq!(config.max, 10);
        assert!(!config.strict);
    }
}
