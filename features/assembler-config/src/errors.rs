/// Errors when reading or registering configuration values
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A configuration was built from something other than a JSON object
    #[error("A configuration must be a JSON object, got '{0}'")]
    NotAnObject(String),
    /// A value could not be deserialized into the requested type
    #[error("Configuration value '{key}' could not be read: {message}")]
    Deserialize { key: String, message: String },
    /// A global was declared twice with two different values
    #[error("Global '{key}' is already registered with a different value")]
    GlobalConflict { key: String },
}
