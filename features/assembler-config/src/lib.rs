//! Assembler Config provides the configuration records consumed by the assembler
//! runtime.
//!
//! It is split into three parts:
//! 1. Configuration: the key/value record attached to each component, with merge semantics
//! 2. Config<T>: a typed view over a configuration
//! 3. Globals: a store of named values shared between resolution contexts
//!
//! # Examples
//!
//! ```rust
//! use assembler_config::{config::Configuration, globals::Globals};
//! use serde_json::json;
//!
//! #[derive(serde::Deserialize)]
//! struct AppConfig {
//!     host: String,
//!     port: u16,
//! }
//!
//! let declared = Configuration::new().with("host", "localhost").with("port", 8080);
//! let runtime = Configuration::new().with("port", 9000);
//!
//! let app_config: AppConfig = declared.merge(Some(&runtime)).extract().unwrap();
//! assert_eq!(app_config.host, "localhost");
//! assert_eq!(app_config.port, 9000);
//!
//! let globals = Globals::new();
//! globals.add("app_name", json!("My Awesome App")).unwrap();
//! assert_eq!(globals.get("app_name"), Some(json!("My Awesome App")));
//! ```

pub mod config;
pub mod errors;
pub mod globals;

pub use config::{Config, Configuration};
pub use errors::ConfigError;
pub use globals::Globals;
