//! Wrapp Config reads the application's YAML config file and turns typed config
//! models into modules that can be injected in the rest of the application.
//!
//! # Examples
//!
//! ```rust
//! use serde::Deserialize;
//! use wrapp_config::provider::ConfigProvider;
//!
//! #[derive(Deserialize)]
//! struct DatabaseConfig {
//!     url: String,
//! }
//!
//! let mut provider: ConfigProvider = "url: postgres://localhost/app".parse().unwrap();
//! provider.add_model::<DatabaseConfig>().unwrap();
//!
//! let config = provider.get_config::<DatabaseConfig>().unwrap();
//! assert_eq!(config.url, "postgres://localhost/app");
//!
//! // Modules taking an `Arc<DatabaseConfig>` now receive it
//! let modules = provider.into_modules();
//! ```
//!
//! Wrapp Config consists of the following components:
//!
//! 1. Config - the settings every application reads, and the environment name
//! 2. Provider - for reading the document, adding and retrieving configs
//! 3. Resolver - for filling in placeholders like `@env(PORT#8080)` before decoding
//! 4. Errors - for config errors

pub mod config;
pub mod errors;
pub mod provider;
pub mod resolver;

pub use config::{AppConfig, Env, LogConfig, LogFormat};
pub use errors::ConfigError;
pub use provider::{ConfigProvider, Model};
pub use resolver::{EnvResolver, Resolver};
