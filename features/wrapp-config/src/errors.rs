use std::path::PathBuf;

use wrapp_container::types::TypeInfo;

/// Errors when reading configs or registering config models
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The document is not valid YAML
    #[error("failed to parse config: {0}")]
    Parse(#[source] serde_yaml::Error),
    /// The document does not match the model
    #[error("failed to decode config model '{model}': {source}")]
    Decode {
        model: &'static str,
        source: serde_yaml::Error,
    },
    /// A placeholder has no value and no default
    #[error("config value '@{resolver}({key})' has no value")]
    Unresolved { resolver: String, key: String },
    /// The model is already registered
    #[error("config model '{0}' is already registered")]
    AlreadyRegistered(TypeInfo),
    /// The required model is not known
    #[error("config model '{0}' is not known")]
    Missing(TypeInfo),
}
