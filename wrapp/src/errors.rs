use std::path::PathBuf;

use wrapp_config::ConfigError;
use wrapp_container::ContainerError;

/// Errors while preparing or running an [Application](crate::Application)
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error("failed to open log file '{}': {source}", path.display())]
    LogFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write pid file '{}': {source}", path.display())]
    PidFile {
        path: PathBuf,
        source: std::io::Error,
    },
}
