use std::{fs::OpenOptions, path::PathBuf, sync::Mutex};

use tracing_subscriber::{filter::LevelFilter, fmt::writer::BoxMakeWriter, EnvFilter};
use wrapp_config::{LogConfig, LogFormat};

use crate::errors::AppError;

/// Maps the configured level, 0 and 1 being errors only and anything above 4 tracing
pub fn level_filter(level: u32) -> LevelFilter {
    match level {
        0 | 1 => LevelFilter::ERROR,
        2 => LevelFilter::WARN,
        3 => LevelFilter::INFO,
        4 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Installs the global subscriber
///
/// `RUST_LOG` directives take precedence over the configured level.
/// If a global subscriber is already installed it is kept.
pub fn setup_logger(config: &LogConfig) -> Result<(), AppError> {
    let filter = EnvFilter::builder()
        .with_default_directive(level_filter(config.level).into())
        .from_env_lossy();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer(config)?);

    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::String => builder.with_target(false).compact().try_init(),
    };
    if let Err(error) = result {
        tracing::debug!(%error, "Logger already installed");
    }
    Ok(())
}

fn writer(config: &LogConfig) -> Result<BoxMakeWriter, AppError> {
    if config.is_stdout() {
        return Ok(BoxMakeWriter::new(std::io::stdout));
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.file_path)
        .map_err(|source| AppError::LogFile {
            path: PathBuf::from(&config.file_path),
            source,
        })?;
    Ok(BoxMakeWriter::new(Mutex::new(file)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_map_to_filters() {
        assert_eq!(level_filter(0), LevelFilter::ERROR);
        assert_eq!(level_filter(1), LevelFilter::ERROR);
        assert_eq!(level_filter(2), LevelFilter::WARN);
        assert_eq!(level_filter(3), LevelFilter::INFO);
        assert_eq!(level_filter(4), LevelFilter::DEBUG);
        assert_eq!(level_filter(9), LevelFilter::TRACE);
    }

    #[test]
    fn log_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let config = LogConfig {
            file_path: path.to_string_lossy().into_owned(),
            ..LogConfig::default()
        };

        writer(&config).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn unwritable_log_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            file_path: dir.path().join("missing/app.log").to_string_lossy().into_owned(),
            ..LogConfig::default()
        };

        assert!(matches!(writer(&config), Err(AppError::LogFile { .. })));
    }
}
