use serde::{Deserialize, Serialize};

/// Settings every application reads from its config file
///
/// ```yaml
/// env: PROD
/// log:
///   level: 3
///   file_path: /var/log/app.log
///   format: json
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub env: String,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            env: "DEV".to_string(),
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// 0 and 1 are errors only, 2 warnings, 3 info, 4 debug, anything above traces
    pub level: u32,
    pub file_path: String,
    pub format: LogFormat,
}

impl LogConfig {
    /// Debug level to stdout, used when running a single call
    pub fn interactive(self) -> Self {
        Self {
            level: 4,
            file_path: STDOUT.to_string(),
            ..self
        }
    }

    pub fn is_stdout(&self) -> bool {
        self.file_path.is_empty() || self.file_path == STDOUT
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: 4,
            file_path: STDOUT.to_string(),
            format: LogFormat::String,
        }
    }
}

const STDOUT: &str = "/dev/stdout";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines
    String,
    Json,
}

/// Name of the environment the application runs in, e.g. `DEV` or `PROD`
///
/// Registered by the application so modules can depend on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Env(pub String);

impl Env {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config: AppConfig = serde_yaml::from_str("log:\n  format: json\n").unwrap();
        assert_eq!(
            config,
            AppConfig {
                env: "DEV".to_string(),
                log: LogConfig {
                    format: LogFormat::Json,
                    ..LogConfig::default()
                },
            }
        );
    }

    #[test]
    fn unknown_format_is_rejected() {
        let result = serde_yaml::from_str::<AppConfig>("log:\n  format: syslog\n");
        assert!(result.is_err());
    }

    #[test]
    fn interactive_logs_everything_to_stdout() {
        let log = LogConfig {
            level: 1,
            file_path: "/var/log/app.log".to_string(),
            format: LogFormat::Json,
        }
        .interactive();

        assert_eq!(log.level, 4);
        assert!(log.is_stdout());
        assert_eq!(log.format, LogFormat::Json);
    }
}
