//! Logging configuration.

use serde::{Deserialize, Serialize};

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Multi-line human readable output.
    #[default]
    Pretty,
}

/// Logging and tracing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level: `"trace"`, `"debug"`, `"info"`, `"warn"`, `"error"`.
    #[serde(default = "default_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
    /// Extra per-target directives appended to the base level,
    /// e.g. `["sqlx=warn", "siteaudit_worker=debug"]`.
    #[serde(default = "default_directives")]
    pub directives: Vec<String>,
}

impl LoggingConfig {
    /// The `EnvFilter` directive string used when `RUST_LOG` is unset.
    pub fn filter_directives(&self) -> String {
        std::iter::once(self.level.as_str())
            .chain(self.directives.iter().map(String::as_str))
            .filter(|d| !d.trim().is_empty())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            directives: default_directives(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_directives() -> Vec<String> {
    vec!["sqlx=warn".to_string(), "tower_http=info".to_string()]
}
