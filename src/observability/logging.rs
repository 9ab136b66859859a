//! Structured logging configuration.

use serde::Deserialize;

/// Environment variable holding the log filter directive.
pub const LOG_FILTER_ENV: &str = "GUARDIAN_COGNITION_LOG";
/// Environment variable selecting the log format (`json` or `pretty`).
pub const LOG_FORMAT_ENV: &str = "GUARDIAN_COGNITION_LOG_FORMAT";

const DEFAULT_FILTER: &str = "info";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses a format name, defaulting to [`LogFormat::Pretty`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. `guardian_cognition=debug`.
    pub filter: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    /// Builds logging configuration from the process environment.
    ///
    /// `GUARDIAN_COGNITION_LOG` takes precedence over `RUST_LOG`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an environment lookup function.
    #[must_use]
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(filter) = lookup(LOG_FILTER_ENV)
            .or_else(|| lookup("RUST_LOG"))
            .filter(|f| !f.trim().is_empty())
        {
            self.filter = filter;
        }
        if let Some(format) = lookup(LOG_FORMAT_ENV) {
            self.format = LogFormat::parse(&format);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.filter, "info");
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn test_crate_variable_wins_over_rust_log() {
        let config = LoggingConfig::default().with_env_overrides(lookup(&[
            ("RUST_LOG", "warn"),
            (LOG_FILTER_ENV, "guardian_cognition=debug"),
            (LOG_FORMAT_ENV, "JSON"),
        ]));
        assert_eq!(config.filter, "guardian_cognition=debug");
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_rust_log_fallback() {
        let config = LoggingConfig::default().with_env_overrides(lookup(&[("RUST_LOG", "warn")]));
        assert_eq!(config.filter, "warn");
    }

    #[test]
    fn test_unknown_format_is_pretty() {
        assert_eq!(LogFormat::parse("yaml"), LogFormat::Pretty);
    }
}
