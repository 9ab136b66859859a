//! Configuration management.
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then `GUARDIAN_COGNITION_*` environment variables.
//!
//! ```toml
//! default_guardian = "shinkami"
//! event_history_capacity = 10000
//!
//! [features]
//! cost_tracking = true
//!
//! [vector]
//! dimensions = 384
//!
//! [budget]
//! token_budget = 200000
//!
//! [[guardians]]
//! id = "vesper"
//! name = "Vesper"
//! gate = "Dusk"
//! frequency = 1234
//! element = "Shadow"
//! retention = { policy = "ttl", ttl_ms = 600000 }
//! ```

mod features;

pub use features::PipelineFeatures;

use crate::models::GuardianConfig;
use crate::observability::LoggingConfig;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Default embedding dimensionality (MiniLM-sized).
pub const DEFAULT_DIMENSIONS: usize = 384;
/// Default event history capacity.
pub const DEFAULT_EVENT_HISTORY_CAPACITY: usize = crate::observability::DEFAULT_HISTORY_CAPACITY;
/// Default feedback ledger capacity.
pub const DEFAULT_FEEDBACK_CAPACITY: usize = 50_000;
/// Guardian chosen when no routing keyword matches.
pub const DEFAULT_GUARDIAN: &str = "shinkami";

const ENV_PREFIX: &str = "GUARDIAN_COGNITION_";

/// Vector index settings.
///
/// The HNSW parameters are carried for ANN-backed indexes; the exhaustive
/// backend only exposes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VectorSettings {
    /// Embedding dimensionality.
    pub dimensions: usize,
    /// HNSW graph degree.
    pub hnsw_m: usize,
    /// HNSW construction beam width.
    pub ef_construction: usize,
    /// HNSW search beam width.
    pub ef_search: usize,
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
            hnsw_m: 16,
            ef_construction: 200,
            ef_search: 64,
        }
    }
}

/// Token budget settings for cost tracking.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct BudgetSettings {
    /// Total token budget; `None` disables budget alerts.
    pub token_budget: Option<u64>,
    /// Fraction of the budget that raises a warning alert.
    pub warning_ratio: f64,
    /// Fraction of the budget that raises a critical alert.
    pub critical_ratio: f64,
}

impl Default for BudgetSettings {
    fn default() -> Self {
        Self {
            token_budget: None,
            warning_ratio: 0.7,
            critical_ratio: 0.9,
        }
    }
}

/// Main configuration for the cognition layer.
#[derive(Debug, Clone, PartialEq)]
pub struct CognitionConfig {
    /// Pipeline feature toggles.
    pub features: PipelineFeatures,
    /// Vector index settings.
    pub vector: VectorSettings,
    /// Event history capacity.
    pub event_history_capacity: usize,
    /// Feedback ledger capacity.
    pub feedback_capacity: usize,
    /// Fallback Guardian for unmatched task text.
    pub default_guardian: String,
    /// Token budget settings.
    pub budget: BudgetSettings,
    /// Guardian entries added to the canonical table.
    pub guardians: Vec<GuardianConfig>,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Default for CognitionConfig {
    fn default() -> Self {
        Self {
            features: PipelineFeatures::default(),
            vector: VectorSettings::default(),
            event_history_capacity: DEFAULT_EVENT_HISTORY_CAPACITY,
            feedback_capacity: DEFAULT_FEEDBACK_CAPACITY,
            default_guardian: DEFAULT_GUARDIAN.to_string(),
            budget: BudgetSettings::default(),
            guardians: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Feature toggles.
    pub features: Option<PipelineFeatures>,
    /// Vector settings.
    pub vector: Option<VectorSettings>,
    /// Event history capacity.
    pub event_history_capacity: Option<usize>,
    /// Feedback ledger capacity.
    pub feedback_capacity: Option<usize>,
    /// Fallback Guardian.
    pub default_guardian: Option<String>,
    /// Budget settings.
    pub budget: Option<BudgetSettings>,
    /// Guardian extensions.
    #[serde(default)]
    pub guardians: Vec<GuardianConfig>,
    /// Logging configuration.
    pub logging: Option<LoggingConfig>,
}

impl CognitionConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: e.to_string(),
        })?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid configuration.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;
        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/guardian-cognition/` on macOS)
    /// 2. XDG config dir (`~/.config/guardian-cognition/` for Unix compatibility)
    ///
    /// Returns default configuration if no config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let candidates = [
            base_dirs
                .config_dir()
                .join("guardian-cognition")
                .join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("guardian-cognition")
                .join("config.toml"),
        ];
        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config");
                },
            }
        }

        Self::default()
    }

    /// Loads the default file and applies process environment overrides.
    #[must_use]
    pub fn from_env() -> Self {
        Self::load_default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Converts a parsed config file, filling gaps with defaults.
    #[must_use]
    pub fn from_config_file(file: ConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            features: file.features.unwrap_or(defaults.features),
            vector: file.vector.unwrap_or(defaults.vector),
            event_history_capacity: file
                .event_history_capacity
                .unwrap_or(defaults.event_history_capacity),
            feedback_capacity: file.feedback_capacity.unwrap_or(defaults.feedback_capacity),
            default_guardian: file.default_guardian.unwrap_or(defaults.default_guardian),
            budget: file.budget.unwrap_or(defaults.budget),
            guardians: file.guardians,
            logging: file.logging.unwrap_or(defaults.logging),
        }
    }

    /// Applies `GUARDIAN_COGNITION_*` overrides from an environment lookup.
    ///
    /// Unparsable values are ignored.
    #[must_use]
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let flag = |name: &str| var(name).and_then(|v| parse_bool(&v));
        let number = |name: &str| var(name).and_then(|v| v.trim().parse::<usize>().ok());

        if let Some(v) = flag("TRAJECTORY_RECORDING") {
            self.features.trajectory_recording = v;
        }
        if let Some(v) = flag("PATTERN_LEARNING") {
            self.features.pattern_learning = v;
        }
        if let Some(v) = flag("COST_TRACKING") {
            self.features.cost_tracking = v;
        }
        if let Some(v) = flag("MEMORY_PERSISTENCE") {
            self.features.memory_persistence = v;
        }
        if let Some(v) = number("VECTOR_DIMENSIONS") {
            self.vector.dimensions = v;
        }
        if let Some(v) = number("EVENT_HISTORY_CAPACITY") {
            self.event_history_capacity = v;
        }
        if let Some(v) = number("FEEDBACK_CAPACITY") {
            self.feedback_capacity = v;
        }
        if let Some(v) = var("DEFAULT_GUARDIAN").filter(|v| !v.trim().is_empty()) {
            self.default_guardian = v.trim().to_lowercase();
        }
        if let Some(v) = var("TOKEN_BUDGET").and_then(|v| v.trim().parse::<u64>().ok()) {
            self.budget.token_budget = Some(v);
        }
        self.logging = self.logging.with_env_overrides(&lookup);
        self
    }

    /// Replaces the feature toggles.
    #[must_use]
    pub const fn with_features(mut self, features: PipelineFeatures) -> Self {
        self.features = features;
        self
    }

    /// Replaces the vector settings.
    #[must_use]
    pub const fn with_vector(mut self, vector: VectorSettings) -> Self {
        self.vector = vector;
        self
    }

    /// Sets the token budget.
    #[must_use]
    pub const fn with_token_budget(mut self, tokens: u64) -> Self {
        self.budget.token_budget = Some(tokens);
        self
    }

    /// Sets the event history capacity.
    #[must_use]
    pub const fn with_event_history_capacity(mut self, capacity: usize) -> Self {
        self.event_history_capacity = capacity;
        self
    }

    /// Sets the feedback ledger capacity.
    #[must_use]
    pub const fn with_feedback_capacity(mut self, capacity: usize) -> Self {
        self.feedback_capacity = capacity;
        self
    }

    /// Adds a Guardian extension.
    #[must_use]
    pub fn with_guardian(mut self, guardian: GuardianConfig) -> Self {
        self.guardians.push(guardian);
        self
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
