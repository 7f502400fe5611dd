//! Configuration system
//!
//! Loads configuration from TOML files with environment variable
//! overrides. Every numeric threshold the engines use (sample-size
//! minimums, decay rates, severity cutoffs) lives here rather than as an
//! embedded constant, so policies can be tuned without touching the
//! algorithms.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pattern: PatternConfig,

    #[serde(default)]
    pub correlation: CorrelationConfig,

    #[serde(default)]
    pub anomaly: AnomalyConfig,

    #[serde(default)]
    pub forecast: ForecastConfig,

    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Pattern detection thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct PatternConfig {
    /// Fewer total logs than this yields an empty (insufficient-data) report
    #[serde(default = "default_min_logs")]
    pub min_logs: usize,

    /// Minimum occurrences of a symptom to count as a pattern
    #[serde(default = "default_min_occurrences")]
    pub min_occurrences: usize,

    /// Confidence gained per occurrence (linear)
    #[serde(default = "default_confidence_per_occurrence")]
    pub confidence_per_occurrence: f64,

    /// Confidence ceiling
    #[serde(default = "default_confidence_cap")]
    pub confidence_cap: f64,

    /// Probability (%) above which severity is high
    #[serde(default = "default_high_probability")]
    pub high_probability: f64,

    /// Probability (%) above which severity is medium
    #[serde(default = "default_medium_probability")]
    pub medium_probability: f64,

    /// Report at most this many patterns, strongest first
    #[serde(default = "default_max_patterns")]
    pub max_patterns: usize,

    /// Symptom names to test for recurrence
    #[serde(default = "default_symptom_vocabulary")]
    pub symptom_vocabulary: Vec<String>,
}

fn default_min_logs() -> usize {
    10
}

fn default_min_occurrences() -> usize {
    2
}

fn default_confidence_per_occurrence() -> f64 {
    20.0
}

fn default_confidence_cap() -> f64 {
    90.0
}

fn default_high_probability() -> f64 {
    70.0
}

fn default_medium_probability() -> f64 {
    40.0
}

fn default_max_patterns() -> usize {
    5
}

fn default_symptom_vocabulary() -> Vec<String> {
    [
        "headache",
        "cramps",
        "bloating",
        "fatigue",
        "mood swings",
        "breast tenderness",
        "acne",
        "nausea",
        "back pain",
        "insomnia",
        "anxiety",
        "food cravings",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            min_logs: default_min_logs(),
            min_occurrences: default_min_occurrences(),
            confidence_per_occurrence: default_confidence_per_occurrence(),
            confidence_cap: default_confidence_cap(),
            high_probability: default_high_probability(),
            medium_probability: default_medium_probability(),
            max_patterns: default_max_patterns(),
            symptom_vocabulary: default_symptom_vocabulary(),
        }
    }
}

/// Correlation engine thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct CorrelationConfig {
    /// Minimum pairwise-complete days before a pair is reported
    #[serde(default = "default_min_paired_days")]
    pub min_paired_days: usize,

    /// |r| at or above this is a strong correlation
    #[serde(default = "default_strong_threshold")]
    pub strong_threshold: f64,

    /// |r| at or above this is a moderate correlation
    #[serde(default = "default_moderate_threshold")]
    pub moderate_threshold: f64,
}

fn default_min_paired_days() -> usize {
    14
}

fn default_strong_threshold() -> f64 {
    0.7
}

fn default_moderate_threshold() -> f64 {
    0.4
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            min_paired_days: default_min_paired_days(),
            strong_threshold: default_strong_threshold(),
            moderate_threshold: default_moderate_threshold(),
        }
    }
}

/// Anomaly detection thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct AnomalyConfig {
    /// Trailing window (days) used for the expected baseline
    #[serde(default = "default_baseline_days")]
    pub baseline_days: usize,

    /// Minimum baseline samples before a reading is scored
    #[serde(default = "default_min_baseline_samples")]
    pub min_baseline_samples: usize,

    /// Score at or above this is medium severity
    #[serde(default = "default_medium_score")]
    pub medium_score: f64,

    /// Score at or above this is high severity
    #[serde(default = "default_high_score")]
    pub high_score: f64,

    /// Score at or above this is critical severity
    #[serde(default = "default_critical_score")]
    pub critical_score: f64,
}

fn default_baseline_days() -> usize {
    14
}

fn default_min_baseline_samples() -> usize {
    5
}

fn default_medium_score() -> f64 {
    0.2
}

fn default_high_score() -> f64 {
    0.5
}

fn default_critical_score() -> f64 {
    1.0
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            baseline_days: default_baseline_days(),
            min_baseline_samples: default_min_baseline_samples(),
            medium_score: default_medium_score(),
            high_score: default_high_score(),
            critical_score: default_critical_score(),
        }
    }
}

/// Mood forecast parameters
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastConfig {
    /// Days ahead to forecast
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,

    /// Rated days to draw the baseline from
    #[serde(default = "default_lookback_days")]
    pub lookback_days: usize,

    /// Minimum mood-rated days in the trailing 7 before forecasting
    #[serde(default = "default_min_rated_recent")]
    pub min_rated_recent: usize,

    /// Mood adjustment on weekend days
    #[serde(default = "default_weekend_adjustment")]
    pub weekend_adjustment: f64,

    /// First cycle day of the PMS window
    #[serde(default = "default_pms_window_start")]
    pub pms_window_start: u32,

    /// Last cycle day of the PMS window, inclusive
    #[serde(default = "default_pms_window_end")]
    pub pms_window_end: u32,

    /// Mood adjustment inside the PMS window
    #[serde(default = "default_pms_adjustment")]
    pub pms_adjustment: f64,

    /// First cycle day of the ovulatory window
    #[serde(default = "default_ovulatory_window_start")]
    pub ovulatory_window_start: u32,

    /// Last cycle day of the ovulatory window, inclusive
    #[serde(default = "default_ovulatory_window_end")]
    pub ovulatory_window_end: u32,

    /// Mood adjustment inside the ovulatory window
    #[serde(default = "default_ovulatory_adjustment")]
    pub ovulatory_adjustment: f64,

    /// Confidence for the first forecast day
    #[serde(default = "default_base_confidence")]
    pub base_confidence: f64,

    /// Confidence lost per day of forecast distance
    #[serde(default = "default_confidence_decay")]
    pub confidence_decay: f64,

    /// Confidence floor
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f64,
}

fn default_horizon_days() -> u32 {
    7
}

fn default_lookback_days() -> usize {
    14
}

fn default_min_rated_recent() -> usize {
    5
}

fn default_weekend_adjustment() -> f64 {
    0.3
}

fn default_pms_window_start() -> u32 {
    22
}

fn default_pms_window_end() -> u32 {
    28
}

fn default_pms_adjustment() -> f64 {
    -1.0
}

fn default_ovulatory_window_start() -> u32 {
    12
}

fn default_ovulatory_window_end() -> u32 {
    16
}

fn default_ovulatory_adjustment() -> f64 {
    0.5
}

fn default_base_confidence() -> f64 {
    90.0
}

fn default_confidence_decay() -> f64 {
    10.0
}

fn default_confidence_floor() -> f64 {
    30.0
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon_days: default_horizon_days(),
            lookback_days: default_lookback_days(),
            min_rated_recent: default_min_rated_recent(),
            weekend_adjustment: default_weekend_adjustment(),
            pms_window_start: default_pms_window_start(),
            pms_window_end: default_pms_window_end(),
            pms_adjustment: default_pms_adjustment(),
            ovulatory_window_start: default_ovulatory_window_start(),
            ovulatory_window_end: default_ovulatory_window_end(),
            ovulatory_adjustment: default_ovulatory_adjustment(),
            base_confidence: default_base_confidence(),
            confidence_decay: default_confidence_decay(),
            confidence_floor: default_confidence_floor(),
        }
    }
}

/// Notification rule thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    /// Trailing average mood below this triggers the mood-decline rule
    #[serde(default = "default_low_mood_threshold")]
    pub low_mood_threshold: f64,

    /// Trailing average stress above this triggers the stress rule
    #[serde(default = "default_high_stress_threshold")]
    pub high_stress_threshold: f64,

    /// Latest sleep hours below this triggers the sleep rule
    #[serde(default = "default_low_sleep_hours")]
    pub low_sleep_hours: f64,

    /// Latest step count below this triggers the activity rule
    #[serde(default = "default_low_steps")]
    pub low_steps: f64,

    /// A predicted pattern within this many days triggers a heads-up
    #[serde(default = "default_pattern_lead_days")]
    pub pattern_lead_days: i64,

    /// A forecast point below this mood triggers the forecast-dip rule
    #[serde(default = "default_forecast_dip_threshold")]
    pub forecast_dip_threshold: f64,
}

fn default_low_mood_threshold() -> f64 {
    3.0
}

fn default_high_stress_threshold() -> f64 {
    7.0
}

fn default_low_sleep_hours() -> f64 {
    6.0
}

fn default_low_steps() -> f64 {
    2000.0
}

fn default_pattern_lead_days() -> i64 {
    3
}

fn default_forecast_dip_threshold() -> f64 {
    4.0
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            low_mood_threshold: default_low_mood_threshold(),
            high_stress_threshold: default_high_stress_threshold(),
            low_sleep_hours: default_low_sleep_hours(),
            low_steps: default_low_steps(),
            pattern_lead_days: default_pattern_lead_days(),
            forecast_dip_threshold: default_forecast_dip_threshold(),
        }
    }
}

/// Session orchestration configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Per-subsystem timeout; a timeout is a recoverable subsystem failure
    #[serde(default = "default_subsystem_timeout_ms")]
    pub subsystem_timeout_ms: u64,

    /// SQLite session store location
    #[serde(default = "default_store_path")]
    pub store_path: String,
}

fn default_subsystem_timeout_ms() -> u64 {
    10_000
}

fn default_store_path() -> String {
    dirs::data_local_dir()
        .map(|p| {
            p.join("cyclesense")
                .join("sessions.db")
                .to_string_lossy()
                .to_string()
        })
        .unwrap_or_else(|| "./cyclesense_sessions.db".to_string())
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            subsystem_timeout_ms: default_subsystem_timeout_ms(),
            store_path: default_store_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("cyclesense").join("config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("CYCLESENSE_STORE_PATH") {
            self.session.store_path = path;
        }
        if let Ok(timeout) = std::env::var("CYCLESENSE_SUBSYSTEM_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.session.subsystem_timeout_ms = ms;
            }
        }
        if let Ok(level) = std::env::var("CYCLESENSE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("CYCLESENSE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# CycleSense Configuration
#
# Environment variables override these settings:
# - CYCLESENSE_STORE_PATH
# - CYCLESENSE_SUBSYSTEM_TIMEOUT_MS
# - CYCLESENSE_LOG_LEVEL
# - CYCLESENSE_LOG_FORMAT

[pattern]
# Fewer total daily logs than this returns an empty pattern report
min_logs = 10

# Minimum occurrences of a symptom to count as a pattern
min_occurrences = 2

# Confidence gained per occurrence, and its ceiling
confidence_per_occurrence = 20.0
confidence_cap = 90.0

# Probability (%) cutoffs for severity buckets
high_probability = 70.0
medium_probability = 40.0

# Report at most this many patterns
max_patterns = 5

[correlation]
# Minimum pairwise-complete days before a metric pair is reported
min_paired_days = 14

# |r| cutoffs for strength classification
strong_threshold = 0.7
moderate_threshold = 0.4

[anomaly]
# Trailing window (days) for the expected baseline
baseline_days = 14

# Minimum baseline samples before a reading is scored
min_baseline_samples = 5

# Relative-deviation cutoffs for severity buckets
medium_score = 0.2
high_score = 0.5
critical_score = 1.0

[forecast]
# Forecast horizon and baseline lookback (days)
horizon_days = 7
lookback_days = 14

# Minimum mood-rated days in the trailing week before forecasting
min_rated_recent = 5

# Heuristic mood adjustments and the cycle-day windows they apply to
weekend_adjustment = 0.3
pms_window_start = 22
pms_window_end = 28
pms_adjustment = -1.0
ovulatory_window_start = 12
ovulatory_window_end = 16
ovulatory_adjustment = 0.5

# Confidence schedule: max(floor, base - decay * days_ahead)
base_confidence = 90.0
confidence_decay = 10.0
confidence_floor = 30.0

[notify]
# Trailing-average and latest-value rule thresholds
low_mood_threshold = 3.0
high_stress_threshold = 7.0
low_sleep_hours = 6.0
low_steps = 2000.0
pattern_lead_days = 3
forecast_dip_threshold = 4.0

[session]
# Per-subsystem timeout (ms); timeouts are recoverable failures
subsystem_timeout_ms = 10000

# SQLite session store location
# store_path = "~/.local/share/cyclesense/sessions.db"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
