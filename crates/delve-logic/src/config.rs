//! Game configuration: sewer dimensions, generation odds, timeouts and
//! scoring constants.
//!
//! Every field has a default, so a JSON file only needs the keys it wants to
//! change. Command-line flags are applied on top by the harness.
//!
//! ```
//! use delve_logic::config::{validate_config, GameConfig};
//!
//! let mut config = GameConfig::default();
//! config.max_edge_weight = 5;
//! assert!(validate_config(&config).is_empty());
//!
//! let config = GameConfig::from_json(r#"{ "min_rows": 4, "max_rows": 6 }"#).unwrap();
//! assert_eq!(config.max_cols, 40);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest accepted grid side, rows or cols.
pub const MAX_GRID_SIDE: u32 = 1000;

/// Everything that shapes one game, with the stock values as defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Grid height range (inclusive).
    pub min_rows: u32,
    pub max_rows: u32,
    /// Grid width range (inclusive).
    pub min_cols: u32,
    pub max_cols: u32,
    /// Share of grid tiles dug open in each sewer.
    pub open_fraction: f64,
    /// Chance that two open, adjacent, unconnected tiles get an extra edge.
    pub loop_chance: f64,
    /// Chance that an open escape tile holds coins.
    pub coin_chance: f64,
    /// Coin amounts a tile can hold, drawn uniformly.
    pub coin_values: Vec<u32>,
    /// Escape edge lengths are uniform in `1..=max_edge_weight`.
    pub max_edge_weight: u32,
    /// Wall-clock limit for the find phase, seconds. `None` means untimed.
    pub find_timeout_secs: Option<f64>,
    /// Wall-clock limit for the flee phase, seconds. `None` means untimed.
    pub flee_timeout_secs: Option<f64>,
    pub min_bonus: f64,
    pub max_bonus: f64,
    /// How many times the minimum find length it takes to lose the whole
    /// bonus.
    pub no_bonus_length: f64,
    /// Slack added to the flee budget, as a share of a typical walk over
    /// every open tile.
    pub extra_time_factor: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_rows: 8,
            max_rows: 25,
            min_cols: 12,
            max_cols: 40,
            open_fraction: 0.6,
            loop_chance: 0.1,
            coin_chance: 0.2,
            coin_values: vec![5, 10, 25, 50, 100, 250],
            max_edge_weight: 15,
            find_timeout_secs: Some(10.0),
            flee_timeout_secs: Some(15.0),
            min_bonus: 1.0,
            max_bonus: 1.3,
            no_bonus_length: 3.0,
            extra_time_factor: 0.3,
        }
    }
}

impl GameConfig {
    pub fn from_json(text: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read, parse and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        let problems = validate_config(&config);
        if problems.is_empty() {
            Ok(config)
        } else {
            Err(LoadError::Invalid(problems))
        }
    }

    pub fn find_timeout(&self) -> Option<Duration> {
        self.find_timeout_secs.map(Duration::from_secs_f64)
    }

    pub fn flee_timeout(&self) -> Option<Duration> {
        self.flee_timeout_secs.map(Duration::from_secs_f64)
    }
}

/// One problem found by [`validate_config`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{axis} range {min}..={max} is empty")]
    EmptyRange {
        axis: &'static str,
        min: u32,
        max: u32,
    },
    #[error("{axis} must be at least 2, got {value}")]
    GridTooSmall { axis: &'static str, value: u32 },
    #[error("{axis} must be at most {limit}, got {value}", limit = MAX_GRID_SIDE)]
    GridTooLarge { axis: &'static str, value: u32 },
    #[error("{field} must be within [0, 1], got {value}")]
    NotAFraction { field: &'static str, value: f64 },
    #[error("open_fraction must be above 0")]
    NothingOpen,
    #[error("coin_values must be non-empty and all above 0")]
    BadCoinValues,
    #[error("max_edge_weight must be at least 1")]
    ZeroEdgeWeight,
    #[error("{field} must be a positive number of seconds, got {value}")]
    BadTimeout { field: &'static str, value: f64 },
    #[error("bonus range {min}..{max} is invalid")]
    BadBonusRange { min: f64, max: f64 },
    #[error("no_bonus_length must be above 0, got {0}")]
    BadNoBonusLength(f64),
    #[error("extra_time_factor must not be negative, got {0}")]
    NegativeExtraTime(f64),
}

/// Failure to produce a usable config from a file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Invalid(Vec<ConfigError>),
}

/// Validate a configuration, returning all errors found.
pub fn validate_config(config: &GameConfig) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    for (axis, min, max) in [
        ("rows", config.min_rows, config.max_rows),
        ("cols", config.min_cols, config.max_cols),
    ] {
        if min < 2 {
            errors.push(ConfigError::GridTooSmall { axis, value: min });
        }
        if max > MAX_GRID_SIDE {
            errors.push(ConfigError::GridTooLarge { axis, value: max });
        }
        if min > max {
            errors.push(ConfigError::EmptyRange { axis, min, max });
        }
    }

    for (field, value) in [
        ("open_fraction", config.open_fraction),
        ("loop_chance", config.loop_chance),
        ("coin_chance", config.coin_chance),
    ] {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ConfigError::NotAFraction { field, value });
        }
    }
    if config.open_fraction <= 0.0 {
        errors.push(ConfigError::NothingOpen);
    }
    if config.coin_values.is_empty() || config.coin_values.contains(&0) {
        errors.push(ConfigError::BadCoinValues);
    }
    if config.max_edge_weight == 0 {
        errors.push(ConfigError::ZeroEdgeWeight);
    }

    for (field, value) in [
        ("find_timeout_secs", config.find_timeout_secs),
        ("flee_timeout_secs", config.flee_timeout_secs),
    ] {
        if let Some(value) = value {
            if !(value.is_finite() && value > 0.0) {
                errors.push(ConfigError::BadTimeout { field, value });
            }
        }
    }

    if !(config.min_bonus >= 0.0 && config.min_bonus <= config.max_bonus) {
        errors.push(ConfigError::BadBonusRange {
            min: config.min_bonus,
            max: config.max_bonus,
        });
    }
    if !(config.no_bonus_length > 0.0) {
        errors.push(ConfigError::BadNoBonusLength(config.no_bonus_length));
    }
    if !(config.extra_time_factor >= 0.0) {
        errors.push(ConfigError::NegativeExtraTime(config.extra_time_factor));
    }

    errors
}
