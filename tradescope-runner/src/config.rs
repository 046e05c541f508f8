//! Serializable analysis configuration.
//!
//! Loaded from TOML:
//!
//! ```toml
//! [sizing]
//! investment = 100000.0
//! mode = "lot"
//!
//! [monte_carlo]
//! simulations = 100
//! seed = 42
//! parallel = false
//! min_simulations = 10
//! max_simulations = 1000
//!
//! [ingest]
//! encodings = ["big5", "utf-8", "gb2312", "cp950"]
//! ```
//!
//! Every section and field is optional; missing values take the defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tradescope_core::monte_carlo::{
    MonteCarloConfig, SimulationBounds, DEFAULT_SIMULATIONS, MAX_SIMULATIONS, MIN_SIMULATIONS,
};
use tradescope_core::{PositionSizer, SizingMode};

use crate::ingest::{resolve_encoding, IngestConfig};

pub const DEFAULT_INVESTMENT: f64 = 100_000.0;

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("investment amount must be a positive finite number, got {0}")]
    InvalidInvestment(f64),

    #[error("simulation count {count} outside allowed range {min}..={max}")]
    InvalidSimulationCount { count: usize, min: usize, max: usize },

    #[error("simulation bounds inverted: min {min} > max {max}")]
    InvertedBounds { min: usize, max: usize },

    #[error("no encodings configured")]
    NoEncodings,

    #[error("unknown encoding label '{0}'")]
    UnknownEncoding(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Fixed amount invested per trade.
    pub investment: f64,
    pub mode: SizingMode,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            investment: DEFAULT_INVESTMENT,
            mode: SizingMode::Lot,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloSettings {
    pub simulations: usize,
    pub seed: Option<u64>,
    pub parallel: bool,
    pub min_simulations: usize,
    pub max_simulations: usize,
}

impl Default for MonteCarloSettings {
    fn default() -> Self {
        Self {
            simulations: DEFAULT_SIMULATIONS,
            seed: None,
            parallel: false,
            min_simulations: MIN_SIMULATIONS,
            max_simulations: MAX_SIMULATIONS,
        }
    }
}

impl MonteCarloSettings {
    pub fn bounds(&self) -> SimulationBounds {
        SimulationBounds {
            min: self.min_simulations,
            max: self.max_simulations,
        }
    }
}

/// Complete configuration for one analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub sizing: SizingConfig,
    pub monte_carlo: MonteCarloSettings,
    pub ingest: IngestConfig,
}

impl AnalysisConfig {
    /// Load and validate a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Reject configurations that cannot be analyzed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let investment = self.sizing.investment;
        if !investment.is_finite() || investment <= 0.0 {
            return Err(ConfigError::InvalidInvestment(investment));
        }

        let mc = &self.monte_carlo;
        if mc.min_simulations > mc.max_simulations {
            return Err(ConfigError::InvertedBounds {
                min: mc.min_simulations,
                max: mc.max_simulations,
            });
        }
        if !mc.bounds().contains(mc.simulations) {
            return Err(ConfigError::InvalidSimulationCount {
                count: mc.simulations,
                min: mc.min_simulations,
                max: mc.max_simulations,
            });
        }

        if self.ingest.encodings.is_empty() {
            return Err(ConfigError::NoEncodings);
        }
        if let Some(bad) = self
            .ingest
            .encodings
            .iter()
            .find(|label| resolve_encoding(label).is_none())
        {
            return Err(ConfigError::UnknownEncoding(bad.clone()));
        }

        Ok(())
    }

    pub fn sizer(&self) -> Result<PositionSizer, ConfigError> {
        PositionSizer::new(self.sizing.investment, self.sizing.mode)
            .map_err(|_| ConfigError::InvalidInvestment(self.sizing.investment))
    }

    /// Monte Carlo parameters with every simulated curve retained.
    pub fn monte_carlo_config(&self) -> MonteCarloConfig {
        MonteCarloConfig {
            n_simulations: self.monte_carlo.simulations,
            seed: self.monte_carlo.seed,
            parallel: self.monte_carlo.parallel,
            retain_curves: true,
            bounds: self.monte_carlo.bounds(),
        }
    }
}
