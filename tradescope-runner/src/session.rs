//! Analysis session — explicit state machine around one uploaded report.
//!
//! ```text
//!   Idle ──load──▶ Loaded ──configure──▶ Configured ──analyze──▶ Analyzed
//!    ▲               ▲  ▲                    │                    │  │
//!    │               │  └────reconfigure─────┘◀───reconfigure─────┘  │
//!    └──────────────────────────── reset ────────────────────────────┘
//! ```
//!
//! Monte Carlo runs only in `Analyzed`. Going back to `Loaded` or `Idle`
//! discards the report together with any simulation results.

use std::fmt;
use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use tradescope_core::{McError, McProgress, MonteCarloResult};

use crate::analysis::{analyze, AnalysisReport};
use crate::config::{AnalysisConfig, ConfigError};
use crate::ingest::LoadedTrades;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Loaded,
    Configured,
    Analyzed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Loaded => "loaded",
            Self::Configured => "configured",
            Self::Analyzed => "analyzed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot {action} while session is {state}")]
    InvalidTransition {
        action: &'static str,
        state: SessionState,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    MonteCarlo(#[from] McError),
}

#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    loaded: Option<LoadedTrades>,
    config: Option<AnalysisConfig>,
    report: Option<AnalysisReport>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            loaded: None,
            config: None,
            report: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn loaded(&self) -> Option<&LoadedTrades> {
        self.loaded.as_ref()
    }

    pub fn config(&self) -> Option<&AnalysisConfig> {
        self.config.as_ref()
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        self.report.as_ref()
    }

    pub fn monte_carlo(&self) -> Option<&MonteCarloResult> {
        self.report.as_ref().and_then(|r| r.monte_carlo.as_ref())
    }

    fn require(&self, action: &'static str, allowed: &[SessionState]) -> Result<(), SessionError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                action,
                state: self.state,
            })
        }
    }

    fn transition(&mut self, to: SessionState) {
        debug!(from = %self.state, %to, "session transition");
        self.state = to;
    }

    /// Accept a parsed trade list. Only valid from `Idle`.
    pub fn load(&mut self, trades: LoadedTrades) -> Result<(), SessionError> {
        self.require("load trades", &[SessionState::Idle])?;
        info!(trades = trades.len(), encoding = %trades.encoding, "trades loaded");
        self.loaded = Some(trades);
        self.transition(SessionState::Loaded);
        Ok(())
    }

    /// Set the analysis parameters. Valid from `Loaded` or `Configured`.
    ///
    /// The configuration is validated first; on error the state is unchanged.
    pub fn configure(&mut self, config: AnalysisConfig) -> Result<(), SessionError> {
        self.require(
            "configure",
            &[SessionState::Loaded, SessionState::Configured],
        )?;
        config.validate()?;
        self.config = Some(config);
        self.transition(SessionState::Configured);
        Ok(())
    }

    /// Run the pipeline over the loaded trades. Only valid from `Configured`.
    pub fn analyze(&mut self) -> Result<&AnalysisReport, SessionError> {
        self.require("analyze", &[SessionState::Configured])?;
        let (Some(loaded), Some(config)) = (&self.loaded, &self.config) else {
            return Err(SessionError::InvalidTransition {
                action: "analyze",
                state: self.state,
            });
        };
        let report = analyze(&loaded.trades, &config.sizer()?);
        self.transition(SessionState::Analyzed);
        Ok(self.report.insert(report))
    }

    /// Run Monte Carlo on the current report. Only valid from `Analyzed`.
    ///
    /// `simulations` overrides the configured count for this run and is
    /// checked against the configured bounds.
    pub fn run_monte_carlo(
        &mut self,
        simulations: Option<usize>,
        progress: Option<&(dyn Fn(McProgress) + Sync)>,
        cancel: Option<&AtomicBool>,
    ) -> Result<&MonteCarloResult, SessionError> {
        self.require("run monte carlo", &[SessionState::Analyzed])?;
        let (Some(config), Some(report)) = (&self.config, &mut self.report) else {
            return Err(SessionError::InvalidTransition {
                action: "run monte carlo",
                state: self.state,
            });
        };
        let mut mc_config = config.monte_carlo_config();
        if let Some(n) = simulations {
            mc_config.n_simulations = n;
        }
        Ok(report.run_monte_carlo(&mc_config, progress, cancel)?)
    }

    /// Return to `Loaded` keeping the trades. Drops the configuration, the
    /// report and any Monte Carlo results.
    pub fn reconfigure(&mut self) -> Result<(), SessionError> {
        self.require(
            "reconfigure",
            &[SessionState::Configured, SessionState::Analyzed],
        )?;
        self.config = None;
        self.report = None;
        self.transition(SessionState::Loaded);
        Ok(())
    }

    /// Return to `Idle`, discarding everything. Always allowed.
    pub fn reset(&mut self) {
        self.loaded = None;
        self.config = None;
        self.report = None;
        self.transition(SessionState::Idle);
    }
}
