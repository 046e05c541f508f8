//! Monte Carlo resampling of realized trade PnL.
//!
//! Each simulation draws `n` PnL values with replacement from the realized
//! trades and cumulative-sums them into an alternative equity curve. The
//! distribution of final values gives the loss probability and a 90% band.
//!
//! Every run owns an RNG derived from `(master_seed, run_index)`, so the
//! sequential and parallel paths produce identical curves for a given seed.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rand::rngs::StdRng;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::metrics::{mean_f64, percentile_sorted};
use crate::rng::{RngHierarchy, RESAMPLE_STREAM};

pub const DEFAULT_SIMULATIONS: usize = 100;
pub const MIN_SIMULATIONS: usize = 10;
pub const MAX_SIMULATIONS: usize = 1000;

/// Inclusive bounds on the simulation count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationBounds {
    pub min: usize,
    pub max: usize,
}

impl Default for SimulationBounds {
    fn default() -> Self {
        Self {
            min: MIN_SIMULATIONS,
            max: MAX_SIMULATIONS,
        }
    }
}

impl SimulationBounds {
    pub fn contains(&self, count: usize) -> bool {
        (self.min..=self.max).contains(&count)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    pub n_simulations: usize,
    /// `None` seeds from entropy; the chosen seed is reported in the result.
    pub seed: Option<u64>,
    /// Run simulations on the rayon pool.
    pub parallel: bool,
    /// Keep every simulated curve. When false only final values are kept.
    pub retain_curves: bool,
    pub bounds: SimulationBounds,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            n_simulations: DEFAULT_SIMULATIONS,
            seed: None,
            parallel: false,
            retain_curves: true,
            bounds: SimulationBounds::default(),
        }
    }
}

impl MonteCarloConfig {
    pub fn validate(&self) -> Result<(), McError> {
        if !self.bounds.contains(self.n_simulations) {
            return Err(McError::InvalidSimulationCount {
                count: self.n_simulations,
                min: self.bounds.min,
                max: self.bounds.max,
            });
        }
        Ok(())
    }
}

/// One simulated cumulative-PnL path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRun {
    pub curve: Vec<f64>,
}

impl SimulationRun {
    pub fn final_value(&self) -> f64 {
        self.curve.last().copied().unwrap_or(0.0)
    }
}

/// Distribution of final cumulative PnL across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McSummary {
    /// Percentage of runs (0–100) ending below zero.
    pub loss_probability: f64,
    pub p5: f64,
    pub median: f64,
    pub p95: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl McSummary {
    pub fn from_finals(finals: &[f64]) -> Self {
        if finals.is_empty() {
            return Self::default();
        }
        let mut sorted = finals.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let losses = finals.iter().filter(|&&v| v < 0.0).count();
        Self {
            loss_probability: losses as f64 / finals.len() as f64 * 100.0,
            p5: percentile_sorted(&sorted, 5.0),
            median: percentile_sorted(&sorted, 50.0),
            p95: percentile_sorted(&sorted, 95.0),
            mean: mean_f64(finals),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloResult {
    /// Simulated curves in run-index order. Empty when curves are not retained.
    pub runs: Vec<SimulationRun>,
    /// Final value of every run, in run-index order.
    pub finals: Vec<f64>,
    pub summary: McSummary,
    /// Realized cumulative PnL by trade index, for overlay against `runs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realized_curve: Option<Vec<f64>>,
    /// Master seed actually used.
    pub seed: u64,
}

impl MonteCarloResult {
    pub fn is_empty(&self) -> bool {
        self.finals.is_empty()
    }

    pub fn with_realized_curve(mut self, curve: Vec<f64>) -> Self {
        self.realized_curve = Some(curve);
        self
    }
}

/// Progress snapshot delivered after each completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct McProgress {
    pub completed: usize,
    pub total: usize,
}

impl McProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum McError {
    #[error("simulation count {count} outside allowed range {min}..={max}")]
    InvalidSimulationCount { count: usize, min: usize, max: usize },
    #[error("monte carlo cancelled after {completed} of {total} runs")]
    Cancelled { completed: usize, total: usize },
}

/// Draw `n` samples with replacement and cumulative-sum them.
pub fn resample_curve(pnl: &[f64], rng: &mut StdRng) -> Vec<f64> {
    let n = pnl.len();
    let mut curve = Vec::with_capacity(n);
    let mut cumulative = 0.0;
    for _ in 0..n {
        cumulative += pnl[rng.gen_range(0..n)];
        curve.push(cumulative);
    }
    curve
}

/// Run the bootstrap simulation.
///
/// # Arguments
/// - `pnl`: realized per-trade PnL. Empty input yields an empty result.
/// - `progress`: called with `(completed, total)` after every run.
/// - `cancel`: checked before each run; once raised the call returns
///   [`McError::Cancelled`].
pub fn run_monte_carlo(
    pnl: &[f64],
    config: &MonteCarloConfig,
    progress: Option<&(dyn Fn(McProgress) + Sync)>,
    cancel: Option<&AtomicBool>,
) -> Result<MonteCarloResult, McError> {
    config.validate()?;

    let hierarchy = match config.seed {
        Some(seed) => RngHierarchy::new(seed),
        None => RngHierarchy::from_entropy(),
    };

    if pnl.is_empty() {
        debug!("no realized trades, skipping monte carlo");
        return Ok(MonteCarloResult {
            seed: hierarchy.master_seed(),
            ..MonteCarloResult::default()
        });
    }

    let total = config.n_simulations;
    info!(
        simulations = total,
        trades = pnl.len(),
        seed = hierarchy.master_seed(),
        parallel = config.parallel,
        "running monte carlo"
    );

    let curves = if config.parallel {
        run_parallel(pnl, total, &hierarchy, progress, cancel)?
    } else {
        run_sequential(pnl, total, &hierarchy, progress, cancel)?
    };

    let finals: Vec<f64> = curves.iter().map(SimulationRun::final_value).collect();
    let summary = McSummary::from_finals(&finals);
    debug!(
        loss_probability = summary.loss_probability,
        p5 = summary.p5,
        median = summary.median,
        p95 = summary.p95,
        "monte carlo complete"
    );

    Ok(MonteCarloResult {
        runs: if config.retain_curves { curves } else { Vec::new() },
        finals,
        summary,
        realized_curve: None,
        seed: hierarchy.master_seed(),
    })
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|f| f.load(Ordering::Relaxed))
}

fn run_sequential(
    pnl: &[f64],
    total: usize,
    hierarchy: &RngHierarchy,
    progress: Option<&(dyn Fn(McProgress) + Sync)>,
    cancel: Option<&AtomicBool>,
) -> Result<Vec<SimulationRun>, McError> {
    let mut runs = Vec::with_capacity(total);
    for index in 0..total {
        if is_cancelled(cancel) {
            return Err(McError::Cancelled {
                completed: index,
                total,
            });
        }
        let mut rng = hierarchy.rng_for(RESAMPLE_STREAM, index as u64);
        runs.push(SimulationRun {
            curve: resample_curve(pnl, &mut rng),
        });
        if let Some(cb) = progress {
            cb(McProgress {
                completed: index + 1,
                total,
            });
        }
    }
    Ok(runs)
}

fn run_parallel(
    pnl: &[f64],
    total: usize,
    hierarchy: &RngHierarchy,
    progress: Option<&(dyn Fn(McProgress) + Sync)>,
    cancel: Option<&AtomicBool>,
) -> Result<Vec<SimulationRun>, McError> {
    let completed = AtomicUsize::new(0);

    // Indexed collect keeps run order regardless of scheduling.
    let runs: Vec<Option<SimulationRun>> = (0..total)
        .into_par_iter()
        .map(|index| {
            if is_cancelled(cancel) {
                return None;
            }
            let mut rng = hierarchy.rng_for(RESAMPLE_STREAM, index as u64);
            let run = SimulationRun {
                curve: resample_curve(pnl, &mut rng),
            };
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(cb) = progress {
                cb(McProgress {
                    completed: done,
                    total,
                });
            }
            Some(run)
        })
        .collect();

    let done = completed.load(Ordering::Relaxed);
    if done < total {
        return Err(McError::Cancelled {
            completed: done,
            total,
        });
    }
    Ok(runs.into_iter().flatten().collect())
}
