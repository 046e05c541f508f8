//! TradeScope Core — trade-to-metrics pipeline and Monte Carlo engine.
//!
//! This crate contains the stateless analytics:
//! - Domain types (raw and priced trades, equity/drawdown/holding points)
//! - Position sizing in lot or unit mode, with observable skip reasons
//! - Realized equity curve and drawdown series
//! - Capital concurrency (daily series and intraday peak)
//! - Risk statistics (Sharpe, profit factor, win rate, totals)
//! - Trade breakdowns (PnL histogram, price buckets, monthly)
//! - Bootstrap Monte Carlo over realized PnL with a deterministic RNG hierarchy
//!
//! Every function here is a pure function of its inputs. Orchestration,
//! ingestion and export live in `tradescope-runner`.

pub mod breakdown;
pub mod concurrency;
pub mod domain;
pub mod drawdown;
pub mod equity;
pub mod metrics;
pub mod monte_carlo;
pub mod rng;
pub mod sizing;

pub use breakdown::{HistogramBin, MonthBasis, MonthlyStats, PriceBucketStats, TradeBreakdown};
pub use concurrency::{ConcurrencyEvent, ConcurrencyReport, EventKind};
pub use domain::{DailyHolding, DrawdownPoint, EquityPoint, PricedTrade, RawTrade, TradeSide};
pub use drawdown::{analyze_drawdown, DrawdownAnalysis};
pub use equity::build_equity_curve;
pub use metrics::RiskStatistics;
pub use monte_carlo::{
    run_monte_carlo, McError, McProgress, McSummary, MonteCarloConfig, MonteCarloResult,
    SimulationBounds, SimulationRun,
};
pub use rng::RngHierarchy;
pub use sizing::{PositionSizer, SizingError, SizingMode, SizingOutcome, SkipReason, SkippedTrade};
