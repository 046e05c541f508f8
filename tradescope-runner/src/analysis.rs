//! Analysis orchestration — runs the core pipeline over a raw trade list.
//!
//! Sizing feeds the equity curve, concurrency, statistics and breakdowns; the
//! equity curve feeds drawdown. Monte Carlo runs on demand afterwards, since
//! it is the only expensive stage.

use std::sync::atomic::AtomicBool;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::info;
use tradescope_core::concurrency::ConcurrencyReport;
use tradescope_core::domain::{EquityPoint, PricedTrade, RawTrade};
use tradescope_core::equity::cumulative_values;
use tradescope_core::{
    analyze_drawdown, build_equity_curve, run_monte_carlo, DrawdownAnalysis, McError, McProgress,
    MonteCarloConfig, MonteCarloResult, PositionSizer, RiskStatistics, SizingMode, SkippedTrade,
    TradeBreakdown,
};

use crate::config::{AnalysisConfig, ConfigError};

/// Current schema version for serialized reports.
pub const SCHEMA_VERSION: u32 = 1;

/// Everything derived from one trade list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub schema_version: u32,
    pub generated_at: NaiveDateTime,

    // ── Inputs ──
    pub investment: f64,
    pub sizing_mode: SizingMode,
    pub input_count: usize,

    // ── Trades ──
    pub trades: Vec<PricedTrade>,
    pub skipped: Vec<SkippedTrade>,

    // ── Series ──
    pub equity_curve: Vec<EquityPoint>,
    pub drawdown: DrawdownAnalysis,
    pub concurrency: ConcurrencyReport,

    // ── Scalars and tables ──
    pub statistics: RiskStatistics,
    pub breakdown: TradeBreakdown,

    /// Filled by [`AnalysisReport::run_monte_carlo`].
    #[serde(default)]
    pub monte_carlo: Option<MonteCarloResult>,
}

impl AnalysisReport {
    /// True when no trade survived sizing.
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Realized PnL in exit order.
    pub fn realized_pnl(&self) -> Vec<f64> {
        self.equity_curve.iter().map(|p| p.pnl).collect()
    }

    /// Run Monte Carlo over the realized PnL, replacing any previous result.
    ///
    /// The result carries the realized cumulative curve for overlay.
    pub fn run_monte_carlo(
        &mut self,
        config: &MonteCarloConfig,
        progress: Option<&(dyn Fn(McProgress) + Sync)>,
        cancel: Option<&AtomicBool>,
    ) -> Result<&MonteCarloResult, McError> {
        self.monte_carlo = None;
        let result = run_monte_carlo(&self.realized_pnl(), config, progress, cancel)?
            .with_realized_curve(cumulative_values(&self.equity_curve));
        Ok(self.monte_carlo.insert(result))
    }

    pub fn clear_monte_carlo(&mut self) {
        self.monte_carlo = None;
    }
}

/// Run the full pipeline with an explicit sizer.
pub fn analyze(raws: &[RawTrade], sizer: &PositionSizer) -> AnalysisReport {
    let outcome = sizer.price_all(raws);
    let trades = outcome.trades;

    let equity_curve = build_equity_curve(&trades);
    let drawdown = analyze_drawdown(&equity_curve);
    let concurrency = ConcurrencyReport::compute(&trades);
    let statistics = RiskStatistics::compute(&trades);
    let breakdown = TradeBreakdown::compute(&trades);

    info!(
        input = raws.len(),
        analyzed = trades.len(),
        skipped = outcome.skipped.len(),
        total_pnl = statistics.total_pnl,
        "analysis complete"
    );

    AnalysisReport {
        schema_version: SCHEMA_VERSION,
        generated_at: chrono::Local::now().naive_local(),
        investment: sizer.investment(),
        sizing_mode: sizer.mode(),
        input_count: raws.len(),
        trades,
        skipped: outcome.skipped,
        equity_curve,
        drawdown,
        concurrency,
        statistics,
        breakdown,
        monte_carlo: None,
    }
}

/// Validate `config` and run the pipeline with its sizing settings.
pub fn analyze_with_config(
    raws: &[RawTrade],
    config: &AnalysisConfig,
) -> Result<AnalysisReport, ConfigError> {
    config.validate()?;
    Ok(analyze(raws, &config.sizer()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tradescope_core::domain::TradeSide;

    fn raw(seq: u64, entry_day: u32, exit_day: u32, entry: f64, exit: f64) -> RawTrade {
        let t = |d: u32| {
            NaiveDate::from_ymd_opt(2024, 4, d)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap()
        };
        RawTrade {
            instrument_name: "X".into(),
            instrument_code: format!("{seq}"),
            sequence_no: seq,
            entry_time: t(entry_day),
            entry_side: TradeSide::Long,
            entry_price: entry,
            exit_time: t(exit_day),
            exit_side: TradeSide::Short,
            exit_price: exit,
        }
    }

    fn sizer() -> PositionSizer {
        PositionSizer::new(100_000.0, SizingMode::Lot).unwrap()
    }

    #[test]
    fn report_links_stages() {
        let raws = vec![raw(1, 1, 3, 100.0, 110.0), raw(2, 2, 4, 50.0, 45.0)];
        let report = analyze(&raws, &sizer());
        assert_eq!(report.schema_version, SCHEMA_VERSION);
        assert_eq!(report.input_count, 2);
        assert_eq!(report.trades.len(), 2);
        assert_eq!(report.equity_curve.len(), 2);
        assert_eq!(report.drawdown.points.len(), 2);
        assert_eq!(report.statistics.total_pnl, 10_000.0 - 10_000.0);
        assert_eq!(report.realized_pnl(), vec![10_000.0, -10_000.0]);
        assert!(report.monte_carlo.is_none());
    }

    #[test]
    fn skipped_trades_are_counted() {
        let raws = vec![raw(1, 1, 3, 0.0, 10.0), raw(2, 1, 3, 500.0, 510.0)];
        let report = analyze(&raws, &sizer());
        assert!(report.is_empty());
        assert_eq!(report.skipped_count(), 2);
        assert_eq!(report.statistics, RiskStatistics::default());
    }

    #[test]
    fn monte_carlo_attaches_realized_curve() {
        let raws = vec![raw(1, 1, 3, 100.0, 110.0), raw(2, 2, 4, 50.0, 45.0)];
        let mut report = analyze(&raws, &sizer());
        let config = MonteCarloConfig {
            n_simulations: 10,
            seed: Some(1),
            ..MonteCarloConfig::default()
        };
        let mc = report.run_monte_carlo(&config, None, None).unwrap();
        assert_eq!(mc.runs.len(), 10);
        assert_eq!(mc.realized_curve.as_deref(), Some(&[10_000.0, 0.0][..]));

        report.clear_monte_carlo();
        assert!(report.monte_carlo.is_none());
    }

    #[test]
    fn failed_monte_carlo_clears_previous_result() {
        let raws = vec![raw(1, 1, 3, 100.0, 110.0)];
        let mut report = analyze(&raws, &sizer());
        let ok = MonteCarloConfig {
            n_simulations: 10,
            seed: Some(1),
            ..MonteCarloConfig::default()
        };
        report.run_monte_carlo(&ok, None, None).unwrap();

        let bad = MonteCarloConfig {
            n_simulations: 1,
            ..ok
        };
        assert!(report.run_monte_carlo(&bad, None, None).is_err());
        assert!(report.monte_carlo.is_none());
    }

    #[test]
    fn config_errors_surface_before_analysis() {
        let mut config = AnalysisConfig::default();
        config.sizing.investment = -5.0;
        let err = analyze_with_config(&[], &config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidInvestment(_)));
    }
}
