//! Reporting and export — JSON, CSV, and Markdown artifact generation.
//!
//! Provides three export formats for analysis reports:
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: per-table exports (trades, equity, drawdown, concurrency,
//!   Monte Carlo) for spreadsheets and plotting tools
//! - **Markdown**: a human-readable summary report
//!
//! Persisted reports carry a `schema_version`. Newer versions are rejected on
//! load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tradescope_core::concurrency::ConcurrencyReport;
use tradescope_core::domain::{EquityPoint, PricedTrade};
use tradescope_core::{DrawdownAnalysis, MonteCarloResult, SkippedTrade};

use crate::analysis::{AnalysisReport, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &AnalysisReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize AnalysisReport to JSON")
}

/// Deserialize an `AnalysisReport`, rejecting newer schema versions.
pub fn import_json(json: &str) -> Result<AnalysisReport> {
    let report: AnalysisReport =
        serde_json::from_str(json).context("failed to deserialize AnalysisReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export priced trades in input order.
pub fn export_trades_csv(trades: &[PricedTrade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "sequence_no",
        "instrument_code",
        "instrument_name",
        "entry_time",
        "entry_side",
        "entry_price",
        "exit_time",
        "exit_side",
        "exit_price",
        "shares",
        "invested_amount",
        "pnl",
        "return_pct",
        "holding_days",
    ])?;

    for t in trades {
        let r = &t.raw;
        wtr.write_record([
            r.sequence_no.to_string().as_str(),
            &r.instrument_code,
            &r.instrument_name,
            &r.entry_time.to_string(),
            r.entry_side.code(),
            &format!("{:.4}", r.entry_price),
            &r.exit_time.to_string(),
            r.exit_side.code(),
            &format!("{:.4}", r.exit_price),
            &format!("{:.4}", t.shares),
            &format!("{:.2}", t.invested_amount),
            &format!("{:.2}", t.pnl),
            &format!("{:.6}", t.return_pct),
            &t.holding_days.to_string(),
        ])?;
    }

    finish(wtr)
}

pub fn export_skipped_csv(skipped: &[SkippedTrade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["sequence_no", "instrument_code", "reason"])?;
    for s in skipped {
        wtr.write_record([
            s.sequence_no.to_string().as_str(),
            &s.instrument_code,
            s.reason.code(),
        ])?;
    }
    finish(wtr)
}

pub fn export_equity_csv(curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["exit_time", "instrument_code", "pnl", "cumulative_pnl", "is_new_high"])?;
    for p in curve {
        wtr.write_record([
            &p.exit_time.to_string(),
            &p.instrument_code,
            &format!("{:.2}", p.pnl),
            &format!("{:.2}", p.cumulative_pnl),
            &p.is_new_high.to_string(),
        ])?;
    }
    finish(wtr)
}

/// Drawdown percentages are written as percent (fraction × 100).
pub fn export_drawdown_csv(drawdown: &DrawdownAnalysis) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["time", "drawdown_amount", "drawdown_pct", "is_max_drawdown"])?;
    for p in &drawdown.points {
        wtr.write_record([
            &p.time.to_string(),
            &format!("{:.2}", p.drawdown_amount),
            &format!("{:.4}", p.drawdown_pct * 100.0),
            &p.is_max_drawdown.to_string(),
        ])?;
    }
    finish(wtr)
}

pub fn export_concurrency_csv(concurrency: &ConcurrencyReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "amount", "open_trades"])?;
    for d in &concurrency.daily {
        wtr.write_record([
            &d.date.to_string(),
            &format!("{:.2}", d.amount),
            &d.open_trades.to_string(),
        ])?;
    }
    finish(wtr)
}

/// One row per simulation run with its final cumulative PnL.
pub fn export_monte_carlo_csv(mc: &MonteCarloResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["run", "final_pnl"])?;
    for (i, v) in mc.finals.iter().enumerate() {
        wtr.write_record([&i.to_string(), &format!("{:.2}", v)])?;
    }
    finish(wtr)
}

/// Every retained simulated curve in long format, plus the realized curve
/// under run id `realized`.
pub fn export_monte_carlo_curves_csv(mc: &MonteCarloResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["run", "trade_index", "cumulative_pnl"])?;
    if let Some(realized) = &mc.realized_curve {
        for (j, v) in realized.iter().enumerate() {
            wtr.write_record(["realized", &j.to_string(), &format!("{:.2}", v)])?;
        }
    }
    for (i, run) in mc.runs.iter().enumerate() {
        let id = i.to_string();
        for (j, v) in run.curve.iter().enumerate() {
            wtr.write_record([&id, &j.to_string(), &format!("{:.2}", v)])?;
        }
    }
    finish(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for one report.
///
/// Creates `{label}_{timestamp}/` under `output_dir` containing
/// `report.json`, `report.md`, `trades.csv`, `skipped.csv`, `equity.csv`,
/// `drawdown.csv`, `concurrency.csv`, and when Monte Carlo has run,
/// `monte_carlo.csv` and `monte_carlo_curves.csv`.
///
/// Returns the path to the created directory.
pub fn save_artifacts(report: &AnalysisReport, output_dir: &Path, label: &str) -> Result<PathBuf> {
    let dirname = format!("{}_{}", label, chrono::Local::now().format("%Y%m%d_%H%M%S"));
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let write = |name: &str, content: String| -> Result<()> {
        let path = run_dir.join(name);
        std::fs::write(&path, content)
            .with_context(|| format!("failed to write {}", path.display()))
    };

    write("report.json", export_json(report)?)?;
    write("report.md", generate_report(report))?;
    write("trades.csv", export_trades_csv(&report.trades)?)?;
    write("skipped.csv", export_skipped_csv(&report.skipped)?)?;
    write("equity.csv", export_equity_csv(&report.equity_curve)?)?;
    write("drawdown.csv", export_drawdown_csv(&report.drawdown)?)?;
    write("concurrency.csv", export_concurrency_csv(&report.concurrency)?)?;
    if let Some(mc) = &report.monte_carlo {
        write("monte_carlo.csv", export_monte_carlo_csv(mc)?)?;
        write("monte_carlo_curves.csv", export_monte_carlo_curves_csv(mc)?)?;
    }

    Ok(run_dir)
}

/// Load a report from an artifact directory's `report.json`.
pub fn load_artifacts(dir: &Path) -> Result<AnalysisReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

// ─── Markdown report ────────────────────────────────────────────────

fn format_profit_factor(pf: f64) -> String {
    if pf.is_infinite() {
        "∞".to_string()
    } else {
        format!("{pf:.2}")
    }
}

/// Generate a Markdown summary for one report.
pub fn generate_report(report: &AnalysisReport) -> String {
    let mut md = String::with_capacity(4096);

    md.push_str("# Backtest Trade Analysis\n\n");

    md.push_str("## Parameters\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Investment per Trade | {:.0} |\n", report.investment));
    md.push_str(&format!("| Sizing Mode | {} |\n", report.sizing_mode.name()));
    md.push_str(&format!(
        "| Trades | {} analyzed / {} input |\n",
        report.trades.len(),
        report.input_count
    ));
    if report.skipped_count() > 0 {
        md.push_str(&format!("| Skipped | {} |\n", report.skipped_count()));
    }
    md.push_str(&format!("| Generated | {} |\n", report.generated_at.format("%Y-%m-%d %H:%M:%S")));
    md.push('\n');

    if report.is_empty() {
        md.push_str("_No analyzable trades._\n");
        return md;
    }

    let s = &report.statistics;
    md.push_str("## Performance Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Total PnL | {:.2} |\n", s.total_pnl));
    md.push_str(&format!("| Total Return | {:.2}% |\n", s.total_return));
    md.push_str(&format!("| Average PnL | {:.2} |\n", s.avg_pnl));
    md.push_str(&format!("| Win Rate | {:.1}% |\n", s.win_rate));
    md.push_str(&format!("| Profit Factor | {} |\n", format_profit_factor(s.profit_factor)));
    md.push_str(&format!("| Sharpe | {:.3} |\n", s.sharpe));
    md.push_str(&format!("| Max Drawdown | {:.2} |\n", report.drawdown.max_drawdown));
    md.push_str(&format!(
        "| Max Drawdown % | {:.2}% |\n",
        report.drawdown.max_drawdown_pct * 100.0
    ));
    md.push_str(&format!(
        "| Max Concurrent Capital | {:.0} |\n",
        report.concurrency.max_concurrent_capital
    ));
    md.push_str(&format!("| Avg Holding Days | {:.1} |\n", s.avg_holding_days));
    md.push('\n');

    let b = &report.breakdown;
    if !b.price_buckets.is_empty() {
        md.push_str("## Entry Price Buckets\n\n");
        md.push_str("| Bucket | Total PnL | Mean PnL | Trades |\n");
        md.push_str("| --- | ---: | ---: | ---: |\n");
        for bucket in &b.price_buckets {
            md.push_str(&format!(
                "| {} | {:.2} | {:.2} | {} |\n",
                bucket.label, bucket.total_pnl, bucket.mean_pnl, bucket.trade_count
            ));
        }
        md.push('\n');
    }

    for (title, months) in [("Entry Month", &b.entry_months), ("Exit Month", &b.exit_months)] {
        if months.is_empty() {
            continue;
        }
        md.push_str(&format!("## PnL by {title}\n\n"));
        md.push_str("| Month | Total PnL | Trades |\n");
        md.push_str("| --- | ---: | ---: |\n");
        for m in months {
            md.push_str(&format!("| {} | {:.2} | {} |\n", m.month, m.total_pnl, m.trade_count));
        }
        md.push('\n');
    }

    if let Some(mc) = &report.monte_carlo {
        let m = &mc.summary;
        md.push_str("## Monte Carlo\n\n");
        md.push_str("| Metric | Value |\n");
        md.push_str("| --- | --- |\n");
        md.push_str(&format!("| Simulations | {} |\n", mc.finals.len()));
        md.push_str(&format!("| Seed | {} |\n", mc.seed));
        md.push_str(&format!("| Loss Probability | {:.1}% |\n", m.loss_probability));
        md.push_str(&format!("| 5th Percentile | {:.2} |\n", m.p5));
        md.push_str(&format!("| Median | {:.2} |\n", m.median));
        md.push_str(&format!("| 95th Percentile | {:.2} |\n", m.p95));
        md.push('\n');
    }

    md
}
