//! TradeScope CLI — analyze, simulate and inspect backtest trade reports.
//!
//! Commands:
//! - `analyze` — full report from a trade CSV, optional Monte Carlo, artifact bundle
//! - `simulate` — Monte Carlo only, progress on stderr, optional time limit
//! - `inspect` — load and validate a trade CSV, print encoding and row count

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tradescope_core::{McError, McProgress, MonteCarloResult, SizingMode};
use tradescope_runner::{
    export_json, generate_report, read_trades, save_artifacts, AnalysisConfig, AnalysisReport,
    IngestConfig, IngestOutcome, LoadedTrades, Session, SessionError,
};

const DEFAULT_LOG_DIRECTIVES: &str = "tradescope=info,tradescope_core=info,tradescope_runner=info";
const VERBOSE_LOG_DIRECTIVES: &str =
    "tradescope=debug,tradescope_core=debug,tradescope_runner=debug";

#[derive(Parser)]
#[command(
    name = "tradescope",
    about = "TradeScope CLI — backtest trade report analytics"
)]
struct Cli {
    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a trade report and save the artifact bundle.
    Analyze {
        /// Trade report CSV.
        file: PathBuf,

        #[command(flatten)]
        params: AnalysisArgs,

        /// Also run the Monte Carlo simulation.
        #[arg(long, default_value_t = false)]
        monte_carlo: bool,

        /// Output directory for the artifact bundle.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Print the full report as JSON instead of the summary.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Print the Markdown report after the summary.
        #[arg(long, default_value_t = false)]
        markdown: bool,
    },
    /// Run only the Monte Carlo simulation on a trade report.
    Simulate {
        /// Trade report CSV.
        file: PathBuf,

        #[command(flatten)]
        params: AnalysisArgs,

        /// Stop the simulation after this many seconds.
        #[arg(long)]
        time_limit: Option<f64>,

        /// Print the simulation result as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Load and validate a trade report without analyzing it.
    Inspect {
        /// Trade report CSV.
        file: PathBuf,

        /// Encodings to try, in order (comma separated).
        #[arg(long, value_delimiter = ',')]
        encodings: Option<Vec<String>>,
    },
}

/// Parameters shared by `analyze` and `simulate`. Flags override the config file.
#[derive(clap::Args)]
struct AnalysisArgs {
    /// Path to a TOML analysis config.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Investment per trade.
    #[arg(long)]
    investment: Option<f64>,

    /// Position sizing mode.
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Number of Monte Carlo simulations.
    #[arg(long)]
    simulations: Option<usize>,

    /// Monte Carlo seed for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,

    /// Run simulations on all cores.
    #[arg(long, default_value_t = false)]
    parallel: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Whole lots of 1000 shares.
    Lot,
    /// Fractional shares, fully invested.
    Unit,
}

impl From<ModeArg> for SizingMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Lot => SizingMode::Lot,
            ModeArg::Unit => SizingMode::Unit,
        }
    }
}

impl AnalysisArgs {
    fn resolve(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_file(path)?,
            None => AnalysisConfig::default(),
        };
        if let Some(investment) = self.investment {
            config.sizing.investment = investment;
        }
        if let Some(mode) = self.mode {
            config.sizing.mode = mode.into();
        }
        if let Some(n) = self.simulations {
            config.monte_carlo.simulations = n;
        }
        if self.seed.is_some() {
            config.monte_carlo.seed = self.seed;
        }
        if self.parallel {
            config.monte_carlo.parallel = true;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Analyze {
            file,
            params,
            monte_carlo,
            output_dir,
            json,
            markdown,
        } => run_analyze(&file, &params, monte_carlo, &output_dir, json, markdown),
        Commands::Simulate {
            file,
            params,
            time_limit,
            json,
        } => run_simulate(&file, &params, time_limit, json),
        Commands::Inspect { file, encodings } => run_inspect(&file, encodings),
    }
}

fn init_tracing(verbose: bool) {
    let directives = if verbose {
        VERBOSE_LOG_DIRECTIVES
    } else {
        DEFAULT_LOG_DIRECTIVES
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load(file: &Path, ingest: &IngestConfig) -> Result<LoadedTrades> {
    let outcome = read_trades(file, ingest)
        .with_context(|| format!("failed to read {}", file.display()))?;

    match outcome {
        IngestOutcome::Success(loaded) => Ok(loaded),
        IngestOutcome::Failure { attempted } => {
            for attempt in &attempted {
                eprintln!("  {:<8} {}", attempt.encoding, attempt.error);
            }
            bail!(
                "could not parse {} with any of {} encodings",
                file.display(),
                attempted.len()
            )
        }
    }
}

fn analyzed_session(file: &Path, params: &AnalysisArgs) -> Result<Session> {
    let config = params.resolve()?;
    let loaded = load(file, &config.ingest)?;

    let mut session = Session::new();
    session.load(loaded)?;
    session.configure(config)?;
    session.analyze()?;
    Ok(session)
}

fn run_analyze(
    file: &Path,
    params: &AnalysisArgs,
    monte_carlo: bool,
    output_dir: &Path,
    json: bool,
    markdown: bool,
) -> Result<()> {
    let mut session = analyzed_session(file, params)?;

    if monte_carlo {
        simulate_with_limit(&mut session, None)?;
    }

    let Some(report) = session.report() else {
        bail!("session has no report after analysis");
    };

    if json {
        println!("{}", export_json(report)?);
    } else {
        print_summary(report);
        if markdown {
            println!("{}", generate_report(report));
        }
    }

    let label = file
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "report".into());
    let run_dir = save_artifacts(report, output_dir, &label)?;
    eprintln!("Artifacts saved to: {}", run_dir.display());

    Ok(())
}

fn run_simulate(
    file: &Path,
    params: &AnalysisArgs,
    time_limit: Option<f64>,
    json: bool,
) -> Result<()> {
    if let Some(secs) = time_limit {
        if !(secs.is_finite() && secs > 0.0) {
            bail!("--time-limit must be a positive number of seconds, got {secs}");
        }
    }

    let mut session = analyzed_session(file, params)?;
    if session.report().is_some_and(AnalysisReport::is_empty) {
        println!("No analyzable trades; nothing to simulate.");
        return Ok(());
    }

    simulate_with_limit(&mut session, time_limit.map(Duration::from_secs_f64))?;

    let Some(result) = session.monte_carlo() else {
        bail!("session has no Monte Carlo result after simulation");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        print_monte_carlo(result);
    }
    Ok(())
}

/// Run Monte Carlo on an analyzed session with progress on stderr.
///
/// With a time limit, a watcher thread raises the cancellation flag once the
/// deadline passes.
fn simulate_with_limit(session: &mut Session, limit: Option<Duration>) -> Result<()> {
    let cancel = AtomicBool::new(false);
    let done = AtomicBool::new(false);

    let progress = |p: McProgress| {
        let step = (p.total / 20).max(1);
        if p.completed % step == 0 || p.completed == p.total {
            eprint!("\rSimulating: {}/{} ({:.0}%)", p.completed, p.total, p.fraction() * 100.0);
        }
    };

    let outcome = std::thread::scope(|s| {
        if let Some(limit) = limit {
            let (cancel, done) = (&cancel, &done);
            let deadline = Instant::now() + limit;
            s.spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    if Instant::now() >= deadline {
                        warn!(seconds = limit.as_secs_f64(), "time limit reached, cancelling");
                        cancel.store(true, Ordering::Relaxed);
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(20));
                }
            });
        }
        let result = session
            .run_monte_carlo(None, Some(&progress), Some(&cancel))
            .map(|_| ());
        done.store(true, Ordering::Relaxed);
        result
    });
    eprintln!();

    match outcome {
        Ok(()) => Ok(()),
        Err(SessionError::MonteCarlo(McError::Cancelled { completed, total })) => {
            bail!("simulation stopped after {completed} of {total} runs")
        }
        Err(e) => Err(e.into()),
    }
}

fn run_inspect(file: &Path, encodings: Option<Vec<String>>) -> Result<()> {
    let ingest = match encodings {
        Some(encodings) => IngestConfig { encodings },
        None => IngestConfig::default(),
    };
    let loaded = load(file, &ingest)?;

    println!("File:        {}", file.display());
    println!("Encoding:    {}", loaded.encoding);
    println!("Rows:        {}", loaded.len());
    if loaded.is_empty() {
        return Ok(());
    }

    let first_entry = loaded.trades.iter().map(|t| t.entry_time).min();
    let last_exit = loaded.trades.iter().map(|t| t.exit_time).max();
    if let (Some(first), Some(last)) = (first_entry, last_exit) {
        println!("Period:      {} to {}", first.date(), last.date());
    }
    let mut codes: Vec<&str> = loaded
        .trades
        .iter()
        .map(|t| t.instrument_code.as_str())
        .collect();
    codes.sort_unstable();
    codes.dedup();
    println!("Instruments: {}", codes.len());
    Ok(())
}

fn print_summary(report: &AnalysisReport) {
    let stats = &report.statistics;
    println!();
    println!("=== Trade Analysis ===");
    println!("Investment:     {:.0} per trade ({:?} mode)", report.investment, report.sizing_mode);
    println!(
        "Trades:         {} analyzed, {} skipped, {} input",
        stats.trade_count,
        report.skipped_count(),
        report.input_count
    );
    if report.is_empty() {
        println!();
        println!("No analyzable trades.");
        println!();
        return;
    }
    println!();
    println!("--- Performance ---");
    println!("Total PnL:      {:.2}", stats.total_pnl);
    println!("Total Invested: {:.2}", stats.total_invested);
    println!("Total Return:   {:.2}%", stats.total_return);
    println!("Avg PnL:        {:.2}", stats.avg_pnl);
    println!("Sharpe:         {:.3}", stats.sharpe);
    if stats.profit_factor.is_infinite() {
        println!("Profit Factor:  inf");
    } else {
        println!("Profit Factor:  {:.2}", stats.profit_factor);
    }
    println!(
        "Win Rate:       {:.1}% ({} W / {} L)",
        stats.win_rate, stats.winning_trades, stats.losing_trades
    );
    println!("Avg Hold:       {:.1} days", stats.avg_holding_days);
    println!();
    println!("--- Risk ---");
    println!("Max Drawdown:   {:.2}", report.drawdown.max_drawdown);
    println!("Max DD %:       {:.2}%", report.drawdown.max_drawdown_pct * 100.0);
    println!(
        "Max Concurrent: {:.2}",
        report.concurrency.max_concurrent_capital
    );
    if let Some(mc) = &report.monte_carlo {
        println!();
        print_monte_carlo(mc);
    }
    println!();
}

fn print_monte_carlo(mc: &MonteCarloResult) {
    let s = &mc.summary;
    println!("--- Monte Carlo ({} runs, seed {}) ---", mc.finals.len(), mc.seed);
    println!("Loss Prob:      {:.1}%", s.loss_probability);
    println!("P5:             {:.2}", s.p5);
    println!("Median:         {:.2}", s.median);
    println!("P95:            {:.2}", s.p95);
    println!("Mean:           {:.2}", s.mean);
    println!("Range:          {:.2} to {:.2}", s.min, s.max);
}
