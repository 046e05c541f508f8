//! BDD scenarios for the file-to-report pipeline.
//!
//! - Big5 broker export is read, analyzed and simulated through a session
//! - A report that no encoding can parse lists every attempt
//! - Re-configuring after Monte Carlo drops the simulation
//! - A cancelled simulation leaves the report without results
//! - Non-finite prices never reach the report

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use tradescope_core::{McError, McProgress, PositionSizer, SizingMode, SkipReason};
use tradescope_runner::{
    analyze, export_json, import_json, parse_trades, read_trades, AnalysisConfig, IngestConfig,
    IngestError, IngestOutcome, Session, SessionError, SessionState,
};

const REPORT: &str = "\
商品名稱,商品代碼,序號,進場時間,進場方向,進場價格,出場時間,出場方向,出場價格
台積電,2330,1,2024/03/01 09:00:00,買進,100,2024/03/04 13:30:00,賣出,110
鴻海,2317,2,2024/03/02 09:00:00,買進,100,2024/03/05 13:30:00,賣出,90
聯發科,2454,3,2024/03/06 09:00:00,買進,50,2024/03/08 13:30:00,賣出,60
";

fn write_big5(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let (bytes, _, had_errors) = encoding_rs::BIG5.encode(REPORT);
    assert!(!had_errors);
    let path = dir.path().join("trades.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(&bytes).unwrap();
    path
}

fn seeded(simulations: usize) -> AnalysisConfig {
    let mut config = AnalysisConfig::default();
    config.monte_carlo.simulations = simulations;
    config.monte_carlo.seed = Some(20240301);
    config
}

#[test]
fn bdd_scenario_big5_report_through_session() {
    // GIVEN a Big5-encoded broker export on disk
    let dir = tempfile::tempdir().unwrap();
    let path = write_big5(&dir);

    // WHEN it is read with the default encoding list
    let outcome = read_trades(&path, &IngestConfig::default()).unwrap();

    // THEN the first encoding succeeds and all rows are parsed
    let loaded = outcome.into_result().unwrap();
    assert_eq!(loaded.encoding, "big5");
    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded.trades[2].instrument_name, "聯發科");

    // WHEN the session is loaded, configured and analyzed
    let mut session = Session::new();
    session.load(loaded).unwrap();
    session.configure(seeded(200)).unwrap();
    let report = session.analyze().unwrap();

    // THEN the report matches the hand-computed figures
    assert_eq!(report.statistics.total_pnl, 20_000.0);
    assert!((report.statistics.profit_factor - 3.0).abs() < 1e-12);
    assert!((report.statistics.win_rate - 66.666_666).abs() < 1e-3);
    assert_eq!(report.drawdown.max_drawdown, -10_000.0);
    assert_eq!(report.concurrency.max_concurrent_capital, 200_000.0);

    // AND Monte Carlo reports progress for every run
    let calls = std::sync::atomic::AtomicUsize::new(0);
    let progress = |_: McProgress| {
        calls.fetch_add(1, Ordering::Relaxed);
    };
    let mc = session.run_monte_carlo(None, Some(&progress), None).unwrap();
    assert_eq!(mc.runs.len(), 200);
    assert_eq!(mc.seed, 20240301);
    assert_eq!(calls.load(Ordering::Relaxed), 200);
    assert_eq!(session.state(), SessionState::Analyzed);
}

#[test]
fn bdd_scenario_unparseable_report_lists_attempts() {
    // GIVEN a file that is not a trade report in any encoding
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.csv");
    std::fs::write(&path, [0xFFu8, 0xFE, 0x00, 0x81, 0x0A]).unwrap();

    // WHEN it is read
    let outcome = read_trades(&path, &IngestConfig::default()).unwrap();

    // THEN every configured encoding was attempted
    let IngestOutcome::Failure { attempted } = outcome.clone() else {
        panic!("expected failure");
    };
    let labels: Vec<&str> = attempted.iter().map(|a| a.encoding.as_str()).collect();
    assert_eq!(labels, vec!["big5", "utf-8", "gb2312", "cp950"]);

    // AND the error form carries the same attempts
    let err = outcome.into_result().unwrap_err();
    assert!(matches!(err, IngestError::AllEncodingsFailed { ref attempted } if attempted.len() == 4));
}

#[test]
fn bdd_scenario_reconfigure_drops_simulation() {
    // GIVEN an analyzed session with Monte Carlo results
    let dir = tempfile::tempdir().unwrap();
    let loaded = read_trades(&write_big5(&dir), &IngestConfig::default())
        .unwrap()
        .into_result()
        .unwrap();
    let mut session = Session::new();
    session.load(loaded).unwrap();
    session.configure(seeded(50)).unwrap();
    session.analyze().unwrap();
    session.run_monte_carlo(None, None, None).unwrap();

    // WHEN the user switches to unit sizing
    session.reconfigure().unwrap();
    let mut unit = seeded(50);
    unit.sizing.mode = SizingMode::Unit;
    session.configure(unit).unwrap();
    let report = session.analyze().unwrap();

    // THEN the new report has no simulation and reflects unit sizing
    assert!(report.monte_carlo.is_none());
    assert_eq!(report.sizing_mode, SizingMode::Unit);
    assert!(report.trades.iter().all(|t| (t.invested_amount - 100_000.0).abs() < 1e-6));
}

#[test]
fn bdd_scenario_cancelled_simulation() {
    // GIVEN an analyzed session
    let dir = tempfile::tempdir().unwrap();
    let loaded = read_trades(&write_big5(&dir), &IngestConfig::default())
        .unwrap()
        .into_result()
        .unwrap();
    let mut session = Session::new();
    session.load(loaded).unwrap();
    session.configure(seeded(1000)).unwrap();
    session.analyze().unwrap();

    // WHEN the cancel flag is raised part-way through
    let cancel = AtomicBool::new(false);
    let progress = |p: McProgress| {
        if p.completed == 10 {
            cancel.store(true, Ordering::Relaxed);
        }
    };
    let err = session
        .run_monte_carlo(None, Some(&progress), Some(&cancel))
        .unwrap_err();

    // THEN the run stops with a cancellation error and no result is kept
    assert!(matches!(
        err,
        SessionError::MonteCarlo(McError::Cancelled {
            completed: 10,
            total: 1000
        })
    ));
    assert!(session.monte_carlo().is_none());
    assert_eq!(session.state(), SessionState::Analyzed);
}

#[test]
fn bdd_scenario_non_finite_prices_are_kept_out() {
    // GIVEN a UTF-8 report whose second and third exits are NaN and inf
    let csv = "\
instrument_name,instrument_code,sequence_no,entry_time,entry_side,entry_price,exit_time,exit_side,exit_price
A,A1,1,2024-01-02 09:00:00,long,10,2024-01-03 09:00:00,short,12
B,B1,2,2024-01-02 09:00:00,long,10,2024-01-04 09:00:00,short,NaN
C,C1,3,2024-01-02 09:00:00,long,10,2024-01-05 09:00:00,short,inf
";

    // WHEN it is parsed
    let outcome = parse_trades(csv.as_bytes(), &["utf-8".to_string()]);

    // THEN ingestion fails on the first bad exit price
    let IngestOutcome::Failure { attempted } = outcome else {
        panic!("expected failure");
    };
    assert_eq!(
        attempted[0].error,
        IngestError::InvalidField {
            row: 2,
            field: "exit_price".into(),
            value: "NaN".into()
        }
    );

    // AND a NaN exit handed straight to the pipeline is skipped, not priced
    let mut raws = parse_trades(
        csv.lines().take(2).collect::<Vec<_>>().join("\n").as_bytes(),
        &["utf-8".to_string()],
    )
    .into_result()
    .unwrap()
    .trades;
    let mut bad = raws[0].clone();
    bad.sequence_no = 2;
    bad.exit_price = f64::NAN;
    raws.push(bad);
    let report = analyze(&raws, &PositionSizer::new(100_000.0, SizingMode::Lot).unwrap());

    assert_eq!(report.trades.len(), 1);
    assert!(matches!(
        report.skipped[0].reason,
        SkipReason::InvalidExitPrice { exit_price } if exit_price.is_nan()
    ));
    assert_eq!(report.statistics.total_pnl, 20_000.0);
    assert_eq!(report.drawdown.max_drawdown, 0.0);

    // AND the report re-imports from its own JSON
    let back = import_json(&export_json(&report).unwrap()).unwrap();
    assert_eq!(back.trades, report.trades);
    assert!(matches!(
        back.skipped[0].reason,
        SkipReason::InvalidExitPrice { exit_price } if exit_price.is_nan()
    ));
}
