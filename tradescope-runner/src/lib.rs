//! TradeScope Runner — ingestion, orchestration, session state, export.
//!
//! This crate builds on `tradescope-core` to provide:
//! - CSV trade report ingestion with multi-encoding fallback
//! - TOML analysis configuration with validation
//! - The analysis pipeline producing a serializable report
//! - A session state machine (idle → loaded → configured → analyzed)
//! - JSON / CSV / Markdown export and artifact bundles

pub mod analysis;
pub mod config;
pub mod export;
pub mod ingest;
pub mod session;

pub use analysis::{analyze, analyze_with_config, AnalysisReport, SCHEMA_VERSION};
pub use config::{AnalysisConfig, ConfigError, MonteCarloSettings, SizingConfig};
pub use export::{
    export_json, generate_report, import_json, load_artifacts, save_artifacts,
};
pub use ingest::{
    parse_trades, read_trades, EncodingAttempt, IngestConfig, IngestError, IngestOutcome,
    LoadedTrades,
};
pub use session::{Session, SessionError, SessionState};
