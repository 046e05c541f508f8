//! Trade report ingestion — CSV with multi-encoding fallback.
//!
//! Broker backtest exports are usually Big5 or GBK encoded, occasionally
//! UTF-8. Each configured encoding is tried in order; an attempt fails if the
//! bytes do not decode cleanly, a required column is missing, or any row
//! fails to parse. The first attempt that succeeds wins. When every attempt
//! fails the caller gets the full list of attempts and their errors.
//!
//! Both the original Chinese column headers and English snake_case headers
//! are accepted.

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use tradescope_core::domain::{RawTrade, TradeSide};

/// Encodings tried when none are configured.
pub const DEFAULT_ENCODINGS: [&str; 4] = ["big5", "utf-8", "gb2312", "cp950"];

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Timestamp layouts seen in broker exports, most common first.
const DATETIME_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y%m%d %H:%M:%S",
    "%Y%m%d %H%M%S",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// Errors from a single ingestion attempt.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum IngestError {
    #[error("unknown encoding label '{0}'")]
    UnknownEncoding(String),

    #[error("input is not valid {0}")]
    Malformed(String),

    #[error("missing required column '{0}'")]
    MissingColumn(String),

    #[error("row {row}: invalid {field} '{value}'")]
    InvalidField {
        row: usize,
        field: String,
        value: String,
    },

    #[error("csv error: {0}")]
    Csv(String),

    #[error("could not parse trade report with any of {} encodings", .attempted.len())]
    AllEncodingsFailed { attempted: Vec<EncodingAttempt> },
}

impl From<csv::Error> for IngestError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e.to_string())
    }
}

/// One failed decoding attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingAttempt {
    pub encoding: String,
    pub error: IngestError,
}

/// Trades parsed from a report, with the encoding that worked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedTrades {
    pub trades: Vec<RawTrade>,
    pub encoding: String,
}

impl LoadedTrades {
    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Success(LoadedTrades),
    Failure { attempted: Vec<EncodingAttempt> },
}

impl IngestOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn into_result(self) -> Result<LoadedTrades, IngestError> {
        match self {
            Self::Success(loaded) => Ok(loaded),
            Self::Failure { attempted } => Err(IngestError::AllEncodingsFailed { attempted }),
        }
    }
}

/// Ingestion settings (`[ingest]` section of the analysis config).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Encoding labels tried in order.
    pub encodings: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            encodings: DEFAULT_ENCODINGS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// Resolve an encoding label. `cp950` is served by the Big5 decoder.
pub fn resolve_encoding(label: &str) -> Option<&'static Encoding> {
    match label.trim().to_ascii_lowercase().as_str() {
        "cp950" | "ms950" | "windows-950" => Some(encoding_rs::BIG5),
        other => Encoding::for_label(other.as_bytes()),
    }
}

/// Read and parse a trade report file.
///
/// I/O errors are returned directly; parse failures are reported through
/// [`IngestOutcome::Failure`].
pub fn read_trades(path: &Path, config: &IngestConfig) -> std::io::Result<IngestOutcome> {
    let bytes = std::fs::read(path)?;
    info!(path = %path.display(), bytes = bytes.len(), "reading trade report");
    Ok(parse_trades(&bytes, &config.encodings))
}

/// Parse a trade report, trying each encoding in order.
pub fn parse_trades(bytes: &[u8], encodings: &[String]) -> IngestOutcome {
    let mut attempted = Vec::with_capacity(encodings.len());

    for label in encodings {
        match parse_with_encoding(bytes, label) {
            Ok(trades) => {
                info!(encoding = %label, trades = trades.len(), "trade report parsed");
                return IngestOutcome::Success(LoadedTrades {
                    trades,
                    encoding: label.clone(),
                });
            }
            Err(error) => {
                warn!(encoding = %label, %error, "encoding attempt failed");
                attempted.push(EncodingAttempt {
                    encoding: label.clone(),
                    error,
                });
            }
        }
    }

    IngestOutcome::Failure { attempted }
}

/// Decode and parse with a single encoding.
pub fn parse_with_encoding(bytes: &[u8], label: &str) -> Result<Vec<RawTrade>, IngestError> {
    let encoding =
        resolve_encoding(label).ok_or_else(|| IngestError::UnknownEncoding(label.to_string()))?;

    let body = if encoding == encoding_rs::UTF_8 {
        bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
    } else {
        bytes
    };
    let text = encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .ok_or_else(|| IngestError::Malformed(encoding.name().to_string()))?;

    parse_csv_text(&text)
}

// ─── CSV parsing ────────────────────────────────────────────────────

/// Logical columns of a trade report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    InstrumentName,
    InstrumentCode,
    SequenceNo,
    EntryTime,
    EntrySide,
    EntryPrice,
    ExitTime,
    ExitSide,
    ExitPrice,
}

impl Column {
    const ALL: [Column; 9] = [
        Column::InstrumentName,
        Column::InstrumentCode,
        Column::SequenceNo,
        Column::EntryTime,
        Column::EntrySide,
        Column::EntryPrice,
        Column::ExitTime,
        Column::ExitSide,
        Column::ExitPrice,
    ];

    /// Header used by the broker export.
    fn native_header(self) -> &'static str {
        match self {
            Column::InstrumentName => "商品名稱",
            Column::InstrumentCode => "商品代碼",
            Column::SequenceNo => "序號",
            Column::EntryTime => "進場時間",
            Column::EntrySide => "進場方向",
            Column::EntryPrice => "進場價格",
            Column::ExitTime => "出場時間",
            Column::ExitSide => "出場方向",
            Column::ExitPrice => "出場價格",
        }
    }

    fn field_name(self) -> &'static str {
        match self {
            Column::InstrumentName => "instrument_name",
            Column::InstrumentCode => "instrument_code",
            Column::SequenceNo => "sequence_no",
            Column::EntryTime => "entry_time",
            Column::EntrySide => "entry_side",
            Column::EntryPrice => "entry_price",
            Column::ExitTime => "exit_time",
            Column::ExitSide => "exit_side",
            Column::ExitPrice => "exit_price",
        }
    }

    fn matches(self, header: &str) -> bool {
        let header = header.trim().trim_start_matches('\u{feff}');
        header == self.native_header() || header.eq_ignore_ascii_case(self.field_name())
    }
}

/// Column positions resolved from the header row.
struct ColumnMap([usize; 9]);

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, IngestError> {
        let mut positions = [0usize; 9];
        for (slot, column) in positions.iter_mut().zip(Column::ALL) {
            *slot = headers
                .iter()
                .position(|h| column.matches(h))
                .ok_or_else(|| IngestError::MissingColumn(column.native_header().to_string()))?;
        }
        Ok(Self(positions))
    }

    fn get<'r>(&self, record: &'r csv::StringRecord, column: Column) -> &'r str {
        record.get(self.0[column as usize]).unwrap_or("").trim()
    }
}

/// Parse decoded CSV text into raw trades, keeping file order.
pub fn parse_csv_text(text: &str) -> Result<Vec<RawTrade>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns = ColumnMap::from_headers(reader.headers()?)?;
    let mut trades = Vec::new();

    for (i, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        // Data rows are numbered from 1, after the header.
        let row = i + 1;
        trades.push(parse_record(&record, &columns, row)?);
    }

    debug!(rows = trades.len(), "parsed trade rows");
    Ok(trades)
}

fn parse_record(
    record: &csv::StringRecord,
    columns: &ColumnMap,
    row: usize,
) -> Result<RawTrade, IngestError> {
    let field = |column: Column| columns.get(record, column);
    let invalid = |column: Column| IngestError::InvalidField {
        row,
        field: column.field_name().to_string(),
        value: field(column).to_string(),
    };

    let sequence_no = parse_sequence(field(Column::SequenceNo))
        .ok_or_else(|| invalid(Column::SequenceNo))?;
    let entry_time =
        parse_timestamp(field(Column::EntryTime)).ok_or_else(|| invalid(Column::EntryTime))?;
    let exit_time =
        parse_timestamp(field(Column::ExitTime)).ok_or_else(|| invalid(Column::ExitTime))?;
    let entry_price =
        parse_number(field(Column::EntryPrice)).ok_or_else(|| invalid(Column::EntryPrice))?;
    let exit_price =
        parse_number(field(Column::ExitPrice)).ok_or_else(|| invalid(Column::ExitPrice))?;

    Ok(RawTrade {
        instrument_name: field(Column::InstrumentName).to_string(),
        instrument_code: field(Column::InstrumentCode).to_string(),
        sequence_no,
        entry_time,
        entry_side: TradeSide::from_code(field(Column::EntrySide)),
        entry_price,
        exit_time,
        exit_side: TradeSide::from_code(field(Column::ExitSide)),
        exit_price,
    })
}

/// Parse a timestamp in any known layout. Date-only values map to midnight.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parse a price, tolerating thousands separators.
///
/// `NaN` and infinities are rejected.
pub fn parse_number(value: &str) -> Option<f64> {
    let cleaned: String = value.chars().filter(|c| *c != ',').collect();
    cleaned.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parse a sequence number. Integral floats such as `"12.0"` are accepted.
fn parse_sequence(value: &str) -> Option<u64> {
    if let Ok(n) = value.parse::<u64>() {
        return Some(n);
    }
    let f = parse_number(value)?;
    (f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64).then_some(f as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NATIVE_CSV: &str = "\
商品名稱,商品代碼,序號,進場時間,進場方向,進場價格,出場時間,出場方向,出場價格
台積電,2330,1,2024/01/02 09:00:00,買進,\"1,000.5\",2024/01/05 13:30:00,賣出,1010
鴻海,2317,2,2024-01-03 09:05,買進,100,2024-01-04,賣出,98.5
";

    const ENGLISH_CSV: &str = "\
instrument_name,instrument_code,sequence_no,entry_time,entry_side,entry_price,exit_time,exit_side,exit_price
Acme,ACM,7,2024-02-01 10:00:00,long,12.5,2024-02-02 10:00:00,short,13
";

    fn labels(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_native_headers() {
        let trades = parse_csv_text(NATIVE_CSV).unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].instrument_code, "2330");
        assert_eq!(trades[0].entry_price, 1000.5);
        assert_eq!(trades[0].entry_side, TradeSide::Long);
        assert_eq!(trades[1].exit_side, TradeSide::Short);
        assert_eq!(
            trades[1].exit_time,
            NaiveDate::from_ymd_opt(2024, 1, 4).unwrap().and_hms_opt(0, 0, 0).unwrap()
        );
    }

    #[test]
    fn parses_english_headers() {
        let trades = parse_csv_text(ENGLISH_CSV).unwrap();
        assert_eq!(trades[0].sequence_no, 7);
        assert_eq!(trades[0].exit_price, 13.0);
    }

    #[test]
    fn extra_columns_are_ignored() {
        let csv = "備註,instrument_name,instrument_code,sequence_no,entry_time,entry_side,entry_price,exit_time,exit_side,exit_price\n\
                   x,A,A1,1.0,2024-01-01,long,1,2024-01-02,short,2\n";
        let trades = parse_csv_text(csv).unwrap();
        assert_eq!(trades[0].sequence_no, 1);
        assert_eq!(trades[0].instrument_code, "A1");
    }

    #[test]
    fn missing_column_is_reported() {
        let err = parse_csv_text("商品名稱,商品代碼\nA,B\n").unwrap_err();
        assert_eq!(err, IngestError::MissingColumn("序號".into()));
    }

    #[test]
    fn bad_timestamp_names_row_and_field() {
        let csv = ENGLISH_CSV.replace("2024-02-02 10:00:00", "yesterday");
        let err = parse_csv_text(&csv).unwrap_err();
        assert_eq!(
            err,
            IngestError::InvalidField {
                row: 1,
                field: "exit_time".into(),
                value: "yesterday".into()
            }
        );
    }

    #[test]
    fn big5_bytes_decode_with_big5() {
        let (bytes, _, had_errors) = encoding_rs::BIG5.encode(NATIVE_CSV);
        assert!(!had_errors);
        let outcome = parse_trades(&bytes, &labels(&DEFAULT_ENCODINGS));
        match outcome {
            IngestOutcome::Success(loaded) => {
                assert_eq!(loaded.encoding, "big5");
                assert_eq!(loaded.trades[0].instrument_name, "台積電");
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn utf8_falls_through_big5() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(NATIVE_CSV.as_bytes());
        let loaded = parse_trades(&bytes, &labels(&DEFAULT_ENCODINGS))
            .into_result()
            .unwrap();
        assert_eq!(loaded.encoding, "utf-8");
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn non_finite_price_names_row_and_field() {
        let csv = format!(
            "{ENGLISH_CSV}Acme,ACM,8,2024-02-03 10:00:00,long,12.5,2024-02-04 10:00:00,short,NaN\n"
        );
        let err = parse_csv_text(&csv).unwrap_err();
        assert_eq!(
            err,
            IngestError::InvalidField {
                row: 2,
                field: "exit_price".into(),
                value: "NaN".into()
            }
        );

        let csv = ENGLISH_CSV.replace(",12.5,", ",inf,");
        assert!(matches!(
            parse_csv_text(&csv),
            Err(IngestError::InvalidField { ref field, .. }) if field == "entry_price"
        ));
    }

    #[test]
    fn every_attempt_recorded_on_failure() {
        let outcome = parse_trades(b"not,a,trade,report\n1,2,3,4\n", &labels(&["utf-8", "nope"]));
        let IngestOutcome::Failure { attempted } = outcome else {
            panic!("expected failure");
        };
        assert_eq!(attempted.len(), 2);
        assert!(matches!(attempted[0].error, IngestError::MissingColumn(_)));
        assert_eq!(attempted[1].error, IngestError::UnknownEncoding("nope".into()));
    }

    #[test]
    fn resolves_legacy_labels() {
        assert_eq!(resolve_encoding("cp950"), Some(encoding_rs::BIG5));
        assert_eq!(resolve_encoding("gb2312"), Some(encoding_rs::GBK));
        assert_eq!(resolve_encoding("UTF-8"), Some(encoding_rs::UTF_8));
        assert_eq!(resolve_encoding("klingon"), None);
    }

    #[test]
    fn number_and_sequence_parsing() {
        assert_eq!(parse_number("1,234.5"), Some(1234.5));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("-infinity"), None);
        assert_eq!(parse_sequence("42"), Some(42));
        assert_eq!(parse_sequence("3.0"), Some(3));
        assert_eq!(parse_sequence("3.5"), None);
        assert_eq!(parse_sequence("-1"), None);
    }
}
