//! Trade records — raw closed trades as exported by the backtester, and the
//! priced form produced by the position sizer.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Direction recorded on an entry or exit leg.
///
/// Broker exports use a mix of English and Chinese direction codes. Codes that
/// are not recognised are preserved verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeSide {
    Long,
    Short,
    Other(String),
}

impl TradeSide {
    /// Map a direction code to a side.
    pub fn from_code(code: &str) -> Self {
        let trimmed = code.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "long" | "buy" | "b" | "買進" | "買" | "多" | "做多" => Self::Long,
            "short" | "sell" | "s" | "賣出" | "賣" | "空" | "放空" | "做空" => Self::Short,
            _ => Self::Other(trimmed.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
            Self::Other(code) => code,
        }
    }
}

/// A closed trade as it appears in the source report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTrade {
    // ── Identification ──
    pub instrument_name: String,
    pub instrument_code: String,
    pub sequence_no: u64,

    // ── Entry ──
    pub entry_time: NaiveDateTime,
    pub entry_side: TradeSide,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_time: NaiveDateTime,
    pub exit_side: TradeSide,
    pub exit_price: f64,
}

/// A trade after position sizing: the raw record plus size and PnL.
///
/// Transaction costs are not modeled; `pnl` is the gross price difference
/// times the share count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedTrade {
    #[serde(flatten)]
    pub raw: RawTrade,

    // ── Size ──
    /// Lot mode: a multiple of 1000. Unit mode: fractional.
    pub shares: f64,
    pub invested_amount: f64,

    // ── PnL ──
    pub pnl: f64,
    /// Price return as a fraction of the entry price.
    pub return_pct: f64,

    // ── Duration ──
    pub holding_days: i64,
}

impl PricedTrade {
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.pnl < 0.0
    }

    pub fn entry_time(&self) -> NaiveDateTime {
        self.raw.entry_time
    }

    pub fn exit_time(&self) -> NaiveDateTime {
        self.raw.exit_time
    }
}
