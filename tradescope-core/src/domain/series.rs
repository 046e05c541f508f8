use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One point of the realized equity curve (one per trade, exit-time order).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub exit_time: NaiveDateTime,
    pub instrument_code: String,
    pub pnl: f64,
    pub cumulative_pnl: f64,
    pub is_new_high: bool,
}

/// Drawdown relative to the running maximum of cumulative PnL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownPoint {
    pub time: NaiveDateTime,
    /// Always ≤ 0.
    pub drawdown_amount: f64,
    /// Fraction of the running maximum (not multiplied by 100).
    pub drawdown_pct: f64,
    /// Set on every point that reaches a new low-water mark.
    pub is_max_drawdown: bool,
}

/// Capital held on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyHolding {
    pub date: NaiveDate,
    pub amount: f64,
    pub open_trades: usize,
}
