//! Position sizing — converts raw trades into priced trades.
//!
//! Every trade is sized independently with the same fixed investment amount.
//! Two modes:
//! 1. **Lot**: whole board lots of 1000 shares; trades that cannot afford one
//!    lot are skipped.
//! 2. **Unit**: fractional shares, so every trade is fully invested.
//!
//! Trades failing a data guard are dropped and reported in
//! [`SizingOutcome::skipped`], never raised as errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::domain::{PricedTrade, RawTrade};

/// Shares per board lot.
pub const LOT_SIZE: f64 = 1000.0;

/// How the investment amount is converted into a share count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingMode {
    /// Whole lots of [`LOT_SIZE`] shares.
    #[default]
    Lot,
    /// Fractional shares.
    Unit,
}

impl SizingMode {
    /// Share count for `investment` at `entry_price`.
    ///
    /// Returns `None` in lot mode when the investment does not cover one lot.
    pub fn shares(&self, investment: f64, entry_price: f64) -> Option<f64> {
        match self {
            Self::Lot => {
                let shares = (investment / (entry_price * LOT_SIZE)).floor() * LOT_SIZE;
                if shares < LOT_SIZE {
                    None
                } else {
                    Some(shares)
                }
            }
            Self::Unit => Some(investment / entry_price),
        }
    }

    /// Capital actually deployed for `shares` at `entry_price`.
    pub fn invested_amount(&self, shares: f64, entry_price: f64) -> f64 {
        match self {
            Self::Lot => (shares / LOT_SIZE) * entry_price * LOT_SIZE,
            Self::Unit => shares * entry_price,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Lot => "lot",
            Self::Unit => "unit",
        }
    }
}

/// Rejected sizing parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SizingError {
    #[error("investment amount must be a positive finite number, got {0}")]
    InvalidInvestment(f64),
}

/// Why a trade was left out of the priced sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Entry price is zero, negative, or not a number.
    InvalidEntryPrice {
        #[serde(with = "crate::metrics::non_finite")]
        entry_price: f64,
    },
    /// Exit price is zero, negative, or not a number.
    InvalidExitPrice {
        #[serde(with = "crate::metrics::non_finite")]
        exit_price: f64,
    },
    /// Lot mode only: one lot costs more than the investment amount.
    InsufficientCapital { lot_cost: f64, investment: f64 },
    /// Exit timestamp precedes the entry timestamp.
    ExitBeforeEntry,
}

impl SkipReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidEntryPrice { .. } => "invalid_entry_price",
            Self::InvalidExitPrice { .. } => "invalid_exit_price",
            Self::InsufficientCapital { .. } => "insufficient_capital",
            Self::ExitBeforeEntry => "exit_before_entry",
        }
    }
}

/// A trade dropped by a data guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedTrade {
    pub sequence_no: u64,
    pub instrument_code: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Result of sizing a whole trade list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SizingOutcome {
    /// Trades that passed every guard, in input order.
    pub trades: Vec<PricedTrade>,
    pub skipped: Vec<SkippedTrade>,
}

impl SizingOutcome {
    /// True when no trade survived the guards.
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Fixed-investment position sizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSizer {
    investment: f64,
    mode: SizingMode,
}

impl PositionSizer {
    /// Create a sizer. Fails fast on a non-positive or non-finite investment.
    pub fn new(investment: f64, mode: SizingMode) -> Result<Self, SizingError> {
        if !investment.is_finite() || investment <= 0.0 {
            return Err(SizingError::InvalidInvestment(investment));
        }
        Ok(Self { investment, mode })
    }

    pub fn investment(&self) -> f64 {
        self.investment
    }

    pub fn mode(&self) -> SizingMode {
        self.mode
    }

    /// Price a single trade, or report why it was skipped.
    pub fn price(&self, raw: &RawTrade) -> Result<PricedTrade, SkipReason> {
        let entry_price = raw.entry_price;
        if !entry_price.is_finite() || entry_price <= 0.0 {
            return Err(SkipReason::InvalidEntryPrice { entry_price });
        }
        let exit_price = raw.exit_price;
        if !exit_price.is_finite() || exit_price <= 0.0 {
            return Err(SkipReason::InvalidExitPrice { exit_price });
        }
        if raw.exit_time < raw.entry_time {
            return Err(SkipReason::ExitBeforeEntry);
        }

        let shares = self.mode.shares(self.investment, entry_price).ok_or(
            SkipReason::InsufficientCapital {
                lot_cost: entry_price * LOT_SIZE,
                investment: self.investment,
            },
        )?;
        let invested_amount = self.mode.invested_amount(shares, entry_price);

        let price_change = exit_price - entry_price;
        Ok(PricedTrade {
            raw: raw.clone(),
            shares,
            invested_amount,
            pnl: shares * price_change,
            return_pct: price_change / entry_price,
            holding_days: (raw.exit_time - raw.entry_time).num_days(),
        })
    }

    /// Price every trade, keeping input order and collecting skips.
    pub fn price_all(&self, raws: &[RawTrade]) -> SizingOutcome {
        let mut outcome = SizingOutcome {
            trades: Vec::with_capacity(raws.len()),
            skipped: Vec::new(),
        };

        for raw in raws {
            match self.price(raw) {
                Ok(trade) => outcome.trades.push(trade),
                Err(reason) => {
                    debug!(
                        sequence_no = raw.sequence_no,
                        instrument = %raw.instrument_code,
                        ?reason,
                        "trade skipped"
                    );
                    outcome.skipped.push(SkippedTrade {
                        sequence_no: raw.sequence_no,
                        instrument_code: raw.instrument_code.clone(),
                        reason,
                    });
                }
            }
        }

        outcome
    }
}
