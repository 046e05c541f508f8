//! Risk statistics — pure functions over the priced trade list.
//!
//! Every metric is a pure function: trade list in, scalar out. Degenerate
//! inputs resolve to defined values (0 or +∞), never to errors.

use serde::{Deserialize, Serialize};

use crate::domain::PricedTrade;

/// Annualization factor applied to per-trade returns.
///
/// Per-trade returns are scaled as if they were daily returns; this treats
/// trade frequency as daily frequency and is kept as a known approximation.
pub const ANNUALIZATION_DAYS: f64 = 252.0;

/// Aggregate statistics for one analyzed trade list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskStatistics {
    pub sharpe: f64,
    /// +∞ when there are gains and no losses.
    #[serde(with = "non_finite")]
    pub profit_factor: f64,
    /// Percentage of winning trades (0–100).
    pub win_rate: f64,
    pub total_pnl: f64,
    pub total_invested: f64,
    /// Total PnL as a percentage of total invested capital.
    pub total_return: f64,
    pub avg_pnl: f64,
    pub trade_count: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub avg_holding_days: f64,
}

impl RiskStatistics {
    /// Compute every statistic. An empty trade list yields all zeros.
    pub fn compute(trades: &[PricedTrade]) -> Self {
        if trades.is_empty() {
            return Self::default();
        }
        let total_pnl = total_pnl(trades);
        let total_invested: f64 = trades.iter().map(|t| t.invested_amount).sum();
        Self {
            sharpe: sharpe_ratio(trades),
            profit_factor: profit_factor(trades),
            win_rate: win_rate(trades),
            total_pnl,
            total_invested,
            total_return: if total_invested > 0.0 {
                total_pnl / total_invested * 100.0
            } else {
                0.0
            },
            avg_pnl: total_pnl / trades.len() as f64,
            trade_count: trades.len(),
            winning_trades: trades.iter().filter(|t| t.is_winner()).count(),
            losing_trades: trades.iter().filter(|t| t.is_loser()).count(),
            avg_holding_days: trades.iter().map(|t| t.holding_days as f64).sum::<f64>()
                / trades.len() as f64,
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

pub fn total_pnl(trades: &[PricedTrade]) -> f64 {
    trades.iter().map(|t| t.pnl).sum()
}

/// Sharpe ratio of per-trade returns, scaled by √252.
///
/// Sharpe = mean(return_pct) / sample_std(return_pct) * sqrt(252).
/// Returns 0.0 with fewer than 2 trades or zero deviation.
pub fn sharpe_ratio(trades: &[PricedTrade]) -> f64 {
    let returns: Vec<f64> = trades.iter().map(|t| t.return_pct).collect();
    sharpe_from_returns(&returns)
}

/// Standard deviations below this are treated as zero dispersion.
pub const STD_EPSILON: f64 = 1e-15;

/// Sharpe ratio over a raw return slice.
pub fn sharpe_from_returns(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(returns);
    // Identical returns can leave a rounding residue around 1e-17 in the std.
    if std < STD_EPSILON || !std.is_finite() {
        return 0.0;
    }
    (mean_f64(returns) / std) * ANNUALIZATION_DAYS.sqrt()
}

/// Gross profit / |gross loss|.
///
/// +∞ when there are no losses but some profit; 0.0 when there is no profit
/// (including the no-profit, no-loss case).
pub fn profit_factor(trades: &[PricedTrade]) -> f64 {
    let gross_profit: f64 = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
    let gross_loss: f64 = trades.iter().filter(|t| t.pnl < 0.0).map(|t| t.pnl).sum();

    if gross_profit == 0.0 {
        return 0.0;
    }
    if gross_loss == 0.0 {
        return f64::INFINITY;
    }
    gross_profit / gross_loss.abs()
}

/// Winning trades as a percentage of all trades.
pub fn win_rate(trades: &[PricedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64 * 100.0
}

// ─── Helpers ────────────────────────────────────────────────────────

pub fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Percentile of a sorted slice using linear interpolation between ranks.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = rank - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

/// Serde adapter that writes non-finite floats as strings ("inf", "-inf",
/// "NaN") since JSON has no representation for them.
pub mod non_finite {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if *value > 0.0 {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(v),
            Repr::Text(s) => match s.as_str() {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                "NaN" => Ok(f64::NAN),
                other => Err(de::Error::custom(format!("invalid float '{other}'"))),
            },
        }
    }
}
