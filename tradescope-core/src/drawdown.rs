//! Drawdown analysis over the realized equity curve.
//!
//! Drawdown is measured against the running maximum of cumulative PnL. The
//! curve starts from zero capital, so the percentage form divides by the
//! running maximum plus a small epsilon rather than by an equity level.

use serde::{Deserialize, Serialize};

use crate::domain::{DrawdownPoint, EquityPoint};

/// Added to the running maximum before dividing, so a zero peak does not
/// divide by zero.
pub const DRAWDOWN_EPSILON: f64 = 1e-10;

/// Drawdown series plus its extrema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrawdownAnalysis {
    pub points: Vec<DrawdownPoint>,
    /// Most negative drawdown amount (0 for an empty or never-falling curve).
    pub max_drawdown: f64,
    /// Most negative drawdown fraction.
    pub max_drawdown_pct: f64,
}

/// Compute the drawdown series for an equity curve.
///
/// Every point whose drawdown equals the running minimum so far is flagged,
/// so each new low-water mark is marked, not only the global minimum.
pub fn analyze_drawdown(curve: &[EquityPoint]) -> DrawdownAnalysis {
    if curve.is_empty() {
        return DrawdownAnalysis::default();
    }

    let mut points = Vec::with_capacity(curve.len());
    let mut running_max = f64::NEG_INFINITY;
    let mut running_min_dd = f64::INFINITY;
    let mut max_drawdown = f64::INFINITY;
    let mut max_drawdown_pct = f64::INFINITY;

    for point in curve {
        running_max = running_max.max(point.cumulative_pnl);
        let drawdown_amount = point.cumulative_pnl - running_max;
        let drawdown_pct = drawdown_amount / (running_max + DRAWDOWN_EPSILON);

        running_min_dd = running_min_dd.min(drawdown_amount);
        max_drawdown = max_drawdown.min(drawdown_amount);
        max_drawdown_pct = max_drawdown_pct.min(drawdown_pct);

        points.push(DrawdownPoint {
            time: point.exit_time,
            drawdown_amount,
            drawdown_pct,
            is_max_drawdown: drawdown_amount == running_min_dd,
        });
    }

    DrawdownAnalysis {
        points,
        max_drawdown,
        max_drawdown_pct,
    }
}
