//! Realized equity curve — cumulative PnL in exit-time order.

use crate::domain::{EquityPoint, PricedTrade};

/// Trades ordered by exit time. Ties keep their input order (stable sort).
pub fn sort_by_exit(trades: &[PricedTrade]) -> Vec<&PricedTrade> {
    let mut ordered: Vec<&PricedTrade> = trades.iter().collect();
    ordered.sort_by_key(|t| t.exit_time());
    ordered
}

/// Build the cumulative PnL curve, one point per trade.
///
/// A point is a new high when it equals the running maximum and strictly
/// exceeds the previous point, so a flat trade sitting at the high is not
/// flagged again. The first point is always a new high (the
/// curve starts from zero capital).
pub fn build_equity_curve(trades: &[PricedTrade]) -> Vec<EquityPoint> {
    let mut curve = Vec::with_capacity(trades.len());
    let mut cumulative = 0.0;
    let mut running_max = f64::NEG_INFINITY;
    let mut previous = f64::NEG_INFINITY;

    for (i, trade) in sort_by_exit(trades).into_iter().enumerate() {
        cumulative += trade.pnl;
        running_max = running_max.max(cumulative);
        let is_new_high = i == 0 || (cumulative == running_max && cumulative > previous);
        previous = cumulative;

        curve.push(EquityPoint {
            exit_time: trade.exit_time(),
            instrument_code: trade.raw.instrument_code.clone(),
            pnl: trade.pnl,
            cumulative_pnl: cumulative,
            is_new_high,
        });
    }

    curve
}

/// Cumulative PnL values only, for overlaying against simulated curves.
pub fn cumulative_values(curve: &[EquityPoint]) -> Vec<f64> {
    curve.iter().map(|p| p.cumulative_pnl).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RawTrade, TradeSide};
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn trade(seq: u64, exit_day: u32, pnl: f64) -> PricedTrade {
        PricedTrade {
            raw: RawTrade {
                instrument_name: "X".into(),
                instrument_code: format!("C{seq}"),
                sequence_no: seq,
                entry_time: ts(1),
                entry_side: TradeSide::Long,
                entry_price: 10.0,
                exit_time: ts(exit_day),
                exit_side: TradeSide::Short,
                exit_price: 10.0,
            },
            shares: 1000.0,
            invested_amount: 10_000.0,
            pnl,
            return_pct: pnl / 10_000.0,
            holding_days: i64::from(exit_day) - 1,
        }
    }

    #[test]
    fn orders_by_exit_time() {
        let trades = vec![trade(1, 9, 100.0), trade(2, 3, -50.0), trade(3, 5, 20.0)];
        let curve = build_equity_curve(&trades);
        let codes: Vec<&str> = curve.iter().map(|p| p.instrument_code.as_str()).collect();
        assert_eq!(codes, vec!["C2", "C3", "C1"]);
        let cum: Vec<f64> = cumulative_values(&curve);
        assert_eq!(cum, vec![-50.0, -30.0, 70.0]);
    }

    #[test]
    fn ties_keep_input_order() {
        let trades = vec![trade(1, 4, 1.0), trade(2, 4, 2.0), trade(3, 2, 3.0)];
        let curve = build_equity_curve(&trades);
        let codes: Vec<&str> = curve.iter().map(|p| p.instrument_code.as_str()).collect();
        assert_eq!(codes, vec!["C3", "C1", "C2"]);
    }

    #[test]
    fn first_point_is_always_new_high() {
        let curve = build_equity_curve(&[trade(1, 2, -500.0), trade(2, 3, -100.0)]);
        assert!(curve[0].is_new_high);
        assert!(!curve[1].is_new_high);
    }

    #[test]
    fn flat_point_at_high_is_not_new() {
        // cum: 100, 50, 100, 150, 150
        // Climbing back to a prior high counts; standing still at the high does not.
        let trades = vec![
            trade(1, 2, 100.0),
            trade(2, 3, -50.0),
            trade(3, 4, 50.0),
            trade(4, 5, 50.0),
            trade(5, 6, 0.0),
        ];
        let flags: Vec<bool> = build_equity_curve(&trades)
            .iter()
            .map(|p| p.is_new_high)
            .collect();
        assert_eq!(flags, vec![true, false, true, true, false]);
    }

    #[test]
    fn empty_input_empty_curve() {
        assert!(build_equity_curve(&[]).is_empty());
    }
}
