//! Trade breakdowns: PnL distribution, entry-price buckets, and monthly
//! grouping by entry or exit month.

use std::collections::BTreeMap;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::domain::PricedTrade;

/// Default number of histogram bins for the PnL distribution.
pub const DEFAULT_HISTOGRAM_BINS: usize = 50;

/// Upper edges of the entry-price buckets. The last bucket is open-ended.
pub const PRICE_BUCKET_EDGES: [f64; 6] = [10.0, 20.0, 30.0, 50.0, 100.0, 200.0];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBucketStats {
    /// Label such as `"10-20"` or `"200+"`.
    pub label: String,
    pub total_pnl: f64,
    pub mean_pnl: f64,
    pub trade_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyStats {
    /// `YYYY-MM`
    pub month: String,
    pub total_pnl: f64,
    pub trade_count: usize,
}

/// Which timestamp assigns a trade to a month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthBasis {
    Entry,
    Exit,
}

/// All breakdown tables for one trade list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeBreakdown {
    pub pnl_histogram: Vec<HistogramBin>,
    pub price_buckets: Vec<PriceBucketStats>,
    pub entry_months: Vec<MonthlyStats>,
    pub exit_months: Vec<MonthlyStats>,
}

impl TradeBreakdown {
    pub fn compute(trades: &[PricedTrade]) -> Self {
        Self {
            pnl_histogram: pnl_histogram(trades, DEFAULT_HISTOGRAM_BINS),
            price_buckets: price_buckets(trades),
            entry_months: monthly(trades, MonthBasis::Entry),
            exit_months: monthly(trades, MonthBasis::Exit),
        }
    }
}

/// Equal-width histogram of per-trade PnL between the minimum and maximum.
///
/// The last bin is closed on both ends. When every PnL is identical a single
/// zero-width bin holds all trades.
pub fn pnl_histogram(trades: &[PricedTrade], bins: usize) -> Vec<HistogramBin> {
    if trades.is_empty() || bins == 0 {
        return Vec::new();
    }
    let min = trades.iter().map(|t| t.pnl).fold(f64::INFINITY, f64::min);
    let max = trades.iter().map(|t| t.pnl).fold(f64::NEG_INFINITY, f64::max);

    if max <= min {
        return vec![HistogramBin {
            lower: min,
            upper: max,
            count: trades.len(),
        }];
    }

    let width = (max - min) / bins as f64;
    let mut histogram: Vec<HistogramBin> = (0..bins)
        .map(|i| HistogramBin {
            lower: min + width * i as f64,
            upper: if i + 1 == bins {
                max
            } else {
                min + width * (i + 1) as f64
            },
            count: 0,
        })
        .collect();

    for trade in trades {
        let idx = (((trade.pnl - min) / width).floor() as usize).min(bins - 1);
        histogram[idx].count += 1;
    }

    histogram
}

/// Bucket index for an entry price: `(0,10]`, `(10,20]`, ... `(200,∞)`.
fn bucket_index(price: f64) -> usize {
    PRICE_BUCKET_EDGES
        .iter()
        .position(|&edge| price <= edge)
        .unwrap_or(PRICE_BUCKET_EDGES.len())
}

fn bucket_label(idx: usize) -> String {
    let lower = if idx == 0 { 0.0 } else { PRICE_BUCKET_EDGES[idx - 1] };
    match PRICE_BUCKET_EDGES.get(idx) {
        Some(upper) => format!("{lower}-{upper}"),
        None => format!("{lower}+"),
    }
}

/// PnL grouped by entry-price bucket. Buckets with no trades are omitted.
pub fn price_buckets(trades: &[PricedTrade]) -> Vec<PriceBucketStats> {
    let mut sums = [(0.0_f64, 0_usize); PRICE_BUCKET_EDGES.len() + 1];
    for trade in trades.iter().filter(|t| t.raw.entry_price > 0.0) {
        let slot = &mut sums[bucket_index(trade.raw.entry_price)];
        slot.0 += trade.pnl;
        slot.1 += 1;
    }

    sums.iter()
        .enumerate()
        .filter(|(_, (_, count))| *count > 0)
        .map(|(idx, &(total, count))| PriceBucketStats {
            label: bucket_label(idx),
            total_pnl: total,
            mean_pnl: total / count as f64,
            trade_count: count,
        })
        .collect()
}

/// PnL grouped by calendar month of entry or exit, in month order.
pub fn monthly(trades: &[PricedTrade], basis: MonthBasis) -> Vec<MonthlyStats> {
    let mut months: BTreeMap<(i32, u32), (f64, usize)> = BTreeMap::new();
    for trade in trades {
        let time = match basis {
            MonthBasis::Entry => trade.entry_time(),
            MonthBasis::Exit => trade.exit_time(),
        };
        let slot = months.entry((time.year(), time.month())).or_insert((0.0, 0));
        slot.0 += trade.pnl;
        slot.1 += 1;
    }

    months
        .into_iter()
        .map(|((year, month), (total_pnl, trade_count))| MonthlyStats {
            month: format!("{year:04}-{month:02}"),
            total_pnl,
            trade_count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RawTrade, TradeSide};
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, month, day)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn trade(entry_price: f64, pnl: f64, entry: NaiveDateTime, exit: NaiveDateTime) -> PricedTrade {
        PricedTrade {
            raw: RawTrade {
                instrument_name: "X".into(),
                instrument_code: "X".into(),
                sequence_no: 0,
                entry_time: entry,
                entry_side: TradeSide::Long,
                entry_price,
                exit_time: exit,
                exit_side: TradeSide::Short,
                exit_price: entry_price,
            },
            shares: 1000.0,
            invested_amount: entry_price * 1000.0,
            pnl,
            return_pct: 0.0,
            holding_days: (exit - entry).num_days(),
        }
    }

    #[test]
    fn histogram_counts_every_trade() {
        let trades: Vec<PricedTrade> = [-100.0, -50.0, 0.0, 50.0, 100.0]
            .iter()
            .map(|&p| trade(10.0, p, at(1, 1), at(1, 2)))
            .collect();
        let hist = pnl_histogram(&trades, 4);
        assert_eq!(hist.len(), 4);
        assert_eq!(hist.iter().map(|b| b.count).sum::<usize>(), 5);
        assert_eq!(hist[0].lower, -100.0);
        assert_eq!(hist[3].upper, 100.0);
        // Maximum lands in the last, closed bin.
        assert_eq!(hist[3].count, 2);
    }

    #[test]
    fn histogram_single_value() {
        let trades = vec![trade(10.0, 5.0, at(1, 1), at(1, 2)); 3];
        let hist = pnl_histogram(&trades, 50);
        assert_eq!(hist.len(), 1);
        assert_eq!(hist[0].count, 3);
    }

    #[test]
    fn bucket_edges_are_right_closed() {
        assert_eq!(bucket_index(10.0), 0);
        assert_eq!(bucket_index(10.01), 1);
        assert_eq!(bucket_index(200.0), 5);
        assert_eq!(bucket_index(999.0), 6);
        assert_eq!(bucket_label(0), "0-10");
        assert_eq!(bucket_label(4), "50-100");
        assert_eq!(bucket_label(6), "200+");
    }

    #[test]
    fn price_buckets_aggregate() {
        let trades = vec![
            trade(8.0, 100.0, at(1, 1), at(1, 2)),
            trade(9.5, -40.0, at(1, 1), at(1, 2)),
            trade(250.0, 1000.0, at(1, 1), at(1, 2)),
        ];
        let buckets = price_buckets(&trades);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].label, "0-10");
        assert_eq!(buckets[0].total_pnl, 60.0);
        assert_eq!(buckets[0].mean_pnl, 30.0);
        assert_eq!(buckets[0].trade_count, 2);
        assert_eq!(buckets[1].label, "200+");
    }

    #[test]
    fn monthly_by_entry_and_exit() {
        let trades = vec![
            trade(10.0, 100.0, at(1, 30), at(2, 2)),
            trade(10.0, -30.0, at(2, 5), at(2, 6)),
            trade(10.0, 10.0, at(3, 1), at(3, 2)),
        ];
        let entry = monthly(&trades, MonthBasis::Entry);
        assert_eq!(
            entry.iter().map(|m| m.month.as_str()).collect::<Vec<_>>(),
            vec!["2024-01", "2024-02", "2024-03"]
        );
        let exit = monthly(&trades, MonthBasis::Exit);
        assert_eq!(exit.len(), 2);
        assert_eq!(exit[0].month, "2024-02");
        assert_eq!(exit[0].total_pnl, 70.0);
        assert_eq!(exit[0].trade_count, 2);
    }

    #[test]
    fn empty_breakdown() {
        assert_eq!(TradeBreakdown::compute(&[]), TradeBreakdown::default());
    }
}
