//! Concurrency of capital — how much money is deployed at the same time.
//!
//! Two views of the same trade set:
//! - a dense daily series (every calendar day between the first entry and the
//!   last exit, inclusive on both ends of each trade), and
//! - the peak concurrent capital from an intraday enter/exit event sweep.
//!
//! At equal timestamps enter events sort before exit events. A trade exiting
//! at the instant another enters is therefore still counted as deployed, so
//! the peak is an upper bound on the truly simultaneous capital.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::{DailyHolding, PricedTrade};

/// Event direction. Ordering matters: `Enter` sorts before `Exit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Enter,
    Exit,
}

/// Capital entering or leaving the market at an instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcurrencyEvent {
    pub time: NaiveDateTime,
    pub amount: f64,
    pub kind: EventKind,
}

/// Both concurrency views for one trade set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConcurrencyReport {
    pub daily: Vec<DailyHolding>,
    pub max_concurrent_capital: f64,
}

impl ConcurrencyReport {
    pub fn compute(trades: &[PricedTrade]) -> Self {
        Self {
            daily: daily_holdings(trades),
            max_concurrent_capital: max_concurrent_capital(trades),
        }
    }
}

/// Enter and exit events for every trade, sorted by (time, kind).
pub fn build_events(trades: &[PricedTrade]) -> Vec<ConcurrencyEvent> {
    let mut events = Vec::with_capacity(trades.len() * 2);
    for trade in trades {
        events.push(ConcurrencyEvent {
            time: trade.entry_time(),
            amount: trade.invested_amount,
            kind: EventKind::Enter,
        });
        events.push(ConcurrencyEvent {
            time: trade.exit_time(),
            amount: trade.invested_amount,
            kind: EventKind::Exit,
        });
    }
    events.sort_by_key(|e| (e.time, e.kind));
    events
}

/// Peak capital deployed at any instant. Returns 0.0 for no trades.
pub fn max_concurrent_capital(trades: &[PricedTrade]) -> f64 {
    let mut current = 0.0_f64;
    let mut peak = 0.0_f64;

    for event in build_events(trades) {
        match event.kind {
            EventKind::Enter => {
                current += event.amount;
                peak = peak.max(current);
            }
            EventKind::Exit => current -= event.amount,
        }
    }

    peak
}

/// Capital held on each calendar day from the first entry day to the last
/// exit day.
///
/// A trade counts on every day from its entry date to its exit date inclusive.
/// Days with no open trade report exactly zero.
pub fn daily_holdings(trades: &[PricedTrade]) -> Vec<DailyHolding> {
    let (Some(first), Some(last)) = (
        trades.iter().map(|t| t.entry_time().date()).min(),
        trades.iter().map(|t| t.exit_time().date()).max(),
    ) else {
        return Vec::new();
    };
    if last < first {
        return Vec::new();
    }

    let days = (last - first).num_days() as usize + 1;

    // Difference arrays: add on the entry day, remove the day after exit.
    let mut amount_delta = vec![0.0_f64; days + 1];
    let mut count_delta = vec![0_i64; days + 1];
    for trade in trades {
        let start = (trade.entry_time().date() - first).num_days();
        let end = (trade.exit_time().date() - first).num_days();
        if start < 0 || end < start {
            continue;
        }
        let (start, end) = (start as usize, end as usize);
        amount_delta[start] += trade.invested_amount;
        amount_delta[end + 1] -= trade.invested_amount;
        count_delta[start] += 1;
        count_delta[end + 1] -= 1;
    }

    let mut series = Vec::with_capacity(days);
    let mut amount = 0.0_f64;
    let mut open = 0_i64;
    for (offset, (da, dc)) in amount_delta.iter().zip(&count_delta).take(days).enumerate() {
        amount += da;
        open += dc;
        if open == 0 {
            // Drop accumulated rounding residue once the book is flat.
            amount = 0.0;
        }
        series.push(DailyHolding {
            date: first + Duration::days(offset as i64),
            amount,
            open_trades: open as usize,
        });
    }

    series
}
