//! Domain types for TradeScope

pub mod series;
pub mod trade;

pub use series::{DailyHolding, DrawdownPoint, EquityPoint};
pub use trade::{PricedTrade, RawTrade, TradeSide};
