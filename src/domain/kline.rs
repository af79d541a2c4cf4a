use serde::{Deserialize, Serialize};

/// One candlestick as returned by the exchange, all fields preserved.
/// `open_time` is the primary ordering and dedup key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Kline {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: i64,
    pub quote_volume: f64,
    pub trade_count: i64,
    pub taker_buy_base: f64,
    pub taker_buy_quote: f64,
}

impl Kline {
    /// Timestamp the next forward fetch should anchor at.
    /// Binance close_time is the last millisecond of the candle, so +1 lands
    /// exactly on the next candle's open_time.
    pub fn next_open_time(&self) -> i64 {
        self.close_time + 1
    }
}
