mod kline;
mod pair_interval;

pub use kline::Kline;
pub use pair_interval::PairInterval;
