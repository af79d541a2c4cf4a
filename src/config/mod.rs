//! Configuration module for the backfill crawler.

mod backfill;
mod binance;

// Re-export commonly used items
pub use backfill::{BACKFILL, BackfillConfig, default_probe_epochs};
pub use binance::{BINANCE, BinanceApiConfig};
