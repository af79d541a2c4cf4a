// Core modules
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod utils;

// Re-export commonly used types outside of crate
pub use config::BackfillConfig;
pub use data::{BinanceFetcher, FetchDirection, FetchError, WindowFetcher};
pub use domain::{Kline, PairInterval};
pub use engine::{BackfillEngine, BackfillOutcome, CrawlMode, Dataset};

// CLI argument parsing
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Trading pair to backfill
    #[arg(long, default_value = "BTCUSDT")]
    pub symbol: String,

    /// Candle interval shorthand (1m, 1h, 1d, ...)
    #[arg(long, default_value = "1h")]
    pub interval: String,

    /// Output CSV path; defaults to <symbol>_<interval>_all.csv
    #[arg(long)]
    pub output: Option<std::path::PathBuf>,

    /// Worker pool size for the parallel crawl
    #[arg(long)]
    pub workers: Option<usize>,

    /// Partition width in days for the parallel crawl
    #[arg(long)]
    pub chunk_days: Option<i64>,

    /// Walk sequentially from the origin instead of partitioning
    #[arg(long, default_value_t = false)]
    pub sequential: bool,

    /// Walk backwards from the most recent data to the origin
    #[arg(long, default_value_t = false, conflicts_with = "sequential")]
    pub backward: bool,
}

impl Cli {
    pub fn crawl_mode(&self) -> CrawlMode {
        if self.backward {
            CrawlMode::Backward
        } else if self.sequential {
            CrawlMode::Sequential
        } else {
            CrawlMode::Parallel
        }
    }
}
