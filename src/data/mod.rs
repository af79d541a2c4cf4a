mod binance;
mod boundary;
mod export;
mod fetcher;
mod rate_limiter;
mod retry;

pub use {
    binance::BinanceFetcher,
    boundary::{BoundaryError, discover_origin},
    export::{write_csv, write_csv_file},
    fetcher::{FetchDirection, FetchError, WindowFetcher, ensure_ascending},
    rate_limiter::GlobalRateLimiter,
    retry::{RetryError, RetryPolicy, fetch_with_retry},
};
