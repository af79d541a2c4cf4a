use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Kline;

/// Which way the next window extends from the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDirection {
    /// Anchor is the inclusive open_time to start from.
    Forward,
    /// Anchor is an exclusive upper bound; records strictly earlier.
    Backward,
}

/// One fetch attempt's failure, classified so the retry layer can decide
/// what to do with it.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Explicit 429-style signal from the exchange. Retryable with backoff.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Network trouble, timeout, or 5xx. Retryable with backoff.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Malformed body or a response the contract forbids. Waiting won't fix
    /// it, so the retry layer fails immediately.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::RateLimited(_) | FetchError::Transient(_))
    }
}

/// Abstract interface for fetching one bounded window of klines.
///
/// An `Ok` empty vec is a valid terminal signal ("no more data in this
/// direction"), not an error. Non-empty windows are ascending by open_time;
/// a source violating that is a `Protocol` error.
#[async_trait]
pub trait WindowFetcher: Send + Sync {
    async fn fetch(
        &self,
        anchor: Option<i64>,
        direction: FetchDirection,
        limit: i64,
    ) -> Result<Vec<Kline>, FetchError>;
}

/// Source guarantee check shared by every adapter: windows must be strictly
/// ascending by open_time.
pub fn ensure_ascending(window: &[Kline]) -> Result<(), FetchError> {
    for pair in window.windows(2) {
        if pair[0].open_time >= pair[1].open_time {
            return Err(FetchError::Protocol(format!(
                "window not strictly ascending: {} then {}",
                pair[0].open_time, pair[1].open_time
            )));
        }
    }
    Ok(())
}
