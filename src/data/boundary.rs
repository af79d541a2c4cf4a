use log::{debug, info};
use thiserror::Error;

use crate::data::{
    fetcher::{FetchDirection, WindowFetcher},
    retry::{RetryError, RetryPolicy, fetch_with_retry},
};
use crate::utils::time_utils::epoch_ms_to_utc;

#[derive(Debug, Error)]
pub enum BoundaryError {
    /// Every probe epoch came back empty. Fatal for the whole run: no
    /// partitions can be formed without an origin.
    #[error("no data available from any probe epoch")]
    NoDataAvailable,

    #[error(transparent)]
    Fetch(#[from] RetryError),
}

/// Finds the earliest open_time with available data by probing candidate
/// epochs, most-recent-plausible first. A forward fetch from any time before
/// the true origin returns the origin itself, so the first non-empty probe
/// settles it.
pub async fn discover_origin(
    fetcher: &dyn WindowFetcher,
    probes: &[i64],
    policy: &RetryPolicy,
) -> Result<i64, BoundaryError> {
    for &epoch in probes {
        debug!("probing for data at {}", epoch_ms_to_utc(epoch));

        let window = fetch_with_retry(policy, "boundary probe", || {
            fetcher.fetch(Some(epoch), FetchDirection::Forward, 1)
        })
        .await?;

        if let Some(first) = window.first() {
            info!(
                "earliest available data: {} (probe {})",
                epoch_ms_to_utc(first.open_time),
                epoch_ms_to_utc(epoch)
            );
            return Ok(first.open_time);
        }
        debug!("no data at {}, trying an earlier probe", epoch_ms_to_utc(epoch));
    }

    Err(BoundaryError::NoDataAvailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fetcher::FetchError;
    use crate::domain::Kline;
    use async_trait::async_trait;
    use std::time::Duration;

    fn kline_at(open_time: i64) -> Kline {
        Kline {
            open_time,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 0.0,
            close_time: open_time + 999,
            quote_volume: 0.0,
            trade_count: 0,
            taker_buy_base: 0.0,
            taker_buy_quote: 0.0,
        }
    }

    /// Pretends data exists exactly in [origin, last]: a forward probe
    /// returns the earliest candle at or after the anchor, or nothing when
    /// the anchor is past the end of history.
    struct OriginSource {
        origin: i64,
        last: i64,
    }

    #[async_trait]
    impl WindowFetcher for OriginSource {
        async fn fetch(
            &self,
            anchor: Option<i64>,
            direction: FetchDirection,
            _limit: i64,
        ) -> Result<Vec<Kline>, FetchError> {
            assert_eq!(direction, FetchDirection::Forward);
            let anchor = anchor.expect("probe always anchors");
            if anchor > self.last {
                Ok(vec![])
            } else {
                Ok(vec![kline_at(anchor.max(self.origin))])
            }
        }
    }

    struct EmptySource;

    #[async_trait]
    impl WindowFetcher for EmptySource {
        async fn fetch(
            &self,
            _anchor: Option<i64>,
            _direction: FetchDirection,
            _limit: i64,
        ) -> Result<Vec<Kline>, FetchError> {
            Ok(vec![])
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn finds_minimal_timestamp_when_probes_bracket_origin() {
        let source = OriginSource {
            origin: 5_000,
            last: 8_000,
        };
        // Newest probe overshoots history entirely (empty), the next one
        // precedes the origin and resolves it.
        let probes = vec![9_000, 4_000, 1_000];
        let origin = discover_origin(&source, &probes, &policy()).await.unwrap();
        assert_eq!(origin, 5_000);
    }

    #[tokio::test]
    async fn all_probes_empty_is_fatal() {
        let err = discover_origin(&EmptySource, &[3_000, 2_000, 1_000], &policy())
            .await
            .unwrap_err();
        assert!(matches!(err, BoundaryError::NoDataAvailable));
    }
}
