use std::{sync::Arc, time::Duration};

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::{
    config::{BINANCE, BackfillConfig},
    data::{
        FetchDirection, GlobalRateLimiter, RetryError, RetryPolicy, WindowFetcher,
        fetch_with_retry,
    },
    domain::Kline,
    engine::partitioner::Partition,
};

/// Per-partition walk result. A failed partition still yields whatever it
/// collected before the failure.
#[derive(Debug)]
pub struct ChunkOutcome {
    pub partition: Partition,
    pub state: ChunkState,
    pub records: Vec<Kline>,
    pub requests: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkState {
    Active,
    Done,
    Failed(FailReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailReason {
    FetchExhausted,
    Protocol,
    SafetyLimitReached,
    Cancelled,
}

impl std::fmt::Display for FailReason {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            FailReason::FetchExhausted => "fetch exhausted",
            FailReason::Protocol => "protocol error",
            FailReason::SafetyLimitReached => "safety limit reached",
            FailReason::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Drives one partition to exhaustion: fetch a window, accumulate, advance
/// the anchor, repeat. All fetches go through the retry controller and the
/// shared weight limiter, plus a fixed inter-request delay so sustained
/// crawling doesn't trip the exchange's rate limits in the first place.
pub struct ChunkWalker {
    fetcher: Arc<dyn WindowFetcher>,
    limiter: GlobalRateLimiter,
    policy: RetryPolicy,
    limit: i64,
    inter_request_delay: Duration,
    max_requests: u32,
    cancel: CancellationToken,
    context: String,
}

impl ChunkWalker {
    pub fn new(
        fetcher: Arc<dyn WindowFetcher>,
        config: &BackfillConfig,
        limiter: GlobalRateLimiter,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            limiter,
            policy: RetryPolicy::new(
                config.max_attempts,
                Duration::from_secs(config.backoff_cap_secs),
            ),
            limit: config.limit,
            inter_request_delay: Duration::from_millis(config.inter_request_delay_ms),
            max_requests: config.max_requests_per_partition,
            cancel,
            context: config.pair.to_string(),
        }
    }

    /// Forward walk over `[partition.start, partition.end)`.
    pub async fn walk_partition(&self, partition: Partition) -> ChunkOutcome {
        let mut state = ChunkState::Active;
        let mut records: Vec<Kline> = Vec::new();
        let mut requests = 0u32;
        let mut anchor = partition.start;

        while state == ChunkState::Active && anchor < partition.end {
            if self.cancel.is_cancelled() {
                warn!("{partition}: cancelled, returning partial results");
                state = ChunkState::Failed(FailReason::Cancelled);
                break;
            }
            if requests >= self.max_requests {
                warn!(
                    "{partition}: request cap {} hit, remote end-of-data signal may be flaky",
                    self.max_requests
                );
                state = ChunkState::Failed(FailReason::SafetyLimitReached);
                break;
            }

            self.limiter
                .acquire(BINANCE.limits.kline_call_weight, &self.context)
                .await;
            requests += 1;

            let fetched = fetch_with_retry(&self.policy, &self.context, || {
                self.fetcher.fetch(Some(anchor), FetchDirection::Forward, self.limit)
            })
            .await;

            match fetched {
                Ok(window) => {
                    if window.is_empty() {
                        // No more data in this direction; caught up to now.
                        state = ChunkState::Done;
                        break;
                    }

                    let full_window = window.len() as i64 >= self.limit;
                    let fetched_count = window.len();
                    let mut in_range: Vec<Kline> = window
                        .into_iter()
                        .filter(|k| partition.covers(k.open_time))
                        .collect();
                    let crossed_boundary = in_range.len() < fetched_count;

                    if let Some(last) = in_range.last() {
                        anchor = last.next_open_time();
                    }
                    debug!(
                        "{partition}: +{} records (total {})",
                        in_range.len(),
                        records.len() + in_range.len()
                    );
                    records.append(&mut in_range);

                    if crossed_boundary || !full_window {
                        // Either the window spilled past the partition edge
                        // or the source ran dry before filling it.
                        state = ChunkState::Done;
                    }
                }
                Err(RetryError::Fatal(err)) => {
                    warn!("{partition}: {err}, keeping {} partial records", records.len());
                    state = ChunkState::Failed(FailReason::Protocol);
                }
                Err(RetryError::Exhausted { attempts, last }) => {
                    warn!(
                        "{partition}: gave up after {attempts} attempts ({last}), \
                         keeping {} partial records",
                        records.len()
                    );
                    state = ChunkState::Failed(FailReason::FetchExhausted);
                }
            }

            if state == ChunkState::Active {
                tokio::time::sleep(self.inter_request_delay).await;
            }
        }

        if state == ChunkState::Active {
            // Anchor walked past the partition edge.
            state = ChunkState::Done;
        }

        info!(
            "{partition}: {} with {} records after {} requests",
            match &state {
                ChunkState::Done => "done".to_string(),
                ChunkState::Failed(reason) => format!("failed ({reason})"),
                ChunkState::Active => unreachable!("walk loop exits with a terminal state"),
            },
            records.len(),
            requests
        );

        ChunkOutcome {
            partition,
            state,
            records,
            requests,
        }
    }

    /// Backward walk from the most recent window down to `origin`. Works
    /// because recent-data requests are the ones that always succeed; the
    /// first fetch is unanchored ("latest available"), each subsequent one
    /// ends strictly before the earliest record seen so far.
    pub async fn walk_backward(&self, origin: i64, now: i64) -> ChunkOutcome {
        let partition = Partition {
            id: 1,
            start: origin,
            end: now,
        };
        let mut state = ChunkState::Active;
        let mut records: Vec<Kline> = Vec::new();
        let mut requests = 0u32;
        let mut anchor: Option<i64> = None;

        while state == ChunkState::Active {
            if self.cancel.is_cancelled() {
                warn!("{partition}: cancelled, returning partial results");
                state = ChunkState::Failed(FailReason::Cancelled);
                break;
            }
            if requests >= self.max_requests {
                state = ChunkState::Failed(FailReason::SafetyLimitReached);
                break;
            }

            self.limiter
                .acquire(BINANCE.limits.kline_call_weight, &self.context)
                .await;
            requests += 1;

            let fetched = fetch_with_retry(&self.policy, &self.context, || {
                self.fetcher.fetch(anchor, FetchDirection::Backward, self.limit)
            })
            .await;

            match fetched {
                Ok(window) => {
                    let Some(first) = window.first() else {
                        // Reached the beginning of history.
                        state = ChunkState::Done;
                        break;
                    };
                    let reached_origin = first.open_time <= origin;
                    let full_window = window.len() as i64 >= self.limit;

                    anchor = Some(first.open_time);
                    let mut in_range: Vec<Kline> = window
                        .into_iter()
                        .filter(|k| k.open_time >= origin)
                        .collect();
                    debug!(
                        "{partition}: +{} records backwards (total {})",
                        in_range.len(),
                        records.len() + in_range.len()
                    );
                    // Prepend so the accumulated sequence stays chronological.
                    in_range.append(&mut records);
                    records = in_range;

                    if reached_origin || !full_window {
                        state = ChunkState::Done;
                    }
                }
                Err(RetryError::Fatal(err)) => {
                    warn!("{partition}: {err}, keeping {} partial records", records.len());
                    state = ChunkState::Failed(FailReason::Protocol);
                }
                Err(RetryError::Exhausted { attempts, last }) => {
                    warn!(
                        "{partition}: gave up after {attempts} attempts ({last}), \
                         keeping {} partial records",
                        records.len()
                    );
                    state = ChunkState::Failed(FailReason::FetchExhausted);
                }
            }

            if state == ChunkState::Active {
                tokio::time::sleep(self.inter_request_delay).await;
            }
        }

        info!(
            "{partition}: backward walk finished with {} records after {} requests",
            records.len(),
            requests
        );

        ChunkOutcome {
            partition,
            state,
            records,
            requests,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FetchError;
    use crate::domain::PairInterval;
    use crate::utils::TimeUtils;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    const HOUR: i64 = TimeUtils::MS_IN_H;

    fn kline_at_hour(h: i64) -> Kline {
        Kline {
            open_time: h * HOUR,
            open: 100.0 + h as f64,
            high: 101.0 + h as f64,
            low: 99.0 + h as f64,
            close: 100.5 + h as f64,
            volume: 1.0,
            close_time: (h + 1) * HOUR - 1,
            quote_volume: 100.0,
            trade_count: 10,
            taker_buy_base: 0.5,
            taker_buy_quote: 50.0,
        }
    }

    /// Synthetic exchange holding hourly candles `[first_hour, last_hour]`,
    /// answering forward and backward window requests the way the real API
    /// does. Optionally starts failing from a given call number.
    struct SyntheticSource {
        first_hour: i64,
        last_hour: i64,
        calls: AtomicU32,
        fail_from_call: Option<u32>,
    }

    impl SyntheticSource {
        fn hours(first_hour: i64, last_hour: i64) -> Self {
            Self {
                first_hour,
                last_hour,
                calls: AtomicU32::new(0),
                fail_from_call: None,
            }
        }

        fn failing_from(mut self, call: u32) -> Self {
            self.fail_from_call = Some(call);
            self
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WindowFetcher for SyntheticSource {
        async fn fetch(
            &self,
            anchor: Option<i64>,
            direction: FetchDirection,
            limit: i64,
        ) -> Result<Vec<Kline>, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(fail_from) = self.fail_from_call
                && call >= fail_from
            {
                return Err(FetchError::Transient("synthetic outage".into()));
            }

            let window = match direction {
                FetchDirection::Forward => {
                    let from = anchor.unwrap_or(self.first_hour * HOUR);
                    // `i64::div_ceil` is feature-gated on this toolchain; this is the
                    // equivalent ceiling division for the positive `HOUR` divisor.
                    let first = (from.div_euclid(HOUR) + (from.rem_euclid(HOUR) != 0) as i64)
                        .max(self.first_hour);
                    (first..=self.last_hour)
                        .take(limit as usize)
                        .map(kline_at_hour)
                        .collect()
                }
                FetchDirection::Backward => {
                    let before = anchor.unwrap_or(i64::MAX);
                    let hours: Vec<i64> = (self.first_hour..=self.last_hour)
                        .filter(|h| h * HOUR < before)
                        .collect();
                    hours
                        .iter()
                        .rev()
                        .take(limit as usize)
                        .rev()
                        .map(|&h| kline_at_hour(h))
                        .collect()
                }
            };
            Ok(window)
        }
    }

    fn walker_config(limit: i64, max_attempts: u32) -> BackfillConfig {
        let mut config = BackfillConfig::new(PairInterval::new("BTCUSDT", HOUR));
        config.limit = limit;
        config.max_attempts = max_attempts;
        config.inter_request_delay_ms = 0;
        config.backoff_cap_secs = 0;
        config
    }

    fn walker(source: Arc<dyn WindowFetcher>, config: &BackfillConfig) -> ChunkWalker {
        ChunkWalker::new(
            source,
            config,
            GlobalRateLimiter::new(100_000),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn forward_walk_seven_records_limit_three_takes_three_fetches() {
        let source = Arc::new(SyntheticSource::hours(0, 6));
        let config = walker_config(3, 5);
        let outcome = walker(source.clone(), &config)
            .walk_partition(Partition { id: 1, start: 0, end: 100 * HOUR })
            .await;

        assert_eq!(outcome.state, ChunkState::Done);
        assert_eq!(outcome.records.len(), 7);
        assert_eq!(source.calls(), 3);
        let times: Vec<i64> = outcome.records.iter().map(|k| k.open_time).collect();
        assert_eq!(times, (0..7).map(|h| h * HOUR).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn forward_walk_stops_at_partition_edge() {
        let source = Arc::new(SyntheticSource::hours(0, 100));
        let config = walker_config(3, 5);
        let outcome = walker(source.clone(), &config)
            .walk_partition(Partition { id: 1, start: 0, end: 3 * HOUR })
            .await;

        assert_eq!(outcome.state, ChunkState::Done);
        assert_eq!(outcome.records.len(), 3);
        // Full window, all in range: the advanced anchor crosses the edge and
        // the loop condition ends the walk without a wasted fetch.
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn failed_partition_keeps_partial_batches() {
        // Three successful 3-record windows, then the 4th fetch fails until
        // the retry budget (3 attempts) is exhausted.
        let source = Arc::new(SyntheticSource::hours(0, 99).failing_from(4));
        let config = walker_config(3, 3);
        let outcome = walker(source.clone(), &config)
            .walk_partition(Partition { id: 7, start: 0, end: 100 * HOUR })
            .await;

        assert_eq!(outcome.state, ChunkState::Failed(FailReason::FetchExhausted));
        assert_eq!(outcome.records.len(), 9);
        assert_eq!(outcome.requests, 4);
        // 3 successes + 3 retry attempts on the failing call.
        assert_eq!(source.calls(), 6);
    }

    #[tokio::test]
    async fn safety_cap_stops_runaway_partitions() {
        let source = Arc::new(SyntheticSource::hours(0, 1_000_000));
        let mut config = walker_config(3, 5);
        config.max_requests_per_partition = 2;
        let outcome = walker(source, &config)
            .walk_partition(Partition { id: 1, start: 0, end: i64::MAX })
            .await;

        assert_eq!(outcome.state, ChunkState::Failed(FailReason::SafetyLimitReached));
        assert_eq!(outcome.records.len(), 6);
        assert_eq!(outcome.requests, 2);
    }

    #[tokio::test]
    async fn cancelled_walk_returns_partial_data_like_a_failure() {
        let source = Arc::new(SyntheticSource::hours(0, 100));
        let config = walker_config(3, 5);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let walker = ChunkWalker::new(
            source,
            &config,
            GlobalRateLimiter::new(1000),
            cancel,
        );
        let outcome = walker
            .walk_partition(Partition { id: 1, start: 0, end: 10 * HOUR })
            .await;

        assert_eq!(outcome.state, ChunkState::Failed(FailReason::Cancelled));
        assert!(outcome.records.is_empty());
    }

    #[tokio::test]
    async fn backward_walk_reaches_origin_in_chronological_order() {
        let source = Arc::new(SyntheticSource::hours(0, 6));
        let config = walker_config(3, 5);
        let outcome = walker(source.clone(), &config)
            .walk_backward(0, 7 * HOUR)
            .await;

        assert_eq!(outcome.state, ChunkState::Done);
        let times: Vec<i64> = outcome.records.iter().map(|k| k.open_time).collect();
        assert_eq!(times, (0..7).map(|h| h * HOUR).collect::<Vec<_>>());
        // [4,5,6], [1,2,3], [0] -> three windows.
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn backward_walk_clips_below_a_later_origin() {
        let source = Arc::new(SyntheticSource::hours(0, 6));
        let config = walker_config(3, 5);
        let outcome = walker(source, &config).walk_backward(2 * HOUR, 7 * HOUR).await;

        assert_eq!(outcome.state, ChunkState::Done);
        let times: Vec<i64> = outcome.records.iter().map(|k| k.open_time).collect();
        assert_eq!(times, (2..7).map(|h| h * HOUR).collect::<Vec<_>>());
    }
}
