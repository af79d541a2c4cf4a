use chrono::{TimeZone, Utc};

use crate::domain::PairInterval;

/// Crawl-loop constants: retry budget, pacing, partitioning and the
/// per-partition runaway guard.
pub struct BackfillDefaults {
    pub max_attempts: u32,
    pub backoff_cap_secs: u64,
    pub inter_request_delay_ms: u64,
    pub chunk_width_days: i64,
    pub max_workers: usize,
    pub max_requests_per_partition: u32,
}

pub const BACKFILL: BackfillDefaults = BackfillDefaults {
    max_attempts: 5,
    backoff_cap_secs: 30,
    inter_request_delay_ms: 100,
    chunk_width_days: 30,
    max_workers: 4,
    // 30 days of 1m candles is ~44 batches; x100 leaves generous headroom
    // for every supported interval before we call the remote signal flaky.
    max_requests_per_partition: 5000,
};

/// Candidate epochs for boundary discovery, most-recent-plausible first.
/// BTCUSDT listed 2017-08-17; the earlier dates cover pairs that predate it
/// and guard against the listing date being wrong.
pub fn default_probe_epochs() -> Vec<i64> {
    [
        (2017, 8, 17),
        (2017, 7, 14),
        (2017, 1, 1),
        (2016, 1, 1),
        (2015, 1, 1),
    ]
    .iter()
    .map(|&(y, m, d)| {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0)
            .single()
            .expect("static probe date")
            .timestamp_millis()
    })
    .collect()
}

/// Everything one run needs, assembled from the CLI in main.
#[derive(Clone)]
pub struct BackfillConfig {
    pub pair: PairInterval,
    pub limit: i64,
    pub max_attempts: u32,
    pub backoff_cap_secs: u64,
    pub inter_request_delay_ms: u64,
    pub chunk_width_ms: i64,
    pub max_workers: usize,
    pub max_requests_per_partition: u32,
    pub probe_epochs: Vec<i64>,
}

impl BackfillConfig {
    pub fn new(pair: PairInterval) -> Self {
        use crate::config::BINANCE;
        use crate::utils::TimeUtils;

        Self {
            pair,
            limit: BINANCE.limits.klines_limit,
            max_attempts: BACKFILL.max_attempts,
            backoff_cap_secs: BACKFILL.backoff_cap_secs,
            inter_request_delay_ms: BACKFILL.inter_request_delay_ms,
            chunk_width_ms: BACKFILL.chunk_width_days * TimeUtils::MS_IN_D,
            max_workers: BACKFILL.max_workers,
            max_requests_per_partition: BACKFILL.max_requests_per_partition,
            probe_epochs: default_probe_epochs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_epochs_are_strictly_descending() {
        let probes = default_probe_epochs();
        assert_eq!(probes.len(), 5);
        for pair in probes.windows(2) {
            assert!(pair[0] > pair[1], "probes must go newest to oldest");
        }
        // First probe is the BTCUSDT listing date.
        assert_eq!(probes[0], 1_502_928_000_000);
    }
}
