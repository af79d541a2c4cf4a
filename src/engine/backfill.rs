use std::{sync::Arc, time::Duration};

use log::{info, warn};
use tabled::Tabled;
use thiserror::Error;
use tokio::{sync::Semaphore, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{
    config::{BINANCE, BackfillConfig},
    data::{BoundaryError, GlobalRateLimiter, RetryPolicy, WindowFetcher, discover_origin},
    engine::{
        aggregator::{Dataset, Gap, MergeStats, merge, validate_continuity},
        partitioner::{Partition, partition_range},
        walker::{ChunkOutcome, ChunkState, ChunkWalker},
    },
    utils::time_utils::{epoch_ms_to_utc, format_duration, utc_now_as_timestamp_ms},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlMode {
    /// Fixed-width partitions crawled by a bounded worker pool.
    Parallel,
    /// One forward walker over the whole span, anchor-chained.
    Sequential,
    /// One walker from the latest window back to the origin.
    Backward,
}

#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("boundary discovery failed: {0}")]
    Boundary(#[from] BoundaryError),

    /// Every partition came back empty. Distinct from partial failure:
    /// partial data is reported, zero data aborts the run.
    #[error("backfill produced zero records")]
    EmptyRun,

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// One row of the end-of-run summary. Silent partial data is prohibited, so
/// every partition shows up here with its terminal state.
#[derive(Debug, Clone, Tabled)]
pub struct PartitionSummary {
    #[tabled(rename = "chunk")]
    pub id: u32,
    #[tabled(rename = "from")]
    pub from: String,
    #[tabled(rename = "to")]
    pub to: String,
    #[tabled(rename = "state")]
    pub state: String,
    #[tabled(rename = "records")]
    pub records: usize,
    #[tabled(rename = "requests")]
    pub requests: u32,
}

#[derive(Debug)]
pub struct BackfillReport {
    pub pair: String,
    pub record_count: usize,
    pub span_start: Option<i64>,
    pub span_end: Option<i64>,
    pub merge_stats: MergeStats,
    pub partitions: Vec<PartitionSummary>,
    pub failed_partition_ids: Vec<u32>,
    pub gaps: Vec<Gap>,
}

impl BackfillReport {
    pub fn span_description(&self) -> String {
        match (self.span_start, self.span_end) {
            (Some(start), Some(end)) => format!(
                "{} .. {} ({})",
                epoch_ms_to_utc(start),
                epoch_ms_to_utc(end),
                format_duration(end - start)
            ),
            _ => "empty".to_string(),
        }
    }
}

pub struct BackfillOutcome {
    pub dataset: Dataset,
    pub report: BackfillReport,
}

/// Orchestrates one complete backfill run: discover the origin, partition
/// the span, drive walkers to completion, and consolidate their outputs.
/// Workers communicate only through their returned ChunkOutcome values;
/// aggregation happens once, after every walker terminated.
pub struct BackfillEngine {
    fetcher: Arc<dyn WindowFetcher>,
    config: BackfillConfig,
    limiter: GlobalRateLimiter,
    cancel: CancellationToken,
}

impl BackfillEngine {
    pub fn new(fetcher: Arc<dyn WindowFetcher>, config: BackfillConfig) -> Self {
        Self {
            fetcher,
            config,
            limiter: GlobalRateLimiter::new(BINANCE.limits.weight_limit_minute),
            cancel: CancellationToken::new(),
        }
    }

    /// Token callers can use to abort a long-running backfill; partitions in
    /// flight return their partial data.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Backfill from the discovered origin up to the current wall clock.
    pub async fn run(&self, mode: CrawlMode) -> Result<BackfillOutcome, BackfillError> {
        self.run_to(mode, utc_now_as_timestamp_ms()).await
    }

    /// Backfill over the closed range `[origin, end)`. Running twice over
    /// the same range and merging both outputs yields the same dataset as
    /// one run; dedup is order-independent.
    pub async fn run_to(&self, mode: CrawlMode, end: i64) -> Result<BackfillOutcome, BackfillError> {
        let policy = RetryPolicy::new(
            self.config.max_attempts,
            Duration::from_secs(self.config.backoff_cap_secs),
        );
        let origin =
            discover_origin(self.fetcher.as_ref(), &self.config.probe_epochs, &policy).await?;
        let now = end;

        info!(
            "backfilling {} from {} to {}",
            self.config.pair,
            epoch_ms_to_utc(origin),
            epoch_ms_to_utc(now)
        );

        let outcomes = match mode {
            CrawlMode::Backward => {
                let walker = self.walker();
                vec![walker.walk_backward(origin, now).await]
            }
            CrawlMode::Sequential => {
                let walker = self.walker();
                let span = Partition {
                    id: 1,
                    start: origin,
                    end: now,
                };
                vec![walker.walk_partition(span).await]
            }
            CrawlMode::Parallel => {
                let partitions = partition_range(origin, now, self.config.chunk_width_ms);
                info!(
                    "created {} chunks of ~{} for up to {} workers",
                    partitions.len(),
                    format_duration(self.config.chunk_width_ms),
                    self.config.max_workers
                );
                self.crawl_partitions(partitions).await?
            }
        };

        self.consolidate(outcomes)
    }

    fn walker(&self) -> ChunkWalker {
        ChunkWalker::new(
            self.fetcher.clone(),
            &self.config,
            self.limiter.clone(),
            self.cancel.clone(),
        )
    }

    /// Runs one walker task per partition, bounded by a semaphore-sized
    /// pool. Each task returns its ChunkOutcome; nothing is shared while
    /// walking, so the join below is the only synchronization point.
    async fn crawl_partitions(
        &self,
        partitions: Vec<Partition>,
    ) -> Result<Vec<ChunkOutcome>, BackfillError> {
        let pool = Arc::new(Semaphore::new(self.config.max_workers.max(1)));
        let mut tasks = JoinSet::new();

        for partition in partitions {
            let pool = pool.clone();
            let walker = self.walker();
            tasks.spawn(async move {
                let _permit = pool.acquire_owned().await.expect("worker pool closed");
                walker.walk_partition(partition).await
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            outcomes.push(joined?);
        }
        outcomes.sort_by_key(|o| o.partition.id);
        Ok(outcomes)
    }

    fn consolidate(
        &self,
        outcomes: Vec<ChunkOutcome>,
    ) -> Result<BackfillOutcome, BackfillError> {
        let failed_partitions: Vec<Partition> = outcomes
            .iter()
            .filter(|o| matches!(o.state, ChunkState::Failed(_)))
            .map(|o| o.partition.clone())
            .collect();
        let failed_partition_ids: Vec<u32> = failed_partitions.iter().map(|p| p.id).collect();

        let summaries: Vec<PartitionSummary> = outcomes
            .iter()
            .map(|o| PartitionSummary {
                id: o.partition.id,
                from: epoch_ms_to_utc(o.partition.start),
                to: epoch_ms_to_utc(o.partition.end),
                state: match &o.state {
                    ChunkState::Done => "done".to_string(),
                    ChunkState::Failed(reason) => format!("failed: {reason}"),
                    ChunkState::Active => "active".to_string(),
                },
                records: o.records.len(),
                requests: o.requests,
            })
            .collect();

        let (dataset, merge_stats) =
            merge(outcomes.into_iter().map(|o| o.records).collect());
        if dataset.is_empty() {
            return Err(BackfillError::EmptyRun);
        }

        let gaps = validate_continuity(&dataset, self.config.pair.interval_ms, &failed_partitions);
        for id in &failed_partition_ids {
            warn!("chunk {id} reported failure; its span may be incomplete");
        }

        let report = BackfillReport {
            pair: self.config.pair.to_string(),
            record_count: dataset.len(),
            span_start: dataset.first_open_time(),
            span_end: dataset.last_open_time(),
            merge_stats,
            partitions: summaries,
            failed_partition_ids,
            gaps,
        };

        Ok(BackfillOutcome { dataset, report })
    }
}
