mod aggregator;
mod backfill;
mod partitioner;
mod walker;

pub use {
    aggregator::{Dataset, Gap, MergeStats, merge, validate_continuity},
    backfill::{
        BackfillEngine, BackfillError, BackfillOutcome, BackfillReport, CrawlMode,
        PartitionSummary,
    },
    partitioner::{Partition, partition_range},
    walker::{ChunkOutcome, ChunkState, ChunkWalker, FailReason},
};
