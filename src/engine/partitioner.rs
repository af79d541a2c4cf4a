/// Half-open slice of wall-clock time `[start, end)` assigned to one walker.
/// IDs are dense and ascending so chunk logs stay traceable even when
/// chunks complete out of order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub id: u32,
    pub start: i64,
    pub end: i64,
}

impl Partition {
    pub fn covers(&self, open_time: i64) -> bool {
        self.start <= open_time && open_time < self.end
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use crate::utils::time_utils::epoch_ms_to_utc;
        write!(
            f,
            "chunk {} [{} .. {})",
            self.id,
            epoch_ms_to_utc(self.start),
            epoch_ms_to_utc(self.end)
        )
    }
}

/// Splits `[origin, end)` into contiguous fixed-width partitions, the last
/// one clipped to `end`. Width is a tunable tradeoff: too small and
/// per-chunk overhead dominates, too large and one slow chunk stalls
/// aggregate completion.
pub fn partition_range(origin: i64, end: i64, width_ms: i64) -> Vec<Partition> {
    assert!(width_ms > 0, "partition width must be positive");

    let mut partitions = Vec::new();
    let mut current = origin;
    let mut id = 1u32;

    while current < end {
        let chunk_end = current.saturating_add(width_ms).min(end);
        partitions.push(Partition {
            id,
            start: current,
            end: chunk_end,
        });
        current = chunk_end;
        id += 1;
    }

    partitions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_tile_the_range_without_gaps_or_overlap() {
        let parts = partition_range(0, 95, 30);
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], Partition { id: 1, start: 0, end: 30 });
        assert_eq!(parts[3], Partition { id: 4, start: 90, end: 95 });

        for pair in parts.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
            assert_eq!(pair[0].id + 1, pair[1].id);
        }
    }

    #[test]
    fn exact_multiple_produces_no_empty_tail() {
        let parts = partition_range(10, 70, 30);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1].end, 70);
    }

    #[test]
    fn empty_or_inverted_range_yields_no_partitions() {
        assert!(partition_range(100, 100, 30).is_empty());
        assert!(partition_range(200, 100, 30).is_empty());
    }

    #[test]
    fn half_open_membership() {
        let p = Partition { id: 1, start: 0, end: 30 };
        assert!(p.covers(0));
        assert!(p.covers(29));
        assert!(!p.covers(30));
    }
}
