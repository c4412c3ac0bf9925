//! Correlation collection
//!
//! Accumulates the Thrift correlations drained from the kernel map
//! between drain passes.

use crate::types::*;
use std::collections::BTreeMap;

/// Collector for drained correlations
#[derive(Default)]
pub struct CorrelationCollector {
    /// Sequence -> request id, newest drain wins
    records: BTreeMap<u64, u64>,
    /// Total number of correlations drained
    total: u64,
    /// Number of drain passes
    drains: u64,
}

impl CorrelationCollector {
    /// Create a new collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the result of one drain pass
    ///
    /// Returns the number of correlations in the batch.
    pub fn add_batch(&mut self, batch: &[Correlation]) -> usize {
        for correlation in batch {
            self.records
                .insert(correlation.sequence, correlation.request_id);
        }
        self.total += batch.len() as u64;
        self.drains += 1;
        batch.len()
    }

    /// Request id recorded for `sequence`
    pub fn request_id(&self, sequence: u64) -> Option<u64> {
        self.records.get(&sequence).copied()
    }

    /// Get total number of correlations drained
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Get number of drain passes
    pub fn drains(&self) -> u64 {
        self.drains
    }

    /// Generate the correlation section of the report
    pub fn generate_stats(&self) -> CorrelationStats {
        CorrelationStats {
            total: self.total,
            drains: self.drains,
            first_sequence: self.records.keys().next().copied(),
            last_sequence: self.records.keys().next_back().copied(),
            records: self
                .records
                .iter()
                .map(|(&sequence, &request_id)| Correlation {
                    sequence,
                    request_id,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn correlation(sequence: u64, request_id: u64) -> Correlation {
        Correlation {
            sequence,
            request_id,
        }
    }

    #[test]
    fn test_collector_basic() {
        let mut collector = CorrelationCollector::new();

        assert_eq!(collector.add_batch(&[correlation(0, 42), correlation(1, 43)]), 2);
        assert_eq!(collector.add_batch(&[]), 0);

        assert_eq!(collector.total(), 2);
        assert_eq!(collector.drains(), 2);
        assert_eq!(collector.request_id(1), Some(43));
        assert_eq!(collector.request_id(2), None);
    }

    #[test]
    fn test_stats_are_ordered_by_sequence() {
        let mut collector = CorrelationCollector::new();
        collector.add_batch(&[correlation(7, 1), correlation(3, 2)]);
        collector.add_batch(&[correlation(5, 3)]);

        let stats = collector.generate_stats();

        assert_eq!(stats.total, 3);
        assert_eq!(stats.first_sequence, Some(3));
        assert_eq!(stats.last_sequence, Some(7));
        let sequences: Vec<u64> = stats.records.iter().map(|c| c.sequence).collect();
        assert_eq!(sequences, vec![3, 5, 7]);
    }

    #[test]
    fn test_reused_sequence_keeps_latest() {
        // The kernel counter restarts at zero when the maps are recreated.
        let mut collector = CorrelationCollector::new();
        collector.add_batch(&[correlation(0, 10)]);
        collector.add_batch(&[correlation(0, 20)]);

        assert_eq!(collector.request_id(0), Some(20));
        assert_eq!(collector.total(), 2);
        assert_eq!(collector.generate_stats().records.len(), 1);
    }
}
