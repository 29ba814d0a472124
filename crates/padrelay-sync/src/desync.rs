//! Machine-state hash comparison across players.

use std::collections::HashMap;

use xxhash_rust::xxh3::xxh3_64;

/// Outcome of checking one state-hash report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncCheck {
    /// First report for this VI count, stored as the reference.
    Recorded,
    /// Same hash as the reference.
    Matched,
    /// Different hash from the reference: the machines diverged.
    Mismatch { expected: u64, actual: u64 },
}

/// First-seen state hash per VI count.
#[derive(Debug)]
pub struct SyncRecords {
    hashes: HashMap<u32, u64>,
    capacity: usize,
}

impl SyncRecords {
    pub fn new(capacity: usize) -> Self {
        Self {
            hashes: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn check(&mut self, vi_count: u32, snapshot: &[u8]) -> SyncCheck {
        let actual = xxh3_64(snapshot);
        match self.hashes.get(&vi_count) {
            Some(&expected) if expected == actual => SyncCheck::Matched,
            Some(&expected) => SyncCheck::Mismatch { expected, actual },
            None => {
                // Flush at capacity; clients only report recent VI counts.
                if self.hashes.len() >= self.capacity {
                    self.hashes.clear();
                }
                self.hashes.insert(vi_count, actual);
                SyncCheck::Recorded
            }
        }
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_report_is_reference() {
        let mut records = SyncRecords::new(10);
        assert_eq!(records.check(1, &[1; 128]), SyncCheck::Recorded);
        assert_eq!(records.check(1, &[1; 128]), SyncCheck::Matched);
        assert!(matches!(
            records.check(1, &[2; 128]),
            SyncCheck::Mismatch { .. }
        ));
        // A mismatch does not replace the reference.
        assert_eq!(records.check(1, &[1; 128]), SyncCheck::Matched);
    }

    #[test]
    fn test_vi_counts_are_independent() {
        let mut records = SyncRecords::new(10);
        assert_eq!(records.check(1, &[1; 128]), SyncCheck::Recorded);
        assert_eq!(records.check(2, &[2; 128]), SyncCheck::Recorded);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_table_flushes_at_capacity() {
        let mut records = SyncRecords::new(3);
        for vi in 0..3 {
            records.check(vi, &[vi as u8; 128]);
        }
        assert_eq!(records.len(), 3);
        records.check(3, &[3; 128]);
        assert_eq!(records.len(), 1);
        // VI 0 was flushed, so a different hash is a fresh reference.
        assert_eq!(records.check(0, &[9; 128]), SyncCheck::Recorded);
        assert!(!records.is_empty());
    }
}
