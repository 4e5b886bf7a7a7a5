//! Bounded FIFO buffer for captured enrollment images.
//!
//! The buffer retains at most `capacity` records. Insertions append in
//! arrival order; when an insertion would exceed capacity, the oldest
//! records are evicted from the front. Retained records are never
//! reordered, only truncated.

use std::collections::VecDeque;

use tracing::debug;

use crate::capture::CaptureRecord;
use crate::error::{Error, Result};

/// An insertion-ordered collection of capture records with a fixed capacity
/// and strict oldest-first eviction.
///
/// Equivalent to `records = (previous ++ batch).suffix(capacity)` after
/// every insertion: the retained set is always the most recent `capacity`
/// records overall, in their original order.
#[derive(Debug, Clone)]
pub struct CaptureBuffer {
    capacity: usize,
    records: VecDeque<CaptureRecord>,
}

impl CaptureBuffer {
    /// Create an empty buffer with the given capacity.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::ConfigValidation {
                message: "capture buffer capacity must be greater than 0".to_string(),
            });
        }
        Ok(Self {
            capacity,
            records: VecDeque::with_capacity(capacity),
        })
    }

    /// The fixed capacity of this buffer.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of records currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the buffer holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a batch of records in argument order, evicting the oldest
    /// entries if the result exceeds capacity.
    ///
    /// A single batch larger than the capacity keeps only the batch's last
    /// `capacity` records. Returns the number of records evicted.
    pub fn insert_batch(&mut self, batch: impl IntoIterator<Item = CaptureRecord>) -> usize {
        self.records.extend(batch);

        let mut evicted = 0;
        while self.records.len() > self.capacity {
            self.records.pop_front();
            evicted += 1;
        }

        if evicted > 0 {
            debug!(evicted, retained = self.records.len(), "evicted oldest captures");
        }

        debug_assert!(self.records.len() <= self.capacity);
        evicted
    }

    /// Empty the buffer unconditionally.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// The current retained records in insertion order, without mutating
    /// state. This is the read view handed to the rendering layer.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CaptureRecord> {
        self.records.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CapturedFrame, Position};

    fn record(id: u64) -> CaptureRecord {
        CaptureRecord::from_frame(
            CapturedFrame::new(format!("mem://frame-{id}"), Position::for_batch_index(id as usize)),
            id,
            0,
        )
    }

    fn records(ids: std::ops::RangeInclusive<u64>) -> Vec<CaptureRecord> {
        ids.map(record).collect()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = CaptureBuffer::new(0).unwrap_err();
        assert!(err.to_string().contains("capacity"));
    }

    #[test]
    fn test_new_buffer_is_empty() {
        let buffer = CaptureBuffer::new(7).unwrap();
        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
        assert_eq!(buffer.capacity(), 7);
    }

    #[test]
    fn test_insert_under_capacity() {
        let mut buffer = CaptureBuffer::new(7).unwrap();
        let evicted = buffer.insert_batch(records(1..=3));

        assert_eq!(evicted, 0);
        assert_eq!(buffer.len(), 3);
        let ids: Vec<u64> = buffer.snapshot().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_fifo_eviction_across_batches() {
        // Capacity 7, batches of sizes [3, 2, 4]. Nine records total;
        // the retained set is #3..#9 in insertion order.
        let mut buffer = CaptureBuffer::new(7).unwrap();
        assert_eq!(buffer.insert_batch(records(1..=3)), 0);
        assert_eq!(buffer.insert_batch(records(4..=5)), 0);
        assert_eq!(buffer.insert_batch(records(6..=9)), 2);

        assert_eq!(buffer.len(), 7);
        let ids: Vec<u64> = buffer.snapshot().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_single_batch_larger_than_capacity() {
        let mut buffer = CaptureBuffer::new(3).unwrap();
        let evicted = buffer.insert_batch(records(1..=10));

        assert_eq!(evicted, 7);
        let ids: Vec<u64> = buffer.snapshot().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![8, 9, 10]);
    }

    #[test]
    fn test_len_never_exceeds_capacity() {
        let mut buffer = CaptureBuffer::new(7).unwrap();
        let mut next_id = 1;
        for batch_size in [1_u64, 3, 7, 2, 9, 1] {
            buffer.insert_batch(records(next_id..=next_id + batch_size - 1));
            next_id += batch_size;
            assert!(buffer.len() <= buffer.capacity());
        }
    }

    #[test]
    fn test_retained_order_is_insertion_order() {
        let mut buffer = CaptureBuffer::new(4).unwrap();
        buffer.insert_batch(records(1..=6));

        let snapshot = buffer.snapshot();
        for pair in snapshot.windows(2) {
            assert!(pair[0].id < pair[1].id);
        }
    }

    #[test]
    fn test_clear() {
        let mut buffer = CaptureBuffer::new(7).unwrap();
        buffer.insert_batch(records(1..=5));
        buffer.clear();

        assert!(buffer.is_empty());
        assert!(buffer.snapshot().is_empty());
    }

    #[test]
    fn test_snapshot_does_not_mutate() {
        let mut buffer = CaptureBuffer::new(7).unwrap();
        buffer.insert_batch(records(1..=5));

        let first = buffer.snapshot();
        let second = buffer.snapshot();
        assert_eq!(first, second);
        assert_eq!(buffer.len(), 5);
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let mut buffer = CaptureBuffer::new(7).unwrap();
        let evicted = buffer.insert_batch(Vec::new());
        assert_eq!(evicted, 0);
        assert!(buffer.is_empty());
    }
}
