//! Sequence-indexed ring of observations.
//!
//! Sequence numbers start at 1 and are never reused. Observation `s` lives in
//! slot `s % capacity` until observation `s + capacity` overwrites it. Each
//! slot keeps the observation (which carries its sequence), so a stale lookup
//! is detected by comparing sequences rather than trusting the position.
//!
//! Checkpoints:
//! - `latest`: current value of every data item.
//! - `first`: state just before the oldest retained observation, advanced as
//!   observations are evicted.
//! - periodic snapshots every `checkpoint_frequency` appends, used by
//!   [`ObservationBuffer::checkpoint_at`] to rebuild state at any retained
//!   sequence without replaying the whole window.

use crate::buffer::checkpoint::Checkpoint;
use crate::entity::Observation;
use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

struct Inner {
    slots: Vec<Option<Observation>>,
    next_sequence: u64,
    first_sequence: u64,
    latest: Checkpoint,
    first: Checkpoint,
    snapshots: VecDeque<(u64, Checkpoint)>,
}

impl Inner {
    fn slot(&self, sequence: u64) -> Option<&Observation> {
        let idx = (sequence % self.slots.len() as u64) as usize;
        self.slots[idx]
            .as_ref()
            .filter(|obs| obs.sequence() == sequence)
    }

    fn contains(&self, sequence: u64) -> bool {
        sequence >= self.first_sequence && sequence < self.next_sequence
    }
}

pub struct ObservationBuffer {
    inner: RwLock<Inner>,
    capacity: usize,
    checkpoint_frequency: u64,
}

impl ObservationBuffer {
    /// Create a buffer holding `capacity` observations (at least one), taking
    /// a snapshot every `checkpoint_frequency` appends (0 disables snapshots).
    pub fn new(capacity: usize, checkpoint_frequency: u64) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: RwLock::new(Inner {
                slots: vec![None; capacity],
                next_sequence: 1,
                first_sequence: 1,
                latest: Checkpoint::new(),
                first: Checkpoint::new(),
                snapshots: VecDeque::new(),
            }),
            capacity,
            checkpoint_frequency,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Assign the next sequence number and store the observation.
    ///
    /// The sequence is assigned and the observation stored under one write
    /// lock: once a reader sees `next_sequence() > s`, observation `s` is
    /// readable (unless already evicted).
    pub fn append(&self, mut observation: Observation) -> u64 {
        let mut inner = self.write();
        let sequence = inner.next_sequence;
        observation.set_sequence(sequence);

        let idx = (sequence % self.capacity as u64) as usize;
        if let Some(evicted) = inner.slots[idx].take() {
            inner.first.add_observation(&evicted);
            inner.first_sequence = evicted.sequence() + 1;
        }

        inner.latest.add_observation(&observation);
        inner.slots[idx] = Some(observation);
        inner.next_sequence = sequence + 1;

        if self.checkpoint_frequency > 0 && sequence % self.checkpoint_frequency == 0 {
            let snapshot = inner.latest.clone();
            inner.snapshots.push_back((sequence, snapshot));
        }
        while let Some(&(snapshot_seq, _)) = inner.snapshots.front() {
            if snapshot_seq >= inner.first_sequence {
                break;
            }
            inner.snapshots.pop_front();
        }

        sequence
    }

    /// The observation with `sequence`, if it has not been overwritten.
    pub fn get(&self, sequence: u64) -> Option<Observation> {
        let inner = self.read();
        if !inner.contains(sequence) {
            return None;
        }
        inner.slot(sequence).cloned()
    }

    /// Up to `count` retained observations with sequence ≥ `from`, in order.
    pub fn range(&self, from: u64, count: usize) -> Vec<Observation> {
        let inner = self.read();
        let start = from.max(inner.first_sequence);
        (start..inner.next_sequence)
            .filter_map(|seq| inner.slot(seq).cloned())
            .take(count)
            .collect()
    }

    /// Sequence the next append will receive.
    pub fn next_sequence(&self) -> u64 {
        self.read().next_sequence
    }

    /// Oldest retained sequence (equal to `next_sequence` when empty).
    pub fn first_sequence(&self) -> u64 {
        self.read().first_sequence
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        let inner = self.read();
        (inner.next_sequence - inner.first_sequence) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current value of one data item.
    pub fn latest(&self, data_item: &str) -> Option<Observation> {
        self.read().latest.get(data_item).cloned()
    }

    /// Current state of every data item.
    pub fn latest_checkpoint(&self) -> Checkpoint {
        self.read().latest.clone()
    }

    /// State just before the oldest retained observation.
    pub fn first_checkpoint(&self) -> Checkpoint {
        self.read().first.clone()
    }

    /// Number of periodic snapshots currently held.
    pub fn snapshot_count(&self) -> usize {
        self.read().snapshots.len()
    }

    /// State as of `sequence` (inclusive).
    ///
    /// Valid from `first_sequence() - 1` (the first checkpoint) up to the last
    /// assigned sequence; anything else returns `None`.
    pub fn checkpoint_at(&self, sequence: u64) -> Option<Checkpoint> {
        let inner = self.read();
        if sequence.saturating_add(1) < inner.first_sequence || sequence >= inner.next_sequence {
            return None;
        }

        let (base_seq, base) = inner
            .snapshots
            .iter()
            .rev()
            .find(|(seq, _)| *seq <= sequence)
            .map(|(seq, checkpoint)| (*seq, checkpoint))
            .unwrap_or((inner.first_sequence - 1, &inner.first));

        let mut checkpoint = base.clone();
        for seq in base_seq + 1..=sequence {
            if let Some(obs) = inner.slot(seq) {
                checkpoint.add_observation(obs);
            }
        }
        Some(checkpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Category, DataItem};
    use crate::entity::Value;
    use chrono::Utc;
    use std::sync::Arc;

    fn sample(item: &Arc<DataItem>, value: f64) -> Observation {
        Observation::new(item.clone(), Utc::now(), Value::Double(value))
    }

    fn x() -> Arc<DataItem> {
        Arc::new(DataItem::new("x1", Category::Sample))
    }

    #[test]
    fn test_sequences_start_at_one() {
        let buffer = ObservationBuffer::new(4, 0);
        assert_eq!(buffer.next_sequence(), 1);
        assert!(buffer.is_empty());

        let item = x();
        assert_eq!(buffer.append(sample(&item, 1.0)), 1);
        assert_eq!(buffer.append(sample(&item, 2.0)), 2);
        assert_eq!(buffer.next_sequence(), 3);
        assert_eq!(buffer.get(1).unwrap().sequence(), 1);
        assert_eq!(buffer.get(2).unwrap().value(), &Value::Double(2.0));
        assert!(buffer.get(3).is_none());
        assert!(buffer.get(0).is_none());
    }

    #[test]
    fn test_wraparound_overwrites_oldest() {
        let buffer = ObservationBuffer::new(4, 0);
        let item = x();
        for i in 1..=6 {
            buffer.append(sample(&item, i as f64));
        }

        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.first_sequence(), 3);
        assert!(buffer.get(1).is_none());
        assert!(buffer.get(2).is_none());
        assert_eq!(buffer.get(3).unwrap().value(), &Value::Double(3.0));
        assert_eq!(buffer.get(6).unwrap().value(), &Value::Double(6.0));
    }

    #[test]
    fn test_range_skips_evicted() {
        let buffer = ObservationBuffer::new(4, 0);
        let item = x();
        for i in 1..=6 {
            buffer.append(sample(&item, i as f64));
        }

        let seqs: Vec<u64> = buffer.range(1, 10).iter().map(Observation::sequence).collect();
        assert_eq!(seqs, vec![3, 4, 5, 6]);

        let seqs: Vec<u64> = buffer.range(4, 2).iter().map(Observation::sequence).collect();
        assert_eq!(seqs, vec![4, 5]);

        assert!(buffer.range(7, 10).is_empty());
    }

    #[test]
    fn test_latest_and_first_checkpoints() {
        let buffer = ObservationBuffer::new(2, 0);
        let x = x();
        let y = Arc::new(DataItem::new("y1", Category::Sample));

        buffer.append(sample(&x, 1.0)); // 1
        buffer.append(sample(&y, 2.0)); // 2
        buffer.append(sample(&x, 3.0)); // 3, evicts 1

        assert_eq!(buffer.latest("x1").unwrap().value(), &Value::Double(3.0));
        assert_eq!(buffer.latest("y1").unwrap().value(), &Value::Double(2.0));

        let first = buffer.first_checkpoint();
        assert_eq!(first.len(), 1);
        assert_eq!(first.get("x1").unwrap().sequence(), 1);
    }

    #[test]
    fn test_checkpoint_at() {
        let buffer = ObservationBuffer::new(8, 3);
        let x = x();
        let y = Arc::new(DataItem::new("y1", Category::Sample));

        for i in 1..=10u64 {
            let item = if i % 2 == 0 { &y } else { &x };
            buffer.append(sample(item, i as f64));
        }
        // 10 appends into 8 slots: sequences 3..=10 retained.
        assert_eq!(buffer.first_sequence(), 3);
        assert_eq!(buffer.snapshot_count(), 3); // at 3, 6, 9

        let at7 = buffer.checkpoint_at(7).unwrap();
        assert_eq!(at7.get("x1").unwrap().sequence(), 7);
        assert_eq!(at7.get("y1").unwrap().sequence(), 6);

        let at2 = buffer.checkpoint_at(2).unwrap();
        assert_eq!(at2, buffer.first_checkpoint());

        assert_eq!(buffer.checkpoint_at(10).unwrap(), buffer.latest_checkpoint());
        assert!(buffer.checkpoint_at(1).is_none());
        assert!(buffer.checkpoint_at(11).is_none());
    }

    #[test]
    fn test_checkpoint_at_out_of_range() {
        let buffer = ObservationBuffer::new(4, 2);
        assert!(buffer.checkpoint_at(u64::MAX).is_none());

        let x = x();
        for i in 0..6 {
            buffer.append(sample(&x, i as f64));
        }
        assert!(buffer.checkpoint_at(u64::MAX).is_none());
        assert!(buffer.checkpoint_at(1).is_none());
        assert!(buffer.checkpoint_at(6).is_some());
    }

    #[test]
    fn test_concurrent_appends_are_unique() {
        let buffer = Arc::new(ObservationBuffer::new(1024, 100));
        let item = x();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let buffer = buffer.clone();
                let item = item.clone();
                std::thread::spawn(move || {
                    (0..100)
                        .map(|i| buffer.append(sample(&item, i as f64)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        assert_eq!(all, (1..=400).collect::<Vec<_>>());
        assert_eq!(buffer.next_sequence(), 401);
    }
}
