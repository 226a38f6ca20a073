//! Bounded FIFO window of recent samples

use std::collections::VecDeque;

use super::TelemetrySample;
use crate::error::{EngineError, EngineResult};

/// Most recent samples in arrival order, oldest evicted first
#[derive(Debug, Clone)]
pub struct SlidingWindowBuffer {
    samples: VecDeque<TelemetrySample>,
    capacity: usize,
}

impl SlidingWindowBuffer {
    pub fn new(capacity: usize) -> EngineResult<Self> {
        if capacity == 0 {
            return Err(EngineError::ConfigOutOfRange {
                field: "max_data_points",
                value: 0.0,
            });
        }

        Ok(Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
        })
    }

    /// Adds to the tail, returning the evicted head when over capacity.
    pub fn append(&mut self, sample: TelemetrySample) -> Option<TelemetrySample> {
        self.samples.push_back(sample);

        if self.samples.len() > self.capacity {
            self.samples.pop_front()
        } else {
            None
        }
    }

    /// Owned copy of the window contents, oldest first.
    pub fn snapshot(&self) -> Vec<TelemetrySample> {
        self.samples.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &TelemetrySample> + ExactSizeIterator {
        self.samples.iter()
    }

    /// The last `n` samples (or all of them), oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &TelemetrySample> {
        self.samples.iter().skip(self.samples.len().saturating_sub(n))
    }

    pub fn latest(&self) -> Option<&TelemetrySample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: i64) -> TelemetrySample {
        TelemetrySample::new(id, [0.0, 0.0, 9.8], [0.0; 3], 22.0, 3.9)
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            SlidingWindowBuffer::new(0),
            Err(EngineError::ConfigOutOfRange { .. })
        ));
    }

    #[test]
    fn test_window_keeps_most_recent_in_order() {
        for capacity in [1usize, 3, 50] {
            let mut window = SlidingWindowBuffer::new(capacity).unwrap();

            for n in 1..=120i64 {
                window.append(sample(n));
                assert!(window.len() <= capacity);

                let expected: Vec<i64> = ((n - (n.min(capacity as i64)) + 1)..=n).collect();
                let ids: Vec<i64> = window.iter().map(|s| s.sensor_id).collect();
                assert_eq!(ids, expected);
            }
        }
    }

    #[test]
    fn test_append_returns_evicted_head() {
        let mut window = SlidingWindowBuffer::new(2).unwrap();
        assert!(window.append(sample(1)).is_none());
        assert!(window.append(sample(2)).is_none());
        assert!(window.is_full());

        let evicted = window.append(sample(3)).unwrap();
        assert_eq!(evicted.sensor_id, 1);
        assert_eq!(window.latest().unwrap().sensor_id, 3);
    }

    #[test]
    fn test_recent_tail() {
        let mut window = SlidingWindowBuffer::new(10).unwrap();
        for n in 0..4 {
            window.append(sample(n));
        }

        let ids: Vec<i64> = window.recent(2).map(|s| s.sensor_id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(window.recent(10).count(), 4);
    }
}
