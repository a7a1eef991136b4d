//! Rolling per-channel sample history.
//!
//! Each channel keeps the most recent `capacity` samples in arrival order.
//! Older samples are evicted and cannot be recovered.

use crate::sensor::types::Sample;
use std::collections::VecDeque;

/// A bounded FIFO of samples for one physiological stream.
#[derive(Debug, Clone)]
pub struct ChannelBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
    total_pushed: u64,
}

impl ChannelBuffer {
    /// Create an empty buffer holding at most `capacity` samples (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            total_pushed: 0,
        }
    }

    /// Append a sample, evicting the oldest one when full.
    pub fn push(&mut self, sample: Sample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.total_pushed += 1;
    }

    /// Append several samples in order.
    pub fn extend<I: IntoIterator<Item = Sample>>(&mut self, samples: I) {
        for sample in samples {
            self.push(sample);
        }
    }

    /// Copy of the last `min(n, len)` samples, oldest first.
    pub fn window(&self, n: usize) -> Vec<Sample> {
        let skip = self.samples.len().saturating_sub(n);
        self.samples.iter().skip(skip).copied().collect()
    }

    /// Values of the last `min(n, len)` samples, oldest first.
    pub fn window_values(&self, n: usize) -> Vec<f64> {
        let skip = self.samples.len().saturating_sub(n);
        self.samples.iter().skip(skip).map(|s| s.value).collect()
    }

    /// The most recently pushed sample.
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of samples ever pushed, including evicted ones.
    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }
}
