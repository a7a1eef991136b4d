//! Finite replay datasets.
//!
//! A recording of two channels sampled at a fixed rate, consumed one second
//! (one slice of `sampling_rate` samples) at a time.

use crate::error::DatasetError;
use crate::sensor::synthetic::CompanionGenerator;
use crate::sensor::types::Sample;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A two-channel recording on disk.
///
/// `channel_b` may be omitted, in which case it is derived from `channel_a`
/// with the synthetic companion generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayDataset {
    /// Samples per second on each channel
    pub sampling_rate: usize,
    pub channel_a: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_b: Option<Vec<f64>>,
}

impl ReplayDataset {
    /// Load a dataset from a JSON file.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let content = std::fs::read_to_string(path)?;
        let dataset: ReplayDataset = serde_json::from_str(&content)?;
        dataset.validate()?;
        Ok(dataset)
    }

    /// Check that the dataset can be replayed.
    pub fn validate(&self) -> Result<(), DatasetError> {
        if self.sampling_rate == 0 {
            return Err(DatasetError::Invalid("sampling_rate must be positive".to_string()));
        }
        if let Some(b) = &self.channel_b {
            if b.len() != self.channel_a.len() {
                return Err(DatasetError::Invalid(format!(
                    "channel lengths differ: {} vs {}",
                    self.channel_a.len(),
                    b.len()
                )));
            }
        }
        Ok(())
    }

    /// Resolve both channels, generating channel B if needed.
    pub fn into_channels(self, companion: &mut CompanionGenerator) -> (Vec<f64>, Vec<f64>) {
        let b = match self.channel_b {
            Some(b) => b,
            None => {
                tracing::info!(
                    companion_std = companion.std_dev(),
                    "Replay dataset has no channel B; using synthetic companion"
                );
                companion.companion_series(&self.channel_a)
            }
        };
        (self.channel_a, b)
    }
}

/// Cursor over a resolved dataset handing out one slice per tick.
#[derive(Debug, Clone)]
pub struct ReplayCursor {
    channel_a: Vec<f64>,
    channel_b: Vec<f64>,
    slice_len: usize,
    sampling_rate: usize,
    position: usize,
}

impl ReplayCursor {
    /// Create a cursor over two equal-length channels.
    pub fn new(channel_a: Vec<f64>, channel_b: Vec<f64>, sampling_rate: usize) -> Self {
        let sampling_rate = sampling_rate.max(1);
        Self {
            channel_a,
            channel_b,
            slice_len: sampling_rate,
            sampling_rate,
            position: 0,
        }
    }

    /// Load a dataset and resolve its channels into a cursor.
    pub fn from_dataset(dataset: ReplayDataset, companion: &mut CompanionGenerator) -> Self {
        let sampling_rate = dataset.sampling_rate;
        let (a, b) = dataset.into_channels(companion);
        Self::new(a, b, sampling_rate)
    }

    /// Number of samples per slice.
    pub fn slice_len(&self) -> usize {
        self.slice_len
    }

    /// Number of full slices not yet consumed.
    pub fn remaining_slices(&self) -> usize {
        let usable = self.channel_a.len().min(self.channel_b.len());
        usable.saturating_sub(self.position) / self.slice_len
    }

    /// Take the next full slice from both channels, or `None` when exhausted.
    ///
    /// Sample timestamps are in seconds from the start of the recording.
    pub fn next_slice(&mut self) -> Option<(Vec<Sample>, Vec<Sample>)> {
        if self.remaining_slices() == 0 {
            return None;
        }
        let range = self.position..self.position + self.slice_len;
        let rate = self.sampling_rate as f64;
        let to_samples = |values: &[f64]| -> Vec<Sample> {
            range
                .clone()
                .zip(values)
                .map(|(i, &v)| Sample::new(i as f64 / rate, v))
                .collect()
        };

        let a = to_samples(&self.channel_a[range.clone()]);
        let b = to_samples(&self.channel_b[range.clone()]);
        self.position = range.end;
        Some((a, b))
    }
}
