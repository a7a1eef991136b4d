//! Synchrony computation between two aligned channel windows.
//!
//! Two modes are supported:
//! - **Pearson** (live default): the Pearson coefficient `r`, normalized to
//!   `(r + 1) / 2` and clamped to `[0, 1]`.
//! - **Cross-correlation max**: the peak of the `valid` sliding dot product
//!   between the two windows. This is an unnormalized magnitude meant for
//!   offline analysis of whole recordings.
//!
//! Nothing here fails. Insufficient or degenerate input yields
//! [`NEUTRAL_CORRELATION`] tagged with a [`NeutralReason`].

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Value reported when a correlation cannot be computed.
pub const NEUTRAL_CORRELATION: f64 = 0.0;

/// Default minimum window length for a meaningful correlation.
pub const DEFAULT_MIN_SAMPLES: usize = 5;

/// Relative variance below which a window counts as flat.
const FLAT_TOLERANCE: f64 = 1e-12;

/// How the two windows are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMode {
    #[default]
    Pearson,
    CrossCorrelationMax,
}

impl CorrelationMode {
    /// Parse a mode from a CLI-style name.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pearson" => Some(CorrelationMode::Pearson),
            "xcorr" | "cross-correlation" | "cross_correlation_max" => {
                Some(CorrelationMode::CrossCorrelationMax)
            }
            _ => None,
        }
    }
}

/// Why a neutral value was reported instead of a computed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeutralReason {
    /// A window held fewer than the minimum number of samples
    InsufficientSamples,
    /// Pearson windows were not the same length
    LengthMismatch,
    /// A window was a perfectly flat signal
    ZeroVariance,
    /// The inputs produced NaN or infinity
    NonFinite,
}

/// Whether a correlation value was computed or defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStatus {
    Computed,
    Neutral(NeutralReason),
}

/// A correlation result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub value: f64,
    pub status: CorrelationStatus,
}

impl Correlation {
    pub fn computed(value: f64) -> Self {
        Self {
            value,
            status: CorrelationStatus::Computed,
        }
    }

    pub fn neutral(reason: NeutralReason) -> Self {
        Self {
            value: NEUTRAL_CORRELATION,
            status: CorrelationStatus::Neutral(reason),
        }
    }

    /// True when `value` is the neutral default rather than a computed result.
    pub fn is_neutral(&self) -> bool {
        matches!(self.status, CorrelationStatus::Neutral(_))
    }

    pub fn neutral_reason(&self) -> Option<NeutralReason> {
        match self.status {
            CorrelationStatus::Neutral(reason) => Some(reason),
            CorrelationStatus::Computed => None,
        }
    }
}

/// Computes correlations under a fixed minimum-sample policy.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationEngine {
    min_samples: usize,
}

impl Default for CorrelationEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SAMPLES)
    }
}

impl CorrelationEngine {
    /// Create an engine. `min_samples` is raised to 2, the least a variance needs.
    pub fn new(min_samples: usize) -> Self {
        Self {
            min_samples: min_samples.max(2),
        }
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// Compare two windows in the given mode.
    pub fn compute(&self, a: &[f64], b: &[f64], mode: CorrelationMode) -> Correlation {
        if a.len() < self.min_samples || b.len() < self.min_samples {
            return Correlation::neutral(NeutralReason::InsufficientSamples);
        }

        match mode {
            CorrelationMode::Pearson => {
                if a.len() != b.len() {
                    return Correlation::neutral(NeutralReason::LengthMismatch);
                }
                match pearson(a, b) {
                    Ok(r) => Correlation::computed(normalize(r)),
                    Err(reason) => Correlation::neutral(reason),
                }
            }
            CorrelationMode::CrossCorrelationMax => {
                let peak = cross_correlation_valid(a, b)
                    .into_iter()
                    .fold(f64::NEG_INFINITY, f64::max);
                if peak.is_finite() {
                    Correlation::computed(peak)
                } else {
                    Correlation::neutral(NeutralReason::NonFinite)
                }
            }
        }
    }
}

/// Pearson correlation coefficient of two equal-length series, in `[-1, 1]`.
///
/// Fails with a [`NeutralReason`] when the coefficient is undefined.
pub fn pearson(a: &[f64], b: &[f64]) -> Result<f64, NeutralReason> {
    if a.len() != b.len() {
        return Err(NeutralReason::LengthMismatch);
    }
    if a.len() < 2 {
        return Err(NeutralReason::InsufficientSamples);
    }

    let var_a = a.iter().variance();
    let var_b = b.iter().variance();
    if !var_a.is_finite() || !var_b.is_finite() {
        return Err(NeutralReason::NonFinite);
    }
    if is_flat(a, var_a) || is_flat(b, var_b) {
        return Err(NeutralReason::ZeroVariance);
    }

    let covariance = a.iter().covariance(b.iter());
    let r = covariance / (var_a.sqrt() * var_b.sqrt());
    if r.is_finite() {
        Ok(r.clamp(-1.0, 1.0))
    } else {
        Err(NeutralReason::NonFinite)
    }
}

/// Map a coefficient in `[-1, 1]` onto `[0, 1]` for display.
pub fn normalize(r: f64) -> f64 {
    ((r + 1.0) / 2.0).clamp(0.0, 1.0)
}

fn is_flat(values: &[f64], variance: f64) -> bool {
    let scale = values.iter().mean().abs().max(1.0);
    variance <= FLAT_TOLERANCE * scale * scale
}

/// Discrete cross-correlation in `valid` mode.
///
/// The shorter series slides across the longer one; each output is the dot
/// product at one fully-overlapping offset, so the output has
/// `|len(a) - len(b)| + 1` entries. Empty input yields an empty output.
pub fn cross_correlation_valid(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };

    (0..=long.len() - short.len())
        .map(|offset| {
            long[offset..offset + short.len()]
                .iter()
                .zip(short)
                .map(|(x, y)| x * y)
                .sum()
        })
        .collect()
}

/// One entry of a windowed analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowedValue {
    /// Window index, equal to seconds when the window is one second long
    pub time: u64,
    pub correlation: Correlation,
}

/// Split two recordings into non-overlapping windows of `window` samples and
/// compute one correlation per window pair.
///
/// A trailing partial window is ignored.
pub fn windowed_series(
    a: &[f64],
    b: &[f64],
    window: usize,
    mode: CorrelationMode,
    engine: &CorrelationEngine,
) -> Vec<WindowedValue> {
    if window == 0 {
        return Vec::new();
    }
    let usable = a.len().min(b.len());

    a[..usable]
        .chunks_exact(window)
        .zip(b[..usable].chunks_exact(window))
        .enumerate()
        .map(|(i, (seg_a, seg_b))| WindowedValue {
            time: i as u64,
            correlation: engine.compute(seg_a, seg_b, mode),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave(n: usize) -> Vec<f64> {
        (0..n).map(|i| 70.0 + 5.0 * (i as f64 / 3.0).sin() + (i % 4) as f64).collect()
    }

    #[test]
    fn test_insufficient_samples_is_neutral() {
        let engine = CorrelationEngine::default();
        let a = wave(4);
        let b = wave(30);

        for mode in [CorrelationMode::Pearson, CorrelationMode::CrossCorrelationMax] {
            let result = engine.compute(&a, &b, mode);
            assert_eq!(result.value, NEUTRAL_CORRELATION);
            assert_eq!(
                result.neutral_reason(),
                Some(NeutralReason::InsufficientSamples)
            );
            assert!(engine.compute(&[], &[], mode).is_neutral());
        }
    }

    #[test]
    fn test_pearson_identity_and_inverse() {
        let x = wave(30);
        let neg: Vec<f64> = x.iter().map(|v| -v).collect();

        assert!((pearson(&x, &x).unwrap() - 1.0).abs() < 1e-9);
        assert!((pearson(&x, &neg).unwrap() + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalized_output() {
        let engine = CorrelationEngine::default();
        let x = wave(30);
        let neg: Vec<f64> = x.iter().map(|v| -v).collect();

        let same = engine.compute(&x, &x, CorrelationMode::Pearson);
        assert_eq!(same.status, CorrelationStatus::Computed);
        assert!((same.value - 1.0).abs() < 1e-9);

        let opposite = engine.compute(&x, &neg, CorrelationMode::Pearson);
        assert!(opposite.value.abs() < 1e-9);
        assert!(!opposite.is_neutral());
    }

    #[test]
    fn test_flat_signal_is_neutral() {
        let engine = CorrelationEngine::default();
        let flat = vec![0.1; 30];
        let x = wave(30);

        let result = engine.compute(&flat, &x, CorrelationMode::Pearson);
        assert_eq!(result.value, NEUTRAL_CORRELATION);
        assert_eq!(result.neutral_reason(), Some(NeutralReason::ZeroVariance));
    }

    #[test]
    fn test_length_mismatch_is_neutral() {
        let engine = CorrelationEngine::default();
        let result = engine.compute(&wave(10), &wave(12), CorrelationMode::Pearson);
        assert_eq!(result.neutral_reason(), Some(NeutralReason::LengthMismatch));
    }

    #[test]
    fn test_non_finite_is_neutral() {
        let engine = CorrelationEngine::default();
        let mut a = wave(10);
        a[3] = f64::NAN;
        let result = engine.compute(&a, &wave(10), CorrelationMode::Pearson);
        assert_eq!(result.neutral_reason(), Some(NeutralReason::NonFinite));
    }

    #[test]
    fn test_cross_correlation_valid() {
        // Equal lengths collapse to a single dot product
        assert_eq!(cross_correlation_valid(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), vec![32.0]);

        let out = cross_correlation_valid(&[1.0, 2.0, 3.0, 4.0], &[1.0, 1.0]);
        assert_eq!(out, vec![3.0, 5.0, 7.0]);

        // Argument order does not change the set of values
        let swapped = cross_correlation_valid(&[1.0, 1.0], &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(swapped, vec![3.0, 5.0, 7.0]);

        assert!(cross_correlation_valid(&[], &[1.0]).is_empty());
    }

    #[test]
    fn test_cross_correlation_mode_is_unnormalized() {
        let engine = CorrelationEngine::default();
        let a = vec![10.0; 8];
        let result = engine.compute(&a, &a, CorrelationMode::CrossCorrelationMax);
        assert_eq!(result.value, 800.0);
        assert_eq!(result.status, CorrelationStatus::Computed);
    }

    #[test]
    fn test_windowed_series_drops_partial_window() {
        let engine = CorrelationEngine::default();
        let a = wave(205);
        let b = a.clone();

        let series = windowed_series(&a, &b, 50, CorrelationMode::Pearson, &engine);
        assert_eq!(series.len(), 4);
        assert_eq!(series[3].time, 3);
        assert!(series.iter().all(|w| (w.correlation.value - 1.0).abs() < 1e-9));

        assert!(windowed_series(&a, &b, 0, CorrelationMode::Pearson, &engine).is_empty());
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(CorrelationMode::from_name("pearson"), Some(CorrelationMode::Pearson));
        assert_eq!(
            CorrelationMode::from_name("xcorr"),
            Some(CorrelationMode::CrossCorrelationMax)
        );
        assert_eq!(CorrelationMode::from_name("spearman"), None);
    }
}
