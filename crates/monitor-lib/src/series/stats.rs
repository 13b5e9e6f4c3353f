//! Descriptive statistics over metric samples

use crate::models::MetricSample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics snapshot for a range of samples.
///
/// `std_dev`/`variance` are present when `count > 1`, `median`/`mode` when
/// `count >= 3`. An empty range has `count == 0` and every other field unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricStatistics {
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    /// Value of the most recent sample in the range
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
    /// Most common value; unset when every value is distinct
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<f64>,
}

impl MetricStatistics {
    /// Compute statistics over samples already sorted by timestamp
    pub fn compute(samples: &[MetricSample]) -> Self {
        let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
            return Self::default();
        };

        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        let count = values.len();

        let mut stats = Self {
            count,
            min: Some(values.iter().copied().fold(f64::INFINITY, f64::min)),
            max: Some(values.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
            mean: Some(mean(&values)),
            current: Some(last.value),
            first_timestamp: Some(first.timestamp),
            last_timestamp: Some(last.timestamp),
            ..Self::default()
        };

        if let Some(variance) = sample_variance(&values) {
            stats.variance = Some(variance);
            stats.std_dev = Some(variance.sqrt());
        }

        if count >= 3 {
            stats.median = Some(median(&values));
            stats.mode = mode(&values);
        }

        stats
    }

    /// Statistics computed directly from raw values (no timestamps)
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let mut stats = Self {
            count: values.len(),
            min: Some(values.iter().copied().fold(f64::INFINITY, f64::min)),
            max: Some(values.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
            mean: Some(mean(values)),
            current: values.last().copied(),
            ..Self::default()
        };

        if let Some(variance) = sample_variance(values) {
            stats.variance = Some(variance);
            stats.std_dev = Some(variance.sqrt());
        }

        if values.len() >= 3 {
            stats.median = Some(median(values));
            stats.mode = mode(values);
        }

        stats
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Arithmetic mean; 0.0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance with Bessel's correction; `None` for fewer than two values
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }

    let mean = mean(values);
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some(sum_sq / (values.len() - 1) as f64)
}

/// Sample standard deviation; `None` for fewer than two values
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    sample_variance(values).map(f64::sqrt)
}

/// Median (mean of the two middle values for even lengths)
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Most frequent value, ties going to the value seen first.
/// `None` when all values are distinct.
pub fn mode(values: &[f64]) -> Option<f64> {
    // (bits, first index, count) keeps first-seen ordering for ties
    let mut counts: Vec<(u64, usize)> = Vec::new();
    for value in values {
        let bits = value.to_bits();
        match counts.iter_mut().find(|(b, _)| *b == bits) {
            Some((_, count)) => *count += 1,
            None => counts.push((bits, 1)),
        }
    }

    if counts.len() == values.len() {
        return None;
    }

    let mut best: Option<(u64, usize)> = None;
    for (bits, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((bits, count));
        }
    }

    best.map(|(bits, _)| f64::from_bits(bits))
}

/// Cut points dividing `values` into `n` equal-probability intervals using
/// the exclusive method (the `m = len + 1` interpolation).
///
/// Returns `n - 1` cut points, or an empty vector when fewer than two values
/// are given or `n < 2`.
pub fn quantiles_exclusive(values: &[f64], n: usize) -> Vec<f64> {
    let len = values.len();
    if len < 2 || n < 2 {
        return Vec::new();
    }

    let mut data = values.to_vec();
    data.sort_by(f64::total_cmp);

    let m = len + 1;
    (1..n)
        .map(|i| {
            let j = (i * m / n).clamp(1, len - 1);
            let delta = (i * m) as f64 - (j * n) as f64;
            (data[j - 1] * (n as f64 - delta) + data[j] * delta) / n as f64
        })
        .collect()
}

/// Percentile `p` (1..=99) of `values`, exclusive method
pub fn percentile(values: &[f64], p: usize) -> Option<f64> {
    if p == 0 || p >= 100 {
        return None;
    }
    quantiles_exclusive(values, 100).get(p - 1).copied()
}

/// Ordinary least-squares slope with the sample index as x.
///
/// `None` when fewer than two values are given.
pub fn ols_slope(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }

    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(values);

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        numerator += dx * (y - y_mean);
        denominator += dx * dx;
    }

    if denominator.abs() < f64::EPSILON {
        return None;
    }

    Some(numerator / denominator)
}
