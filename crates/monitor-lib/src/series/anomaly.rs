//! Anomaly detection over a metric series
//!
//! Three detectors share a lookback window of the most recent samples:
//! - statistical: z-score of the last 10 samples against the window
//! - threshold: last 5 samples against the 5th/95th percentile of the rest
//! - trend: recent OLS slope diverging from the window's slope

use super::stats::{mean, ols_slope, percentile, sample_std_dev};
use crate::models::MetricSample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum samples in the series before any detector runs
pub const MIN_SAMPLES_FOR_DETECTION: usize = 10;

/// Default number of most recent samples analysed
pub const DEFAULT_LOOKBACK: usize = 100;

/// Z-score above which a sample is anomalous
const Z_SCORE_THRESHOLD: f64 = 2.5;

/// Z-score above which an anomaly is high severity
const HIGH_SEVERITY_Z_SCORE: f64 = 3.0;

/// Trailing samples checked by the statistical detector
const STATISTICAL_TAIL: usize = 10;

/// Trailing samples treated as "recent" by threshold and trend detectors
const RECENT_TAIL: usize = 5;

/// Detection algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyMethod {
    #[default]
    Statistical,
    Threshold,
    Trend,
}

/// Severity assigned to a detected anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    Medium,
    High,
}

/// Detector-specific measurements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnomalyDetails {
    Statistical {
        z_score: f64,
        mean: f64,
        std_dev: f64,
    },
    Threshold {
        lower_threshold: f64,
        upper_threshold: f64,
    },
    Trend {
        overall_slope: f64,
        recent_slope: f64,
        trend_change: f64,
    },
}

/// A detected anomaly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub timestamp: DateTime<Utc>,
    /// Offending sample value (unset for trend anomalies)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    pub severity: AnomalySeverity,
    #[serde(flatten)]
    pub details: AnomalyDetails,
}

impl Anomaly {
    pub fn method(&self) -> AnomalyMethod {
        match self.details {
            AnomalyDetails::Statistical { .. } => AnomalyMethod::Statistical,
            AnomalyDetails::Threshold { .. } => AnomalyMethod::Threshold,
            AnomalyDetails::Trend { .. } => AnomalyMethod::Trend,
        }
    }
}

/// Run `method` over the trailing `lookback` samples.
///
/// `samples` must be sorted by timestamp. Returns nothing when the series
/// holds fewer than [`MIN_SAMPLES_FOR_DETECTION`] samples.
pub fn detect(samples: &[MetricSample], method: AnomalyMethod, lookback: usize) -> Vec<Anomaly> {
    if samples.len() < MIN_SAMPLES_FOR_DETECTION {
        return Vec::new();
    }

    let start = samples.len().saturating_sub(lookback);
    let window = &samples[start..];

    match method {
        AnomalyMethod::Statistical => detect_statistical(window),
        AnomalyMethod::Threshold => detect_threshold(window),
        AnomalyMethod::Trend => detect_trend(window),
    }
}

/// Z-score of each of the last 10 samples against the whole window
fn detect_statistical(window: &[MetricSample]) -> Vec<Anomaly> {
    if window.len() < RECENT_TAIL {
        return Vec::new();
    }

    let values: Vec<f64> = window.iter().map(|s| s.value).collect();
    let mean = mean(&values);
    let Some(std_dev) = sample_std_dev(&values) else {
        return Vec::new();
    };

    // Constant data has no meaningful z-score
    if std_dev <= 0.0 {
        return Vec::new();
    }

    let tail_start = window.len().saturating_sub(STATISTICAL_TAIL);
    window[tail_start..]
        .iter()
        .filter_map(|sample| {
            let z_score = (sample.value - mean).abs() / std_dev;
            if z_score <= Z_SCORE_THRESHOLD {
                return None;
            }

            let severity = if z_score > HIGH_SEVERITY_Z_SCORE {
                AnomalySeverity::High
            } else {
                AnomalySeverity::Medium
            };

            Some(Anomaly {
                timestamp: sample.timestamp,
                value: Some(sample.value),
                severity,
                details: AnomalyDetails::Statistical {
                    z_score,
                    mean,
                    std_dev,
                },
            })
        })
        .collect()
}

/// Last 5 samples against the 5th/95th percentile band of the earlier ones
fn detect_threshold(window: &[MetricSample]) -> Vec<Anomaly> {
    if window.len() < MIN_SAMPLES_FOR_DETECTION {
        return Vec::new();
    }

    let split = window.len() - RECENT_TAIL;
    let history: Vec<f64> = window[..split].iter().map(|s| s.value).collect();

    let (Some(lower_threshold), Some(upper_threshold)) =
        (percentile(&history, 5), percentile(&history, 95))
    else {
        return Vec::new();
    };

    window[split..]
        .iter()
        .filter(|sample| sample.value < lower_threshold || sample.value > upper_threshold)
        .map(|sample| Anomaly {
            timestamp: sample.timestamp,
            value: Some(sample.value),
            severity: AnomalySeverity::Medium,
            details: AnomalyDetails::Threshold {
                lower_threshold,
                upper_threshold,
            },
        })
        .collect()
}

/// Compare the slope of the last 5 samples with the slope of the window
fn detect_trend(window: &[MetricSample]) -> Vec<Anomaly> {
    if window.len() < MIN_SAMPLES_FOR_DETECTION {
        return Vec::new();
    }

    let values: Vec<f64> = window.iter().map(|s| s.value).collect();
    let Some(overall_slope) = ols_slope(&values) else {
        return Vec::new();
    };

    let recent = &values[values.len() - RECENT_TAIL..];
    let recent_slope = ols_slope(recent).unwrap_or(0.0);

    let trend_change = (recent_slope - overall_slope).abs();
    if trend_change <= (overall_slope * 2.0).abs() {
        return Vec::new();
    }

    let Some(last) = window.last() else {
        return Vec::new();
    };

    vec![Anomaly {
        timestamp: last.timestamp,
        value: None,
        severity: AnomalySeverity::Medium,
        details: AnomalyDetails::Trend {
            overall_slope,
            recent_slope,
            trend_change,
        },
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::collections::HashMap;

    fn series(values: &[f64]) -> Vec<MetricSample> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| MetricSample {
                timestamp: start + Duration::minutes(i as i64),
                value: *v,
                tags: HashMap::new(),
                metadata: HashMap::new(),
            })
            .collect()
    }

    #[test]
    fn test_requires_minimum_samples() {
        let data = series(&[1.0, 2.0, 100.0]);
        assert!(detect(&data, AnomalyMethod::Statistical, DEFAULT_LOOKBACK).is_empty());
        assert!(detect(&data, AnomalyMethod::Threshold, DEFAULT_LOOKBACK).is_empty());
        assert!(detect(&data, AnomalyMethod::Trend, DEFAULT_LOOKBACK).is_empty());
    }

    #[test]
    fn test_statistical_single_spike() {
        let mut values = vec![10.0; 9];
        values.push(95.0);
        let data = series(&values);

        let anomalies = detect(&data, AnomalyMethod::Statistical, DEFAULT_LOOKBACK);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].value, Some(95.0));
        assert_eq!(anomalies[0].method(), AnomalyMethod::Statistical);

        // One outlier among n samples sits (n - 1) / sqrt(n) sample deviations out
        let AnomalyDetails::Statistical { z_score, .. } = anomalies[0].details else {
            panic!("expected statistical details");
        };
        assert!((z_score - 9.0 / 10f64.sqrt()).abs() < 1e-9);
        assert_eq!(anomalies[0].severity, AnomalySeverity::Medium);
    }

    #[test]
    fn test_statistical_high_severity_with_longer_history() {
        let mut values = vec![10.0; 29];
        values.push(95.0);
        let data = series(&values);

        let anomalies = detect(&data, AnomalyMethod::Statistical, DEFAULT_LOOKBACK);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].severity, AnomalySeverity::High);
    }

    #[test]
    fn test_statistical_constant_series() {
        let data = series(&[5.0; 20]);
        assert!(detect(&data, AnomalyMethod::Statistical, DEFAULT_LOOKBACK).is_empty());
    }

    #[test]
    fn test_statistical_only_checks_last_ten() {
        // Outlier at the start of the window is outside the checked tail
        let mut values = vec![95.0];
        values.extend(std::iter::repeat(10.0).take(29));
        let data = series(&values);

        assert!(detect(&data, AnomalyMethod::Statistical, DEFAULT_LOOKBACK).is_empty());
    }

    #[test]
    fn test_threshold_flags_recent_outliers() {
        let mut values: Vec<f64> = (0..20).map(|i| 50.0 + (i % 5) as f64).collect();
        values.extend([52.0, 53.0, 200.0, 51.0, -40.0]);
        let data = series(&values);

        let anomalies = detect(&data, AnomalyMethod::Threshold, DEFAULT_LOOKBACK);
        let flagged: Vec<f64> = anomalies.iter().filter_map(|a| a.value).collect();
        assert_eq!(flagged, vec![200.0, -40.0]);
        assert!(anomalies
            .iter()
            .all(|a| a.severity == AnomalySeverity::Medium));
    }

    #[test]
    fn test_trend_detects_sudden_ramp() {
        let mut values = vec![10.0; 15];
        values.extend([20.0, 40.0, 60.0, 80.0, 100.0]);
        let data = series(&values);

        let anomalies = detect(&data, AnomalyMethod::Trend, DEFAULT_LOOKBACK);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].timestamp, data.last().unwrap().timestamp);

        let AnomalyDetails::Trend { recent_slope, .. } = anomalies[0].details else {
            panic!("expected trend details");
        };
        assert!((recent_slope - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_trend_steady_growth_not_flagged() {
        let values: Vec<f64> = (0..30).map(|i| i as f64 * 2.0).collect();
        let data = series(&values);

        assert!(detect(&data, AnomalyMethod::Trend, DEFAULT_LOOKBACK).is_empty());
    }

    #[test]
    fn test_lookback_limits_window() {
        // Old spike falls out of a 10-sample lookback entirely
        let mut values = vec![10.0, 11.0, 500.0];
        values.extend((0..20).map(|i| 10.0 + (i % 2) as f64));
        let data = series(&values);

        assert!(detect(&data, AnomalyMethod::Statistical, 10).is_empty());
    }
}
