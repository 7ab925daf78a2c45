//! Temporal segmentation data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Post count in one UTC-aligned time bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityBucket {
    pub start: DateTime<Utc>,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PhaseLabel {
    PreCrisis,
    PeakCrisis,
    ActivePhase,
    Recovery,
}

impl std::fmt::Display for PhaseLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PreCrisis => write!(f, "PreCrisis"),
            Self::PeakCrisis => write!(f, "PeakCrisis"),
            Self::ActivePhase => write!(f, "ActivePhase"),
            Self::Recovery => write!(f, "Recovery"),
        }
    }
}

/// Contiguous run of daily buckets with one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrisisPhase {
    pub label: PhaseLabel,
    /// Start of the first bucket
    pub start: DateTime<Utc>,
    /// Start of the bucket after the last one (exclusive)
    pub end: DateTime<Utc>,
    /// First daily bucket index
    pub first_bucket: usize,
    /// Last daily bucket index (inclusive)
    pub last_bucket: usize,
    pub post_count: usize,
}

/// Quartile band of a day's post count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActivityLevel {
    High,
    Moderate,
    Low,
    Minimal,
}

/// One row of the daily time-series table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyActivity {
    pub start: DateTime<Utc>,
    pub count: usize,
    /// Centered rolling mean of the count
    pub rolling_mean: f64,
    pub level: ActivityLevel,
    pub phase: PhaseLabel,
}

/// Levels used to seed and extend PeakCrisis excursions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PhaseThresholds {
    pub mean: f64,
    /// Population standard deviation of daily counts
    pub std_dev: f64,
    /// Seed level, mean + k·σ
    pub high: f64,
    /// Exit level, the mean
    pub low: f64,
}

/// Everything the segmenter derives from a Post Store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalProfile {
    pub hourly: Vec<ActivityBucket>,
    pub daily: Vec<DailyActivity>,
    pub peak_days: Vec<ActivityBucket>,
    pub peak_hours: Vec<ActivityBucket>,
    pub phases: Vec<CrisisPhase>,
    pub thresholds: PhaseThresholds,
    /// Posts per UTC hour of day, 0–23
    pub hour_of_day: [usize; 24],
    /// Posts per weekday, Monday first
    pub day_of_week: [usize; 7],
}

impl TemporalProfile {
    pub fn phase_of_day(&self, index: usize) -> Option<PhaseLabel> {
        self.daily.get(index).map(|d| d.phase)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalConfig {
    /// Standard deviations above the mean that seed a peak (default: 1.5)
    pub peak_threshold_k: f64,
    /// Centered rolling window in days (default: 3)
    pub rolling_window: usize,
    /// Peaks reported per granularity (default: 10)
    pub top_k_peaks: usize,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            peak_threshold_k: 1.5,
            rolling_window: 3,
            top_k_peaks: 10,
        }
    }
}
