//! Activity time series, peak ranking and crisis phases.
//!
//! Phases come from a two-level excursion test over daily counts: a day
//! above `mean + k·σ` (with a rolling mean above `mean`) seeds a PeakCrisis
//! run, which then grows while neighboring days stay above `mean`.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

use super::models::{
    ActivityBucket, ActivityLevel, CrisisPhase, DailyActivity, PhaseLabel, PhaseThresholds,
    TemporalConfig, TemporalProfile,
};
use crate::error::{EngineError, EngineResult};
use crate::posts::PostStore;
use crate::stats::quartiles;

#[derive(Debug, Clone, Default)]
pub struct TemporalSegmenter {
    config: TemporalConfig,
}

impl TemporalSegmenter {
    pub fn new(config: TemporalConfig) -> Self {
        Self { config }
    }

    pub fn segment(&self, store: &PostStore) -> EngineResult<TemporalProfile> {
        let Some((first, last)) = store.time_range() else {
            return Err(EngineError::insufficient("temporal", 1, 0));
        };
        let timestamps: Vec<DateTime<Utc>> = store.iter().map(|p| p.created_at).collect();

        let hourly = dense_buckets(&timestamps, floor_hour(first), floor_hour(last), Duration::hours(1));
        let daily_buckets =
            dense_buckets(&timestamps, floor_day(first), floor_day(last), Duration::days(1));
        let counts: Vec<usize> = daily_buckets.iter().map(|b| b.count).collect();

        let thresholds = phase_thresholds(&counts, self.config.peak_threshold_k);
        let rolling = rolling_mean(&counts, self.config.rolling_window);
        let spans = phase_spans(&counts, &rolling, &thresholds);
        let levels = activity_levels(&counts);

        let mut phase_per_day = vec![PhaseLabel::ActivePhase; counts.len()];
        let phases: Vec<CrisisPhase> = spans
            .iter()
            .map(|&(label, a, b)| {
                for p in &mut phase_per_day[a..=b] {
                    *p = label;
                }
                CrisisPhase {
                    label,
                    start: daily_buckets[a].start,
                    end: daily_buckets[b].start + Duration::days(1),
                    first_bucket: a,
                    last_bucket: b,
                    post_count: counts[a..=b].iter().sum(),
                }
            })
            .collect();

        let daily: Vec<DailyActivity> = daily_buckets
            .iter()
            .enumerate()
            .map(|(i, b)| DailyActivity {
                start: b.start,
                count: b.count,
                rolling_mean: rolling[i],
                level: levels[i],
                phase: phase_per_day[i],
            })
            .collect();

        let mut hour_of_day = [0usize; 24];
        let mut day_of_week = [0usize; 7];
        for ts in &timestamps {
            hour_of_day[ts.hour() as usize] += 1;
            day_of_week[ts.weekday().num_days_from_monday() as usize] += 1;
        }

        tracing::info!(
            "Segmented timeline days={} phases={} peak_threshold={:.2}",
            daily.len(),
            phases.len(),
            thresholds.high
        );

        Ok(TemporalProfile {
            peak_days: top_peaks(&daily_buckets, self.config.top_k_peaks),
            peak_hours: top_peaks(&hourly, self.config.top_k_peaks),
            hourly,
            daily,
            phases,
            thresholds,
            hour_of_day,
            day_of_week,
        })
    }
}

// ============================================================================
// Buckets
// ============================================================================

fn floor_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    let secs = ts.timestamp().div_euclid(3600) * 3600;
    DateTime::from_timestamp(secs, 0).unwrap_or(ts)
}

fn floor_day(ts: DateTime<Utc>) -> DateTime<Utc> {
    let secs = ts.timestamp().div_euclid(86_400) * 86_400;
    DateTime::from_timestamp(secs, 0).unwrap_or(ts)
}

/// Zero-filled buckets of `step` from `first` to `last` inclusive.
/// `timestamps` must be sorted.
fn dense_buckets(
    timestamps: &[DateTime<Utc>],
    first: DateTime<Utc>,
    last: DateTime<Utc>,
    step: Duration,
) -> Vec<ActivityBucket> {
    let mut buckets = Vec::new();
    let mut start = first;
    let mut cursor = 0;
    while start <= last {
        let end = start + step;
        let begin = cursor;
        while cursor < timestamps.len() && timestamps[cursor] < end {
            cursor += 1;
        }
        buckets.push(ActivityBucket {
            start,
            count: cursor - begin,
        });
        start = end;
    }
    buckets
}

/// Non-empty buckets by count, descending; ties go to the earlier bucket.
pub fn top_peaks(buckets: &[ActivityBucket], k: usize) -> Vec<ActivityBucket> {
    let mut peaks: Vec<ActivityBucket> = buckets.iter().filter(|b| b.count > 0).cloned().collect();
    peaks.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.start.cmp(&b.start)));
    peaks.truncate(k);
    peaks
}

// ============================================================================
// Phases
// ============================================================================

pub fn phase_thresholds(counts: &[usize], k: f64) -> PhaseThresholds {
    if counts.is_empty() {
        return PhaseThresholds::default();
    }
    let n = counts.len() as f64;
    let mean = counts.iter().sum::<usize>() as f64 / n;
    let variance = counts.iter().map(|&c| (c as f64 - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();
    PhaseThresholds {
        mean,
        std_dev,
        high: mean + k * std_dev,
        low: mean,
    }
}

/// Centered rolling mean; windows are truncated at the series edges.
pub fn rolling_mean(counts: &[usize], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let before = (window - 1) / 2;
    let after = window / 2;
    (0..counts.len())
        .map(|i| {
            let lo = i.saturating_sub(before);
            let hi = (i + after).min(counts.len() - 1);
            let slice = &counts[lo..=hi];
            slice.iter().sum::<usize>() as f64 / slice.len() as f64
        })
        .collect()
}

/// Labelled, contiguous `(label, first, last)` spans covering every index.
pub fn phase_spans(
    counts: &[usize],
    rolling: &[f64],
    thresholds: &PhaseThresholds,
) -> Vec<(PhaseLabel, usize, usize)> {
    let n = counts.len();
    if n == 0 {
        return Vec::new();
    }

    // Seed and grow excursions
    let mut excursions: Vec<(usize, usize)> = Vec::new();
    for i in 0..n {
        let seeded = counts[i] as f64 > thresholds.high && rolling[i] > thresholds.low;
        if !seeded || excursions.last().is_some_and(|&(_, b)| i <= b) {
            continue;
        }
        let above = |j: usize| counts[j] as f64 > thresholds.low;
        let mut a = i;
        while a > 0 && above(a - 1) {
            a -= 1;
        }
        let mut b = i;
        while b + 1 < n && above(b + 1) {
            b += 1;
        }
        match excursions.last_mut() {
            // Overlapping or touching a previous excursion
            Some(last) if a <= last.1 + 1 => last.1 = last.1.max(b),
            _ => excursions.push((a, b)),
        }
    }

    if excursions.is_empty() {
        return vec![(PhaseLabel::ActivePhase, 0, n - 1)];
    }

    let mut spans = Vec::new();
    let mut cursor = 0;
    for (idx, &(a, b)) in excursions.iter().enumerate() {
        if a > cursor {
            let label = if idx == 0 {
                PhaseLabel::PreCrisis
            } else {
                PhaseLabel::ActivePhase
            };
            spans.push((label, cursor, a - 1));
        }
        spans.push((PhaseLabel::PeakCrisis, a, b));
        cursor = b + 1;
    }
    if cursor < n {
        spans.push((PhaseLabel::Recovery, cursor, n - 1));
    }
    spans
}

// ============================================================================
// Activity levels
// ============================================================================

fn activity_levels(counts: &[usize]) -> Vec<ActivityLevel> {
    let values: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
    let (q1, q2, q3) = quartiles(&values);
    values
        .iter()
        .map(|&v| {
            if v >= q3 {
                ActivityLevel::High
            } else if v >= q2 {
                ActivityLevel::Moderate
            } else if v >= q1 {
                ActivityLevel::Low
            } else {
                ActivityLevel::Minimal
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{post_at, store_of, BASE_TS};

    fn spans_for(counts: &[usize]) -> Vec<(PhaseLabel, usize, usize)> {
        let config = TemporalConfig::default();
        let thresholds = phase_thresholds(counts, config.peak_threshold_k);
        let rolling = rolling_mean(counts, config.rolling_window);
        phase_spans(counts, &rolling, &thresholds)
    }

    /// Store with `counts[d]` posts on day `d`.
    fn store_with_daily_counts(counts: &[usize]) -> PostStore {
        let mut posts = Vec::new();
        for (day, &count) in counts.iter().enumerate() {
            for k in 0..count {
                let offset = day as i64 * 86_400 + k as i64 * 60;
                posts.push(post_at(&format!("d{}_{}", day, k), "alice", "news", offset));
            }
        }
        store_of(posts)
    }

    #[test]
    fn test_single_surge_phases() {
        let spans = spans_for(&[1, 1, 1, 50, 60, 55, 2, 1, 1]);
        assert_eq!(
            spans,
            vec![
                (PhaseLabel::PreCrisis, 0, 2),
                (PhaseLabel::PeakCrisis, 3, 5),
                (PhaseLabel::Recovery, 6, 8),
            ]
        );
    }

    #[test]
    fn test_flat_series_is_single_active_phase() {
        assert_eq!(spans_for(&[5, 5, 5, 5]), vec![(PhaseLabel::ActivePhase, 0, 3)]);
    }

    #[test]
    fn test_two_surges_have_active_phase_between() {
        let spans = spans_for(&[1, 40, 1, 1, 1, 1, 45, 1]);
        let labels: Vec<PhaseLabel> = spans.iter().map(|s| s.0).collect();
        assert_eq!(
            labels,
            vec![
                PhaseLabel::PreCrisis,
                PhaseLabel::PeakCrisis,
                PhaseLabel::ActivePhase,
                PhaseLabel::PeakCrisis,
                PhaseLabel::Recovery,
            ]
        );
    }

    #[test]
    fn test_phases_contiguous_and_exhaustive() {
        let profile = TemporalSegmenter::default()
            .segment(&store_with_daily_counts(&[1, 1, 1, 50, 60, 55, 2, 1, 1]))
            .unwrap();
        assert_eq!(profile.daily.len(), 9);
        assert_eq!(profile.phases.first().unwrap().first_bucket, 0);
        assert_eq!(profile.phases.last().unwrap().last_bucket, 8);
        for pair in profile.phases.windows(2) {
            assert_eq!(pair[0].last_bucket + 1, pair[1].first_bucket);
            assert_eq!(pair[0].end, pair[1].start);
        }
        let total: usize = profile.phases.iter().map(|p| p.post_count).sum();
        assert_eq!(total, 172);
        assert_eq!(profile.phase_of_day(4), Some(PhaseLabel::PeakCrisis));
    }

    #[test]
    fn test_gaps_are_zero_filled() {
        let store = store_of(vec![
            post_at("p1", "alice", "news", 0),
            post_at("p2", "bob", "news", 3 * 86_400 + 10),
        ]);
        let profile = TemporalSegmenter::default().segment(&store).unwrap();
        let counts: Vec<usize> = profile.daily.iter().map(|d| d.count).collect();
        assert_eq!(counts, vec![1, 0, 0, 1]);
        assert_eq!(profile.hourly.len(), 3 * 24 + 1);
        assert_eq!(profile.hourly.iter().map(|b| b.count).sum::<usize>(), 2);
    }

    #[test]
    fn test_peaks_sorted_ties_earliest() {
        let profile = TemporalSegmenter::default()
            .segment(&store_with_daily_counts(&[2, 0, 3, 2]))
            .unwrap();
        let peaks: Vec<usize> = profile.peak_days.iter().map(|b| b.count).collect();
        assert_eq!(peaks, vec![3, 2, 2]);
        assert!(profile.peak_days[1].start < profile.peak_days[2].start);
    }

    #[test]
    fn test_profiles_by_hour_and_weekday() {
        let store = store_of(vec![
            post_at("p1", "alice", "news", 3600 * 5),
            post_at("p2", "bob", "news", 3600 * 5 + 60),
        ]);
        let profile = TemporalSegmenter::default().segment(&store).unwrap();
        assert_eq!(profile.hour_of_day[5], 2);
        // BASE_TS is a Sunday
        let weekday = DateTime::from_timestamp(BASE_TS, 0)
            .unwrap()
            .weekday()
            .num_days_from_monday() as usize;
        assert_eq!(profile.day_of_week[weekday], 2);
        assert_eq!(profile.day_of_week.iter().sum::<usize>(), 2);
    }

    #[test]
    fn test_activity_levels_by_quartile() {
        let levels = activity_levels(&[1, 2, 3, 4, 5]);
        assert_eq!(levels[0], ActivityLevel::Minimal);
        assert_eq!(levels[1], ActivityLevel::Low);
        assert_eq!(levels[2], ActivityLevel::Moderate);
        assert_eq!(levels[4], ActivityLevel::High);
    }

    #[test]
    fn test_empty_store_is_insufficient() {
        let err = TemporalSegmenter::default()
            .segment(&PostStore::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData { .. }));
    }
}
