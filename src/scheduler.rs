// src/scheduler.rs

//! SM-2 family review scheduler.
//!
//! Pure state transition `(record, quality, now) -> record'`. The caller
//! supplies `now` once per request and persists the returned record.

use crate::config::SchedulerConfig;
use crate::constants::{DAY_SECONDS, INTERVAL_MIN};
use crate::error::{NexusError, Result};
use crate::models::{FlashcardView, Quality, ReviewRecord};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct ReviewScheduler {
    config: SchedulerConfig,
}

impl ReviewScheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(ReviewScheduler { config })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Same as [`apply`](Self::apply) but takes the rating as it arrives
    /// from a client (an integer 0-3).
    pub fn apply_raw(
        &self,
        record: &ReviewRecord,
        quality: i64,
        now: DateTime<Utc>,
    ) -> Result<ReviewRecord> {
        let quality = Quality::try_from(quality)?;
        self.apply(record, quality, now)
    }

    /// Computes the next scheduling state. The input record is left untouched.
    pub fn apply(
        &self,
        record: &ReviewRecord,
        quality: Quality,
        now: DateTime<Utc>,
    ) -> Result<ReviewRecord> {
        if let Some(last_review) = record.last_review {
            if now < last_review {
                return Err(NexusError::ClockRegression { last_review, now });
            }
        }

        let cfg = &self.config;
        let mut next = record.clone();
        let ease = record.ease_factor.clamp(cfg.ease_floor, cfg.ease_ceiling);

        debug!(
            "[SM-2 Input] Record {}: Quality {}, Reps {}, Interval {}d, Ease {:.2}",
            record.id, quality, record.repetition_count, record.interval_days, ease
        );

        match quality {
            Quality::Fail => {
                debug!("[SM-2 logic] Branch: Fail (reset)");
                next.repetition_count = 0;
                next.interval_days = cfg.reset_interval;
                next.ease_factor = (ease - cfg.fail_penalty).max(cfg.ease_floor);
            }
            _ => {
                next.repetition_count = record.repetition_count.saturating_add(1);

                next.ease_factor = match quality {
                    Quality::Hard => ease - cfg.hard_penalty,
                    Quality::Easy => ease + cfg.easy_bonus,
                    _ => ease,
                }
                .clamp(cfg.ease_floor, cfg.ease_ceiling);

                next.interval_days = if next.repetition_count == 1 {
                    debug!("[SM-2 logic] Branch: First repetition seed");
                    self.seed_interval(quality)
                } else {
                    debug!("[SM-2 logic] Branch: Review growth");
                    let previous = record.interval_days.max(INTERVAL_MIN) as f64;
                    let modifier = match quality {
                        Quality::Hard => cfg.hard_multiplier,
                        Quality::Easy => cfg.easy_multiplier,
                        _ => 1.0,
                    };
                    let grown = (previous * next.ease_factor * modifier).round();
                    grown.clamp(INTERVAL_MIN as f64, cfg.max_interval as f64) as u32
                };
            }
        }

        let spacing = Duration::seconds(next.interval_days as i64 * DAY_SECONDS);
        let next_review = now
            .checked_add_signed(spacing)
            .ok_or(NexusError::InvalidTimestamp {
                now,
                interval_days: next.interval_days,
            })?;
        next.last_review = Some(now);
        next.next_review = Some(next_review);

        info!(
            "[SM-2 Result] Record {}: Ease {:.2} -> {:.2}, Interval {}d -> {}d, Reps {}",
            record.id,
            ease,
            next.ease_factor,
            record.interval_days,
            next.interval_days,
            next.repetition_count
        );

        Ok(next)
    }

    fn seed_interval(&self, quality: Quality) -> u32 {
        let cfg = &self.config;
        let seed = match quality {
            Quality::Hard => cfg.seed_hard,
            Quality::Easy => cfg.seed_easy,
            _ => cfg.seed_good,
        };
        seed.min(cfg.max_interval)
    }

    /// Interval each of the four buttons would produce, in `Quality::ALL` order.
    pub fn preview_intervals(&self, record: &ReviewRecord, now: DateTime<Utc>) -> Result<[u32; 4]> {
        let mut out = [0u32; 4];
        for (slot, quality) in out.iter_mut().zip(Quality::ALL) {
            *slot = self.apply(record, quality, now)?.interval_days;
        }
        Ok(out)
    }
}

// --- Due Query ---

/// Never-reviewed cards are always due.
pub fn is_due(record: &ReviewRecord, now: DateTime<Utc>) -> bool {
    match record.next_review {
        None => true,
        Some(next) => next <= now,
    }
}

/// Filters due cards and orders them for presentation: unscheduled cards
/// first, then oldest `next_review`, ties by creation time and id.
pub fn select_due(cards: &[FlashcardView], now: DateTime<Utc>) -> Vec<&FlashcardView> {
    let mut due: Vec<&FlashcardView> = cards.iter().filter(|c| is_due(&c.review, now)).collect();
    due.sort_by_key(|c| (c.review.next_review, c.card.created_at, c.card.id));
    due
}

/// Format an interval in days to a short label
pub fn format_interval(days: u32) -> String {
    match days {
        0 => "now".to_string(),
        1..=6 => format!("{}d", days),
        7..=29 => format!("{}w", days / 7),
        30..=364 => format!("{}mo", days / 30),
        _ => format!("{}y", days / 365),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;
    use crate::models::Flashcard;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn days(n: i64) -> Duration {
        Duration::days(n)
    }

    fn scheduler() -> ReviewScheduler {
        ReviewScheduler::default()
    }

    #[test]
    fn test_first_review_good() {
        let record = ReviewRecord::new(1);
        let next = scheduler().apply(&record, Quality::Good, t0()).unwrap();

        assert_eq!(next.last_review, Some(t0()));
        assert_eq!(next.next_review, Some(t0() + days(4)));
        assert_eq!(next.interval_days, 4);
        assert_eq!(next.ease_factor, 2.5);
        assert_eq!(next.repetition_count, 1);
        // input untouched
        assert_eq!(record, ReviewRecord::new(1));
    }

    #[test]
    fn test_first_review_seeds() {
        let record = ReviewRecord::new(1);
        let s = scheduler();
        assert_eq!(s.apply(&record, Quality::Hard, t0()).unwrap().interval_days, 2);
        assert_eq!(s.apply(&record, Quality::Easy, t0()).unwrap().interval_days, 7);
        assert_eq!(s.apply(&record, Quality::Fail, t0()).unwrap().interval_days, INTERVAL_RESET);
    }

    #[test]
    fn test_ease_adjustments() {
        let record = ReviewRecord::new(1);
        let s = scheduler();
        let hard = s.apply(&record, Quality::Hard, t0()).unwrap();
        let easy = s.apply(&record, Quality::Easy, t0()).unwrap();
        assert!((hard.ease_factor - 2.35).abs() < 1e-9);
        assert!((easy.ease_factor - 2.65).abs() < 1e-9);
    }

    #[test]
    fn test_subsequent_good_multiplies_by_ease() {
        let mut record = ReviewRecord::new(1);
        record.repetition_count = 1;
        record.interval_days = 4;
        record.last_review = Some(t0());
        record.next_review = Some(t0() + days(4));

        let next = scheduler().apply(&record, Quality::Good, t0() + days(4)).unwrap();
        // 4 * 2.5 = 10
        assert_eq!(next.interval_days, 10);
        assert_eq!(next.repetition_count, 2);
        assert_eq!(next.next_review, Some(t0() + days(14)));
    }

    #[test]
    fn test_hard_penalty_and_easy_bonus() {
        let mut record = ReviewRecord::new(1);
        record.repetition_count = 3;
        record.interval_days = 10;
        let s = scheduler();

        // 10 * 2.35 * 0.7 = 16.45
        assert_eq!(s.apply(&record, Quality::Hard, t0()).unwrap().interval_days, 16);
        // 10 * 2.65 * 1.2 = 31.8
        assert_eq!(s.apply(&record, Quality::Easy, t0()).unwrap().interval_days, 32);
    }

    #[test]
    fn test_monotonic_spacing_on_success() {
        let s = scheduler();
        for quality in [Quality::Good, Quality::Easy] {
            let mut record = ReviewRecord::new(1);
            let mut now = t0();
            let mut last_interval = 0;
            for _ in 0..12 {
                record = s.apply(&record, quality, now).unwrap();
                assert!(record.interval_days >= last_interval);
                last_interval = record.interval_days;
                now = record.next_review.unwrap();
            }
            assert_eq!(last_interval, INTERVAL_MAX);
        }
    }

    #[test]
    fn test_reset_on_failure() {
        let s = scheduler();
        for (reps, interval) in [(1, 4), (5, 60), (9, 180)] {
            let mut record = ReviewRecord::new(1);
            record.repetition_count = reps;
            record.interval_days = interval;
            record.last_review = Some(t0());

            let next = s.apply(&record, Quality::Fail, t0() + days(1)).unwrap();
            assert_eq!(next.repetition_count, 0);
            assert_eq!(next.interval_days, INTERVAL_RESET);
            assert_eq!(next.next_review, Some(t0() + days(2)));
        }
    }

    #[test]
    fn test_ease_floor() {
        let s = scheduler();
        let mut record = ReviewRecord::new(1);
        let mut now = t0();
        for i in 0..40 {
            let quality = if i % 2 == 0 { Quality::Fail } else { Quality::Hard };
            record = s.apply(&record, quality, now).unwrap();
            assert!(record.ease_factor >= EASE_FACTOR_MIN);
            now = record.next_review.unwrap();
        }
        assert_eq!(record.ease_factor, EASE_FACTOR_MIN);
    }

    #[test]
    fn test_next_review_invariant() {
        let s = scheduler();
        let mut record = ReviewRecord::new(1);
        let mut now = t0();
        for quality in [Quality::Good, Quality::Hard, Quality::Fail, Quality::Easy, Quality::Good] {
            record = s.apply(&record, quality, now).unwrap();
            assert_eq!(
                record.next_review.unwrap(),
                record.last_review.unwrap() + days(record.interval_days as i64)
            );
            now = record.next_review.unwrap() + Duration::hours(3);
        }
    }

    #[test]
    fn test_invalid_quality() {
        let err = scheduler().apply_raw(&ReviewRecord::new(1), 4, t0()).unwrap_err();
        assert!(matches!(err, NexusError::InvalidQuality(4)));
    }

    #[test]
    fn test_clock_regression() {
        let mut record = ReviewRecord::new(1);
        record.last_review = Some(t0());
        let err = scheduler()
            .apply(&record, Quality::Good, t0() - Duration::minutes(1))
            .unwrap_err();
        assert!(matches!(err, NexusError::ClockRegression { .. }));

        // same instant is fine
        assert!(scheduler().apply(&record, Quality::Good, t0()).is_ok());
    }

    #[test]
    fn test_next_review_past_calendar_range() {
        let now = DateTime::<Utc>::MAX_UTC - days(2);
        let err = scheduler()
            .apply(&ReviewRecord::new(1), Quality::Good, now)
            .unwrap_err();
        assert!(matches!(err, NexusError::InvalidTimestamp { interval_days: 4, .. }));

        // a one-day reset still fits
        let failed = scheduler().apply(&ReviewRecord::new(1), Quality::Fail, now).unwrap();
        assert_eq!(failed.next_review, Some(now + days(1)));
    }

    #[test]
    fn test_custom_config_rejected_when_invalid() {
        let config = SchedulerConfig {
            ease_floor: -1.0,
            ..SchedulerConfig::default()
        };
        assert!(ReviewScheduler::new(config).is_err());
    }

    #[test]
    fn test_preview_intervals_new_card() {
        let preview = scheduler().preview_intervals(&ReviewRecord::new(1), t0()).unwrap();
        assert_eq!(preview, [1, 2, 4, 7]);
    }

    #[test]
    fn test_due_query() {
        let fresh = ReviewRecord::new(1);
        assert!(is_due(&fresh, t0()));

        let mut scheduled = ReviewRecord::new(2);
        scheduled.next_review = Some(t0() + days(3));
        assert!(!is_due(&scheduled, t0()));
        assert!(!is_due(&scheduled, t0() + days(3) - Duration::seconds(1)));
        assert!(is_due(&scheduled, t0() + days(3)));
        assert!(is_due(&scheduled, t0() + days(30)));
    }

    fn view(id: i64, created_offset: i64, next: Option<i64>) -> FlashcardView {
        let mut review = ReviewRecord::new(id);
        review.next_review = next.map(|d| t0() + days(d));
        FlashcardView {
            card: Flashcard {
                id,
                deck_id: 1,
                front: format!("Q{}", id),
                back: format!("A{}", id),
                created_at: t0() + Duration::minutes(created_offset),
            },
            review,
        }
    }

    #[test]
    fn test_select_due_ordering() {
        let now = t0() + days(10);
        let cards = vec![
            view(1, 0, Some(5)),
            view(2, 1, None),
            view(3, 2, Some(2)),
            view(4, 3, Some(20)),
            view(5, 4, Some(2)),
            view(6, -1, None),
        ];

        let ids: Vec<i64> = select_due(&cards, now).iter().map(|c| c.card.id).collect();
        assert_eq!(ids, vec![6, 2, 3, 5, 1]);
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(0), "now");
        assert_eq!(format_interval(1), "1d");
        assert_eq!(format_interval(4), "4d");
        assert_eq!(format_interval(7), "1w");
        assert_eq!(format_interval(14), "2w");
        assert_eq!(format_interval(30), "1mo");
        assert_eq!(format_interval(90), "3mo");
        assert_eq!(format_interval(365), "1y");
    }
}
