//! Timestamp distribution strategies.
//!
//! A strategy places conversations inside the configured period, spaces the
//! messages of each conversation, and can pre-compute how many conversations
//! land on each day. All timestamps are naive local times.

mod business_hours;
mod custom_period;
mod uniform;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use rand::prelude::*;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use tracing::warn;

use crate::config::DatetimeConfig;
use crate::error::GenerationError;
use crate::models::SingleConversation;

pub use business_hours::BusinessHoursStrategy;
pub use custom_period::CustomPeriodStrategy;
pub use uniform::UniformStrategy;

/// Strategy for timestamping conversations and their messages.
pub trait DatetimeStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// The `(start, end)` period timestamps are clamped to.
    fn period(&self) -> (NaiveDateTime, NaiveDateTime);

    /// Start time of a conversation. A planned date fixes the day and only
    /// the time of day is sampled.
    fn conversation_timestamp(
        &self,
        planned_date: Option<NaiveDate>,
        rng: &mut ChaCha8Rng,
    ) -> NaiveDateTime;

    /// `count` non-decreasing timestamps, the first equal to `start`.
    fn message_timestamps(
        &self,
        start: NaiveDateTime,
        count: usize,
        rng: &mut ChaCha8Rng,
    ) -> Vec<NaiveDateTime>;

    /// How many of `total` conversations fall on each day of the period.
    /// Counts always sum to `total`.
    fn message_count_distribution(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        total: usize,
        rng: &mut ChaCha8Rng,
    ) -> BTreeMap<NaiveDate, usize>;

    /// Sets the conversation start time and a timestamp on every line.
    fn apply_timestamps(
        &self,
        conversation: &mut SingleConversation,
        start: NaiveDateTime,
        rng: &mut ChaCha8Rng,
    ) -> Result<(), GenerationError> {
        let timestamps = self.message_timestamps(start, conversation.lines.len(), rng);
        if timestamps.len() != conversation.lines.len() {
            return Err(GenerationError::TimestampMismatch {
                timestamps: timestamps.len(),
                lines: conversation.lines.len(),
            });
        }

        conversation.timestamp = start;
        for (line, ts) in conversation.lines.iter_mut().zip(timestamps) {
            line.timestamp = Some(ts);
        }
        Ok(())
    }
}

/// Builds the configured strategy, or `None` when timestamping is disabled.
pub fn create_datetime_strategy(config: &DatetimeConfig) -> Option<Box<dyn DatetimeStrategy>> {
    if !config.enabled {
        return None;
    }

    let strategy: Box<dyn DatetimeStrategy> = match config.strategy.as_str() {
        "business_hours" => Box::new(BusinessHoursStrategy::new(config)),
        "uniform" => Box::new(UniformStrategy::new(config)),
        "custom_period" => Box::new(CustomPeriodStrategy::new(config)),
        other => {
            warn!(strategy = other, "Unknown datetime strategy, using business_hours");
            Box::new(BusinessHoursStrategy::new(config))
        }
    };
    tracing::info!(strategy = strategy.name(), "Datetime distribution enabled");
    Some(strategy)
}

/// Expands a per-day distribution into a shuffled list of planned dates.
pub fn planned_dates(distribution: &BTreeMap<NaiveDate, usize>, rng: &mut ChaCha8Rng) -> Vec<NaiveDate> {
    let mut dates: Vec<NaiveDate> = distribution
        .iter()
        .flat_map(|(date, count)| std::iter::repeat_n(*date, *count))
        .collect();
    dates.shuffle(rng);
    dates
}

pub(crate) fn clamp(ts: NaiveDateTime, start: NaiveDateTime, end: NaiveDateTime) -> NaiveDateTime {
    ts.max(start).min(end)
}

/// Every calendar day touched by the period, in order.
pub(crate) fn days_in(start: NaiveDateTime, end: NaiveDateTime) -> Vec<NaiveDate> {
    let last = end.date();
    start
        .date()
        .iter_days()
        .take_while(|day| *day <= last)
        .collect()
}

/// `date` at `hour` with a random minute and second.
pub(crate) fn random_time_on(date: NaiveDate, hour: u32, rng: &mut ChaCha8Rng) -> NaiveDateTime {
    let minute = rng.random_range(0..60);
    let second = rng.random_range(0..60);
    let time = NaiveTime::from_hms_opt(hour.min(23), minute, second).unwrap_or(NaiveTime::MIN);
    date.and_time(time)
}

/// Gaussian sample, or `mean` when the parameters are not a valid normal.
pub(crate) fn normal_sample(mean: f64, std_dev: f64, rng: &mut ChaCha8Rng) -> f64 {
    match rand_distr::Normal::new(mean, std_dev) {
        Ok(normal) => rng.sample(normal),
        Err(_) => mean,
    }
}

/// Advances `start` by successive delays, clamping to `end`.
pub(crate) fn accumulate_delays(
    start: NaiveDateTime,
    end: NaiveDateTime,
    delays: impl IntoIterator<Item = f64>,
) -> Vec<NaiveDateTime> {
    let mut current = start;
    let mut timestamps = vec![start];
    for delay in delays {
        let millis = (delay.max(0.0) * 1000.0).round() as i64;
        current = (current + Duration::milliseconds(millis)).min(end.max(start));
        timestamps.push(current);
    }
    timestamps
}

/// Lowercase English weekday name, matching config keys.
pub(crate) fn weekday_key(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

pub(crate) fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Splits `total` across days proportionally to their weights.
///
/// Each day first gets the floor of its share. The remainder goes one at a
/// time to days in descending weight order. With no positive weight the
/// split is even, with the remainder on the earliest days.
pub(crate) fn distribute_by_weight(
    weights: &[(NaiveDate, f64)],
    total: usize,
) -> BTreeMap<NaiveDate, usize> {
    let mut distribution: BTreeMap<NaiveDate, usize> =
        weights.iter().map(|(day, _)| (*day, 0)).collect();
    if weights.is_empty() {
        return distribution;
    }

    let weight_sum: f64 = weights.iter().map(|(_, w)| w.max(0.0)).sum();
    if weight_sum <= 0.0 || !weight_sum.is_finite() {
        let base = total / weights.len();
        let extra = total % weights.len();
        for (i, (day, _)) in weights.iter().enumerate() {
            distribution.insert(*day, base + usize::from(i < extra));
        }
        return distribution;
    }

    let mut remaining = total;
    for (day, weight) in weights {
        let share = (total as f64 * weight.max(0.0) / weight_sum).floor() as usize;
        let count = share.min(remaining);
        distribution.insert(*day, count);
        remaining -= count;
    }

    let mut by_weight: Vec<&(NaiveDate, f64)> = weights.iter().collect();
    by_weight.sort_by(|a, b| b.1.total_cmp(&a.1));
    for (day, _) in by_weight.iter().cycle().take(remaining) {
        if let Some(count) = distribution.get_mut(day) {
            *count += 1;
        }
    }

    distribution
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::NaiveDateTime;

    pub fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").expect("valid datetime")
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::dt;
    use super::*;
    use crate::models::ChatLine;

    fn enabled(strategy: &str) -> DatetimeConfig {
        DatetimeConfig {
            enabled: true,
            strategy: strategy.to_string(),
            start_date: Some(dt("2024-01-01 00:00:00")),
            end_date: Some(dt("2024-01-31 23:59:59")),
            ..DatetimeConfig::default()
        }
    }

    #[test]
    fn test_factory() {
        assert!(create_datetime_strategy(&DatetimeConfig::default()).is_none());
        for (name, expected) in [
            ("business_hours", "business_hours"),
            ("uniform", "uniform"),
            ("custom_period", "custom_period"),
            ("lunar", "business_hours"),
        ] {
            let strategy = create_datetime_strategy(&enabled(name)).expect("enabled");
            assert_eq!(strategy.name(), expected);
        }
    }

    #[test]
    fn test_every_strategy_keeps_invariants() {
        for name in ["business_hours", "uniform", "custom_period"] {
            let strategy = create_datetime_strategy(&enabled(name)).expect("enabled");
            let (start, end) = strategy.period();
            let mut rng = ChaCha8Rng::seed_from_u64(42);

            for _ in 0..200 {
                let ts = strategy.conversation_timestamp(None, &mut rng);
                assert!(ts >= start && ts <= end, "{name}: {ts} outside period");

                let messages = strategy.message_timestamps(ts, 8, &mut rng);
                assert_eq!(messages.len(), 8);
                assert_eq!(messages[0], ts);
                assert!(messages.windows(2).all(|w| w[0] <= w[1]), "{name}: not monotonic");
                assert!(messages.iter().all(|m| *m <= end));
            }

            let distribution = strategy.message_count_distribution(start, end, 57, &mut rng);
            assert_eq!(distribution.len(), 31);
            assert_eq!(distribution.values().sum::<usize>(), 57, "{name}: counts do not sum");
        }
    }

    #[test]
    fn test_planned_date_fixes_the_day() {
        let planned = NaiveDate::from_ymd_opt(2024, 1, 17).expect("date");
        for name in ["business_hours", "uniform", "custom_period"] {
            let strategy = create_datetime_strategy(&enabled(name)).expect("enabled");
            let mut rng = ChaCha8Rng::seed_from_u64(3);
            for _ in 0..20 {
                let ts = strategy.conversation_timestamp(Some(planned), &mut rng);
                assert_eq!(ts.date(), planned, "{name}");
            }
        }
    }

    #[test]
    fn test_apply_timestamps() {
        let strategy = create_datetime_strategy(&enabled("business_hours")).expect("enabled");
        let mut conversation = SingleConversation {
            conversation_id: "c1".to_string(),
            timestamp: dt("2000-01-01 00:00:00"),
            category: "General".to_string(),
            topic: "General".to_string(),
            lines: vec![ChatLine::advisor("Hi"), ChatLine::client("Hello")],
            company_mentions: Vec::new(),
        };
        let start = dt("2024-01-10 10:00:00");
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        strategy
            .apply_timestamps(&mut conversation, start, &mut rng)
            .expect("apply");

        assert_eq!(conversation.timestamp, start);
        assert_eq!(conversation.lines[0].timestamp, Some(start));
        assert!(conversation.lines[1].timestamp > Some(start));
    }

    #[test]
    fn test_planned_dates_expand_counts() {
        let mut distribution = BTreeMap::new();
        let a = NaiveDate::from_ymd_opt(2024, 1, 1).expect("date");
        let b = NaiveDate::from_ymd_opt(2024, 1, 2).expect("date");
        distribution.insert(a, 2);
        distribution.insert(b, 1);

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut dates = planned_dates(&distribution, &mut rng);
        dates.sort();
        assert_eq!(dates, vec![a, a, b]);
    }

    #[test]
    fn test_distribute_by_weight() {
        let days: Vec<NaiveDate> = (1..=3)
            .filter_map(|d| NaiveDate::from_ymd_opt(2024, 1, d))
            .collect();
        let weights = vec![(days[0], 1.0), (days[1], 3.0), (days[2], 0.0)];
        let distribution = distribute_by_weight(&weights, 10);
        assert_eq!(distribution[&days[0]], 2);
        assert_eq!(distribution[&days[1]], 8);
        assert_eq!(distribution[&days[2]], 0);

        let zero = vec![(days[0], 0.0), (days[1], 0.0), (days[2], 0.0)];
        let even = distribute_by_weight(&zero, 4);
        assert_eq!(even.values().copied().collect::<Vec<_>>(), vec![2, 1, 1]);
    }

    #[test]
    fn test_days_in_spans_partial_days() {
        let days = days_in(dt("2024-01-01 18:00:00"), dt("2024-01-03 01:00:00"));
        assert_eq!(days.len(), 3);
    }
}
