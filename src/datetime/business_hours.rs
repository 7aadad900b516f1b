use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

use super::{
    accumulate_delays, clamp, days_in, distribute_by_weight, is_weekend, normal_sample,
    random_time_on, weekday_key, DatetimeStrategy,
};
use crate::config::{BusinessHoursConfig, DatetimeConfig};
use crate::utils::weighted_index;

const WEEKDAYS: [Weekday; 5] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
];

/// Weight used for a weekday missing from the configuration.
const DEFAULT_WEEKDAY_WEIGHT: f64 = 0.2;

/// Share of conversations placed inside configured business periods.
const IN_HOURS_PROBABILITY: f64 = 0.95;

/// Minimum gap between two messages, in seconds.
const MIN_DELAY_SECS: f64 = 5.0;

/// Weights conversations toward weekdays and office hours.
pub struct BusinessHoursStrategy {
    start: NaiveDateTime,
    end: NaiveDateTime,
    hours: BusinessHoursConfig,
    delay_mean: f64,
    delay_std_dev: f64,
}

impl BusinessHoursStrategy {
    pub fn new(config: &DatetimeConfig) -> Self {
        let (start, end) = config.period();
        tracing::info!(%start, %end, "Business hours strategy initialized");
        Self {
            start,
            end,
            hours: config.business_hours.clone(),
            delay_mean: config.message_delay_mean,
            delay_std_dev: config.message_delay_std_dev,
        }
    }

    fn weekday_weight(&self, day: Weekday) -> f64 {
        self.hours
            .weekday_weights
            .get(weekday_key(day))
            .copied()
            .unwrap_or(DEFAULT_WEEKDAY_WEIGHT)
    }

    fn sample_weekday(&self, rng: &mut ChaCha8Rng) -> Weekday {
        let weights: Vec<f64> = WEEKDAYS.iter().map(|d| self.weekday_weight(*d)).collect();
        weighted_index(&weights, rng)
            .map(|i| WEEKDAYS[i])
            .unwrap_or_else(|| WEEKDAYS[rng.random_range(0..WEEKDAYS.len())])
    }

    /// A random day in the period, moved onto a weekend or a weighted
    /// weekday of the same week.
    fn sample_date(&self, rng: &mut ChaCha8Rng) -> NaiveDate {
        let want_weekend = rng.random::<f64>() < self.hours.weekend_weight;
        let range_days = (self.end.date() - self.start.date()).num_days().max(0);
        let mut date = self.start.date() + Duration::days(rng.random_range(0..=range_days));

        let offset_from_monday = i64::from(date.weekday().num_days_from_monday());
        if want_weekend && !is_weekend(date) {
            let to_weekend = if rng.random::<f64>() < 0.5 { 5 } else { 6 };
            date += Duration::days(to_weekend - offset_from_monday);
        } else if !want_weekend && is_weekend(date) {
            let target = i64::from(self.sample_weekday(rng).num_days_from_monday());
            date = date - Duration::days(offset_from_monday) + Duration::days(target);
        }

        date.max(self.start.date()).min(self.end.date())
    }

    fn sample_hour(&self, rng: &mut ChaCha8Rng) -> u32 {
        let open = self.hours.start.min(23);
        let close = self.hours.end.clamp(open, 23);

        if rng.random::<f64>() < IN_HOURS_PROBABILITY {
            let periods = &self.hours.period_weights;
            let weights = [periods.morning, periods.afternoon, periods.evening];
            match weighted_index(&weights, rng).unwrap_or(1) {
                0 => rng.random_range(open..=open.max(11)),
                1 => {
                    let lo = open.max(12);
                    rng.random_range(lo..=close.saturating_sub(1).max(lo))
                }
                _ => rng.random_range(close..=(close + 2).min(23)),
            }
        } else if rng.random::<f64>() < 0.5 {
            rng.random_range(open.saturating_sub(3)..=open.saturating_sub(1))
        } else {
            rng.random_range((close + 3).min(23)..=23)
        }
    }

    fn day_weight(&self, date: NaiveDate) -> f64 {
        if is_weekend(date) {
            self.hours.weekend_weight / 2.0
        } else {
            (1.0 - self.hours.weekend_weight) * self.weekday_weight(date.weekday())
        }
    }
}

impl DatetimeStrategy for BusinessHoursStrategy {
    fn name(&self) -> &'static str {
        "business_hours"
    }

    fn period(&self) -> (NaiveDateTime, NaiveDateTime) {
        (self.start, self.end)
    }

    fn conversation_timestamp(
        &self,
        planned_date: Option<NaiveDate>,
        rng: &mut ChaCha8Rng,
    ) -> NaiveDateTime {
        let date = planned_date.unwrap_or_else(|| self.sample_date(rng));
        let hour = self.sample_hour(rng);
        clamp(random_time_on(date, hour, rng), self.start, self.end)
    }

    fn message_timestamps(
        &self,
        start: NaiveDateTime,
        count: usize,
        rng: &mut ChaCha8Rng,
    ) -> Vec<NaiveDateTime> {
        if count == 0 {
            return Vec::new();
        }

        let delays: Vec<f64> = (1..count)
            .map(|_| {
                let mut delay = normal_sample(self.delay_mean, self.delay_std_dev, rng)
                    .max(MIN_DELAY_SECS);
                if rng.random::<f64>() < 0.1 {
                    delay += f64::from(rng.random_range(60u32..=300));
                }
                delay
            })
            .collect();
        accumulate_delays(start, self.end, delays)
    }

    fn message_count_distribution(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        total: usize,
        _rng: &mut ChaCha8Rng,
    ) -> BTreeMap<NaiveDate, usize> {
        let weights: Vec<(NaiveDate, f64)> = days_in(start, end)
            .into_iter()
            .map(|day| (day, self.day_weight(day)))
            .collect();
        distribute_by_weight(&weights, total)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::dt;
    use super::*;

    fn strategy(weekend_weight: f64) -> BusinessHoursStrategy {
        let mut config = DatetimeConfig {
            enabled: true,
            start_date: Some(dt("2024-03-01 00:00:00")),
            end_date: Some(dt("2024-05-31 23:59:59")),
            ..DatetimeConfig::default()
        };
        config.business_hours.weekend_weight = weekend_weight;
        BusinessHoursStrategy::new(&config)
    }

    #[test]
    fn test_no_weekends_when_weight_is_zero() {
        let strategy = strategy(0.0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..300 {
            let ts = strategy.conversation_timestamp(None, &mut rng);
            assert!(!is_weekend(ts.date()), "weekend timestamp {ts}");
        }
    }

    #[test]
    fn test_mostly_business_hours() {
        let strategy = strategy(0.2);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let samples = 1000;
        let in_window = (0..samples)
            .filter(|_| {
                let hour = strategy.sample_hour(&mut rng);
                (9..=19).contains(&hour)
            })
            .count();
        assert!(in_window > samples * 9 / 10, "only {in_window} in window");
    }

    #[test]
    fn test_weekend_share_tracks_weight() {
        let strategy = strategy(0.5);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let weekends = (0..1000)
            .filter(|_| is_weekend(strategy.sample_date(&mut rng)))
            .count();
        assert!((350..=650).contains(&weekends), "weekend count {weekends}");
    }

    #[test]
    fn test_distribution_prefers_weekdays() {
        let strategy = strategy(0.2);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        // 2024-03-04 is a Monday
        let distribution = strategy.message_count_distribution(
            dt("2024-03-04 00:00:00"),
            dt("2024-03-10 23:59:59"),
            100,
            &mut rng,
        );
        let monday = distribution[&NaiveDate::from_ymd_opt(2024, 3, 4).expect("date")];
        let sunday = distribution[&NaiveDate::from_ymd_opt(2024, 3, 10).expect("date")];
        assert!(monday > sunday);
        assert_eq!(distribution.values().sum::<usize>(), 100);
    }

    #[test]
    fn test_message_delays_respect_minimum() {
        let strategy = strategy(0.2);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let start = dt("2024-03-05 10:00:00");
        let stamps = strategy.message_timestamps(start, 20, &mut rng);
        assert!(stamps
            .windows(2)
            .all(|w| (w[1] - w[0]).num_milliseconds() >= 5000));
    }
}
