use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rand::prelude::*;
use rand::seq::IndexedRandom;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use tracing::warn;

use super::{
    accumulate_delays, clamp, days_in, distribute_by_weight, normal_sample, random_time_on,
    weekday_key, DatetimeStrategy,
};
use crate::config::{CustomPeriodConfig, DatetimeConfig, TimingPattern};
use crate::utils::weighted_index;

/// Weight for a weekday missing from `day_weights`.
const DEFAULT_DAY_WEIGHT: f64 = 0.1;

/// Weight for an hour missing from `hour_weights`.
const DEFAULT_HOUR_WEIGHT: f64 = 0.1;

/// Chance that an unplanned conversation lands on a special date.
const SPECIAL_DATE_PROBABILITY: f64 = 0.2;

/// Chance of a long pause before a message.
const PAUSE_PROBABILITY: f64 = 0.05;

/// Pause ranges in seconds: a short break, a longer one, a meal break.
const PAUSE_RANGES: [(u32, u32); 3] = [(180, 300), (600, 1200), (3600, 7200)];

/// Per-hour, per-weekday, per-month and per-date weighting, with message
/// timing drawn from named patterns.
pub struct CustomPeriodStrategy {
    start: NaiveDateTime,
    end: NaiveDateTime,
    custom: CustomPeriodConfig,
    /// Parsed `special_dates`; invalid keys are dropped with a warning.
    special_dates: BTreeMap<NaiveDate, f64>,
}

impl CustomPeriodStrategy {
    pub fn new(config: &DatetimeConfig) -> Self {
        let (start, end) = config.period();
        let special_dates = config
            .custom_period
            .special_dates
            .iter()
            .filter_map(|(raw, weight)| match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                Ok(date) => Some((date, *weight)),
                Err(_) => {
                    warn!(date = %raw, "Invalid date format in special_dates");
                    None
                }
            })
            .collect();

        tracing::info!(%start, %end, "Custom period strategy initialized");
        Self {
            start,
            end,
            custom: config.custom_period.clone(),
            special_dates,
        }
    }

    fn base_day_weight(&self, date: NaiveDate) -> f64 {
        let day = self
            .custom
            .day_weights
            .get(weekday_key(date.weekday()))
            .copied()
            .unwrap_or(DEFAULT_DAY_WEIGHT);
        let month = self
            .custom
            .month_weights
            .get(&date.month())
            .copied()
            .unwrap_or(1.0);
        day * month
    }

    fn day_weight(&self, date: NaiveDate) -> f64 {
        let special = self.special_dates.get(&date).copied().unwrap_or(1.0);
        special * self.base_day_weight(date)
    }

    fn sample_date(&self, rng: &mut ChaCha8Rng) -> NaiveDate {
        let (first, last) = (self.start.date(), self.end.date());
        let specials: Vec<(NaiveDate, f64)> = self
            .special_dates
            .iter()
            .filter(|(date, _)| (first..=last).contains(*date))
            .map(|(date, weight)| (*date, *weight))
            .collect();

        if !specials.is_empty() && rng.random::<f64>() < SPECIAL_DATE_PROBABILITY {
            let weights: Vec<f64> = specials.iter().map(|(_, w)| *w).collect();
            if let Some(i) = weighted_index(&weights, rng) {
                return specials[i].0;
            }
        }

        let days = days_in(self.start, self.end);
        let weights: Vec<f64> = days.iter().map(|d| self.base_day_weight(*d)).collect();
        weighted_index(&weights, rng)
            .and_then(|i| days.get(i).copied())
            .or_else(|| days.choose(rng).copied())
            .unwrap_or(first)
    }

    /// Hours absent from `hour_weights` weigh [`DEFAULT_HOUR_WEIGHT`]. When
    /// every weight is zero, hours are uniform.
    fn sample_hour(&self, rng: &mut ChaCha8Rng) -> u32 {
        let weights: Vec<f64> = (0..24u32)
            .map(|h| self.custom.hour_weights.get(&h).copied().unwrap_or(DEFAULT_HOUR_WEIGHT))
            .collect();
        weighted_index(&weights, rng)
            .map(|h| h as u32)
            .unwrap_or_else(|| rng.random_range(0..24))
    }

    fn sample_pattern(&self, rng: &mut ChaCha8Rng) -> Option<&TimingPattern> {
        let patterns = &self.custom.timing_patterns;
        let weights: Vec<f64> = patterns.iter().map(|p| p.probability).collect();
        weighted_index(&weights, rng)
            .and_then(|i| patterns.get(i))
            .or_else(|| patterns.choose(rng))
    }
}

impl DatetimeStrategy for CustomPeriodStrategy {
    fn name(&self) -> &'static str {
        "custom_period"
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

        // No patterns configured: one minute apart
        let (mean, std_dev) = self
            .sample_pattern(rng)
            .map(|p| (p.mean, p.std_dev))
            .unwrap_or((60.0, 30.0));

        let delays: Vec<f64> = (1..count)
            .map(|i| {
                let position_factor = 1.0 + (i as f64 / count as f64) * 0.5;
                let mut delay = normal_sample(mean * position_factor, std_dev, rng).max(5.0);
                if rng.random::<f64>() < PAUSE_PROBABILITY {
                    let (lo, hi) = PAUSE_RANGES[rng.random_range(0..PAUSE_RANGES.len())];
                    delay += f64::from(rng.random_range(lo..=hi));
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
