use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rand::prelude::*;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

use super::{accumulate_delays, clamp, days_in, normal_sample, DatetimeStrategy};
use crate::config::DatetimeConfig;

const SECONDS_PER_DAY: u32 = 86_400;

/// Spreads conversations evenly over the period.
pub struct UniformStrategy {
    start: NaiveDateTime,
    end: NaiveDateTime,
    delay_mean: f64,
    delay_std_dev: f64,
}

impl UniformStrategy {
    pub fn new(config: &DatetimeConfig) -> Self {
        let (start, end) = config.period();
        Self {
            start,
            end,
            delay_mean: config.message_delay_mean,
            delay_std_dev: config.message_delay_std_dev,
        }
    }
}

impl DatetimeStrategy for UniformStrategy {
    fn name(&self) -> &'static str {
        "uniform"
    }

    fn period(&self) -> (NaiveDateTime, NaiveDateTime) {
        (self.start, self.end)
    }

    fn conversation_timestamp(
        &self,
        planned_date: Option<NaiveDate>,
        rng: &mut ChaCha8Rng,
    ) -> NaiveDateTime {
        match planned_date {
            Some(date) => {
                let secs = rng.random_range(0..SECONDS_PER_DAY);
                let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, 0)
                    .unwrap_or(NaiveTime::MIN);
                clamp(date.and_time(time), self.start, self.end)
            }
            None => {
                let range = (self.end - self.start).num_seconds().max(0);
                self.start + Duration::seconds(rng.random_range(0..=range))
            }
        }
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
            .map(|_| normal_sample(self.delay_mean, self.delay_std_dev, rng).max(5.0))
            .collect();
        accumulate_delays(start, self.end, delays)
    }

    fn message_count_distribution(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        total: usize,
        rng: &mut ChaCha8Rng,
    ) -> BTreeMap<NaiveDate, usize> {
        let days = days_in(start, end);
        if days.is_empty() {
            return BTreeMap::new();
        }

        let base = total / days.len();
        let extra = total % days.len();
        let mut distribution: BTreeMap<NaiveDate, usize> =
            days.iter().map(|day| (*day, base)).collect();

        let mut shuffled = days;
        shuffled.shuffle(rng);
        for day in shuffled.into_iter().take(extra) {
            if let Some(count) = distribution.get_mut(&day) {
                *count += 1;
            }
        }
        distribution
    }
}
