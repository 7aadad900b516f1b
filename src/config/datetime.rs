//! Settings for timestamp distribution across generated conversations.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ConfigError;

/// Relative weight of morning, afternoon and evening business hours.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodWeights {
    pub morning: f64,
    pub afternoon: f64,
    pub evening: f64,
}

impl Default for PeriodWeights {
    fn default() -> Self {
        Self {
            morning: 0.3,
            afternoon: 0.5,
            evening: 0.2,
        }
    }
}

/// Settings for the `business_hours` strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessHoursConfig {
    /// First business hour (inclusive).
    pub start: u32,
    /// Closing hour.
    pub end: u32,
    /// Share of conversations that land on a weekend.
    pub weekend_weight: f64,
    /// Weights keyed by lowercase weekday name (`monday` .. `friday`).
    pub weekday_weights: BTreeMap<String, f64>,
    pub period_weights: PeriodWeights,
}

impl Default for BusinessHoursConfig {
    fn default() -> Self {
        Self {
            start: 9,
            end: 17,
            weekend_weight: 0.2,
            weekday_weights: [
                ("monday", 0.25),
                ("tuesday", 0.2),
                ("wednesday", 0.2),
                ("thursday", 0.2),
                ("friday", 0.15),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
            period_weights: PeriodWeights::default(),
        }
    }
}

/// A named message-delay profile used by the `custom_period` strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingPattern {
    pub name: String,
    /// Mean delay between messages in seconds.
    pub mean: f64,
    pub std_dev: f64,
    pub probability: f64,
}

impl TimingPattern {
    fn new(name: &str, mean: f64, std_dev: f64, probability: f64) -> Self {
        Self {
            name: name.to_string(),
            mean,
            std_dev,
            probability,
        }
    }
}

/// Settings for the `custom_period` strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomPeriodConfig {
    /// Weight per hour of day (0-23). Missing hours weigh 0.1.
    pub hour_weights: BTreeMap<u32, f64>,
    /// Weight per lowercase weekday name. Missing days weigh 0.1.
    pub day_weights: BTreeMap<String, f64>,
    /// Weight per month (1-12). Missing months weigh 1.0.
    pub month_weights: BTreeMap<u32, f64>,
    /// Multiplier for specific dates, keyed `YYYY-MM-DD`.
    pub special_dates: BTreeMap<String, f64>,
    pub timing_patterns: Vec<TimingPattern>,
}

impl Default for CustomPeriodConfig {
    fn default() -> Self {
        let mut hour_weights = BTreeMap::new();
        for hour in 9..=17 {
            hour_weights.insert(hour, 1.0);
        }
        for hour in [7, 8, 18, 19, 20] {
            hour_weights.insert(hour, 0.5);
        }

        let day_weights = [
            ("monday", 1.0),
            ("tuesday", 1.0),
            ("wednesday", 1.0),
            ("thursday", 1.0),
            ("friday", 1.0),
            ("saturday", 0.3),
            ("sunday", 0.2),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            hour_weights,
            day_weights,
            month_weights: (1..=12).map(|m| (m, 1.0)).collect(),
            special_dates: BTreeMap::new(),
            timing_patterns: vec![
                TimingPattern::new("quick_exchange", 20.0, 10.0, 0.3),
                TimingPattern::new("normal_conversation", 60.0, 30.0, 0.5),
                TimingPattern::new("thoughtful_discussion", 180.0, 60.0, 0.2),
            ],
        }
    }
}

/// Top-level datetime distribution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatetimeConfig {
    pub enabled: bool,
    /// `business_hours`, `uniform` or `custom_period`.
    pub strategy: String,
    /// Defaults to thirty days before now.
    pub start_date: Option<NaiveDateTime>,
    /// Defaults to now.
    pub end_date: Option<NaiveDateTime>,
    /// Mean delay between messages in seconds.
    pub message_delay_mean: f64,
    pub message_delay_std_dev: f64,
    pub business_hours: BusinessHoursConfig,
    pub custom_period: CustomPeriodConfig,
}

impl Default for DatetimeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            strategy: "business_hours".to_string(),
            start_date: None,
            end_date: None,
            message_delay_mean: 60.0,
            message_delay_std_dev: 30.0,
            business_hours: BusinessHoursConfig::default(),
            custom_period: CustomPeriodConfig::default(),
        }
    }
}

impl DatetimeConfig {
    /// Resolves the configured period, filling in defaults relative to now.
    pub fn period(&self) -> (NaiveDateTime, NaiveDateTime) {
        let now = chrono::Local::now().naive_local();
        let end = self.end_date.unwrap_or(now);
        let start = self
            .start_date
            .unwrap_or_else(|| end - chrono::Duration::days(30));
        (start, end)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start >= end {
                return Err(ConfigError::ValidationFailed(
                    "datetime.start_date must be before datetime.end_date".to_string(),
                ));
            }
        }

        let hours = &self.business_hours;
        if hours.start >= hours.end || hours.end > 23 {
            return Err(ConfigError::ValidationFailed(
                "datetime.business_hours requires start < end <= 23".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&hours.weekend_weight) {
            return Err(ConfigError::ValidationFailed(
                "datetime.business_hours.weekend_weight must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.message_delay_std_dev < 0.0 {
            return Err(ConfigError::ValidationFailed(
                "datetime.message_delay_std_dev cannot be negative".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_period_defaults() {
        let config = CustomPeriodConfig::default();
        assert_eq!(config.hour_weights.get(&12), Some(&1.0));
        assert_eq!(config.hour_weights.get(&7), Some(&0.5));
        assert_eq!(config.hour_weights.get(&3), None);
        assert_eq!(config.timing_patterns.len(), 3);
        let total: f64 = config.timing_patterns.iter().map(|p| p.probability).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_period_defaults_to_last_thirty_days() {
        let (start, end) = DatetimeConfig::default().period();
        assert_eq!((end - start).num_days(), 30);
    }

    #[test]
    fn test_inverted_period_rejected() {
        let config = DatetimeConfig {
            start_date: NaiveDateTime::parse_from_str("2024-02-01 00:00:00", "%Y-%m-%d %H:%M:%S").ok(),
            end_date: NaiveDateTime::parse_from_str("2024-01-01 00:00:00", "%Y-%m-%d %H:%M:%S").ok(),
            ..DatetimeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_dates_parse() {
        let yaml = "enabled: true\nstart_date: 2024-01-01T00:00:00\nend_date: 2024-03-31T23:59:59\n";
        let config: DatetimeConfig = serde_yaml::from_str(yaml).expect("parse");
        assert!(config.enabled);
        assert!(config.validate().is_ok());
        assert_eq!(config.strategy, "business_hours");
    }
}
