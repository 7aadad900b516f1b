//! Run configuration for chat-forge.
//!
//! A [`GeneratorConfig`] is loaded from a YAML or JSON file, then adjusted by
//! `CHAT_FORGE_*` environment variables and CLI flags, and finally validated
//! before any generation work starts.

mod datetime;
mod settings;

pub use datetime::{BusinessHoursConfig, CustomPeriodConfig, DatetimeConfig, PeriodWeights, TimingPattern};
pub use settings::{CompanyTargeting, GeneratorConfig, MessageLengthRatio, RetryConfig};
