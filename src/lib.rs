//! chat-forge: synthetic chat conversation generator.
//!
//! This library drives an LLM through pluggable taxonomy, generation and
//! few-shot strategies to produce advisor/client conversations, and
//! post-processes the resulting run files.

// Core modules
pub mod cli;
pub mod companies;
pub mod config;
pub mod datetime;
pub mod error;
pub mod few_shot;
pub mod generation;
pub mod generator;
pub mod llm;
pub mod models;
pub mod postprocess;
pub mod strategies;
pub mod taxonomy;
pub mod utils;

// Re-export commonly used error types
pub use error::{
    ConfigError, GenerationError, LlmError, OutputError, StrategyError, TaxonomyError,
};
