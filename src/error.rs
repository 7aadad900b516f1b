//! Error types for chat-forge operations.
//!
//! Defines error types for each subsystem:
//! - Configuration loading and validation
//! - Taxonomy loading and topic selection
//! - Strategy registry lookups
//! - Prompt construction and response handling
//! - LLM API interactions
//! - Output persistence and post-processing

use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file '{path}': {message}")]
    Parse { path: String, message: String },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Errors that can occur while loading a taxonomy.
#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("Taxonomy file not found: {0}")]
    NotFound(String),

    #[error("Invalid taxonomy structure: {0}")]
    InvalidStructure(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the strategy registry.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("Unknown {kind} strategy: {name}")]
    Unknown { kind: &'static str, name: String },
}

/// Errors that can occur while building prompts or conversations.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Prompt rendering error: {0}")]
    Tera(#[from] tera::Error),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("LLM returned no content")]
    EmptyResponse,

    #[error("No conversation lines could be parsed from the LLM response")]
    NoLines,

    #[error("Timestamp count mismatch: {timestamps} timestamps for {lines} lines")]
    TimestampMismatch { timestamps: usize, lines: usize },

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("Strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("Taxonomy error: {0}")]
    Taxonomy(#[from] TaxonomyError),
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: {0} environment variable not set")]
    MissingApiKey(String),

    #[error("Unknown LLM provider: {0}")]
    UnknownProvider(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Giving up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<LlmError> },
}

/// Errors that can occur while writing or post-processing output files.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Directory not found: {0}")]
    MissingDirectory(String),

    #[error("Source and target directories are the same: {0}")]
    SameDirectory(String),

    #[error("Output path is a directory: {0}")]
    OutputIsDirectory(String),
}
