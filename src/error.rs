//! Error types for Lexitrace

use thiserror::Error;

/// Errors that can occur during an analysis run
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Failed to parse event record: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Unparsable timestamp: {0}")]
    TimestampError(String),

    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("Unknown session phase: {0}")]
    UnknownPhase(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("No event records supplied")]
    EmptyRun,

    #[error("No valid participants available to seed the threshold table")]
    NoThresholdSeed,
}
