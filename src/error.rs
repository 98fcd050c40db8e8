//! Error types for the analysis core.
//!
//! Every fallible operation in the crate returns [`Result`]. The variants
//! follow the taxonomy the pipeline reports to its callers: user input,
//! configuration, infrastructure (model loading), per-engine analysis
//! failures and the terminal pipeline failure.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::model::ModelKey;

/// Error type produced by the opaque NLP engines.
pub type EngineError = Box<dyn std::error::Error + Send + Sync>;

/// Shared form of an engine error so the same failure can reach every waiter.
pub type SharedEngineError = Arc<dyn std::error::Error + Send + Sync>;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SatzbauError>;

/// Which processor an analysis failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorKind {
    Linguistic,
    Grammar,
}

impl fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessorKind::Linguistic => write!(f, "linguistic"),
            ProcessorKind::Grammar => write!(f, "grammar"),
        }
    }
}

/// Coarse classification of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Bad input. Always reported, never worth retrying.
    UserInput,
    /// The requested language or model is not configured.
    Configuration,
    /// Model loading problems. Callers may retry after a backoff.
    Infrastructure,
    /// One engine failed while analysing.
    Engine,
    /// Both processors failed.
    Pipeline,
    Internal,
}

#[derive(Error, Debug, Clone)]
pub enum SatzbauError {
    #[error("input text is empty or contains only whitespace")]
    InputEmpty,

    #[error("input text has {length} characters, limit is {limit}")]
    InputTooLarge { length: usize, limit: usize },

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("timed out after {timeout:?} waiting for model {key}")]
    ModelLoadTimeout { key: ModelKey, timeout: Duration },

    #[error("failed to load model {key}: {source}")]
    ModelLoadFailure {
        key: ModelKey,
        #[source]
        source: SharedEngineError,
    },

    #[error("model {0} is not loaded")]
    ModelNotLoaded(ModelKey),

    #[error("model {key} is in use ({ref_count} active references)")]
    ModelInUse { key: ModelKey, ref_count: usize },

    #[error("{processor} analysis failed: {message}")]
    AnalysisFailure {
        processor: ProcessorKind,
        message: String,
        #[source]
        source: Option<SharedEngineError>,
    },

    #[error("both processors failed (linguistic: {linguistic}; grammar: {grammar})")]
    PipelineFailure {
        linguistic: Box<SatzbauError>,
        grammar: Box<SatzbauError>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(Arc<serde_json::Error>),

    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SatzbauError {
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        SatzbauError::InvalidConfig(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        SatzbauError::Internal(msg.into())
    }

    pub fn unsupported_language<S: Into<String>>(language: S) -> Self {
        SatzbauError::UnsupportedLanguage(language.into())
    }

    /// Analysis failure without an underlying engine error.
    pub fn analysis<S: Into<String>>(processor: ProcessorKind, msg: S) -> Self {
        SatzbauError::AnalysisFailure {
            processor,
            message: msg.into(),
            source: None,
        }
    }

    /// Analysis failure wrapping the engine's own error.
    pub fn analysis_failure(processor: ProcessorKind, err: EngineError) -> Self {
        SatzbauError::AnalysisFailure {
            processor,
            message: err.to_string(),
            source: Some(Arc::from(err)),
        }
    }

    pub fn model_load_failure(key: ModelKey, err: EngineError) -> Self {
        SatzbauError::ModelLoadFailure {
            key,
            source: Arc::from(err),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            SatzbauError::InputEmpty | SatzbauError::InputTooLarge { .. } => ErrorClass::UserInput,
            SatzbauError::UnsupportedLanguage(_) | SatzbauError::InvalidConfig(_) => {
                ErrorClass::Configuration
            }
            SatzbauError::ModelLoadTimeout { .. } | SatzbauError::ModelLoadFailure { .. } => {
                ErrorClass::Infrastructure
            }
            SatzbauError::ModelNotLoaded(_) | SatzbauError::ModelInUse { .. } => {
                ErrorClass::Configuration
            }
            SatzbauError::AnalysisFailure { .. } => ErrorClass::Engine,
            SatzbauError::PipelineFailure { .. } => ErrorClass::Pipeline,
            SatzbauError::Json(_) | SatzbauError::Io(_) => ErrorClass::Configuration,
            SatzbauError::Internal(_) => ErrorClass::Internal,
        }
    }

    /// Whether a caller may reasonably retry after a backoff.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Infrastructure
    }
}

impl From<serde_json::Error> for SatzbauError {
    fn from(err: serde_json::Error) -> Self {
        SatzbauError::Json(Arc::new(err))
    }
}

impl From<std::io::Error> for SatzbauError {
    fn from(err: std::io::Error) -> Self {
        SatzbauError::Io(Arc::new(err))
    }
}
