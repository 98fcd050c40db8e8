//! # Satzbau
//!
//! Orchestration core for German text analysis.
//!
//! Two independent engines, a statistical annotator and a rule-based grammar
//! checker, are combined into one [`AnalysisResult`] whose spans all refer to
//! the caller's original text.
//!
//! ## Features
//!
//! - Input normalization with an offset map back to the raw text
//! - Process-wide model cache with coalesced loads, reference counting and
//!   LRU eviction
//! - Concurrent processors with partial-failure reporting
//! - Built-in German reference engines
//!
//! ```no_run
//! use std::sync::Arc;
//! use satzbau::{AnalysisOptions, BuiltinModelLoader, Pipeline, PipelineConfig};
//!
//! # async fn run() -> satzbau::Result<()> {
//! let pipeline = Pipeline::new(PipelineConfig::default(), Arc::new(BuiltinModelLoader::new()))?;
//! let result = pipeline
//!     .process("Das ist ein Fehler.", "de", &AnalysisOptions::default())
//!     .await?;
//! assert_eq!(result.sentences.len(), 1);
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod builtin;
pub mod config;
mod data;
mod error;
pub mod model;
pub mod pipeline;
pub mod preprocess;
pub mod processor;
mod util;

// Re-exports for the public API
pub use builtin::annotator::SimpleGermanAnnotator;
pub use builtin::checker::SimpleGermanChecker;
pub use builtin::loader::BuiltinModelLoader;
pub use config::{GrammarSettings, LanguageModels, PipelineConfig, ResourceLimits};
pub use data::{
    AnalysisMetadata, AnalysisResult, DependencyRelation, Governor, GrammarIssue, IssueCategory,
    ProcessorReport, ProcessorStatus, Sentence, Span, Token,
};
pub use error::{EngineError, ErrorClass, ProcessorKind, Result, SatzbauError};
pub use model::manager::{CacheLimits, ModelHandle, ModelManager, ModelStatus};
pub use model::{
    AnnotateOptions, GrammarModel, LinguisticModel, LoadRequest, LoadedModel, ModelKey, ModelKind,
    ModelLoader, RawDocument, RawMatch, RawSentence, RawWord,
};
pub use pipeline::Pipeline;
pub use pipeline::options::AnalysisOptions;
pub use pipeline::state::PipelineStage;
pub use preprocess::{CleanText, TextPreprocessor, TextStats, ValidationWarning};
pub use processor::grammar::GrammarProcessor;
pub use processor::linguistic::LinguisticProcessor;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
