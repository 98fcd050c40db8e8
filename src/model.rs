//! Engine-facing model abstractions.
//!
//! The NLP engines are black boxes. This module defines the narrow interface
//! the core consumes from them:
//!
//! - [`LinguisticModel`]: tokenization, tagging, lemmatization, morphology
//!   and dependency parsing, reported as a [`RawDocument`].
//! - [`GrammarModel`]: rule-based checking, reported as [`RawMatch`]es.
//! - [`ModelLoader`]: the (blocking, potentially slow) factory for both.
//!
//! The `Raw*` types mirror what such engines natively produce. Processors
//! normalize them into the crate's value types immediately; nothing past the
//! processor boundary sees an engine shape.

pub mod manager;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// The two kinds of heavyweight models the core manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Linguistic,
    Grammar,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Linguistic => f.write_str("linguistic"),
            ModelKind::Grammar => f.write_str("grammar"),
        }
    }
}

/// Cache key of a model: kind plus configured language code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelKey {
    pub kind: ModelKind,
    pub language: String,
}

impl ModelKey {
    pub fn new(kind: ModelKind, language: impl Into<String>) -> Self {
        Self {
            kind,
            language: language.into(),
        }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.language)
    }
}

/// Options forwarded to the linguistic engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotateOptions {
    pub dependency_parse: bool,
}

impl Default for AnnotateOptions {
    fn default() -> Self {
        Self {
            dependency_parse: true,
        }
    }
}

/// A word as a statistical annotator reports it.
///
/// Offsets are char offsets into the analysed text. `id` is 1-based within
/// the sentence and `head == Some(0)` marks the root, CoNLL-U style.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawWord {
    pub id: usize,
    pub text: String,
    pub lemma: Option<String>,
    pub upos: Option<String>,
    pub xpos: Option<String>,
    /// Morphological features, `Case=Nom|Gender=Masc|Number=Sing`.
    pub feats: Option<String>,
    pub head: Option<usize>,
    pub deprel: Option<String>,
    pub start_char: Option<usize>,
    pub end_char: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSentence {
    pub words: Vec<RawWord>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDocument {
    pub sentences: Vec<RawSentence>,
}

/// A rule match as a grammar checker reports it. Offsets are in chars.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMatch {
    pub offset: usize,
    pub length: usize,
    pub message: String,
    pub replacements: Vec<String>,
    pub rule_id: String,
    /// Checker category id, e.g. `TYPOS`, `GRAMMAR`, `PUNCTUATION`.
    pub category_id: Option<String>,
    /// Checker issue type, e.g. `misspelling`, `grammar`, `style`.
    pub issue_type: Option<String>,
}

/// Statistical annotator. Inference must not mutate shared state.
pub trait LinguisticModel: Send + Sync + fmt::Debug {
    fn annotate(
        &self,
        text: &str,
        options: &AnnotateOptions,
    ) -> std::result::Result<RawDocument, EngineError>;

    /// Rough resident size, used by the cache eviction policy.
    fn memory_footprint(&self) -> u64 {
        0
    }
}

/// Rule-based grammar and spell checker.
pub trait GrammarModel: Send + Sync + fmt::Debug {
    fn check(&self, text: &str) -> std::result::Result<Vec<RawMatch>, EngineError>;

    fn memory_footprint(&self) -> u64 {
        0
    }
}

/// A loaded model of either kind.
#[derive(Debug, Clone)]
pub enum LoadedModel {
    Linguistic(Arc<dyn LinguisticModel>),
    Grammar(Arc<dyn GrammarModel>),
}

impl LoadedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            LoadedModel::Linguistic(_) => ModelKind::Linguistic,
            LoadedModel::Grammar(_) => ModelKind::Grammar,
        }
    }

    pub fn memory_footprint(&self) -> u64 {
        match self {
            LoadedModel::Linguistic(m) => m.memory_footprint(),
            LoadedModel::Grammar(m) => m.memory_footprint(),
        }
    }

    pub fn as_linguistic(&self) -> Option<&Arc<dyn LinguisticModel>> {
        match self {
            LoadedModel::Linguistic(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_grammar(&self) -> Option<&Arc<dyn GrammarModel>> {
        match self {
            LoadedModel::Grammar(m) => Some(m),
            _ => None,
        }
    }
}

/// What to load: the cache key and the configured model id for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub key: ModelKey,
    pub model_id: String,
}

/// Factory for engine instances.
///
/// `load` may block for a long time (reading model files, starting a
/// checker process); the manager always calls it from a blocking thread.
pub trait ModelLoader: Send + Sync {
    fn load(&self, request: &LoadRequest) -> std::result::Result<LoadedModel, EngineError>;
}

impl<F> ModelLoader for F
where
    F: Fn(&LoadRequest) -> std::result::Result<LoadedModel, EngineError> + Send + Sync,
{
    fn load(&self, request: &LoadRequest) -> std::result::Result<LoadedModel, EngineError> {
        self(request)
    }
}
