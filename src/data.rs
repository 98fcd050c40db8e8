//! Value types produced by an analysis request.
//!
//! Everything in this module is created once per request and never mutated
//! afterwards. Spans are half-open ranges of Unicode scalar values (chars),
//! not bytes, so that they line up with what the engines report.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{ProcessorKind, SatzbauError};
use crate::pipeline::state::PipelineStage;
use crate::preprocess::{TextStats, ValidationWarning};

/// Half-open character range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    #[serde(rename = "startChar")]
    pub start: usize,
    #[serde(rename = "endChar")]
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True if the span is non-empty and lies within a text of `text_len` chars.
    pub fn is_valid_for(&self, text_len: usize) -> bool {
        self.start < self.end && self.end <= text_len
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Slice `text` by this char span. Returns `None` when out of range.
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        if self.start > self.end {
            return None;
        }
        let start = char_to_byte(text, self.start)?;
        let end = char_to_byte(text, self.end)?;
        text.get(start..end)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Byte offset of the char at `char_idx`; `char_idx == len` maps to the end.
pub(crate) fn char_to_byte(text: &str, char_idx: usize) -> Option<usize> {
    text.char_indices()
        .map(|(byte, _)| byte)
        .chain(std::iter::once(text.len()))
        .nth(char_idx)
}

/// A single analysed word.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub text: String,
    #[serde(flatten)]
    pub span: Span,
    pub lemma: String,
    /// Universal part-of-speech tag.
    pub pos: String,
    /// Language-specific tag (STTS for German), when the engine provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xpos: Option<String>,
    pub morphology: BTreeMap<String, String>,
    /// Position within the sentence, 0-based.
    pub index: usize,
}

/// Head of a dependency relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Governor {
    Root,
    Token(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyRelation {
    pub governor: Governor,
    pub dependent: usize,
    pub relation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sentence {
    pub text: String,
    #[serde(flatten)]
    pub span: Span,
    pub tokens: Vec<Token>,
    pub dependencies: Vec<DependencyRelation>,
}

impl Sentence {
    /// The relation whose dependent is `token_index`, if any.
    pub fn head_of(&self, token_index: usize) -> Option<&DependencyRelation> {
        self.dependencies
            .iter()
            .find(|rel| rel.dependent == token_index)
    }

    pub fn root(&self) -> Option<&DependencyRelation> {
        self.dependencies
            .iter()
            .find(|rel| rel.governor == Governor::Root)
    }
}

/// Closed set of issue categories.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Grammar,
    Spelling,
    Style,
    Punctuation,
}

impl IssueCategory {
    pub const ALL: [IssueCategory; 4] = [
        IssueCategory::Grammar,
        IssueCategory::Spelling,
        IssueCategory::Style,
        IssueCategory::Punctuation,
    ];

    pub fn all() -> BTreeSet<IssueCategory> {
        Self::ALL.into_iter().collect()
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IssueCategory::Grammar => "grammar",
            IssueCategory::Spelling => "spelling",
            IssueCategory::Style => "style",
            IssueCategory::Punctuation => "punctuation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrammarIssue {
    #[serde(flatten)]
    pub span: Span,
    pub category: IssueCategory,
    pub message: String,
    pub suggestions: Vec<String>,
    pub rule_id: String,
}

/// How one processor fared during a request.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessorStatus {
    Succeeded,
    Failed {
        #[serde(serialize_with = "serialize_error")]
        error: SatzbauError,
    },
    /// Not run because the request options excluded it.
    Skipped,
}

fn serialize_error<S: Serializer>(err: &SatzbauError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&err.to_string())
}

fn serialize_millis<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(d.as_secs_f64() * 1000.0)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorReport {
    pub processor: ProcessorKind,
    #[serde(flatten)]
    pub status: ProcessorStatus,
    #[serde(rename = "elapsedMs", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl ProcessorReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, ProcessorStatus::Succeeded)
    }

    pub fn failed(&self) -> bool {
        matches!(self.status, ProcessorStatus::Failed { .. })
    }

    pub fn error(&self) -> Option<&SatzbauError> {
        match &self.status {
            ProcessorStatus::Failed { error } => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    pub request_id: uuid::Uuid,
    /// Configured language code the request was resolved to.
    pub language: String,
    /// Language code as the caller sent it.
    pub requested_language: String,
    pub linguistic: ProcessorReport,
    pub grammar: ProcessorReport,
    #[serde(rename = "preprocessingMs", serialize_with = "serialize_millis")]
    pub preprocessing_elapsed: Duration,
    #[serde(rename = "totalMs", serialize_with = "serialize_millis")]
    pub total_elapsed: Duration,
    pub text_stats: TextStats,
    pub warnings: Vec<ValidationWarning>,
    pub stages: Vec<PipelineStage>,
}

impl AnalysisMetadata {
    /// True when one processor failed and the result is degraded.
    pub fn is_partial(&self) -> bool {
        self.linguistic.failed() || self.grammar.failed()
    }
}

/// Merged output of both processors over the original input text.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(rename = "originalText")]
    pub text: String,
    pub sentences: Vec<Sentence>,
    #[serde(rename = "errors")]
    pub grammar_issues: Vec<GrammarIssue>,
    pub metadata: AnalysisMetadata,
}

impl AnalysisResult {
    pub fn token_count(&self) -> usize {
        self.sentences.iter().map(|s| s.tokens.len()).sum()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.sentences.iter().flat_map(|s| s.tokens.iter())
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Check the span invariants of the result against its own text.
    ///
    /// Fails with [`SatzbauError::Internal`] describing the first violation.
    pub fn verify_spans(&self) -> crate::error::Result<()> {
        let len = self.text.chars().count();
        let mut prev_sentence_start = 0;
        for (si, sentence) in self.sentences.iter().enumerate() {
            if !sentence.span.is_valid_for(len) {
                return Err(SatzbauError::internal(format!(
                    "sentence {si} span {} out of range", sentence.span
                )));
            }
            if sentence.span.start < prev_sentence_start {
                return Err(SatzbauError::internal(format!(
                    "sentence {si} out of document order"
                )));
            }
            prev_sentence_start = sentence.span.start;

            let mut prev_end = sentence.span.start;
            for token in &sentence.tokens {
                if !token.span.is_valid_for(len) {
                    return Err(SatzbauError::internal(format!(
                        "token {:?} span {} out of range", token.text, token.span
                    )));
                }
                if token.span.start < prev_end {
                    return Err(SatzbauError::internal(format!(
                        "token {:?} overlaps its predecessor", token.text
                    )));
                }
                if !sentence.span.contains(&token.span) {
                    return Err(SatzbauError::internal(format!(
                        "token {:?} outside sentence {si}", token.text
                    )));
                }
                prev_end = token.span.end;
            }
        }

        let mut prev_start = 0;
        for issue in &self.grammar_issues {
            if !issue.span.is_valid_for(len) {
                return Err(SatzbauError::internal(format!(
                    "issue {} span {} out of range", issue.rule_id, issue.span
                )));
            }
            if issue.span.start < prev_start {
                return Err(SatzbauError::internal(format!(
                    "issue {} out of document order", issue.rule_id
                )));
            }
            prev_start = issue.span.start;
        }
        Ok(())
    }
}
