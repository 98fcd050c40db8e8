//! Request orchestration.
//!
//! [`Pipeline::process`] runs one request:
//!
//! 1. Preprocess the raw text (size and emptiness checks happen here, before
//!    any model is touched).
//! 2. Resolve the language against the configuration.
//! 3. Run the linguistic and grammar processors concurrently. Each outcome is
//!    kept separately, so one failing does not cancel the other.
//! 4. Map spans from the clean text back onto the original input and merge
//!    both layers into an [`AnalysisResult`].
//!
//! If exactly one processor fails the result is still returned, with that
//! layer empty and its [`ProcessorReport`] marked failed. If both fail the
//! request fails with [`SatzbauError::PipelineFailure`].

pub mod options;
pub mod state;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::data::{
    AnalysisMetadata, AnalysisResult, GrammarIssue, ProcessorReport, ProcessorStatus, Sentence,
    Span,
};
use crate::error::{ProcessorKind, Result, SatzbauError};
use crate::model::manager::{ModelManager, ModelStatus};
use crate::model::{AnnotateOptions, ModelKind, ModelLoader};
use crate::preprocess::{CleanText, TextPreprocessor};
use crate::processor::grammar::GrammarProcessor;
use crate::processor::linguistic::LinguisticProcessor;
use crate::util::preview;

use self::options::AnalysisOptions;
use self::state::{PipelineStage, StageTrace};

/// Entry point of the analysis core.
///
/// Cheap to share behind an `Arc`; all methods take `&self` and requests
/// may run concurrently.
#[derive(Debug)]
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    manager: ModelManager,
    preprocessor: TextPreprocessor,
    linguistic: LinguisticProcessor,
    grammar: GrammarProcessor,
}

/// Outcome of one processor call.
struct Outcome<T> {
    result: Option<Result<T>>,
    elapsed: Duration,
    finished: Instant,
}

async fn timed<T>(fut: impl Future<Output = Result<T>>) -> Outcome<T> {
    let started = Instant::now();
    let result = fut.await;
    Outcome {
        result: Some(result),
        elapsed: started.elapsed(),
        finished: Instant::now(),
    }
}

impl Pipeline {
    /// Create a pipeline with its own [`ModelManager`].
    pub fn new(config: PipelineConfig, loader: Arc<dyn ModelLoader>) -> Result<Self> {
        config.validate()?;
        let manager = ModelManager::new(
            config.model_catalog(),
            loader,
            config.limits.cache_limits(),
        );
        Self::with_manager(config, manager)
    }

    /// Create a pipeline that shares an existing [`ModelManager`].
    ///
    /// Fails with [`SatzbauError::InvalidConfig`] when the manager has no
    /// model for one of the configured languages.
    pub fn with_manager(config: PipelineConfig, manager: ModelManager) -> Result<Self> {
        config.validate()?;
        for language in config.supported_languages() {
            for kind in [ModelKind::Linguistic, ModelKind::Grammar] {
                if !manager.is_configured(kind, &language) {
                    return Err(SatzbauError::invalid_config(format!(
                        "model manager has no {kind} model for language '{language}'"
                    )));
                }
            }
        }
        Ok(Self {
            preprocessor: TextPreprocessor::new(config.limits.max_input_chars),
            linguistic: LinguisticProcessor::new(manager.clone()),
            grammar: GrammarProcessor::new(manager.clone(), config.grammar.max_suggestions),
            config: Arc::new(config),
            manager,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn manager(&self) -> &ModelManager {
        &self.manager
    }

    /// Configured language codes, sorted.
    pub fn supported_languages(&self) -> Vec<String> {
        self.config.supported_languages()
    }

    /// Status of every loaded model.
    pub fn status(&self) -> Vec<ModelStatus> {
        self.manager.status()
    }

    /// Load the models of every configured language.
    pub async fn warm_up(&self) -> Result<()> {
        let languages = self.supported_languages();
        let codes: Vec<&str> = languages.iter().map(String::as_str).collect();
        self.manager.warm_up(&codes).await
    }

    /// Analyse `text` in `language`. An empty language selects the default.
    pub async fn process(
        &self,
        text: &str,
        language: &str,
        options: &AnalysisOptions,
    ) -> Result<AnalysisResult> {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        let mut trace = StageTrace::new();
        debug!("request {request_id}: received {:?}", preview(text));

        let preprocessed = match self.preprocessor.preprocess(text) {
            Ok(p) => p,
            Err(err) => {
                trace.fail();
                debug!("request {request_id}: rejected input: {err}");
                return Err(err);
            }
        };
        let preprocessing_elapsed = started.elapsed();
        trace.advance(PipelineStage::Preprocessed)?;

        let resolved = match self.config.resolve_language(language) {
            Ok(code) => code,
            Err(err) => {
                trace.fail();
                debug!("request {request_id}: {err}");
                return Err(err);
            }
        };

        let clean = &preprocessed.clean;
        let annotate = AnnotateOptions {
            dependency_parse: options.include_dependency_parse,
        };
        let linguistic_fut = timed(self.linguistic.analyze(clean.as_str(), &resolved, annotate));
        let grammar_fut = async {
            if options.runs_grammar() {
                timed(self.grammar.check(clean.as_str(), &resolved, &options.grammar_categories))
                    .await
            } else {
                Outcome {
                    result: None,
                    elapsed: Duration::ZERO,
                    finished: Instant::now(),
                }
            }
        };
        let (linguistic, grammar) = tokio::join!(linguistic_fut, grammar_fut);

        if linguistic.finished <= grammar.finished {
            trace.advance(PipelineStage::LinguisticDone)?;
            trace.advance(PipelineStage::GrammarDone)?;
        } else {
            trace.advance(PipelineStage::GrammarDone)?;
            trace.advance(PipelineStage::LinguisticDone)?;
        }

        let linguistic_result = linguistic
            .result
            .map(|r| r.and_then(|sentences| remap_sentences(clean, text, sentences)));
        let grammar_result = grammar
            .result
            .map(|r| r.and_then(|issues| remap_issues(clean, issues)));

        let (sentences, linguistic_status) = split_outcome(linguistic_result);
        let (grammar_issues, grammar_status) = split_outcome(grammar_result);

        if let (
            ProcessorStatus::Failed { error: linguistic_err },
            ProcessorStatus::Failed { error: grammar_err },
        ) = (&linguistic_status, &grammar_status)
        {
            trace.fail();
            error!(
                "request {request_id}: both processors failed ({linguistic_err}; {grammar_err})"
            );
            return Err(SatzbauError::PipelineFailure {
                linguistic: Box::new(linguistic_err.clone()),
                grammar: Box::new(grammar_err.clone()),
            });
        }
        for (kind, status) in [
            (ProcessorKind::Linguistic, &linguistic_status),
            (ProcessorKind::Grammar, &grammar_status),
        ] {
            if let ProcessorStatus::Failed { error } = status {
                warn!("request {request_id}: {kind} processor failed, returning partial result: {error}");
            }
        }

        trace.advance(PipelineStage::Merged)?;
        trace.advance(PipelineStage::Complete)?;

        let metadata = AnalysisMetadata {
            request_id,
            language: resolved,
            requested_language: language.to_string(),
            linguistic: ProcessorReport {
                processor: ProcessorKind::Linguistic,
                status: linguistic_status,
                elapsed: linguistic.elapsed,
            },
            grammar: ProcessorReport {
                processor: ProcessorKind::Grammar,
                status: grammar_status,
                elapsed: grammar.elapsed,
            },
            preprocessing_elapsed,
            total_elapsed: started.elapsed(),
            text_stats: preprocessed.stats,
            warnings: preprocessed.warnings,
            stages: trace.into_stages(),
        };
        let result = AnalysisResult {
            text: text.to_string(),
            sentences,
            grammar_issues,
            metadata,
        };
        info!(
            "request {request_id}: {} sentences, {} issues in {:?} (linguistic {:?}, grammar {:?})",
            result.sentences.len(),
            result.grammar_issues.len(),
            result.metadata.total_elapsed,
            result.metadata.linguistic.elapsed,
            result.metadata.grammar.elapsed,
        );
        Ok(result)
    }
}

/// Split a processor outcome into its layer and report status. A failed or
/// skipped processor contributes an empty layer.
fn split_outcome<T: Default>(outcome: Option<Result<T>>) -> (T, ProcessorStatus) {
    match outcome {
        Some(Ok(value)) => (value, ProcessorStatus::Succeeded),
        Some(Err(error)) => (T::default(), ProcessorStatus::Failed { error }),
        None => (T::default(), ProcessorStatus::Skipped),
    }
}

fn remap_span(clean: &CleanText, span: Span) -> Result<Span> {
    clean
        .to_original(span)
        .ok_or_else(|| SatzbauError::internal(format!("span {span} outside the clean text")))
}

fn remap_sentences(
    clean: &CleanText,
    original: &str,
    sentences: Vec<Sentence>,
) -> Result<Vec<Sentence>> {
    sentences
        .into_iter()
        .map(|mut sentence| {
            for token in &mut sentence.tokens {
                token.span = remap_span(clean, token.span)?;
            }
            sentence.span = remap_span(clean, sentence.span)?;
            if let Some(text) = sentence.span.slice(original) {
                sentence.text = text.to_string();
            }
            Ok(sentence)
        })
        .collect()
}

fn remap_issues(clean: &CleanText, issues: Vec<GrammarIssue>) -> Result<Vec<GrammarIssue>> {
    issues
        .into_iter()
        .map(|mut issue| {
            issue.span = remap_span(clean, issue.span)?;
            Ok(issue)
        })
        .collect()
}
