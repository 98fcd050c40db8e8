use std::sync::Arc;

use satzbau::{
    AnalysisOptions, AnnotateOptions, BuiltinModelLoader, EngineError, ErrorClass, GrammarModel,
    LinguisticModel, LoadRequest, LoadedModel, ModelKind, ModelLoader, Pipeline, PipelineConfig,
    PipelineStage, ProcessorKind, RawDocument, RawMatch, RawSentence, RawWord, SatzbauError,
};

#[derive(Debug)]
struct CrashingAnnotator;

impl LinguisticModel for CrashingAnnotator {
    fn annotate(&self, _: &str, _: &AnnotateOptions) -> Result<RawDocument, EngineError> {
        Err("tagger crashed".into())
    }
}

#[derive(Debug)]
struct CrashingChecker;

impl GrammarModel for CrashingChecker {
    fn check(&self, _: &str) -> Result<Vec<RawMatch>, EngineError> {
        Err("checker process exited".into())
    }
}

/// Reports a word the text does not contain.
#[derive(Debug)]
struct MisalignedAnnotator;

impl LinguisticModel for MisalignedAnnotator {
    fn annotate(&self, _: &str, _: &AnnotateOptions) -> Result<RawDocument, EngineError> {
        Ok(RawDocument {
            sentences: vec![RawSentence {
                words: vec![RawWord {
                    id: 1,
                    text: "Gespenst".into(),
                    head: Some(0),
                    ..RawWord::default()
                }],
            }],
        })
    }
}

/// Reports one valid match and one past the end of the text.
#[derive(Debug)]
struct SloppyChecker;

impl GrammarModel for SloppyChecker {
    fn check(&self, text: &str) -> Result<Vec<RawMatch>, EngineError> {
        let len = text.chars().count();
        Ok(vec![
            RawMatch {
                offset: len + 3,
                length: 2,
                rule_id: "OUT_OF_RANGE".into(),
                ..RawMatch::default()
            },
            RawMatch {
                offset: 0,
                length: 3,
                message: "Test".into(),
                rule_id: "DE_AGREEMENT".into(),
                category_id: Some("GRAMMAR".into()),
                ..RawMatch::default()
            },
        ])
    }
}

#[derive(Clone, Copy)]
enum Engine {
    Builtin,
    Crashing,
    Misaligned,
    Sloppy,
    Unloadable,
}

/// Loader with a scripted engine per model kind.
struct ScriptedLoader {
    linguistic: Engine,
    grammar: Engine,
}

impl ModelLoader for ScriptedLoader {
    fn load(&self, request: &LoadRequest) -> Result<LoadedModel, EngineError> {
        let engine = match request.key.kind {
            ModelKind::Linguistic => self.linguistic,
            ModelKind::Grammar => self.grammar,
        };
        match (engine, request.key.kind) {
            (Engine::Builtin, _) => BuiltinModelLoader::new().load(request),
            (Engine::Unloadable, _) => Err(format!("model file for {} is missing", request.model_id).into()),
            (Engine::Crashing, ModelKind::Linguistic) => {
                Ok(LoadedModel::Linguistic(Arc::new(CrashingAnnotator)))
            }
            (Engine::Crashing, ModelKind::Grammar) => {
                Ok(LoadedModel::Grammar(Arc::new(CrashingChecker)))
            }
            (Engine::Misaligned, _) => Ok(LoadedModel::Linguistic(Arc::new(MisalignedAnnotator))),
            (Engine::Sloppy, _) => Ok(LoadedModel::Grammar(Arc::new(SloppyChecker))),
        }
    }
}

fn pipeline(linguistic: Engine, grammar: Engine) -> Pipeline {
    let loader = ScriptedLoader {
        linguistic,
        grammar,
    };
    Pipeline::new(PipelineConfig::default(), Arc::new(loader)).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_grammar_failure_keeps_sentences() -> satzbau::Result<()> {
    let pipeline = pipeline(Engine::Builtin, Engine::Crashing);

    let result = pipeline
        .process("Das ist ein Fehler.", "de", &AnalysisOptions::default())
        .await?;

    assert_eq!(result.sentences.len(), 1);
    assert_eq!(result.token_count(), 5);
    assert!(result.grammar_issues.is_empty());

    let meta = &result.metadata;
    assert!(meta.is_partial());
    assert!(meta.linguistic.succeeded());
    assert!(meta.grammar.failed());
    match meta.grammar.error() {
        Some(SatzbauError::AnalysisFailure {
            processor, message, ..
        }) => {
            assert_eq!(*processor, ProcessorKind::Grammar);
            assert!(message.contains("checker process exited"));
        }
        other => panic!("expected AnalysisFailure, got {other:?}"),
    }
    assert_eq!(meta.stages.last(), Some(&PipelineStage::Complete));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_linguistic_failure_keeps_issues() -> satzbau::Result<()> {
    let pipeline = pipeline(Engine::Crashing, Engine::Builtin);

    let result = pipeline
        .process("Das ist vieleicht gut.", "de", &AnalysisOptions::default())
        .await?;

    assert!(result.sentences.is_empty());
    assert_eq!(result.grammar_issues.len(), 1);
    assert!(result.metadata.linguistic.failed());
    assert!(result.metadata.grammar.succeeded());

    let json: serde_json::Value = serde_json::to_value(&result)?;
    assert_eq!(json["metadata"]["linguistic"]["status"], "failed");
    assert!(
        json["metadata"]["linguistic"]["error"]
            .as_str()
            .unwrap()
            .contains("tagger crashed")
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_both_failing_is_a_pipeline_failure() {
    let pipeline = pipeline(Engine::Crashing, Engine::Crashing);

    let err = pipeline
        .process("Das ist ein Fehler.", "de", &AnalysisOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::Pipeline);
    match err {
        SatzbauError::PipelineFailure {
            linguistic,
            grammar,
        } => {
            assert!(linguistic.to_string().contains("tagger crashed"));
            assert!(grammar.to_string().contains("checker process exited"));
        }
        other => panic!("expected PipelineFailure, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_load_failure_is_isolated_and_retried() -> satzbau::Result<()> {
    let pipeline = pipeline(Engine::Builtin, Engine::Unloadable);

    for _ in 0..2 {
        let result = pipeline
            .process("Das ist gut.", "de", &AnalysisOptions::default())
            .await?;
        assert!(result.metadata.linguistic.succeeded());
        let err = result.metadata.grammar.error().unwrap();
        assert!(matches!(err, SatzbauError::ModelLoadFailure { .. }));
        assert!(err.is_retryable());
    }

    // Failed loads leave nothing cached.
    let loaded: Vec<_> = pipeline.status().into_iter().map(|s| s.key.kind).collect();
    assert_eq!(loaded, vec![ModelKind::Linguistic]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_engine_output_is_validated() -> satzbau::Result<()> {
    let pipeline = pipeline(Engine::Misaligned, Engine::Sloppy);

    let result = pipeline
        .process("Das ist gut.", "de", &AnalysisOptions::default())
        .await?;

    // The misaligned annotator fails the linguistic layer.
    assert!(result.metadata.linguistic.failed());
    assert!(result.sentences.is_empty());

    // The out-of-range match is dropped, the valid one kept.
    assert_eq!(result.grammar_issues.len(), 1);
    assert_eq!(result.grammar_issues[0].rule_id, "DE_AGREEMENT");
    assert!(result.verify_spans().is_ok());
    Ok(())
}
