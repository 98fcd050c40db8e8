use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio_test::assert_ok;

use satzbau::{
    AnalysisOptions, AnnotateOptions, BuiltinModelLoader, CacheLimits, EngineError, LoadRequest,
    LoadedModel, ModelKey, ModelKind, ModelLoader, ModelManager, Pipeline, PipelineConfig,
    SatzbauError,
};

/// Built-in engines behind a slow, counting load.
struct SlowLoader {
    loads: AtomicUsize,
    delay: Duration,
}

impl SlowLoader {
    fn new(delay: Duration) -> Self {
        Self {
            loads: AtomicUsize::new(0),
            delay,
        }
    }
}

impl ModelLoader for SlowLoader {
    fn load(&self, request: &LoadRequest) -> Result<LoadedModel, EngineError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        BuiltinModelLoader::new().load(request)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_share_one_load_per_model() {
    let loader = Arc::new(SlowLoader::new(Duration::from_millis(200)));
    let pipeline = Arc::new(Pipeline::new(PipelineConfig::default(), loader.clone()).unwrap());

    let mut tasks = Vec::new();
    for i in 0..16 {
        let pipeline = Arc::clone(&pipeline);
        tasks.push(tokio::spawn(async move {
            let text = format!("Das ist Satz {i}.");
            pipeline
                .process(&text, "de", &AnalysisOptions::default())
                .await
        }));
    }
    for task in tasks {
        let result = assert_ok!(task.await.unwrap());
        assert!(!result.metadata.is_partial());
    }

    // One load per (kind, language), all references returned.
    assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
    let status = pipeline.status();
    assert_eq!(status.len(), 2);
    assert!(status.iter().all(|s| s.ref_count == 0));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unload_in_use_model() -> satzbau::Result<()> {
    let pipeline = Pipeline::new(
        PipelineConfig::default(),
        Arc::new(BuiltinModelLoader::new()),
    )?;
    let manager = pipeline.manager();

    // 1. Hold a handle
    let handle = manager.acquire(ModelKind::Linguistic, "de").await?;

    // 2. Unload refuses while it is held
    let err = manager.unload(ModelKind::Linguistic, "de").unwrap_err();
    assert!(matches!(err, SatzbauError::ModelInUse { ref_count: 1, .. }));
    assert!(manager.is_loaded(ModelKind::Linguistic, "de"));

    // 3. The handle still works, and so do requests
    let doc = handle
        .linguistic()
        .unwrap()
        .annotate("Hallo Welt.", &AnnotateOptions::default())
        .map_err(|e| SatzbauError::internal(e.to_string()))?;
    assert_eq!(doc.sentences.len(), 1);
    pipeline
        .process("Hallo Welt.", "de", &AnalysisOptions::default())
        .await?;

    // 4. Released handles can be unloaded
    manager.release(handle);
    manager.unload(ModelKind::Linguistic, "de")?;
    assert!(!manager.is_loaded(ModelKind::Linguistic, "de"));
    assert!(matches!(
        manager.unload(ModelKind::Linguistic, "de"),
        Err(SatzbauError::ModelNotLoaded(_))
    ));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancelled_request_releases_references() {
    let loader = Arc::new(SlowLoader::new(Duration::from_millis(300)));
    let pipeline = Arc::new(Pipeline::new(PipelineConfig::default(), loader.clone()).unwrap());

    // Cancel while the models are still loading.
    let task_pipeline = Arc::clone(&pipeline);
    let task = tokio::spawn(async move {
        task_pipeline
            .process("Das ist ein Fehler.", "de", &AnalysisOptions::default())
            .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    // The loads finish in the background; nothing stays referenced.
    tokio::time::sleep(Duration::from_millis(600)).await;
    let status = pipeline.status();
    assert_eq!(status.len(), 2);
    assert!(status.iter().all(|s| s.ref_count == 0));
    assert_eq!(pipeline.manager().loading_count(), 0);

    assert_ok!(pipeline.manager().unload(ModelKind::Grammar, "de"));
    assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_load_timeout_is_per_caller() {
    let loader = Arc::new(SlowLoader::new(Duration::from_millis(400)));
    let config = PipelineConfig::builder()
        .add_language("de", "de-ud", "de-DE")
        .load_timeout(Duration::from_millis(50))
        .build()
        .unwrap();
    let manager = ModelManager::new(
        config.model_catalog(),
        loader.clone(),
        config.limits.cache_limits(),
    );
    let pipeline = Pipeline::with_manager(config, manager.clone()).unwrap();

    // Both processors time out waiting: the request fails as a whole.
    let err = pipeline
        .process("Das ist gut.", "de", &AnalysisOptions::default())
        .await
        .unwrap_err();
    match err {
        SatzbauError::PipelineFailure {
            linguistic,
            grammar,
        } => {
            assert!(matches!(*linguistic, SatzbauError::ModelLoadTimeout { .. }));
            assert!(matches!(*grammar, SatzbauError::ModelLoadTimeout { .. }));
        }
        other => panic!("expected PipelineFailure, got {other:?}"),
    }

    // The loads were not aborted; a patient caller gets the same models.
    let handle = manager
        .acquire_with_timeout(ModelKind::Grammar, "de", Duration::from_secs(5))
        .await
        .unwrap();
    assert!(handle.grammar().is_some());
    drop(handle);

    tokio::time::sleep(Duration::from_millis(500)).await;
    let result = pipeline
        .process("Das ist gut.", "de", &AnalysisOptions::default())
        .await
        .unwrap();
    assert!(!result.metadata.is_partial());
    assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shared_manager_must_cover_configured_languages() {
    let loader = Arc::new(BuiltinModelLoader::new());

    // 1. A manager that only knows the linguistic model is rejected
    let mut catalog = HashMap::new();
    catalog.insert(ModelKey::new(ModelKind::Linguistic, "de"), "de-ud".to_string());
    let partial = ModelManager::new(catalog.clone(), loader.clone(), CacheLimits::default());
    let err = Pipeline::with_manager(PipelineConfig::default(), partial).unwrap_err();
    assert!(matches!(err, SatzbauError::InvalidConfig(ref msg) if msg.contains("grammar")));

    // 2. With both kinds it is accepted and serves requests
    catalog.insert(ModelKey::new(ModelKind::Grammar, "de"), "de-DE".to_string());
    let full = ModelManager::new(catalog, loader, CacheLimits::default());
    let pipeline = Pipeline::with_manager(PipelineConfig::default(), full).unwrap();
    let result = pipeline
        .process("Das ist gut.", "de", &AnalysisOptions::default())
        .await
        .unwrap();
    assert!(!result.metadata.is_partial());
}
