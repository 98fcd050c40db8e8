//! Loader for the built-in engines.

use std::sync::Arc;

use log::debug;

use crate::builtin::annotator::SimpleGermanAnnotator;
use crate::builtin::checker::SimpleGermanChecker;
use crate::error::EngineError;
use crate::model::{LoadRequest, LoadedModel, ModelKind, ModelLoader};

/// Serves [`SimpleGermanAnnotator`] and [`SimpleGermanChecker`] for any
/// model id starting with `de` (`de-ud`, `de-DE`, ...). Other ids fail to load.
#[derive(Debug, Default, Clone)]
pub struct BuiltinModelLoader;

impl BuiltinModelLoader {
    pub fn new() -> Self {
        Self
    }

    pub fn supports(model_id: &str) -> bool {
        model_id
            .get(..2)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("de"))
    }
}

impl ModelLoader for BuiltinModelLoader {
    fn load(&self, request: &LoadRequest) -> Result<LoadedModel, EngineError> {
        if !Self::supports(&request.model_id) {
            return Err(format!(
                "no built-in {} model with id '{}'",
                request.key.kind, request.model_id
            )
            .into());
        }
        debug!("using built-in engine for {}", request.key);
        Ok(match request.key.kind {
            ModelKind::Linguistic => LoadedModel::Linguistic(Arc::new(SimpleGermanAnnotator::new())),
            ModelKind::Grammar => LoadedModel::Grammar(Arc::new(SimpleGermanChecker::new())),
        })
    }
}
