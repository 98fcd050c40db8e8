//! Per-request stage tracking.

use log::debug;
use serde::Serialize;

use crate::error::{Result, SatzbauError};

/// Stages a request moves through.
///
/// `Received → Preprocessed → {LinguisticDone, GrammarDone} → Merged → Complete`,
/// where the two processor stages may complete in either order and `Failed`
/// can be entered from any non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Received,
    Preprocessed,
    LinguisticDone,
    GrammarDone,
    Merged,
    Complete,
    Failed,
}

impl PipelineStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStage::Complete | PipelineStage::Failed)
    }
}

/// Validated sequence of stages for one request.
#[derive(Debug, Clone)]
pub struct StageTrace {
    stages: Vec<PipelineStage>,
    linguistic_done: bool,
    grammar_done: bool,
}

impl Default for StageTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTrace {
    pub fn new() -> Self {
        Self {
            stages: vec![PipelineStage::Received],
            linguistic_done: false,
            grammar_done: false,
        }
    }

    pub fn current(&self) -> PipelineStage {
        // Never empty: starts with `Received`.
        self.stages
            .last()
            .copied()
            .unwrap_or(PipelineStage::Received)
    }

    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    /// Move to `next`, rejecting transitions the state machine does not allow.
    pub fn advance(&mut self, next: PipelineStage) -> Result<()> {
        use PipelineStage::*;

        let current = self.current();
        let allowed = match (current, next) {
            (from, Failed) => !from.is_terminal(),
            (Received, Preprocessed) => true,
            (Preprocessed | LinguisticDone | GrammarDone, LinguisticDone) => !self.linguistic_done,
            (Preprocessed | LinguisticDone | GrammarDone, GrammarDone) => !self.grammar_done,
            (LinguisticDone | GrammarDone, Merged) => self.linguistic_done && self.grammar_done,
            (Merged, Complete) => true,
            _ => false,
        };
        if !allowed {
            return Err(SatzbauError::internal(format!(
                "invalid pipeline transition {current:?} -> {next:?}"
            )));
        }

        match next {
            LinguisticDone => self.linguistic_done = true,
            GrammarDone => self.grammar_done = true,
            _ => {}
        }
        debug!("pipeline stage {current:?} -> {next:?}");
        self.stages.push(next);
        Ok(())
    }

    /// Enter `Failed` unless already terminal.
    pub fn fail(&mut self) {
        if !self.current().is_terminal() {
            self.stages.push(PipelineStage::Failed);
        }
    }

    pub fn into_stages(self) -> Vec<PipelineStage> {
        self.stages
    }
}
