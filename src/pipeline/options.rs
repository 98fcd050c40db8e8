//! Per-request analysis options.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::data::IssueCategory;

/// Options recognized by [`Pipeline::process`](crate::Pipeline::process).
///
/// Deserializes from the request shape
/// `{"includeDependencyParse": true, "grammarCategories": ["spelling"]}`;
/// missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisOptions {
    #[serde(alias = "include_dependency_parse")]
    pub include_dependency_parse: bool,
    /// Issue categories to report. Empty means the grammar check is skipped.
    #[serde(alias = "grammar_categories")]
    pub grammar_categories: BTreeSet<IssueCategory>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            include_dependency_parse: true,
            grammar_categories: IssueCategory::all(),
        }
    }
}

impl AnalysisOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include_dependency_parse(mut self, include: bool) -> Self {
        self.include_dependency_parse = include;
        self
    }

    pub fn grammar_categories(mut self, categories: impl IntoIterator<Item = IssueCategory>) -> Self {
        self.grammar_categories = categories.into_iter().collect();
        self
    }

    pub fn runs_grammar(&self) -> bool {
        !self.grammar_categories.is_empty()
    }
}
