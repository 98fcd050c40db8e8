//! Grammar processor: spelling, grammar, style and punctuation issues.
//!
//! Checker matches are mapped onto the closed [`IssueCategory`] set, filtered
//! by the requested categories and sorted by span start, then span length.
//! Overlapping matches are kept as separate issues.

use std::collections::BTreeSet;
use std::time::Instant;

use log::{debug, warn};

use crate::data::{GrammarIssue, IssueCategory, Span};
use crate::error::{ProcessorKind, Result, SatzbauError};
use crate::model::manager::ModelManager;
use crate::model::{ModelKind, RawMatch};
use crate::processor::run_blocking;

const PROCESSOR: ProcessorKind = ProcessorKind::Grammar;

/// Wraps the rule-based checker.
#[derive(Debug, Clone)]
pub struct GrammarProcessor {
    manager: ModelManager,
    max_suggestions: usize,
}

impl GrammarProcessor {
    pub fn new(manager: ModelManager, max_suggestions: usize) -> Self {
        Self {
            manager,
            max_suggestions,
        }
    }

    /// Check `text` (already preprocessed) with the model for `language`.
    pub async fn check(
        &self,
        text: &str,
        language: &str,
        categories: &BTreeSet<IssueCategory>,
    ) -> Result<Vec<GrammarIssue>> {
        let handle = self.manager.acquire(ModelKind::Grammar, language).await?;
        let model = handle
            .grammar()
            .cloned()
            .ok_or_else(|| SatzbauError::internal(format!("{} is not a grammar model", handle.key())))?;

        let owned = text.to_string();
        let started = Instant::now();
        let matches = run_blocking(PROCESSOR, move || {
            let result = model
                .check(&owned)
                .map_err(|err| SatzbauError::analysis_failure(PROCESSOR, err));
            drop(handle);
            result
        })
        .await?;
        debug!("checker reported {} matches in {:?}", matches.len(), started.elapsed());

        Ok(normalize_matches(
            text.chars().count(),
            matches,
            categories,
            self.max_suggestions,
        ))
    }
}

/// Convert checker matches into sorted, filtered issues over a text of
/// `text_len` chars. Matches with unusable spans are dropped.
pub fn normalize_matches(
    text_len: usize,
    matches: Vec<RawMatch>,
    categories: &BTreeSet<IssueCategory>,
    max_suggestions: usize,
) -> Vec<GrammarIssue> {
    let mut issues: Vec<GrammarIssue> = matches
        .into_iter()
        .filter_map(|m| {
            let span = Span::new(m.offset, m.offset.saturating_add(m.length));
            if !span.is_valid_for(text_len) {
                warn!(
                    "dropping match {} with span {span} outside text of {text_len} chars",
                    m.rule_id
                );
                return None;
            }
            let category = map_category(&m);
            if !categories.contains(&category) {
                return None;
            }
            let mut suggestions = m.replacements;
            suggestions.truncate(max_suggestions);
            Some(GrammarIssue {
                span,
                category,
                message: m.message,
                suggestions,
                rule_id: m.rule_id,
            })
        })
        .collect();

    // Stable: issues sharing start and length keep checker order.
    issues.sort_by_key(|issue| (issue.span.start, issue.span.len()));
    issues
}

/// Map checker metadata onto an [`IssueCategory`].
pub fn map_category(m: &RawMatch) -> IssueCategory {
    let issue_type = m.issue_type.as_deref().unwrap_or("").to_ascii_lowercase();
    let category_id = m.category_id.as_deref().unwrap_or("").to_ascii_uppercase();
    let rule_id = m.rule_id.to_ascii_uppercase();

    if issue_type == "misspelling"
        || matches!(category_id.as_str(), "TYPOS" | "SPELLING")
        || rule_id.contains("SPELL")
        || rule_id.contains("MORFOLOGIK")
    {
        return IssueCategory::Spelling;
    }
    if issue_type == "typographical" || matches!(category_id.as_str(), "PUNCTUATION" | "TYPOGRAPHY")
    {
        return IssueCategory::Punctuation;
    }
    if issue_type == "style"
        || matches!(
            category_id.as_str(),
            "STYLE" | "REDUNDANCY" | "COLLOQUIALISMS" | "REPETITIONS_STYLE"
        )
    {
        return IssueCategory::Style;
    }
    IssueCategory::Grammar
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(offset: usize, length: usize, rule_id: &str, category_id: &str) -> RawMatch {
        RawMatch {
            offset,
            length,
            message: format!("{rule_id} at {offset}"),
            replacements: Vec::new(),
            rule_id: rule_id.into(),
            category_id: Some(category_id.into()),
            issue_type: None,
        }
    }

    #[test]
    fn test_category_mapping() {
        assert_eq!(
            map_category(&raw(0, 1, "GERMAN_SPELLER_RULE", "TYPOS")),
            IssueCategory::Spelling
        );
        assert_eq!(
            map_category(&raw(0, 1, "MORFOLOGIK_RULE_DE_DE", "MISC")),
            IssueCategory::Spelling
        );
        assert_eq!(
            map_category(&raw(0, 1, "COMMA_PARENTHESIS_WHITESPACE", "TYPOGRAPHY")),
            IssueCategory::Punctuation
        );
        assert_eq!(
            map_category(&raw(0, 1, "GERMAN_WORD_REPEAT_RULE", "REPETITIONS_STYLE")),
            IssueCategory::Style
        );
        assert_eq!(
            map_category(&raw(0, 1, "DE_AGREEMENT", "GRAMMAR")),
            IssueCategory::Grammar
        );

        let misspelling = RawMatch {
            issue_type: Some("misspelling".into()),
            category_id: None,
            ..raw(0, 1, "X", "")
        };
        assert_eq!(map_category(&misspelling), IssueCategory::Spelling);
    }

    #[test]
    fn test_sorted_by_start_then_length_without_dedup() {
        let matches = vec![
            raw(10, 4, "B", "GRAMMAR"),
            raw(2, 6, "LONG", "GRAMMAR"),
            raw(2, 3, "SHORT", "GRAMMAR"),
            raw(10, 4, "A", "GRAMMAR"),
        ];
        let issues = normalize_matches(20, matches, &IssueCategory::all(), 5);
        let rules: Vec<&str> = issues.iter().map(|i| i.rule_id.as_str()).collect();
        assert_eq!(rules, vec!["SHORT", "LONG", "B", "A"]);
    }

    #[test]
    fn test_invalid_spans_are_dropped() {
        let matches = vec![
            raw(0, 0, "EMPTY", "GRAMMAR"),
            raw(8, 5, "PAST_END", "GRAMMAR"),
            raw(usize::MAX, 2, "OVERFLOW", "GRAMMAR"),
            raw(3, 2, "OK", "GRAMMAR"),
        ];
        let issues = normalize_matches(10, matches, &IssueCategory::all(), 5);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule_id, "OK");
    }

    #[test]
    fn test_category_filter_and_suggestion_limit() {
        let mut typo = raw(0, 4, "GERMAN_SPELLER_RULE", "TYPOS");
        typo.replacements = (0..8).map(|i| format!("s{i}")).collect();
        let matches = vec![typo, raw(5, 1, "COMMA", "PUNCTUATION")];

        let only_spelling: BTreeSet<_> = [IssueCategory::Spelling].into_iter().collect();
        let issues = normalize_matches(10, matches, &only_spelling, 3);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].category, IssueCategory::Spelling);
        assert_eq!(issues[0].suggestions, vec!["s0", "s1", "s2"]);
    }
}
