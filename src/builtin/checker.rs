//! Rule-based German checker.

use lazy_static::lazy_static;
use regex::Regex;

use crate::builtin::CharOffsets;
use crate::builtin::lexicon;
use crate::error::EngineError;
use crate::model::{GrammarModel, RawMatch};
use crate::util::levenshtein;

pub const WORD_REPEAT_RULE: &str = "GERMAN_WORD_REPEAT_RULE";
pub const SENTENCE_START_RULE: &str = "UPPERCASE_SENTENCE_START";
pub const PUNCTUATION_WHITESPACE_RULE: &str = "COMMA_PARENTHESIS_WHITESPACE";
pub const SPELLER_RULE: &str = "GERMAN_SPELLER_RULE";

/// Edit distance up to which vocabulary words are offered as extra
/// speller suggestions.
const MAX_SUGGESTION_DISTANCE: usize = 2;

lazy_static! {
    static ref WORD: Regex = Regex::new(r"\p{L}[\p{L}\p{M}\p{N}'-]*").unwrap();
    static ref SENTENCE_START: Regex =
        Regex::new(r"(?:^|[.!?]\s+)(\p{Ll}[\p{L}\p{M}]*)").unwrap();
    static ref SPACE_BEFORE_PUNCT: Regex = Regex::new(r"[ \t]+([,.;:!?)])").unwrap();
}

/// Four rules: repeated words (style), lowercase sentence start (grammar),
/// whitespace before punctuation (punctuation) and a misspelling table
/// (spelling).
#[derive(Debug, Default)]
pub struct SimpleGermanChecker;

impl SimpleGermanChecker {
    pub fn new() -> Self {
        Self
    }
}

impl GrammarModel for SimpleGermanChecker {
    fn check(&self, text: &str) -> Result<Vec<RawMatch>, EngineError> {
        let offsets = CharOffsets::new(text);
        let mut matches = Vec::new();
        word_repeats(text, &offsets, &mut matches);
        sentence_starts(text, &offsets, &mut matches);
        punctuation_whitespace(text, &offsets, &mut matches);
        misspellings(text, &offsets, &mut matches);
        Ok(matches)
    }

    fn memory_footprint(&self) -> u64 {
        lexicon::footprint()
    }
}

fn raw_match(
    offsets: &CharOffsets,
    start_byte: usize,
    end_byte: usize,
    rule_id: &str,
    category_id: &str,
    message: &str,
    replacements: Vec<String>,
) -> RawMatch {
    let offset = offsets.char_at(start_byte);
    RawMatch {
        offset,
        length: offsets.char_at(end_byte) - offset,
        message: message.to_string(),
        replacements,
        rule_id: rule_id.to_string(),
        category_id: Some(category_id.to_string()),
        issue_type: None,
    }
}

fn word_repeats(text: &str, offsets: &CharOffsets, out: &mut Vec<RawMatch>) {
    let words: Vec<regex::Match<'_>> = WORD.find_iter(text).collect();
    for pair in words.windows(2) {
        let (first, second) = (pair[0], pair[1]);
        let gap = &text[first.end()..second.start()];
        if gap.is_empty() || !gap.chars().all(char::is_whitespace) {
            continue;
        }
        if first.as_str().to_lowercase() == second.as_str().to_lowercase() {
            out.push(raw_match(
                offsets,
                first.start(),
                second.end(),
                WORD_REPEAT_RULE,
                "REPETITIONS_STYLE",
                "Möglicher Tippfehler: ein Wort wird wiederholt.",
                vec![first.as_str().to_string()],
            ));
        }
    }
}

fn sentence_starts(text: &str, offsets: &CharOffsets, out: &mut Vec<RawMatch>) {
    for caps in SENTENCE_START.captures_iter(text) {
        let (Some(whole), Some(word)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        // Text after an ellipsis may continue the sentence.
        if text[..whole.start()].ends_with('.') {
            continue;
        }
        out.push(raw_match(
            offsets,
            word.start(),
            word.end(),
            SENTENCE_START_RULE,
            "CASING",
            "Dieser Satz fängt nicht mit einem großen Buchstaben an.",
            vec![capitalize(word.as_str())],
        ));
    }
}

fn punctuation_whitespace(text: &str, offsets: &CharOffsets, out: &mut Vec<RawMatch>) {
    for caps in SPACE_BEFORE_PUNCT.captures_iter(text) {
        let (Some(whole), Some(punct)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        // " ..." is an ellipsis, not a misplaced period.
        if punct.as_str() == "." && text[whole.end()..].starts_with('.') {
            continue;
        }
        out.push(raw_match(
            offsets,
            whole.start(),
            whole.end(),
            PUNCTUATION_WHITESPACE_RULE,
            "TYPOGRAPHY",
            "Vor dem Satzzeichen sollte kein Leerzeichen stehen.",
            vec![punct.as_str().to_string()],
        ));
    }
}

fn misspellings(text: &str, offsets: &CharOffsets, out: &mut Vec<RawMatch>) {
    for word in WORD.find_iter(text) {
        let lower = word.as_str().to_lowercase();
        let Some(correct) = lexicon::correction(&lower) else {
            continue;
        };
        let capitalized = word.as_str().chars().next().is_some_and(char::is_uppercase);
        let adjust = |s: &str| {
            if capitalized {
                capitalize(s)
            } else {
                s.to_string()
            }
        };

        let mut nearby: Vec<(usize, &str)> = lexicon::vocabulary()
            .iter()
            .filter(|candidate| !candidate.eq_ignore_ascii_case(correct))
            .map(|candidate| (levenshtein(&lower, &candidate.to_lowercase()), *candidate))
            .filter(|(distance, _)| *distance <= MAX_SUGGESTION_DISTANCE)
            .collect();
        nearby.sort();

        let mut replacements = vec![adjust(correct)];
        replacements.extend(nearby.into_iter().map(|(_, candidate)| adjust(candidate)));

        out.push(raw_match(
            offsets,
            word.start(),
            word.end(),
            SPELLER_RULE,
            "TYPOS",
            "Möglicher Tippfehler gefunden.",
            replacements,
        ));
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(text: &str) -> Vec<RawMatch> {
        SimpleGermanChecker::new().check(text).unwrap()
    }

    #[test]
    fn test_clean_sentence_has_no_matches() {
        assert!(check("Das ist ein Fehler.").is_empty());
        assert!(check("Na ja ... mal sehen.").is_empty());
    }

    #[test]
    fn test_word_repeat() {
        let matches = check("Das ist der der Hund.");
        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        assert_eq!(m.rule_id, WORD_REPEAT_RULE);
        assert_eq!((m.offset, m.length), (8, 7));
        assert_eq!(m.replacements, vec!["der"]);
    }

    #[test]
    fn test_sentence_start() {
        let matches = check("Gut. das war es.");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].rule_id, SENTENCE_START_RULE);
        assert_eq!(matches[0].offset, 5);
        assert_eq!(matches[0].replacements, vec!["Das"]);

        let matches = check("über alles");
        assert_eq!(matches[0].replacements, vec!["Über"]);
    }

    #[test]
    fn test_space_before_punctuation() {
        let matches = check("Ja , genau .");
        let rules: Vec<_> = matches.iter().map(|m| (m.rule_id.as_str(), m.offset, m.length)).collect();
        assert_eq!(
            rules,
            vec![
                (PUNCTUATION_WHITESPACE_RULE, 2, 2),
                (PUNCTUATION_WHITESPACE_RULE, 10, 2),
            ]
        );
    }

    #[test]
    fn test_speller() {
        let matches = check("Das ist vieleicht ein Poblem.");
        assert_eq!(matches.len(), 2);

        let first = &matches[0];
        assert_eq!(first.rule_id, SPELLER_RULE);
        assert_eq!(first.category_id.as_deref(), Some("TYPOS"));
        assert_eq!((first.offset, first.length), (8, 9));
        assert_eq!(first.replacements[0], "vielleicht");

        let second = &matches[1];
        assert_eq!(second.replacements[0], "Problem");
    }

    #[test]
    fn test_offsets_are_chars() {
        let matches = check("Größe über über alles.");
        assert_eq!(matches.len(), 1);
        assert_eq!((matches[0].offset, matches[0].length), (6, 9));
    }
}
