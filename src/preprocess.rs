//! Input normalization and validation.
//!
//! [`TextPreprocessor`] turns raw request text into a [`CleanText`]: line
//! endings normalized, control characters dropped, whitespace runs collapsed
//! and the ends trimmed. Every clean char remembers which raw char it came
//! from so spans computed on the clean text can be mapped back onto the
//! original input.

use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

use crate::data::Span;
use crate::error::{Result, SatzbauError};

/// Normalized text plus its offset map back to the raw input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanText {
    text: String,
    /// `offsets[i]` is the raw char index of clean char `i`.
    /// The last element is a sentinel equal to the raw char length.
    offsets: Vec<usize>,
}

impl CleanText {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in chars.
    pub fn char_len(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Raw char index of clean char `idx` (`idx == char_len()` maps to the raw end).
    pub fn original_offset(&self, idx: usize) -> Option<usize> {
        self.offsets.get(idx).copied()
    }

    /// Map a span over the clean text onto the raw text.
    pub fn to_original(&self, span: Span) -> Option<Span> {
        if span.is_empty() || span.end > self.char_len() {
            return None;
        }
        let start = self.offsets[span.start];
        let end = self.offsets[span.end - 1] + 1;
        Some(Span::new(start, end))
    }
}

/// Non-fatal observations about the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationWarning {
    /// Five or more identical characters in a row.
    RepeatedCharacters,
    /// Ten or more consecutive whitespace characters.
    ExcessiveWhitespace,
    NoLetters,
    /// Contains U+FFFD, usually a sign of a decoding problem upstream.
    ReplacementCharacter,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStats {
    pub char_count: usize,
    pub word_count: usize,
    pub sentence_count: usize,
    pub line_count: usize,
    pub paragraph_count: usize,
}

/// Output of [`TextPreprocessor::preprocess`].
#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub clean: CleanText,
    pub stats: TextStats,
    pub warnings: Vec<ValidationWarning>,
}

#[derive(Debug, Clone)]
pub struct TextPreprocessor {
    max_chars: usize,
}

impl TextPreprocessor {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Validate and normalize `raw`.
    ///
    /// Fails with [`SatzbauError::InputTooLarge`] before doing any work when
    /// the raw input exceeds the limit, and with [`SatzbauError::InputEmpty`]
    /// when nothing but whitespace and control characters remain.
    pub fn preprocess(&self, raw: &str) -> Result<Preprocessed> {
        let length = raw.chars().count();
        if length > self.max_chars {
            return Err(SatzbauError::InputTooLarge {
                length,
                limit: self.max_chars,
            });
        }

        let clean = normalize(raw, length);
        if clean.text.is_empty() {
            return Err(SatzbauError::InputEmpty);
        }

        let stats = text_stats(&clean.text);
        let warnings = validation_warnings(raw);
        Ok(Preprocessed {
            clean,
            stats,
            warnings,
        })
    }
}

impl Default for TextPreprocessor {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_INPUT_CHARS)
    }
}

fn is_dropped_control(c: char) -> bool {
    c.is_control() && c != '\n' && c != '\t' && c != '\r'
}

fn normalize(raw: &str, raw_len: usize) -> CleanText {
    let mut text = String::with_capacity(raw.len());
    let mut offsets = Vec::with_capacity(raw_len + 1);

    // Pending whitespace run: (raw index of its first char, newline count).
    let mut pending: Option<(usize, usize)> = None;
    let mut chars = raw.chars().enumerate().peekable();

    while let Some((idx, c)) = chars.next() {
        if is_dropped_control(c) {
            continue;
        }
        if c.is_whitespace() {
            let is_newline = match c {
                '\n' => true,
                // "\r\n" counts once; a lone "\r" is a newline of its own.
                '\r' => !matches!(chars.peek(), Some((_, '\n'))),
                _ => false,
            };
            let run = pending.get_or_insert((idx, 0));
            if is_newline {
                run.1 += 1;
            }
            continue;
        }

        if let Some((run_start, newlines)) = pending.take() {
            // Leading whitespace is trimmed.
            if !text.is_empty() {
                let replacement: &str = match newlines {
                    0 => " ",
                    1 => "\n",
                    _ => "\n\n",
                };
                for (i, ch) in replacement.chars().enumerate() {
                    text.push(ch);
                    offsets.push(run_start + i);
                }
            }
        }
        text.push(c);
        offsets.push(idx);
    }

    // Trailing whitespace in `pending` is dropped.
    offsets.push(raw_len);
    CleanText { text, offsets }
}

fn text_stats(clean: &str) -> TextStats {
    let sentence_count = clean
        .split(['.', '!', '?'])
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .count();
    TextStats {
        char_count: clean.chars().count(),
        word_count: clean.unicode_words().count(),
        sentence_count,
        line_count: clean.lines().count(),
        paragraph_count: clean.split("\n\n").filter(|p| !p.trim().is_empty()).count(),
    }
}

fn validation_warnings(raw: &str) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let mut prev: Option<char> = None;
    let mut repeat = 0usize;
    let mut whitespace_run = 0usize;
    let mut repeated = false;
    let mut excessive_ws = false;
    for c in raw.chars() {
        if Some(c) == prev {
            repeat += 1;
        } else {
            repeat = 1;
            prev = Some(c);
        }
        if repeat >= 5 && !c.is_whitespace() {
            repeated = true;
        }
        if c.is_whitespace() {
            whitespace_run += 1;
            if whitespace_run >= 10 {
                excessive_ws = true;
            }
        } else {
            whitespace_run = 0;
        }
    }

    if repeated {
        warnings.push(ValidationWarning::RepeatedCharacters);
    }
    if excessive_ws {
        warnings.push(ValidationWarning::ExcessiveWhitespace);
    }
    if !raw.chars().any(char::is_alphabetic) {
        warnings.push(ValidationWarning::NoLetters);
    }
    if raw.contains('\u{FFFD}') {
        warnings.push(ValidationWarning::ReplacementCharacter);
    }
    warnings
}
