//! Built-in reference engines for German.
//!
//! Deterministic, rule-based stand-ins for the statistical annotator and the
//! grammar checker. They make the pipeline usable without external model
//! files and give tests a realistic engine to run against. Production
//! deployments plug their own engines in through
//! [`ModelLoader`](crate::model::ModelLoader).

pub mod annotator;
pub mod checker;
pub mod lexicon;
pub mod loader;

/// Byte offset to char offset lookup for one text.
pub(crate) struct CharOffsets {
    /// `table[b]` is the char index of byte `b` (valid at char boundaries).
    table: Vec<usize>,
}

impl CharOffsets {
    pub(crate) fn new(text: &str) -> Self {
        let mut table = vec![0; text.len() + 1];
        let mut chars = 0;
        for (byte, c) in text.char_indices() {
            for slot in &mut table[byte..byte + c.len_utf8()] {
                *slot = chars;
            }
            chars += 1;
        }
        table[text.len()] = chars;
        Self { table }
    }

    pub(crate) fn char_at(&self, byte: usize) -> usize {
        self.table[byte.min(self.table.len() - 1)]
    }
}
