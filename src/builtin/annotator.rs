//! Rule-based German annotator.

use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

use crate::builtin::CharOffsets;
use crate::builtin::lexicon::{self, Entry};
use crate::error::EngineError;
use crate::model::{AnnotateOptions, LinguisticModel, RawDocument, RawSentence, RawWord};

/// Tokenizes on Unicode word boundaries, splits sentences at `.`, `!`, `?`
/// and paragraph breaks, tags from the closed-class lexicon plus suffix
/// heuristics, and builds a shallow dependency tree around the first verb.
#[derive(Debug, Default)]
pub struct SimpleGermanAnnotator;

impl SimpleGermanAnnotator {
    pub fn new() -> Self {
        Self
    }
}

impl LinguisticModel for SimpleGermanAnnotator {
    fn annotate(
        &self,
        text: &str,
        options: &AnnotateOptions,
    ) -> Result<RawDocument, EngineError> {
        let offsets = CharOffsets::new(text);
        let mut sentences = Vec::new();
        let mut words: Vec<RawWord> = Vec::new();
        // Newlines seen since the last word; line breaks are segments of their own.
        let mut newlines = 0;

        for (byte, segment) in text.split_word_bound_indices() {
            if segment.chars().all(char::is_whitespace) {
                newlines += segment.matches('\n').count();
                if newlines >= 2 && !words.is_empty() {
                    sentences.push(finish_sentence(std::mem::take(&mut words), options));
                }
                continue;
            }
            newlines = 0;

            let start = offsets.char_at(byte);
            let end = offsets.char_at(byte + segment.len());
            let mut word = tag(segment, words.is_empty());
            word.id = words.len() + 1;
            word.start_char = Some(start);
            word.end_char = Some(end);
            let ends_sentence = matches!(segment, "." | "!" | "?");
            words.push(word);

            if ends_sentence {
                sentences.push(finish_sentence(std::mem::take(&mut words), options));
            }
        }
        if !words.is_empty() {
            sentences.push(finish_sentence(words, options));
        }
        Ok(RawDocument { sentences })
    }

    fn memory_footprint(&self) -> u64 {
        lexicon::footprint()
    }
}

fn tag(surface: &str, sentence_initial: bool) -> RawWord {
    let lower: String = surface.nfc().collect::<String>().to_lowercase();
    let entry = lexicon::lookup(&lower)
        .copied()
        .unwrap_or_else(|| guess(surface, &lower, sentence_initial));
    RawWord {
        text: surface.to_string(),
        lemma: Some(if entry.lemma.is_empty() {
            lemmatize(surface, &lower, entry.upos)
        } else {
            entry.lemma.to_string()
        }),
        upos: Some(entry.upos.to_string()),
        xpos: Some(entry.xpos.to_string()),
        feats: Some(entry.feats.to_string()),
        ..RawWord::default()
    }
}

/// Open-class guess. Returns an entry with an empty lemma to be filled by
/// [`lemmatize`].
fn guess(surface: &str, lower: &str, sentence_initial: bool) -> Entry {
    let open = |upos: &'static str, xpos: &'static str, feats: &'static str| Entry {
        lemma: "",
        upos,
        xpos,
        feats,
    };
    let first = surface.chars().next().unwrap_or(' ');

    if surface.chars().all(|c| c.is_ascii_digit()) {
        return open("NUM", "CARD", "NumType=Card");
    }
    if !first.is_alphanumeric() {
        let xpos = match surface {
            "." | "!" | "?" | ";" | ":" => "$.",
            "," => "$,",
            _ => "$(",
        };
        return open("PUNCT", xpos, "_");
    }
    if first.is_uppercase() && !sentence_initial {
        return open("NOUN", "NN", "_");
    }
    if ["ig", "lich", "isch", "bar", "sam"]
        .iter()
        .any(|suffix| lower.ends_with(suffix))
    {
        return open("ADJ", "ADJD", "Degree=Pos");
    }
    if lower.ends_with("en") || lower.ends_with('t') {
        return open("VERB", "VVFIN", "VerbForm=Fin");
    }
    if first.is_uppercase() {
        // Unknown capitalized sentence-initial word: most likely a noun.
        return open("NOUN", "NN", "_");
    }
    open("ADV", "ADV", "_")
}

fn lemmatize(surface: &str, lower: &str, upos: &str) -> String {
    match upos {
        "VERB" if lower.ends_with("en") => lower.to_string(),
        "VERB" => {
            let stem = lower.strip_suffix('t').unwrap_or(lower);
            if stem.ends_with('e') {
                format!("{stem}n")
            } else {
                format!("{stem}en")
            }
        }
        "NOUN" | "PROPN" | "NUM" | "PUNCT" => surface.to_string(),
        _ => lower.to_string(),
    }
}

fn finish_sentence(mut words: Vec<RawWord>, options: &AnnotateOptions) -> RawSentence {
    retag_pronominal_determiners(&mut words);
    if options.dependency_parse {
        attach(&mut words);
    }
    RawSentence { words }
}

/// A determiner not followed by a nominal is used pronominally ("Das ist").
fn retag_pronominal_determiners(words: &mut [RawWord]) {
    for i in 0..words.len() {
        if upos(&words[i]) != "DET" {
            continue;
        }
        let next_is_nominal = words
            .get(i + 1)
            .is_some_and(|next| matches!(upos(next), "NOUN" | "PROPN" | "ADJ" | "NUM"));
        if !next_is_nominal {
            words[i].upos = Some("PRON".to_string());
            words[i].xpos = Some("PDS".to_string());
        }
    }
}

fn upos(word: &RawWord) -> &str {
    word.upos.as_deref().unwrap_or("X")
}

/// Heads and relations. The first finite verb or auxiliary is the root,
/// falling back to the first noun and then the first word. Determiners,
/// prepositions and adjectives attach to the next noun; everything else
/// attaches to the root.
fn attach(words: &mut [RawWord]) {
    let root = words
        .iter()
        .position(|w| matches!(upos(w), "VERB" | "AUX"))
        .or_else(|| words.iter().position(|w| matches!(upos(w), "NOUN" | "PROPN")))
        .unwrap_or(0);

    let next_noun = |from: usize, words: &[RawWord]| {
        words[from + 1..]
            .iter()
            .position(|w| matches!(upos(w), "NOUN" | "PROPN"))
            .map(|offset| from + 1 + offset)
    };

    let mut heads = Vec::with_capacity(words.len());
    for (i, word) in words.iter().enumerate() {
        if i == root {
            heads.push((0, "root"));
            continue;
        }
        let head_noun = match upos(word) {
            "DET" | "ADP" | "ADJ" => next_noun(i, words),
            _ => None,
        };
        let entry = match (upos(word), head_noun) {
            ("DET", Some(n)) => (n, "det"),
            ("ADP", Some(n)) => (n, "case"),
            ("ADJ", Some(n)) => (n, "amod"),
            ("PUNCT", _) => (root, "punct"),
            ("PRON" | "NOUN" | "PROPN", _) if i < root => (root, "nsubj"),
            ("NOUN" | "PROPN", _) => (root, "obj"),
            ("PRON", _) => (root, "obj"),
            ("ADV" | "PART", _) => (root, "advmod"),
            ("ADJ", _) => (root, "advmod"),
            ("CCONJ", _) => (root, "cc"),
            ("SCONJ", _) => (root, "mark"),
            ("AUX", _) => (root, "aux"),
            _ => (root, "dep"),
        };
        heads.push(entry);
    }

    for (word, (head, rel)) in words.iter_mut().zip(heads) {
        // Heads are 1-based word ids; `root` is an index.
        word.head = Some(if rel == "root" { 0 } else { head + 1 });
        word.deprel = Some(rel.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotate(text: &str) -> RawDocument {
        SimpleGermanAnnotator::new()
            .annotate(text, &AnnotateOptions::default())
            .unwrap()
    }

    #[test]
    fn test_tokens_and_offsets() {
        let doc = annotate("Das ist ein Fehler.");
        assert_eq!(doc.sentences.len(), 1);
        let words = &doc.sentences[0].words;
        let surfaces: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(surfaces, vec!["Das", "ist", "ein", "Fehler", "."]);
        assert_eq!(words[3].start_char, Some(12));
        assert_eq!(words[3].end_char, Some(18));
        assert_eq!(words[4].start_char, Some(18));
    }

    #[test]
    fn test_tags_and_lemmas() {
        let doc = annotate("Das ist ein Fehler.");
        let words = &doc.sentences[0].words;
        assert_eq!(words[0].upos.as_deref(), Some("PRON"));
        assert_eq!(words[1].lemma.as_deref(), Some("sein"));
        assert_eq!(words[2].upos.as_deref(), Some("DET"));
        assert_eq!(words[3].upos.as_deref(), Some("NOUN"));
        assert_eq!(words[4].upos.as_deref(), Some("PUNCT"));

        let doc = annotate("Er macht heute Pause.");
        let macht = &doc.sentences[0].words[1];
        assert_eq!(macht.upos.as_deref(), Some("VERB"));
        assert_eq!(macht.lemma.as_deref(), Some("machen"));
    }

    #[test]
    fn test_dependency_heuristics() {
        let doc = annotate("Das ist ein Fehler.");
        let words = &doc.sentences[0].words;
        // "ist" is the root, "ein" attaches to "Fehler".
        assert_eq!(words[1].head, Some(0));
        assert_eq!(words[2].head, Some(4));
        assert_eq!(words[2].deprel.as_deref(), Some("det"));
        assert_eq!(words[0].deprel.as_deref(), Some("nsubj"));
        assert_eq!(words[4].deprel.as_deref(), Some("punct"));
        assert_eq!(
            words.iter().filter(|w| w.head == Some(0)).count(),
            1
        );
    }

    #[test]
    fn test_sentence_splitting() {
        let doc = annotate("Ich komme. Du bleibst\n\nNeuer Absatz");
        assert_eq!(doc.sentences.len(), 3);
        assert_eq!(doc.sentences[2].words[0].text, "Neuer");
        assert_eq!(doc.sentences[2].words[0].id, 1);
    }

    #[test]
    fn test_no_dependencies_when_disabled() {
        let doc = SimpleGermanAnnotator::new()
            .annotate(
                "Das ist gut.",
                &AnnotateOptions {
                    dependency_parse: false,
                },
            )
            .unwrap();
        assert!(doc.sentences[0].words.iter().all(|w| w.head.is_none()));
    }

    #[test]
    fn test_umlaut_offsets_are_chars() {
        let doc = annotate("Größe über alles.");
        let words = &doc.sentences[0].words;
        assert_eq!(words[1].text, "über");
        assert_eq!(words[1].start_char, Some(6));
        assert_eq!(words[1].end_char, Some(10));
    }
}
