//! Linguistic processor: tokens, sentences, tags, lemmas, morphology and
//! dependency trees.
//!
//! The statistical annotator reports CoNLL-U shaped [`RawDocument`]s. This
//! module turns them into [`Sentence`]s whose spans are checked against the
//! analysed text: in range, non-empty, strictly increasing and
//! non-overlapping. Missing offsets are recovered by aligning surface forms
//! against the text. Dependency trees must have exactly one root per
//! sentence and no cycles. Anything else is an
//! [`AnalysisFailure`](SatzbauError::AnalysisFailure).

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use log::debug;

use crate::data::{DependencyRelation, Governor, Sentence, Span, Token};
use crate::error::{ProcessorKind, Result, SatzbauError};
use crate::model::manager::ModelManager;
use crate::model::{AnnotateOptions, ModelKind, RawDocument, RawWord};
use crate::processor::run_blocking;

const PROCESSOR: ProcessorKind = ProcessorKind::Linguistic;

/// Wraps the statistical annotator.
#[derive(Debug, Clone)]
pub struct LinguisticProcessor {
    manager: ModelManager,
}

impl LinguisticProcessor {
    pub fn new(manager: ModelManager) -> Self {
        Self { manager }
    }

    /// Analyse `text` (already preprocessed) with the model for `language`.
    ///
    /// Spans in the result are char offsets into `text`. The model handle is
    /// released when the engine call finishes, whatever its outcome.
    pub async fn analyze(
        &self,
        text: &str,
        language: &str,
        options: AnnotateOptions,
    ) -> Result<Vec<Sentence>> {
        let handle = self.manager.acquire(ModelKind::Linguistic, language).await?;
        let model = handle
            .linguistic()
            .cloned()
            .ok_or_else(|| SatzbauError::internal(format!("{} is not linguistic", handle.key())))?;

        let owned = text.to_string();
        let started = Instant::now();
        let raw = run_blocking(PROCESSOR, move || {
            let result = model
                .annotate(&owned, &options)
                .map_err(|err| SatzbauError::analysis_failure(PROCESSOR, err));
            drop(handle);
            result
        })
        .await?;
        debug!(
            "annotated {} sentences in {:?}",
            raw.sentences.len(),
            started.elapsed()
        );

        normalize_document(text, raw, options.dependency_parse)
    }
}

/// Convert engine output into validated sentences over `text`.
pub fn normalize_document(
    text: &str,
    raw: RawDocument,
    dependency_parse: bool,
) -> Result<Vec<Sentence>> {
    let chars: Vec<char> = text.chars().collect();
    let mut cursor = 0;
    let mut sentences = Vec::with_capacity(raw.sentences.len());

    for (si, raw_sentence) in raw.sentences.into_iter().enumerate() {
        if raw_sentence.words.is_empty() {
            continue;
        }

        let mut spans = Vec::with_capacity(raw_sentence.words.len());
        for word in &raw_sentence.words {
            let span = locate(&chars, word, cursor)?;
            cursor = span.end;
            spans.push(span);
        }

        let dependencies = if dependency_parse {
            build_tree(si, &raw_sentence.words)?
        } else {
            Vec::new()
        };

        let tokens: Vec<Token> = raw_sentence
            .words
            .into_iter()
            .zip(spans)
            .enumerate()
            .map(|(index, (word, span))| to_token(word, span, index))
            .collect();

        let span = Span::new(tokens[0].span.start, tokens[tokens.len() - 1].span.end);
        sentences.push(Sentence {
            text: chars[span.start..span.end].iter().collect(),
            span,
            tokens,
            dependencies,
        });
    }
    Ok(sentences)
}

/// Span of `word`, from its reported offsets or by alignment from `cursor`.
fn locate(chars: &[char], word: &RawWord, cursor: usize) -> Result<Span> {
    let span = match (word.start_char, word.end_char) {
        (Some(start), Some(end)) => Span::new(start, end),
        _ => align(chars, &word.text, cursor).ok_or_else(|| {
            SatzbauError::analysis(
                PROCESSOR,
                format!("cannot align token {:?} after offset {cursor}", word.text),
            )
        })?,
    };

    if !span.is_valid_for(chars.len()) {
        return Err(SatzbauError::analysis(
            PROCESSOR,
            format!(
                "token {:?} has span {span} outside text of {} chars",
                word.text,
                chars.len()
            ),
        ));
    }
    if span.start < cursor {
        return Err(SatzbauError::analysis(
            PROCESSOR,
            format!(
                "token {:?} at {span} overlaps or precedes offset {cursor}",
                word.text
            ),
        ));
    }
    Ok(span)
}

fn align(chars: &[char], surface: &str, from: usize) -> Option<Span> {
    let needle: Vec<char> = surface.chars().collect();
    if needle.is_empty() || from > chars.len() {
        return None;
    }
    let mut start = from;
    while start < chars.len() && chars[start].is_whitespace() {
        start += 1;
    }
    if chars[start..].starts_with(&needle) {
        return Some(Span::new(start, start + needle.len()));
    }
    chars[start..]
        .windows(needle.len())
        .position(|w| w == needle.as_slice())
        .map(|pos| Span::new(start + pos, start + pos + needle.len()))
}

fn to_token(word: RawWord, span: Span, index: usize) -> Token {
    let lemma = match word.lemma {
        Some(lemma) if !lemma.is_empty() && lemma != "_" => lemma,
        _ => word.text.clone(),
    };
    let pos = match word.upos {
        Some(upos) if !upos.is_empty() && upos != "_" => upos,
        _ => "X".to_string(),
    };
    Token {
        morphology: parse_feats(word.feats.as_deref()),
        xpos: word.xpos.filter(|x| !x.is_empty() && x != "_"),
        text: word.text,
        span,
        lemma,
        pos,
        index,
    }
}

/// Parse `Case=Nom|Gender=Masc` into a map. `_` and empty mean no features.
pub fn parse_feats(feats: Option<&str>) -> BTreeMap<String, String> {
    let Some(feats) = feats.map(str::trim) else {
        return BTreeMap::new();
    };
    if feats.is_empty() || feats == "_" {
        return BTreeMap::new();
    }
    feats
        .split('|')
        .filter_map(|pair| pair.split_once('='))
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

/// Build and validate the dependency tree of one sentence.
fn build_tree(sentence: usize, words: &[RawWord]) -> Result<Vec<DependencyRelation>> {
    // CoNLL-U ids are 1-based; a missing id means "position in sentence".
    let mut index_of = HashMap::with_capacity(words.len());
    for (idx, word) in words.iter().enumerate() {
        let id = if word.id == 0 { idx + 1 } else { word.id };
        if index_of.insert(id, idx).is_some() {
            return Err(tree_error(sentence, format!("duplicate word id {id}")));
        }
    }

    let mut relations = Vec::with_capacity(words.len());
    for (dependent, word) in words.iter().enumerate() {
        let governor = match word.head {
            None => {
                return Err(tree_error(
                    sentence,
                    format!("token {:?} has no head", word.text),
                ));
            }
            Some(0) => Governor::Root,
            Some(head) => match index_of.get(&head) {
                Some(&idx) if idx != dependent => Governor::Token(idx),
                Some(_) => {
                    return Err(tree_error(
                        sentence,
                        format!("token {:?} governs itself", word.text),
                    ));
                }
                None => {
                    return Err(tree_error(
                        sentence,
                        format!("token {:?} has unknown head {head}", word.text),
                    ));
                }
            },
        };
        let relation = match &word.deprel {
            Some(rel) if !rel.is_empty() && rel != "_" => rel.clone(),
            _ => "dep".to_string(),
        };
        relations.push(DependencyRelation {
            governor,
            dependent,
            relation,
        });
    }

    let roots = relations
        .iter()
        .filter(|rel| rel.governor == Governor::Root)
        .count();
    if roots != 1 {
        return Err(tree_error(sentence, format!("expected one root, found {roots}")));
    }

    // Every chain of heads must reach the root within `len` steps.
    for start in 0..relations.len() {
        let mut current = start;
        let mut steps = 0;
        while let Governor::Token(next) = relations[current].governor {
            current = next;
            steps += 1;
            if steps > relations.len() {
                return Err(tree_error(
                    sentence,
                    format!("cycle through token {start}"),
                ));
            }
        }
    }
    Ok(relations)
}

fn tree_error(sentence: usize, msg: String) -> SatzbauError {
    SatzbauError::analysis(
        PROCESSOR,
        format!("invalid dependency tree in sentence {sentence}: {msg}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawSentence;

    fn word(id: usize, text: &str, head: usize, deprel: &str) -> RawWord {
        RawWord {
            id,
            text: text.into(),
            head: Some(head),
            deprel: Some(deprel.into()),
            ..RawWord::default()
        }
    }

    fn das_ist_ein_fehler() -> RawDocument {
        RawDocument {
            sentences: vec![RawSentence {
                words: vec![
                    RawWord {
                        lemma: Some("der".into()),
                        upos: Some("PRON".into()),
                        feats: Some("Case=Nom|Gender=Neut|Number=Sing|PronType=Dem".into()),
                        ..word(1, "Das", 4, "nsubj")
                    },
                    RawWord {
                        lemma: Some("sein".into()),
                        upos: Some("AUX".into()),
                        xpos: Some("VAFIN".into()),
                        ..word(2, "ist", 4, "cop")
                    },
                    word(3, "ein", 4, "det"),
                    RawWord {
                        upos: Some("NOUN".into()),
                        ..word(4, "Fehler", 0, "root")
                    },
                    word(5, ".", 4, "punct"),
                ],
            }],
        }
    }

    #[test]
    fn test_alignment_without_offsets() {
        let text = "Das ist ein Fehler.";
        let sentences = normalize_document(text, das_ist_ein_fehler(), true).unwrap();
        assert_eq!(sentences.len(), 1);

        let s = &sentences[0];
        let surfaces: Vec<&str> = s.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(surfaces, vec!["Das", "ist", "ein", "Fehler", "."]);
        let spans: Vec<(usize, usize)> = s.tokens.iter().map(|t| (t.span.start, t.span.end)).collect();
        assert_eq!(spans, vec![(0, 3), (4, 7), (8, 11), (12, 18), (18, 19)]);
        assert_eq!(s.span, Span::new(0, 19));
        assert_eq!(s.text, text);
    }

    #[test]
    fn test_token_fields_are_normalized() {
        let sentences =
            normalize_document("Das ist ein Fehler.", das_ist_ein_fehler(), true).unwrap();
        let tokens = &sentences[0].tokens;

        assert_eq!(tokens[0].lemma, "der");
        assert_eq!(tokens[0].morphology.len(), 4);
        assert_eq!(tokens[0].morphology["Case"], "Nom");
        assert_eq!(tokens[1].xpos.as_deref(), Some("VAFIN"));
        // Missing lemma and tag fall back.
        assert_eq!(tokens[2].lemma, "ein");
        assert_eq!(tokens[2].pos, "X");
        assert!(tokens[2].morphology.is_empty());
        assert_eq!(tokens[4].index, 4);
    }

    #[test]
    fn test_dependency_tree() {
        let sentences =
            normalize_document("Das ist ein Fehler.", das_ist_ein_fehler(), true).unwrap();
        let s = &sentences[0];
        assert_eq!(s.dependencies.len(), 5);
        let root = s.root().unwrap();
        assert_eq!(root.dependent, 3);
        assert_eq!(s.head_of(0).unwrap().governor, Governor::Token(3));
        assert_eq!(s.head_of(4).unwrap().relation, "punct");
    }

    #[test]
    fn test_dependency_parse_disabled() {
        let mut doc = das_ist_ein_fehler();
        for w in &mut doc.sentences[0].words {
            w.head = None;
        }
        let sentences = normalize_document("Das ist ein Fehler.", doc, false).unwrap();
        assert!(sentences[0].dependencies.is_empty());
    }

    #[test]
    fn test_reported_offsets_are_used() {
        let text = "Ja  nein";
        let doc = RawDocument {
            sentences: vec![RawSentence {
                words: vec![
                    RawWord {
                        start_char: Some(0),
                        end_char: Some(2),
                        ..word(1, "Ja", 0, "root")
                    },
                    RawWord {
                        start_char: Some(4),
                        end_char: Some(8),
                        ..word(2, "nein", 1, "dep")
                    },
                ],
            }],
        };
        let s = &normalize_document(text, doc, true).unwrap()[0];
        assert_eq!(s.tokens[1].span, Span::new(4, 8));
    }

    #[test]
    fn test_bad_spans_fail() {
        let overlapping = RawDocument {
            sentences: vec![RawSentence {
                words: vec![
                    RawWord {
                        start_char: Some(0),
                        end_char: Some(3),
                        ..word(1, "Das", 0, "root")
                    },
                    RawWord {
                        start_char: Some(2),
                        end_char: Some(5),
                        ..word(2, "s i", 1, "dep")
                    },
                ],
            }],
        };
        let err = normalize_document("Das ist", overlapping, true).unwrap_err();
        assert!(matches!(
            err,
            SatzbauError::AnalysisFailure {
                processor: ProcessorKind::Linguistic,
                ..
            }
        ));

        let out_of_range = RawDocument {
            sentences: vec![RawSentence {
                words: vec![RawWord {
                    start_char: Some(0),
                    end_char: Some(40),
                    ..word(1, "Das", 0, "root")
                }],
            }],
        };
        assert!(normalize_document("Das ist", out_of_range, true).is_err());

        let unalignable = RawDocument {
            sentences: vec![RawSentence {
                words: vec![word(1, "Haus", 0, "root")],
            }],
        };
        assert!(normalize_document("Das ist", unalignable, true).is_err());
    }

    #[test]
    fn test_invalid_trees_fail() {
        let two_roots = RawDocument {
            sentences: vec![RawSentence {
                words: vec![word(1, "Ja", 0, "root"), word(2, "nein", 0, "root")],
            }],
        };
        assert!(normalize_document("Ja nein", two_roots, true).is_err());

        let cycle = RawDocument {
            sentences: vec![RawSentence {
                words: vec![
                    word(1, "a", 0, "root"),
                    word(2, "b", 3, "dep"),
                    word(3, "c", 2, "dep"),
                ],
            }],
        };
        let err = normalize_document("a b c", cycle, true).unwrap_err();
        assert!(err.to_string().contains("cycle"));

        let dangling = RawDocument {
            sentences: vec![RawSentence {
                words: vec![word(1, "a", 0, "root"), word(2, "b", 9, "dep")],
            }],
        };
        assert!(normalize_document("a b", dangling, true).is_err());
    }

    #[test]
    fn test_parse_feats() {
        assert!(parse_feats(None).is_empty());
        assert!(parse_feats(Some("_")).is_empty());
        let feats = parse_feats(Some("Number=Plur|Case=Dat|broken"));
        assert_eq!(feats.len(), 2);
        assert_eq!(feats.keys().collect::<Vec<_>>(), vec!["Case", "Number"]);
    }

    #[test]
    fn test_multiple_sentences_share_one_cursor() {
        let doc = RawDocument {
            sentences: vec![
                RawSentence {
                    words: vec![word(1, "Ja", 0, "root"), word(2, ".", 1, "punct")],
                },
                RawSentence { words: vec![] },
                RawSentence {
                    words: vec![word(1, "Ja", 0, "root"), word(2, "!", 1, "punct")],
                },
            ],
        };
        let sentences = normalize_document("Ja. Ja!", doc, true).unwrap();
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[1].span, Span::new(4, 7));
        assert_eq!(sentences[1].text, "Ja!");
    }
}
