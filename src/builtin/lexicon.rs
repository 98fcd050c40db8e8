//! Closed-class German lexicon and a small misspelling table.
//!
//! Entries carry the most frequent reading only. Ambiguous forms such as
//! `die` or `sie` are not disambiguated.

use ahash::AHashMap;
use lazy_static::lazy_static;

/// One lexicon reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub lemma: &'static str,
    pub upos: &'static str,
    /// STTS tag.
    pub xpos: &'static str,
    /// CoNLL-U feature string, `_` when empty.
    pub feats: &'static str,
}

const fn e(
    lemma: &'static str,
    upos: &'static str,
    xpos: &'static str,
    feats: &'static str,
) -> Entry {
    Entry {
        lemma,
        upos,
        xpos,
        feats,
    }
}

#[rustfmt::skip]
const ENTRIES: &[(&str, Entry)] = &[
    // Definite articles
    ("der", e("der", "DET", "ART", "Case=Nom|Definite=Def|Gender=Masc|Number=Sing|PronType=Art")),
    ("die", e("der", "DET", "ART", "Case=Nom|Definite=Def|Gender=Fem|Number=Sing|PronType=Art")),
    ("das", e("der", "DET", "ART", "Case=Nom|Definite=Def|Gender=Neut|Number=Sing|PronType=Art")),
    ("den", e("der", "DET", "ART", "Case=Acc|Definite=Def|Gender=Masc|Number=Sing|PronType=Art")),
    ("dem", e("der", "DET", "ART", "Case=Dat|Definite=Def|Gender=Masc|Number=Sing|PronType=Art")),
    ("des", e("der", "DET", "ART", "Case=Gen|Definite=Def|Gender=Masc|Number=Sing|PronType=Art")),
    // Indefinite articles
    ("ein", e("ein", "DET", "ART", "Case=Nom|Definite=Ind|Gender=Masc|Number=Sing|PronType=Art")),
    ("eine", e("ein", "DET", "ART", "Case=Nom|Definite=Ind|Gender=Fem|Number=Sing|PronType=Art")),
    ("einen", e("ein", "DET", "ART", "Case=Acc|Definite=Ind|Gender=Masc|Number=Sing|PronType=Art")),
    ("einem", e("ein", "DET", "ART", "Case=Dat|Definite=Ind|Gender=Masc|Number=Sing|PronType=Art")),
    ("einer", e("ein", "DET", "ART", "Case=Dat|Definite=Ind|Gender=Fem|Number=Sing|PronType=Art")),
    ("eines", e("ein", "DET", "ART", "Case=Gen|Definite=Ind|Gender=Masc|Number=Sing|PronType=Art")),
    ("kein", e("kein", "DET", "PIAT", "Case=Nom|Gender=Masc|Number=Sing|PronType=Neg")),
    ("keine", e("kein", "DET", "PIAT", "Case=Nom|Gender=Fem|Number=Sing|PronType=Neg")),
    // Personal pronouns
    ("ich", e("ich", "PRON", "PPER", "Case=Nom|Number=Sing|Person=1|PronType=Prs")),
    ("du", e("du", "PRON", "PPER", "Case=Nom|Number=Sing|Person=2|PronType=Prs")),
    ("er", e("er", "PRON", "PPER", "Case=Nom|Gender=Masc|Number=Sing|Person=3|PronType=Prs")),
    ("sie", e("sie", "PRON", "PPER", "Case=Nom|Gender=Fem|Number=Sing|Person=3|PronType=Prs")),
    ("es", e("es", "PRON", "PPER", "Case=Nom|Gender=Neut|Number=Sing|Person=3|PronType=Prs")),
    ("wir", e("wir", "PRON", "PPER", "Case=Nom|Number=Plur|Person=1|PronType=Prs")),
    ("ihr", e("ihr", "PRON", "PPER", "Case=Nom|Number=Plur|Person=2|PronType=Prs")),
    ("mich", e("ich", "PRON", "PPER", "Case=Acc|Number=Sing|Person=1|PronType=Prs")),
    ("mir", e("ich", "PRON", "PPER", "Case=Dat|Number=Sing|Person=1|PronType=Prs")),
    ("dich", e("du", "PRON", "PPER", "Case=Acc|Number=Sing|Person=2|PronType=Prs")),
    ("dir", e("du", "PRON", "PPER", "Case=Dat|Number=Sing|Person=2|PronType=Prs")),
    ("ihn", e("er", "PRON", "PPER", "Case=Acc|Gender=Masc|Number=Sing|Person=3|PronType=Prs")),
    ("ihm", e("er", "PRON", "PPER", "Case=Dat|Gender=Masc|Number=Sing|Person=3|PronType=Prs")),
    ("uns", e("wir", "PRON", "PPER", "Number=Plur|Person=1|PronType=Prs")),
    ("euch", e("ihr", "PRON", "PPER", "Number=Plur|Person=2|PronType=Prs")),
    ("ihnen", e("sie", "PRON", "PPER", "Case=Dat|Number=Plur|Person=3|PronType=Prs")),
    ("man", e("man", "PRON", "PIS", "Case=Nom|PronType=Ind")),
    // Auxiliaries and modals
    ("bin", e("sein", "AUX", "VAFIN", "Mood=Ind|Number=Sing|Person=1|Tense=Pres|VerbForm=Fin")),
    ("bist", e("sein", "AUX", "VAFIN", "Mood=Ind|Number=Sing|Person=2|Tense=Pres|VerbForm=Fin")),
    ("ist", e("sein", "AUX", "VAFIN", "Mood=Ind|Number=Sing|Person=3|Tense=Pres|VerbForm=Fin")),
    ("sind", e("sein", "AUX", "VAFIN", "Mood=Ind|Number=Plur|Person=3|Tense=Pres|VerbForm=Fin")),
    ("seid", e("sein", "AUX", "VAFIN", "Mood=Ind|Number=Plur|Person=2|Tense=Pres|VerbForm=Fin")),
    ("war", e("sein", "AUX", "VAFIN", "Mood=Ind|Number=Sing|Person=3|Tense=Past|VerbForm=Fin")),
    ("waren", e("sein", "AUX", "VAFIN", "Mood=Ind|Number=Plur|Person=3|Tense=Past|VerbForm=Fin")),
    ("hat", e("haben", "AUX", "VAFIN", "Mood=Ind|Number=Sing|Person=3|Tense=Pres|VerbForm=Fin")),
    ("habe", e("haben", "AUX", "VAFIN", "Mood=Ind|Number=Sing|Person=1|Tense=Pres|VerbForm=Fin")),
    ("haben", e("haben", "AUX", "VAFIN", "Mood=Ind|Number=Plur|Person=3|Tense=Pres|VerbForm=Fin")),
    ("hatte", e("haben", "AUX", "VAFIN", "Mood=Ind|Number=Sing|Person=3|Tense=Past|VerbForm=Fin")),
    ("wird", e("werden", "AUX", "VAFIN", "Mood=Ind|Number=Sing|Person=3|Tense=Pres|VerbForm=Fin")),
    ("werden", e("werden", "AUX", "VAFIN", "Mood=Ind|Number=Plur|Person=3|Tense=Pres|VerbForm=Fin")),
    ("wurde", e("werden", "AUX", "VAFIN", "Mood=Ind|Number=Sing|Person=3|Tense=Past|VerbForm=Fin")),
    ("kann", e("können", "AUX", "VMFIN", "Mood=Ind|Number=Sing|Person=3|Tense=Pres|VerbForm=Fin")),
    ("können", e("können", "AUX", "VMFIN", "Mood=Ind|Number=Plur|Person=3|Tense=Pres|VerbForm=Fin")),
    ("muss", e("müssen", "AUX", "VMFIN", "Mood=Ind|Number=Sing|Person=3|Tense=Pres|VerbForm=Fin")),
    ("will", e("wollen", "AUX", "VMFIN", "Mood=Ind|Number=Sing|Person=3|Tense=Pres|VerbForm=Fin")),
    ("soll", e("sollen", "AUX", "VMFIN", "Mood=Ind|Number=Sing|Person=3|Tense=Pres|VerbForm=Fin")),
    // Prepositions
    ("in", e("in", "ADP", "APPR", "_")),
    ("im", e("in", "ADP", "APPRART", "Case=Dat|Definite=Def|Gender=Masc|Number=Sing")),
    ("an", e("an", "ADP", "APPR", "_")),
    ("am", e("an", "ADP", "APPRART", "Case=Dat|Definite=Def|Gender=Masc|Number=Sing")),
    ("auf", e("auf", "ADP", "APPR", "_")),
    ("aus", e("aus", "ADP", "APPR", "_")),
    ("bei", e("bei", "ADP", "APPR", "_")),
    ("mit", e("mit", "ADP", "APPR", "_")),
    ("nach", e("nach", "ADP", "APPR", "_")),
    ("von", e("von", "ADP", "APPR", "_")),
    ("vom", e("von", "ADP", "APPRART", "Case=Dat|Definite=Def|Gender=Masc|Number=Sing")),
    ("zu", e("zu", "ADP", "APPR", "_")),
    ("zum", e("zu", "ADP", "APPRART", "Case=Dat|Definite=Def|Gender=Masc|Number=Sing")),
    ("zur", e("zu", "ADP", "APPRART", "Case=Dat|Definite=Def|Gender=Fem|Number=Sing")),
    ("für", e("für", "ADP", "APPR", "_")),
    ("über", e("über", "ADP", "APPR", "_")),
    ("unter", e("unter", "ADP", "APPR", "_")),
    ("durch", e("durch", "ADP", "APPR", "_")),
    ("gegen", e("gegen", "ADP", "APPR", "_")),
    ("ohne", e("ohne", "ADP", "APPR", "_")),
    ("um", e("um", "ADP", "APPR", "_")),
    // Conjunctions
    ("und", e("und", "CCONJ", "KON", "_")),
    ("oder", e("oder", "CCONJ", "KON", "_")),
    ("aber", e("aber", "CCONJ", "KON", "_")),
    ("denn", e("denn", "CCONJ", "KON", "_")),
    ("dass", e("dass", "SCONJ", "KOUS", "_")),
    ("weil", e("weil", "SCONJ", "KOUS", "_")),
    ("wenn", e("wenn", "SCONJ", "KOUS", "_")),
    ("ob", e("ob", "SCONJ", "KOUS", "_")),
    ("als", e("als", "SCONJ", "KOKOM", "_")),
    // Particles and adverbs
    ("nicht", e("nicht", "PART", "PTKNEG", "Polarity=Neg")),
    ("sehr", e("sehr", "ADV", "ADV", "_")),
    ("auch", e("auch", "ADV", "ADV", "_")),
    ("noch", e("noch", "ADV", "ADV", "_")),
    ("schon", e("schon", "ADV", "ADV", "_")),
    ("hier", e("hier", "ADV", "ADV", "_")),
    ("dort", e("dort", "ADV", "ADV", "_")),
    ("heute", e("heute", "ADV", "ADV", "_")),
    ("gestern", e("gestern", "ADV", "ADV", "_")),
    ("morgen", e("morgen", "ADV", "ADV", "_")),
    ("vielleicht", e("vielleicht", "ADV", "ADV", "_")),
    ("wahrscheinlich", e("wahrscheinlich", "ADV", "ADV", "_")),
    ("nämlich", e("nämlich", "ADV", "ADV", "_")),
    // Frequent adjectives
    ("gut", e("gut", "ADJ", "ADJD", "Degree=Pos")),
    ("schön", e("schön", "ADJ", "ADJD", "Degree=Pos")),
    ("groß", e("groß", "ADJ", "ADJD", "Degree=Pos")),
    ("klein", e("klein", "ADJ", "ADJD", "Degree=Pos")),
    ("neu", e("neu", "ADJ", "ADJD", "Degree=Pos")),
    ("alt", e("alt", "ADJ", "ADJD", "Degree=Pos")),
    ("separat", e("separat", "ADJ", "ADJD", "Degree=Pos")),
    ("endgültig", e("endgültig", "ADJ", "ADJD", "Degree=Pos")),
];

/// Common misspellings and their correction.
#[rustfmt::skip]
const MISSPELLINGS: &[(&str, &str)] = &[
    ("vieleicht", "vielleicht"),
    ("nähmlich", "nämlich"),
    ("seperat", "separat"),
    ("standart", "Standard"),
    ("warscheinlich", "wahrscheinlich"),
    ("wiederspiegeln", "widerspiegeln"),
    ("entgültig", "endgültig"),
    ("addresse", "Adresse"),
    ("rythmus", "Rhythmus"),
    ("maschiene", "Maschine"),
    ("agressiv", "aggressiv"),
    ("tolleranz", "Toleranz"),
    ("poblem", "Problem"),
    ("fehlr", "Fehler"),
];

/// Correct words the speller suggests alternatives from.
const VOCABULARY: &[&str] = &[
    "Fehler", "Problem", "Adresse", "Maschine", "Standard", "Rhythmus", "Toleranz",
    "aggressiv", "vielleicht", "nämlich", "separat", "wahrscheinlich", "endgültig",
    "widerspiegeln", "Satz", "Text", "Haus", "Hund", "Katze",
];

lazy_static! {
    static ref LEXICON: AHashMap<&'static str, Entry> = ENTRIES.iter().copied().collect();
    static ref MISSPELLED: AHashMap<&'static str, &'static str> =
        MISSPELLINGS.iter().copied().collect();
}

/// Look up a lowercased, NFC-normalized word form.
pub fn lookup(lower: &str) -> Option<&'static Entry> {
    LEXICON.get(lower)
}

/// Correction for a lowercased misspelling.
pub fn correction(lower: &str) -> Option<&'static str> {
    MISSPELLED.get(lower).copied()
}

pub fn vocabulary() -> &'static [&'static str] {
    VOCABULARY
}

/// Rough resident size of the tables in bytes.
pub fn footprint() -> u64 {
    let entry = std::mem::size_of::<(&str, Entry)>();
    ((LEXICON.len() + MISSPELLED.len() + VOCABULARY.len()) * entry) as u64
}
