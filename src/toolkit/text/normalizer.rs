use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::vocab::{is_stopword, ABBREVIATIONS, DIACRITIC_MAP};

/// Characters that separate independent phrases inside one field value.
pub const PHRASE_DELIMITERS: [char; 5] = [',', ';', '/', '&', '|'];

/// Shortest word emitted alongside its phrase by [`tokenize`].
pub const MIN_WORD_CHARS: usize = 3;

const DASH_VARIANTS: [char; 9] = [
    '\u{2010}', '\u{2011}', '\u{2012}', '\u{2013}', '\u{2014}', '\u{2015}', '\u{2212}',
    '\u{FE63}', '\u{FF0D}',
];

lazy_static! {
    static ref PARENTHESIZED_ASIDE: Regex = Regex::new(r"\([^()]*\)").unwrap();
}

/// Canonical form used for every alias and lookup key.
pub fn normalize(text: &str) -> String {
    let composed: String = text.nfc().collect();
    let lowered = composed.to_lowercase();
    let without_asides = strip_asides(&lowered);
    let folded = fold_diacritics(&without_asides);
    let cleaned = clean_punctuation(&folded);
    cleaned.nfc().collect()
}

/// Normalized, de-duplicated phrases of `text`, split on [`PHRASE_DELIMITERS`].
pub fn split_phrases(text: &str) -> Vec<String> {
    let without_asides = strip_asides(text);
    let mut seen = HashSet::new();

    without_asides
        .split(PHRASE_DELIMITERS)
        .map(normalize)
        .filter(|phrase| !phrase.is_empty() && seen.insert(phrase.clone()))
        .collect()
}

/// Splits on phrase delimiters and emits each normalized phrase plus its longer words.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();

    for phrase in split_phrases(text) {
        let multi_word = phrase.contains(' ');
        if seen.insert(phrase.clone()) {
            tokens.push(phrase.clone());
        }

        if multi_word {
            for word in index_words(&phrase) {
                if seen.insert(word.to_string()) {
                    tokens.push(word.to_string());
                }
            }
        }
    }

    tokens
}

pub fn preprocess(text: &str) -> String {
    normalize(text)
        .split_whitespace()
        .filter(|token| token.chars().count() > 1 && !is_stopword(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Appends spelled-out forms after each known abbreviation, keeping the original token.
pub fn expand_abbreviations(tokens: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut expanded = Vec::with_capacity(tokens.len());

    for token in tokens {
        if seen.insert(token.clone()) {
            expanded.push(token.clone());
        }
        if let Some(synonyms) = ABBREVIATIONS.get(token.as_str()) {
            for synonym in synonyms {
                let synonym = normalize(synonym);
                if seen.insert(synonym.clone()) {
                    expanded.push(synonym);
                }
            }
        }
    }

    expanded
}

/// Words of the normalized text that are long enough to index on their own.
pub fn index_words(normalized: &str) -> impl Iterator<Item = &str> {
    normalized
        .split_whitespace()
        .filter(|word| word.chars().count() >= MIN_WORD_CHARS)
}

fn strip_asides(text: &str) -> String {
    let mut current = text.to_string();
    // Inner-most groups first so nested asides disappear too.
    while PARENTHESIZED_ASIDE.is_match(&current) {
        current = PARENTHESIZED_ASIDE.replace_all(&current, " ").into_owned();
    }
    current
}

fn fold_diacritics(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if let Some(base) = DIACRITIC_MAP.get(&c) {
            out.push(*base);
        } else if is_combining_mark(c) {
            continue;
        } else if c.is_ascii() {
            out.push(c);
        } else {
            out.extend(c.to_string().nfd().filter(|d| !is_combining_mark(*d)));
        }
    }
    out
}

fn clean_punctuation(text: &str) -> String {
    let chars: Vec<char> = text
        .chars()
        .map(|c| if DASH_VARIANTS.contains(&c) { '-' } else { c })
        .collect();
    let mut out = String::with_capacity(chars.len());

    for (i, c) in chars.iter().enumerate() {
        if c.is_alphanumeric() {
            out.push(*c);
        } else if *c == '-' {
            let after_word = out.chars().last().is_some_and(char::is_alphanumeric);
            let before_word = chars.get(i + 1).is_some_and(|next| next.is_alphanumeric());
            out.push(if after_word && before_word { '-' } else { ' ' });
        } else {
            out.push(' ');
        }
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
