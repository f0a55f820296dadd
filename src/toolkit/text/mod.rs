pub mod normalizer;
pub mod vocab;

pub use normalizer::{
    expand_abbreviations, index_words, normalize, preprocess, split_phrases, tokenize,
    MIN_WORD_CHARS, PHRASE_DELIMITERS,
};
pub use vocab::is_stopword;
