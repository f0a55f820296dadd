use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use super::models::MatchType;
use crate::toolkit::text::normalize;

/// Longest span accepted as a person name.
pub const MAX_NAME_WORDS: usize = 5;

pub const EXACT_NAME_SCORE: f64 = 1.0;
pub const FUZZY_NAME_SCORE: f64 = 0.7;

lazy_static! {
    static ref HONORIFIC_NAME: Regex = Regex::new(
        r"(?:^|\s)(?:PGS\.?\s*TS\.?|GS\.?\s*TS\.?|ThS\.?|TS\.?|PGS\.?|GS\.?|Dr\.?|Prof\.?|[Tt]hầy|[Cc]ô|[Tt]iến sĩ|[Gg]iáo sư)\s+(\p{Lu}\p{Ll}*\b(?:\s+\p{Lu}\p{Ll}*\b){0,4})"
    )
    .unwrap();

    static ref CAPITALIZED_NAME: Regex =
        Regex::new(r"\b\p{Lu}\p{Ll}*\b(?:\s+\p{Lu}\p{Ll}*\b)+").unwrap();

    static ref HONORIFIC: Regex = Regex::new(
        r"(?:^|\s)(?:PGS\.?\s*TS\.?|GS\.?\s*TS\.?|ThS\.?|TS\.?|PGS\.?|GS\.?|Dr\.?|Prof\.?|[Tt]hầy|[Cc]ô|[Tt]iến sĩ|[Gg]iáo sư)(?:\s|$)"
    )
    .unwrap();

    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();

    /// Vietnamese family names, diacritics stripped.
    static ref SURNAMES: HashSet<&'static str> = [
        "nguyen", "tran", "le", "pham", "hoang", "huynh", "phan", "vu", "vo", "dang",
        "bui", "do", "ho", "ngo", "duong", "ly", "dao", "dinh", "mai", "truong", "lam",
        "phung", "cao", "ta", "luong", "ha", "to", "chau", "quach", "thai", "kieu",
        "trinh", "doan", "la", "lu", "tang", "van", "kim", "hua", "vuong", "khuc",
        "tong", "giang", "quan", "luu", "lai", "thach", "tieu", "au", "mac", "ong",
    ]
    .into_iter()
    .collect();

    /// Words that mark a capitalized span as a topic rather than a person.
    static ref TECHNICAL_TERMS: HashSet<&'static str> = [
        "machine", "learning", "deep", "data", "science", "network", "networks", "neural",
        "artificial", "intelligence", "computer", "computing", "vision", "security", "cloud",
        "blockchain", "python", "java", "rust", "web", "software", "system", "systems",
        "engineering", "database", "databases", "mining", "big", "internet", "things",
        "language", "languages", "processing", "natural", "robotics", "ai", "ml", "nlp",
        "iot", "information", "technology", "research", "model", "models", "algorithm",
        "algorithms", "reinforcement", "graph", "quantum", "mobile", "development",
        "transformer", "transformers", "generative", "distributed",
    ]
    .into_iter()
    .collect();

    /// Diacritic-free Vietnamese topic phrases.
    static ref TECHNICAL_PHRASES: Vec<&'static str> = vec![
        "hoc may", "hoc sau", "tri tue nhan tao", "du lieu", "mang may tinh",
        "thi giac may tinh", "xu ly ngon ngu", "an toan thong tin", "phan mem", "he thong",
        "co so du lieu", "cong nghe",
    ];

    /// Query verbs and role words that may start a capitalized span.
    static ref LEADING_NOISE: HashSet<&'static str> = [
        "find", "search", "show", "who", "where", "list", "lecturer", "lecturers",
        "professor", "teacher", "tim", "kiem", "thay", "co", "ts", "ths", "pgs", "gs",
        "dr", "prof",
    ]
    .into_iter()
    .collect();
}

fn is_technical(span: &str) -> bool {
    let normalized = normalize(span);
    normalized.split_whitespace().any(|w| TECHNICAL_TERMS.contains(w))
        || TECHNICAL_PHRASES.iter().any(|p| normalized.contains(p))
}

pub fn is_surname(word: &str) -> bool {
    SURNAMES.contains(normalize(word).as_str())
}

/// Trims leading query words, starts at the first surname when one follows other
/// capitalized words, then applies the length and technical-term checks.
fn validate_span(span: &str, min_words: usize) -> Option<String> {
    let mut words: Vec<&str> = span.split_whitespace().collect();

    while words
        .first()
        .is_some_and(|w| LEADING_NOISE.contains(normalize(w).as_str()))
    {
        words.remove(0);
    }
    if let Some(pos) = words.iter().position(|w| is_surname(w)) {
        if pos > 0 {
            words.drain(..pos);
        }
    }

    if words.len() < min_words || words.len() > MAX_NAME_WORDS {
        return None;
    }
    let first_ok = words
        .first()
        .is_some_and(|w| is_surname(w) || w.chars().next().is_some_and(char::is_uppercase));
    let name = words.join(" ");
    if !first_ok || is_technical(&name) {
        return None;
    }
    Some(name)
}

/// Person names mentioned in `query`, honorific-prefixed spans first, without duplicates.
pub fn extract_person_names(query: &str) -> Vec<String> {
    let query: String = query.nfc().collect();
    let mut names: Vec<String> = Vec::new();
    let mut push = |name: String| {
        if !names.iter().any(|n| n == &name || n.contains(name.as_str())) {
            names.push(name);
        }
    };

    for caps in HONORIFIC_NAME.captures_iter(&query) {
        if let Some(name) = caps.get(1).and_then(|m| validate_span(m.as_str(), 1)) {
            push(name);
        }
    }
    for m in CAPITALIZED_NAME.find_iter(&query) {
        if let Some(name) = validate_span(m.as_str(), 2) {
            push(name);
        }
    }
    names
}

/// `query` without the given names and any honorifics.
pub fn strip_names(query: &str, names: &[String]) -> String {
    let mut text: String = query.nfc().collect();
    for name in names {
        text = text.replace(name.as_str(), " ");
    }
    let text = HONORIFIC.replace_all(&text, " ");
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}


/// Scores lecturer names against one name from the query.
pub struct NameMatcher {
    exact: String,
    words: Vec<Regex>,
}

impl NameMatcher {
    pub fn new(name: &str) -> Self {
        let words = normalize(name)
            .split_whitespace()
            .filter_map(|w| Regex::new(&format!(r"\b{}\b", regex::escape(w))).ok())
            .collect();
        Self {
            exact: name.nfc().collect::<String>().trim().to_lowercase(),
            words,
        }
    }

    /// Exact case-insensitive equality scores 1.0; every query word present in the
    /// full name, diacritics ignored and in any order, scores 0.7.
    pub fn score(&self, full_name: &str) -> Option<(f64, MatchType)> {
        let candidate = full_name.nfc().collect::<String>().trim().to_lowercase();
        if candidate == self.exact {
            return Some((EXACT_NAME_SCORE, MatchType::ExactName));
        }
        if self.words.is_empty() {
            return None;
        }
        let normalized = normalize(full_name);
        self.words
            .iter()
            .all(|re| re.is_match(&normalized))
            .then_some((FUZZY_NAME_SCORE, MatchType::FuzzyName))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vietnamese_name_before_topic() {
        assert_eq!(
            extract_person_names("Nguyễn Văn A machine learning"),
            vec!["Nguyễn Văn A".to_string()]
        );
    }

    #[test]
    fn test_honorific_and_leading_words() {
        assert_eq!(extract_person_names("PGS.TS Trần Thị Bình"), vec!["Trần Thị Bình".to_string()]);
        assert_eq!(extract_person_names("thầy Hùng dạy gì"), vec!["Hùng".to_string()]);
        assert_eq!(extract_person_names("Find Lê Minh Tuấn"), vec!["Lê Minh Tuấn".to_string()]);
    }

    #[test]
    fn test_technical_spans_are_not_names() {
        assert!(extract_person_names("Machine Learning and Deep Learning").is_empty());
        assert!(extract_person_names("Học Máy cho Dữ Liệu Lớn").is_empty());
        assert!(extract_person_names("lecturers working on nlp").is_empty());
        assert_eq!(
            extract_person_names("Deep Learning Phạm Quốc Huy"),
            vec!["Phạm Quốc Huy".to_string()]
        );
    }

    #[test]
    fn test_too_long_span_rejected() {
        assert!(extract_person_names("Một Hai Ba Bốn Năm Sáu").is_empty());
    }

    #[test]
    fn test_strip_names() {
        let names = extract_person_names("TS. Nguyễn Văn A machine learning");
        assert_eq!(strip_names("TS. Nguyễn Văn A machine learning", &names), "machine learning");
    }

    #[test]
    fn test_name_matcher() {
        let matcher = NameMatcher::new("Nguyễn Văn A");
        assert_eq!(matcher.score("nguyễn văn a"), Some((1.0, MatchType::ExactName)));
        assert_eq!(matcher.score("Văn A Nguyễn"), Some((0.7, MatchType::FuzzyName)));
        assert_eq!(matcher.score("Nguyen Van A"), Some((0.7, MatchType::FuzzyName)));
        assert_eq!(matcher.score("Nguyễn Văn An"), None);
        assert_eq!(matcher.score("Trần Văn A"), None);
    }
}
