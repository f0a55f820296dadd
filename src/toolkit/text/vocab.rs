use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;

/// Base letter followed by every Vietnamese toned / hatted variant that folds onto it.
const VIETNAMESE_GROUPS: &[(char, &str)] = &[
    ('a', "àáạảãâầấậẩẫăằắặẳẵ"),
    ('e', "èéẹẻẽêềếệểễ"),
    ('i', "ìíịỉĩ"),
    ('o', "òóọỏõôồốộổỗơờớợởỡ"),
    ('u', "ùúụủũưừứựửữ"),
    ('y', "ỳýỵỷỹ"),
    ('d', "đ"),
];

lazy_static! {
    pub static ref DIACRITIC_MAP: HashMap<char, char> = {
        let mut m = HashMap::new();
        for (base, variants) in VIETNAMESE_GROUPS {
            let upper_base = base.to_ascii_uppercase();
            for variant in variants.chars() {
                m.insert(variant, *base);
                for upper in variant.to_uppercase() {
                    m.insert(upper, upper_base);
                }
            }
        }
        m
    };

    pub static ref STOPWORDS: HashSet<&'static str> = {
        let english = [
            "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have",
            "in", "into", "is", "its", "of", "on", "or", "that", "the", "their", "this",
            "to", "was", "were", "will", "with", "about", "using", "based", "via", "etc",
        ];
        let vietnamese = [
            "va", "cua", "cho", "voi", "cac", "nhung", "mot", "la", "trong", "tren", "duoi",
            "ve", "tu", "den", "theo", "nhu", "de", "thi", "ma", "khi", "da", "dang", "se",
            "duoc", "bi", "co", "khong", "nay", "do", "hoac", "cung", "rat", "nhieu",
        ];
        english.into_iter().chain(vietnamese).collect()
    };

    pub static ref ABBREVIATIONS: HashMap<&'static str, Vec<&'static str>> = {
        let mut m = HashMap::new();
        m.insert("ai", vec!["artificial intelligence", "tri tue nhan tao"]);
        m.insert("ml", vec!["machine learning", "hoc may"]);
        m.insert("dl", vec!["deep learning", "hoc sau"]);
        m.insert("nlp", vec!["natural language processing", "xu ly ngon ngu tu nhien"]);
        m.insert("cv", vec!["computer vision", "thi giac may tinh"]);
        m.insert("iot", vec!["internet of things"]);
        m.insert("db", vec!["database", "co so du lieu"]);
        m.insert("dbms", vec!["database management system"]);
        m.insert("os", vec!["operating system", "he dieu hanh"]);
        m.insert("se", vec!["software engineering", "cong nghe phan mem"]);
        m.insert("rl", vec!["reinforcement learning", "hoc tang cuong"]);
        m.insert("llm", vec!["large language model"]);
        m.insert("hci", vec!["human computer interaction"]);
        m.insert("ui", vec!["user interface"]);
        m.insert("ux", vec!["user experience"]);
        m.insert("devops", vec!["development operations"]);
        m
    };
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diacritic_map_covers_both_cases() {
        assert_eq!(DIACRITIC_MAP.get(&'ễ'), Some(&'e'));
        assert_eq!(DIACRITIC_MAP.get(&'Ễ'), Some(&'E'));
        assert_eq!(DIACRITIC_MAP.get(&'đ'), Some(&'d'));
        assert_eq!(DIACRITIC_MAP.get(&'Đ'), Some(&'D'));
        assert_eq!(DIACRITIC_MAP.get(&'Ư'), Some(&'U'));
    }

    #[test]
    fn test_stopwords_are_bilingual() {
        assert!(is_stopword("the"));
        assert!(is_stopword("cua"));
        assert!(!is_stopword("learning"));
    }
}
