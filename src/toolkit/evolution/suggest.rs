use lazy_static::lazy_static;

use crate::toolkit::ontology::models::is_valid_key;

lazy_static! {
    /// Keyword fragments mapped to the domain a new concept most likely belongs under.
    /// Checked in order; the first fragment contained in the token wins.
    static ref PARENT_KEYWORDS: Vec<(&'static str, &'static str)> = vec![
        ("learning", "it.ai"),
        ("neural", "it.ai"),
        ("vision", "it.ai"),
        ("nlp", "it.ai"),
        ("llm", "it.ai"),
        ("gpt", "it.ai"),
        ("transformer", "it.ai"),
        ("robot", "it.ai"),
        ("tri tue", "it.ai"),
        ("hoc may", "it.ai"),
        ("data", "it.data"),
        ("du lieu", "it.data"),
        ("sql", "it.data"),
        ("big data", "it.data"),
        ("analytic", "it.data"),
        ("statistic", "it.data"),
        ("warehouse", "it.data"),
        ("secur", "it.security"),
        ("crypto", "it.security"),
        ("blockchain", "it.security"),
        ("bao mat", "it.security"),
        ("malware", "it.security"),
        ("forensic", "it.security"),
        ("network", "it.networking"),
        ("mang may tinh", "it.networking"),
        ("cloud", "it.systems"),
        ("iot", "it.networking"),
        ("wireless", "it.networking"),
        ("5g", "it.networking"),
        ("web", "it.software"),
        ("mobile", "it.software"),
        ("application", "it.software"),
        ("devops", "it.software"),
        ("software", "it.software"),
        ("phan mem", "it.software"),
        ("framework", "it.software"),
        ("test", "it.software"),
        ("game", "it.software"),
        ("embedded", "it.systems"),
        ("nhung", "it.systems"),
        ("hardware", "it.systems"),
        ("kernel", "it.systems"),
        ("compiler", "it.systems"),
        ("quantum", "it.systems"),
    ];
}

/// Parent suggested for `token`, `default_parent` when no keyword applies.
pub fn suggest_parent(token: &str, default_parent: &str) -> String {
    PARENT_KEYWORDS
        .iter()
        .find(|(keyword, _)| token.contains(keyword))
        .map(|(_, parent)| parent.to_string())
        .unwrap_or_else(|| default_parent.to_string())
}

pub fn title_case(token: &str) -> String {
    token
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Concept key for `token` under `parent`, or `None` when the token has no usable
/// characters.
pub fn suggest_key(parent: &str, token: &str) -> Option<String> {
    let segment: String = token
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    if segment.is_empty() {
        return None;
    }
    let key = format!("{}.{}", parent, segment);
    is_valid_key(&key).then_some(key)
}

/// Variants other than the canonical form, in first-seen order.
pub fn suggest_aliases(canonical: &str, variants: &[String]) -> Vec<String> {
    variants
        .iter()
        .filter(|v| v.as_str() != canonical)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_by_keyword() {
        assert_eq!(suggest_parent("federated learning", "it"), "it.ai");
        assert_eq!(suggest_parent("blockchain", "it"), "it.security");
        assert_eq!(suggest_parent("bao mat he thong", "it"), "it.security");
        assert_eq!(suggest_parent("gardening", "it"), "it");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("federated learning"), "Federated Learning");
        assert_eq!(title_case("  edge   ai "), "Edge Ai");
    }

    #[test]
    fn test_suggest_key() {
        assert_eq!(suggest_key("it.ai", "federated learning").as_deref(), Some("it.ai.federated_learning"));
        assert_eq!(suggest_key("it", "c++/rust").as_deref(), Some("it.c_rust"));
        assert_eq!(suggest_key("it", "---"), None);
    }

    #[test]
    fn test_aliases_skip_canonical() {
        let variants = vec!["blockchain".to_string(), "blockchains".to_string()];
        assert_eq!(suggest_aliases("blockchain", &variants), vec!["blockchains".to_string()]);
    }
}
