use unicode_normalization::UnicodeNormalization;

/// Takes the first `max_chars` characters after NFC composition, so a Vietnamese
/// letter typed as base + combining marks is never split.
#[inline]
pub fn safe_truncate(s: &str, max_chars: usize) -> String {
    s.nfc().take(max_chars).collect()
}


#[inline]
pub fn safe_truncate_ellipsis(s: &str, max_chars: usize) -> String {
    let composed: String = s.nfc().collect();
    if composed.chars().count() > max_chars {
        format!("{}...", composed.chars().take(max_chars).collect::<String>())
    } else {
        composed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_truncate_ascii() {
        assert_eq!(safe_truncate("hello world", 5), "hello");
    }

    #[test]
    fn test_safe_truncate_vietnamese() {
        assert_eq!(safe_truncate("Nguyễn Văn A", 6), "Nguyễn");
    }

    #[test]
    fn test_safe_truncate_decomposed_marks() {
        // "Nguyễn" spelled with combining circumflex and tilde
        let decomposed = "Nguye\u{302}\u{303}n Văn A";
        assert_eq!(safe_truncate(decomposed, 6), "Nguy\u{1ec5}n");
    }

    #[test]
    fn test_safe_truncate_shorter() {
        assert_eq!(safe_truncate("hi", 10), "hi");
    }

    #[test]
    fn test_safe_truncate_ellipsis() {
        assert_eq!(safe_truncate_ellipsis("học máy thống kê", 7), "học máy...");
        assert_eq!(safe_truncate_ellipsis("hi", 10), "hi");
    }
}
