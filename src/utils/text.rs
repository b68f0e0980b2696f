//! Text validation and truncation shared by encoders.

/// Why a text cannot be encoded, or `None` when it is acceptable.
pub fn malformed_reason(text: &str) -> Option<&'static str> {
    if text.trim().is_empty() {
        Some("text is empty or whitespace-only")
    } else if text.contains('\0') {
        Some("text contains a NUL character")
    } else {
        None
    }
}

/// Truncate to at most `max_chars` characters, always on a char boundary.
///
/// Returns the input unchanged when it already fits.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_reason() {
        assert!(malformed_reason("hello").is_none());
        assert!(malformed_reason("").is_some());
        assert!(malformed_reason(" \n\t").is_some());
        assert!(malformed_reason("a\0b").is_some());
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("日本語", 1), "日");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
