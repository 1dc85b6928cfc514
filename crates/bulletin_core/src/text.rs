use unicode_normalization::UnicodeNormalization;

/// Strips accents, lowercases and collapses every run of non-alphanumerics
/// into a single space. `"5. Crédito por Sector"` becomes `"5 credito por sector"`.
pub fn normalize_title(value: &str) -> String {
    let ascii: String = value.nfkd().filter(char::is_ascii).collect();
    let mut out = String::with_capacity(ascii.len());
    let mut pending_space = false;
    for ch in ascii.chars().map(|c| c.to_ascii_lowercase()) {
        if ch.is_ascii_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(ch);
        } else {
            pending_space = true;
        }
    }
    out
}

/// Order-independent substring match: every keyword must occur in `normalized`.
pub fn matches_all_keywords<S: AsRef<str>>(normalized: &str, keywords: &[S]) -> bool {
    keywords.iter().all(|k| normalized.contains(k.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accents_case_and_punctuation_are_normalized() {
        assert_eq!(normalize_title("5. Crédito por Sector"), "5 credito por sector");
        assert_eq!(normalize_title("  7. E. TC  "), "7 e tc");
        assert_eq!(normalize_title("ÉÉFF--Ñandú"), "eeff nandu");
        assert_eq!(normalize_title("***"), "");
    }

    #[test]
    fn keyword_order_does_not_matter() {
        let title = normalize_title("5. Credit by Sector");
        assert!(matches_all_keywords(&title, &["sector", "credit"]));
        assert!(!matches_all_keywords(&title, &["credit", "bank"]));
    }
}
