use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

const MIN_TOKEN_CHARS: usize = 2;

fn word_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"[\p{L}\p{N}]+").expect("Regex should compile"))
}

/// Split text into the distinct lowercase words the index stores.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    let lowered = text.to_lowercase();
    word_regex()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .filter(|word| word.chars().count() >= MIN_TOKEN_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_dedups() {
        let tokens = tokenize("Rust rust RUST programming");
        assert_eq!(tokens.len(), 2);
        assert!(tokens.contains("rust"));
        assert!(tokens.contains("programming"));
    }

    #[test]
    fn test_tokenize_drops_punctuation_and_short_words() {
        let tokens = tokenize("I wrote a post, again!");
        assert!(tokens.contains("wrote"));
        assert!(tokens.contains("post"));
        assert!(tokens.contains("again"));
        assert!(!tokens.contains("i"));
        assert!(!tokens.contains("a"));
        assert!(!tokens.iter().any(|t| t.contains(',') || t.contains('!')));
    }

    #[test]
    fn test_tokenize_keeps_non_ascii_words() {
        let tokens = tokenize("Café día 2024");
        assert!(tokens.contains("café"));
        assert!(tokens.contains("día"));
        assert!(tokens.contains("2024"));
    }
}
