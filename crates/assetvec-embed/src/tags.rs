//! Keyword tag extraction.
//!
//! Tags are the most frequent content words of a text, ties broken by first
//! occurrence. They travel alongside a vector so callers can label assets
//! without a second model call.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

/// Word tokens: letters/digits, optionally joined by `'`, `_` or `-`.
static WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{L}\p{N}]+(?:['_\-][\p{L}\p{N}]+)*").expect("static regex is valid")
});

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "shall",
    "can", "need", "to", "of", "in", "for", "on", "with", "at", "by", "from", "as", "into",
    "through", "during", "before", "after", "above", "below", "between", "under", "over",
    "again", "further", "then", "once", "here", "there", "when", "where", "why", "how", "all",
    "each", "few", "more", "most", "other", "some", "such", "no", "nor", "not", "only", "own",
    "same", "so", "than", "too", "very", "just", "and", "but", "if", "or", "because", "until",
    "while", "about", "against", "this", "that", "these", "those", "what", "which", "who",
    "whom", "i", "me", "my", "we", "our", "you", "your", "he", "him", "his", "she", "her", "it",
    "its", "they", "them", "their", "up", "down", "out", "off", "any", "both", "also", "get",
    "got", "us",
];

static STOP_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| STOP_WORDS.iter().copied().collect());

/// Lower-cased word tokens of `text`, in order, including stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    WORD_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Extract up to `max_tags` keyword tags from `text`.
///
/// Stop words, single characters and pure numbers are skipped.
pub fn extract_tags(text: &str, max_tags: usize) -> Vec<String> {
    if max_tags == 0 {
        return Vec::new();
    }

    // word -> (count, first position)
    let mut stats: HashMap<String, (usize, usize)> = HashMap::new();
    for (pos, word) in tokenize(text).into_iter().enumerate() {
        if word.chars().count() < 2
            || STOP_SET.contains(word.as_str())
            || word.chars().all(|c| c.is_numeric())
        {
            continue;
        }
        stats
            .entry(word)
            .and_modify(|(count, _)| *count += 1)
            .or_insert((1, pos));
    }

    let mut ranked: Vec<(String, usize, usize)> = stats
        .into_iter()
        .map(|(word, (count, first))| (word, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    ranked
        .into_iter()
        .take(max_tags)
        .map(|(word, _, _)| word)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_keeps_joiners() {
        let tokens = tokenize("Summer-Sale launch: Don't miss it!");
        assert_eq!(tokens, vec!["summer-sale", "launch", "don't", "miss", "it"]);
    }

    #[test]
    fn test_tokenize_unicode() {
        let tokens = tokenize("Café promo über alles");
        assert_eq!(tokens, vec!["café", "promo", "über", "alles"]);
    }

    #[test]
    fn test_extract_tags_filters_stop_words() {
        let tags = extract_tags("the quick brown fox jumps over the lazy dog", 10);
        assert!(!tags.contains(&"the".to_string()));
        assert!(!tags.contains(&"over".to_string()));
        assert!(tags.contains(&"quick".to_string()));
        assert!(tags.contains(&"fox".to_string()));
    }

    #[test]
    fn test_extract_tags_orders_by_frequency_then_position() {
        let tags = extract_tags("launch banner, spring launch, banner launch video", 3);
        assert_eq!(tags, vec!["launch", "banner", "spring"]);
    }

    #[test]
    fn test_extract_tags_respects_limit() {
        assert_eq!(extract_tags("alpha beta gamma delta", 2).len(), 2);
        assert!(extract_tags("alpha beta", 0).is_empty());
    }

    #[test]
    fn test_extract_tags_skips_numbers_and_single_chars() {
        let tags = extract_tags("x 2024 campaign 7", 5);
        assert_eq!(tags, vec!["campaign"]);
    }

    #[test]
    fn test_extract_tags_empty_text() {
        assert!(extract_tags("", 5).is_empty());
        assert!(extract_tags("   ...  ", 5).is_empty());
    }
}
