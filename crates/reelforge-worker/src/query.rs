//! Search terms for narration segments.
//!
//! The primary term is built from the strongest keywords of the sentence.
//! The fallback term broadens the search: the job topic when there is one,
//! otherwise the single strongest keyword, otherwise a generic background.

use regex::Regex;
use std::sync::LazyLock;

/// Term used when nothing more specific is known.
pub const GENERIC_QUERY: &str = "abstract background";

/// Keywords kept in a primary query.
pub const MAX_KEYWORDS: usize = 3;

const MIN_KEYWORD_LEN: usize = 3;

const STOP_WORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "all", "also", "and", "any", "are", "aren",
    "because", "been", "before", "being", "below", "between", "both", "but", "can", "could",
    "did", "does", "doing", "down", "during", "each", "even", "ever", "every", "few", "for",
    "from", "further", "get", "gets", "got", "had", "has", "have", "having", "her", "here",
    "hers", "herself", "him", "himself", "his", "how", "into", "its", "itself", "just", "let",
    "lets", "like", "made", "make", "makes", "many", "more", "most", "much", "must", "myself",
    "never", "not", "now", "off", "once", "one", "only", "other", "our", "ours", "ourselves",
    "out", "over", "own", "really", "same", "see", "she", "should", "some", "still", "such",
    "than", "that", "the", "their", "theirs", "them", "themselves", "then", "there", "these",
    "they", "thing", "things", "this", "those", "through", "too", "under", "until", "very",
    "was", "way", "were", "what", "when", "where", "which", "while", "who", "whom", "why",
    "will", "with", "would", "you", "your", "yours", "yourself", "yourselves",
];

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{Alphabetic}\p{N}]+").expect("word pattern is valid"));

/// Lowercase alphanumeric words of `text`.
pub fn tokenize(text: &str) -> Vec<String> {
    WORD.find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

fn is_keyword(word: &str) -> bool {
    word.chars().count() >= MIN_KEYWORD_LEN
        && !word.chars().all(|c| c.is_ascii_digit())
        && !STOP_WORDS.contains(&word)
}

/// Distinct keywords of `text` in order of appearance.
pub fn keywords(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for word in tokenize(text) {
        if is_keyword(&word) && !out.contains(&word) {
            out.push(word);
        }
    }
    out
}

/// Up to `max` keywords, longest first; equal lengths keep text order.
pub fn strongest_keywords(text: &str, max: usize) -> Vec<String> {
    let mut ranked = keywords(text);
    // stable: ties keep their position
    ranked.sort_by_key(|w| std::cmp::Reverse(w.chars().count()));
    ranked.truncate(max);
    ranked
}

/// Primary and fallback search terms for one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneQuery {
    pub primary: String,
    pub fallback: String,
}

impl SceneQuery {
    /// Derive terms from the segment text and an optional job topic.
    pub fn derive(text: &str, topic: Option<&str>) -> Self {
        let strongest = strongest_keywords(text, MAX_KEYWORDS);

        // Keep the chosen keywords in the order they were narrated
        let all = keywords(text);
        let primary_words: Vec<&str> = all
            .iter()
            .filter(|w| strongest.contains(w))
            .map(String::as_str)
            .collect();
        let primary = if primary_words.is_empty() {
            topic
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(GENERIC_QUERY)
                .to_string()
        } else {
            primary_words.join(" ")
        };

        let topic = topic.map(str::trim).filter(|t| !t.is_empty());
        let mut fallback = match (topic, strongest.first()) {
            (Some(t), _) => t.to_string(),
            (None, Some(k)) => k.clone(),
            (None, None) => GENERIC_QUERY.to_string(),
        };
        if fallback.eq_ignore_ascii_case(&primary) {
            fallback = GENERIC_QUERY.to_string();
        }

        Self { primary, fallback }
    }

    /// Whether the fallback would repeat the primary search.
    pub fn fallback_is_distinct(&self) -> bool {
        !self.fallback.eq_ignore_ascii_case(&self.primary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Ocean_waves-4K!"), vec!["ocean", "waves", "4k"]);
        assert!(tokenize("  ...  ").is_empty());
    }

    #[test]
    fn test_keywords_drop_stop_words_and_duplicates() {
        assert_eq!(
            keywords("The smart pen is the future of productivity, and the pen knows it."),
            vec!["smart", "pen", "future", "productivity", "knows"]
        );
    }

    #[test]
    fn test_primary_uses_strongest_in_narrated_order() {
        let q = SceneQuery::derive("Smart pens boost productivity in modern classrooms.", None);
        // strongest three: productivity, classrooms, modern
        assert_eq!(q.primary, "productivity modern classrooms");
        assert_eq!(q.fallback, "productivity");
    }

    #[test]
    fn test_topic_is_fallback() {
        let q = SceneQuery::derive("Waves crash on the rocks.", Some("ocean"));
        assert_eq!(q.primary, "waves crash rocks");
        assert_eq!(q.fallback, "ocean");
        assert!(q.fallback_is_distinct());
    }

    #[test]
    fn test_no_keywords_uses_topic_then_generic() {
        let q = SceneQuery::derive("And so it is.", Some("space travel"));
        assert_eq!(q.primary, "space travel");
        assert_eq!(q.fallback, GENERIC_QUERY);

        let q = SceneQuery::derive("And so it is.", None);
        assert_eq!(q.primary, GENERIC_QUERY);
        assert!(!q.fallback_is_distinct());
    }

    #[test]
    fn test_single_keyword_broadens_to_generic() {
        let q = SceneQuery::derive("Volcanoes.", None);
        assert_eq!(q.primary, "volcanoes");
        assert_eq!(q.fallback, GENERIC_QUERY);
    }
}
