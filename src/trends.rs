//! Keyword extraction and trend scoring.
//!
//! Keywords are the five most frequent words of four or more letters in the
//! tag-stripped, lower-cased content, minus a small stopword list. The trend
//! score is the share of the trending set found among those keywords:
//!
//! ```text
//! score = round(min(100, |keywords ∩ trending| / |trending| * 100))
//! ```

use crate::utils::strip_tags;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Maximum number of keywords kept per item.
pub const MAX_KEYWORDS: usize = 5;

/// Score at or above which an item is tagged [`TRENDING_TAG`].
pub const TRENDING_THRESHOLD: u8 = 60;

pub const TRENDING_TAG: &str = "🔥 Trending";

const STOPWORDS: &[&str] = &[
    "the", "and", "with", "this", "that", "for", "from", "https", "about", "your", "you", "are", "was", "will",
    "have", "has", "just", "been",
];

static RE_KEYWORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-z]{4,}\b").unwrap());

/// Top keywords of `content`, most frequent first.
///
/// Ties keep first-occurrence order so the result is deterministic.
pub fn extract_keywords(content: &str) -> Vec<String> {
    let text = strip_tags(content).to_lowercase();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for m in RE_KEYWORD.find_iter(&text) {
        let word = m.as_str();
        if STOPWORDS.contains(&word) {
            continue;
        }
        let count = counts.entry(word).or_insert(0);
        if *count == 0 {
            order.push(word);
        }
        *count += 1;
    }

    order
        .into_iter()
        .enumerate()
        .sorted_by_key(|(first_seen, w)| (std::cmp::Reverse(counts[w]), *first_seen))
        .take(MAX_KEYWORDS)
        .map(|(_, w)| w.to_string())
        .collect()
}

/// Percentage of `trending` terms present in `keywords`, case-insensitive.
///
/// Always within `0..=100`; empty inputs score 0.
pub fn score(keywords: &[String], trending: &[String]) -> u8 {
    let trending: HashSet<String> = trending
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    if keywords.is_empty() || trending.is_empty() {
        return 0;
    }
    let matched = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .unique()
        .filter(|k| trending.contains(k))
        .count();
    let pct = (matched as f64 / trending.len() as f64 * 100.0).min(100.0);
    pct.round() as u8
}

/// Record tags: the keywords, plus [`TRENDING_TAG`] for high scores.
pub fn tags(keywords: &[String], score: u8) -> Vec<String> {
    let mut tags = keywords.to_vec();
    if score >= TRENDING_THRESHOLD {
        tags.push(TRENDING_TAG.to_string());
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_keywords_rank_by_frequency_and_skip_stopwords() {
        let content = "<p>Bitcoin rallies.</p> Bitcoin miners and Tesla: this Tesla news about bitcoin, \
                       plus nvidia chips, apple phones.";
        let kws = extract_keywords(content);
        assert_eq!(kws.len(), MAX_KEYWORDS);
        assert_eq!(kws[0], "bitcoin");
        assert_eq!(kws[1], "tesla");
        assert!(!kws.iter().any(|k| k == "this" || k == "about"));
        assert!(!kws.iter().any(|k| k == "and"));
    }

    #[test]
    fn test_ties_keep_first_occurrence_order() {
        assert_eq!(extract_keywords("gamma alpha beta"), strings(&["gamma", "alpha", "beta"]));
    }

    #[test]
    fn test_short_words_and_digits_are_ignored() {
        assert!(extract_keywords("ai gpt 2024 go to it").is_empty());
    }

    #[test]
    fn test_score_is_bounded() {
        let trending = strings(&["ai", "bitcoin", "apple", "tesla", "nvidia"]);
        assert_eq!(score(&[], &trending), 0);
        assert_eq!(score(&trending, &[]), 0);
        assert_eq!(score(&trending, &trending), 100);
        assert_eq!(score(&strings(&["Bitcoin", "APPLE", "weather"]), &trending), 40);
        assert_eq!(score(&strings(&["bitcoin", "bitcoin", "bitcoin"]), &trending), 20);
    }

    #[test]
    fn test_score_rounds() {
        let trending = strings(&["one", "two", "three"]);
        assert_eq!(score(&strings(&["one"]), &trending), 33);
        assert_eq!(score(&strings(&["one", "two"]), &trending), 67);
    }

    #[test]
    fn test_trending_tag_at_threshold() {
        let kws = strings(&["bitcoin"]);
        assert_eq!(tags(&kws, 59), kws);
        assert_eq!(tags(&kws, 60).last().map(String::as_str), Some(TRENDING_TAG));
    }
}
