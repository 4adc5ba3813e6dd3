//! Affiliate link insertion.
//!
//! For each configured keyword, the first whole-word, case-insensitive match
//! in the content is wrapped in a sponsored link:
//!
//! ```text
//! <a href="{base}?keyword={urlencoded}" rel="nofollow sponsored" target="_blank">{match}</a>
//! ```
//!
//! Matches are searched in the original content only, so text inside tags
//! and inside existing `<a>` elements (including links inserted for other
//! keywords) is never touched.

use crate::config::AffiliateConfig;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::ops::Range;
use tracing::{debug, warn};

/// Existing anchors (with their text) and any other tag.
static RE_MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<a\b[^>]*>.*?</a\s*>|<[^>]*>").unwrap());

pub struct AffiliateLinker {
    base_url: String,
    rules: Vec<(String, Regex)>,
}

impl AffiliateLinker {
    pub fn new(config: &AffiliateConfig) -> Self {
        let rules = config
            .keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .filter_map(|k| {
                let pattern = format!(r"\b{}\b", regex::escape(k));
                match RegexBuilder::new(&pattern).case_insensitive(true).build() {
                    Ok(re) => Some((k.to_string(), re)),
                    Err(e) => {
                        warn!(keyword = %k, error = %e, "Skipping affiliate keyword");
                        None
                    }
                }
            })
            .collect();
        Self {
            base_url: config.base_url.trim().to_string(),
            rules,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.base_url.is_empty() && !self.rules.is_empty()
    }

    /// `content` with the first occurrence of each keyword linked.
    pub fn apply(&self, content: &str) -> String {
        if !self.is_enabled() {
            return content.to_string();
        }
        let markup: Vec<Range<usize>> = RE_MARKUP.find_iter(content).map(|m| m.range()).collect();
        let in_markup = |r: &Range<usize>| markup.iter().any(|t| r.start < t.end && t.start < r.end);

        let mut links: Vec<(Range<usize>, &str)> = Vec::new();
        for (keyword, re) in &self.rules {
            let found = re
                .find_iter(content)
                .map(|m| m.range())
                .find(|r| !in_markup(r) && !links.iter().any(|(l, _)| r.start < l.end && l.start < r.end));
            if let Some(range) = found {
                links.push((range, keyword.as_str()));
            }
        }
        links.sort_by_key(|(r, _)| r.start);

        let mut out = String::with_capacity(content.len() + links.len() * 96);
        let mut cursor = 0;
        for (range, keyword) in links {
            out.push_str(&content[cursor..range.start]);
            out.push_str(&format!(
                r#"<a href="{}?keyword={}" rel="nofollow sponsored" target="_blank">{}</a>"#,
                self.base_url,
                urlencoding::encode(keyword),
                &content[range.clone()]
            ));
            cursor = range.end;
            debug!(%keyword, "Inserted affiliate link");
        }
        out.push_str(&content[cursor..]);
        out
    }
}
