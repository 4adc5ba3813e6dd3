//! News articles: body cleaning and short-content expansion.

use super::{absolute_url, records};
use crate::models::{ContentItem, ContentType};
use crate::record::list_at;
use crate::utils::{collapse_whitespace, word_count};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Continuation sentence appended to expanded snippets.
pub(super) const STAY_TUNED: &str = "Stay tuned for more updates!";

/// Word count under which a body gets expanded.
const EXPAND_BELOW: usize = 100;

static RE_TRUNCATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\+\d+\s*chars\]").unwrap());

pub(super) fn parse(raw: &Value) -> Vec<ContentItem> {
    let Some(list) = list_at(raw, &["articles", "news"]) else {
        debug!("No article list in news response");
        return Vec::new();
    };

    records(list, "news")
        .filter_map(|r| {
            let Some(title) = r.get_opt(&["title"]) else {
                debug!("Skipped news item: missing title");
                return None;
            };
            let Some(url) = r.get_opt(&["url", "link"]).as_deref().and_then(absolute_url) else {
                debug!(%title, "Skipped news item: missing or invalid url");
                return None;
            };

            let body = clean_content(&r.get_string(&["content", "body", "fullText"], ""));
            let description = clean_content(&r.get_string(&["description"], ""));

            let source_words = if description.is_empty() || body.contains(&description) {
                word_count(&body)
            } else {
                word_count(&body) + word_count(&description)
            };
            if source_words < ContentType::News.min_words() {
                debug!(%title, %url, words = source_words, "Skipped news item: content too short");
                return None;
            }

            Some(ContentItem {
                content: expand(&title, &body, &description),
                image: r.get_opt(&["urlToImage", "image", "thumbnail"]),
                category: r.get_string(&["category"], "News"),
                provider: r.get_string(&["source.name"], "newsapi"),
                post_type: "post".to_string(),
                published_at: r.get_opt(&["publishedAt", "published_at", "pubDate"]),
                title,
                url,
            })
        })
        .collect()
}

/// Remove API truncation markers like `[+1234 chars]` and collapse whitespace.
pub(super) fn clean_content(s: &str) -> String {
    collapse_whitespace(&RE_TRUNCATION.replace_all(s, ""))
}

/// Pad a short body with the description, a bold title line and a
/// continuation sentence.
///
/// Bodies of 100 words or more are returned unchanged. Otherwise the
/// description is appended unless the body already contains it; if the result
/// is still under 100 words the title is prefixed in `<strong>`; finally
/// [`STAY_TUNED`] is appended.
pub(super) fn expand(title: &str, content: &str, description: &str) -> String {
    if word_count(content) >= EXPAND_BELOW {
        return content.to_string();
    }

    let mut out = content.to_string();
    let description = description.trim();
    if !description.is_empty() && !out.contains(description) {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(description);
    }

    if word_count(&out) < EXPAND_BELOW && !title.trim().is_empty() {
        out = format!("<strong>{}</strong>\n\n{}", escape_html(title.trim()), out);
    }

    out.push_str("\n\n");
    out.push_str(STAY_TUNED);
    out
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn words(n: usize) -> String {
        vec!["lorem"; n].join(" ")
    }

    fn other_words(n: usize) -> String {
        vec!["ipsum"; n].join(" ")
    }

    #[test]
    fn test_clean_content_strips_truncation_marker() {
        assert_eq!(
            clean_content("Markets rallied   today…\n [+2893 chars]"),
            "Markets rallied today…"
        );
    }

    #[test]
    fn test_expand_is_noop_for_long_content() {
        let long = words(120);
        assert_eq!(expand("Title", &long, "desc here"), long);
    }

    #[test]
    fn test_expand_adds_description_title_and_continuation() {
        let out = expand("Big & Bold", "short body", "extra context");
        assert!(out.starts_with("<strong>Big &amp; Bold</strong>\n\n"));
        assert!(out.contains("short body\n\nextra context"));
        assert!(out.ends_with(STAY_TUNED));
        assert!(word_count(&out) >= word_count("short body"));
    }

    #[test]
    fn test_expand_skips_description_already_contained() {
        let out = expand("T", "the body says more", "says more");
        assert_eq!(out.matches("says more").count(), 1);
    }

    #[test]
    fn test_expand_without_title_prefix_once_long_enough() {
        let body = words(95);
        let out = expand("Headline", &body, &other_words(10));
        assert!(!out.contains("<strong>"));
        assert!(out.ends_with(STAY_TUNED));
    }

    #[test]
    fn test_ten_word_floor_is_checked_before_expansion() {
        let raw = json!({"articles": [
            {"title": "Nine", "url": "https://n.io/9", "content": words(9)},
            {"title": "Ten", "url": "https://n.io/10", "content": words(10)},
            {"title": "Split", "url": "https://n.io/s", "content": words(6), "description": other_words(4)}
        ]});
        let items = parse(&raw);
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, ["Ten", "Split"]);
        assert!(items[0].content.contains("<strong>Ten</strong>"));
    }

    #[test]
    fn test_maps_fields_with_fallbacks() {
        let raw = json!({"news": [
            {
                "title": " Chip rally ",
                "link": "https://wire.example/chips",
                "body": format!("{} [+120 chars]", words(12)),
                "image": "https://wire.example/c.png",
                "source": {"name": "Wire"},
                "publishedAt": "2025-05-06T14:30:00Z"
            },
            {"title": "No url", "content": words(20)},
            {"title": "Relative", "url": "/a/b", "content": words(20)},
            "not a record",
            {"url": "https://wire.example/untitled", "content": words(20)}
        ]});
        let items = parse(&raw);
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.title, "Chip rally");
        assert_eq!(item.url, "https://wire.example/chips");
        assert_eq!(item.image.as_deref(), Some("https://wire.example/c.png"));
        assert_eq!(item.provider, "Wire");
        assert_eq!(item.category, "News");
        assert_eq!(item.post_type, "post");
        assert!(!item.content.contains("chars]"));
        assert_eq!(item.published_at.as_deref(), Some("2025-05-06T14:30:00Z"));
    }

    #[test]
    fn test_cyrillic_article_passes_word_floor() {
        let body = "Центральный банк России в пятницу сохранил ключевую ставку на прежнем уровне, \
                    сообщили аналитики после заседания совета директоров";
        let raw = json!({"articles": [{"title": "Ставка", "url": "https://ru.example/a", "content": body}]});
        let items = parse(&raw);
        assert_eq!(items.len(), 1);
        assert!(items[0].content.starts_with("<strong>Ставка</strong>"));
    }

    #[test]
    fn test_root_list_is_accepted() {
        let raw = json!([{"title": "Root", "url": "https://r.io", "content": words(30)}]);
        let items = parse(&raw);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].provider, "newsapi");
    }
}
