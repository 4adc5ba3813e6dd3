//! Image resolution for content items.
//!
//! Priority chain:
//! 1. The image the provider already supplied on the item
//! 2. `og:image` meta tag on the source page
//! 3. `twitter:image` meta tag
//! 4. The first `<img src>` in document order
//!
//! Candidates from the page are resolved against the page URL, so relative
//! and protocol-relative paths come back absolute. Every failure along the
//! way (bad URL, network error, non-200, nothing found) ends in `None`.

use crate::error::ImageError;
use crate::models::ContentItem;
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Boundary to whatever downloads the source page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn get_html(&self, url: &str, timeout: Duration) -> Result<(u16, String), ImageError>;
}

/// reqwest-backed [`PageFetcher`].
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new() -> Result<Self, ImageError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("content_booster/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn get_html(&self, url: &str, timeout: Duration) -> Result<(u16, String), ImageError> {
        let resp = self.client.get(url).timeout(timeout).send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok((status, body))
    }
}

pub struct ImageResolver {
    fetcher: Arc<dyn PageFetcher>,
    timeout: Duration,
}

impl ImageResolver {
    pub fn new(fetcher: Arc<dyn PageFetcher>, timeout: Duration) -> Self {
        Self { fetcher, timeout }
    }

    /// Pick an image for `item`, scraping its source page if needed.
    #[instrument(level = "debug", skip_all, fields(url = %item.url))]
    pub async fn resolve(&self, item: &ContentItem) -> Option<String> {
        if let Some(image) = item.image.as_deref().map(str::trim).filter(|i| !i.is_empty()) {
            return Some(image.to_string());
        }
        if item.url.trim().is_empty() {
            return None;
        }
        self.from_page(&item.url).await
    }

    /// Scrape `page_url` for an image candidate.
    pub async fn from_page(&self, page_url: &str) -> Option<String> {
        match self.scrape(page_url).await {
            Ok(found) => {
                if found.is_none() {
                    debug!(%page_url, "No image candidates on page");
                }
                found
            }
            Err(e) => {
                debug!(%page_url, error = %e, "Image unresolved");
                None
            }
        }
    }

    async fn scrape(&self, page_url: &str) -> Result<Option<String>, ImageError> {
        let base = Url::parse(page_url.trim()).map_err(|_| ImageError::InvalidUrl(page_url.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ImageError::InvalidUrl(page_url.to_string()));
        }
        let (status, html) = self.fetcher.get_html(base.as_str(), self.timeout).await?;
        if status != 200 {
            return Err(ImageError::Status(status));
        }
        Ok(extract_image(&html, &base))
    }
}

/// First image candidate in `html`, resolved against `base`.
pub fn extract_image(html: &str, base: &Url) -> Option<String> {
    let document = Html::parse_document(html);

    let og = Selector::parse(r#"meta[property="og:image"], meta[name="og:image"]"#).ok()?;
    let twitter = Selector::parse(r#"meta[name="twitter:image"], meta[property="twitter:image"]"#).ok()?;
    let img = Selector::parse("img[src]").ok()?;

    let meta_content = |selector: &Selector| {
        document
            .select(selector)
            .filter_map(|el| el.value().attr("content"))
            .find_map(|c| absolutize(base, c))
    };

    meta_content(&og).or_else(|| meta_content(&twitter)).or_else(|| {
        document
            .select(&img)
            .filter_map(|el| el.value().attr("src"))
            .find_map(|src| absolutize(base, src))
    })
}

fn absolutize(base: &Url, candidate: &str) -> Option<String> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }
    let resolved = base.join(candidate).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct StubPages {
        response: Result<(u16, String), String>,
        requested: Mutex<Vec<String>>,
    }

    impl StubPages {
        fn ok(status: u16, html: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Ok((status, html.to_string())),
                requested: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl PageFetcher for StubPages {
        async fn get_html(&self, url: &str, _timeout: Duration) -> Result<(u16, String), ImageError> {
            self.requested.lock().unwrap().push(url.to_string());
            self.response.clone().map_err(ImageError::Fetch)
        }
    }

    fn item(url: &str, image: Option<&str>) -> ContentItem {
        ContentItem {
            title: "T".into(),
            content: "C".into(),
            url: url.into(),
            image: image.map(str::to_string),
            category: "News".into(),
            provider: "p".into(),
            post_type: "post".into(),
            published_at: None,
        }
    }

    fn base() -> Url {
        Url::parse("https://news.example.com/world/story.html").unwrap()
    }

    #[test]
    fn test_og_beats_twitter_and_img() {
        let html = r#"<html><head>
            <meta name="twitter:image" content="https://cdn.example.com/tw.jpg">
            <meta property="og:image" content="https://cdn.example.com/og.jpg">
        </head><body><img src="/first.png"></body></html>"#;
        assert_eq!(extract_image(html, &base()).as_deref(), Some("https://cdn.example.com/og.jpg"));
    }

    #[test]
    fn test_twitter_beats_img() {
        let html = r#"<meta name="twitter:image" content="/tw.jpg"><img src="/first.png">"#;
        assert_eq!(
            extract_image(html, &base()).as_deref(),
            Some("https://news.example.com/tw.jpg")
        );
    }

    #[test]
    fn test_first_img_is_resolved_relative_to_page() {
        let html = r#"<body><p>x</p><img src="images/a.png"><img src="/b.png"></body>"#;
        assert_eq!(
            extract_image(html, &base()).as_deref(),
            Some("https://news.example.com/world/images/a.png")
        );
        let proto_relative = r#"<img src="//static.example.net/c.png">"#;
        assert_eq!(
            extract_image(proto_relative, &base()).as_deref(),
            Some("https://static.example.net/c.png")
        );
    }

    #[test]
    fn test_empty_candidates_and_data_uris_are_ignored() {
        let html = r#"<meta property="og:image" content=" "><img src="data:image/png;base64,AAAA"><img src="/real.png">"#;
        assert_eq!(
            extract_image(html, &base()).as_deref(),
            Some("https://news.example.com/real.png")
        );
        assert_eq!(extract_image("<p>no images</p>", &base()), None);
        assert_eq!(extract_image("<<<not html", &base()), None);
    }

    #[tokio::test]
    async fn test_explicit_image_skips_page_fetch() {
        let pages = StubPages::ok(200, r#"<img src="/x.png">"#);
        let resolver = ImageResolver::new(pages.clone(), Duration::from_secs(1));
        let got = resolver.resolve(&item("https://a.io/s", Some("https://a.io/given.png"))).await;
        assert_eq!(got.as_deref(), Some("https://a.io/given.png"));
        assert!(pages.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scrapes_when_image_missing() {
        let pages = StubPages::ok(200, r#"<meta property="og:image" content="/og.png">"#);
        let resolver = ImageResolver::new(pages, Duration::from_secs(1));
        let got = resolver.resolve(&item("https://a.io/s", None)).await;
        assert_eq!(got.as_deref(), Some("https://a.io/og.png"));
    }

    #[tokio::test]
    async fn test_failures_yield_no_image() {
        let not_found = ImageResolver::new(StubPages::ok(404, r#"<img src="/x.png">"#), Duration::from_secs(1));
        assert_eq!(not_found.resolve(&item("https://a.io/s", None)).await, None);

        let broken = ImageResolver::new(
            Arc::new(StubPages {
                response: Err("connection reset".into()),
                requested: Mutex::new(Vec::new()),
            }),
            Duration::from_secs(1),
        );
        assert_eq!(broken.resolve(&item("https://a.io/s", None)).await, None);

        let pages = StubPages::ok(200, r#"<img src="/x.png">"#);
        let invalid = ImageResolver::new(pages.clone(), Duration::from_secs(1));
        assert_eq!(invalid.resolve(&item("not a url", None)).await, None);
        assert_eq!(invalid.resolve(&item("", None)).await, None);
        assert!(pages.requested.lock().unwrap().is_empty());
    }
}
