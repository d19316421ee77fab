use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::models::UrlMetadata;

static YOUTUBE_URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:youtube\.com/(?:watch\?v=|embed/|shorts/)|youtu\.be/)([\w-]+)")
        .expect("youtube url pattern should compile")
});

/// Browser-like headers; some sites refuse plain client UAs
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";

fn youtube_video_id(url: &str) -> Option<&str> {
    YOUTUBE_URL_PATTERN
        .captures(url)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

/// Best-effort scan of an HTML document for metadata tags
///
/// Each field tries an ordered list of tag-name synonyms; the first
/// non-empty match wins. A malformed document just yields empty fields.
pub struct MetaTagExtractor<'a> {
    html: &'a str,
}

impl<'a> MetaTagExtractor<'a> {
    pub fn new(html: &'a str) -> Self {
        Self { html }
    }

    /// Finds a `<meta>` tag's content by its `property` or `name`,
    /// whichever attribute order the document uses
    fn meta_content(&self, tag: &str) -> Option<String> {
        let tag = regex::escape(tag);
        let patterns = [
            format!(
                r#"(?i)<meta[^>]*property=["']{}["'][^>]*content=["']([^"']+)["']"#,
                tag
            ),
            format!(
                r#"(?i)<meta[^>]*content=["']([^"']+)["'][^>]*property=["']{}["']"#,
                tag
            ),
            format!(
                r#"(?i)<meta[^>]*name=["']{}["'][^>]*content=["']([^"']+)["']"#,
                tag
            ),
            format!(
                r#"(?i)<meta[^>]*content=["']([^"']+)["'][^>]*name=["']{}["']"#,
                tag
            ),
        ];

        for pattern in &patterns {
            let Ok(re) = Regex::new(pattern) else {
                continue;
            };
            if let Some(captures) = re.captures(self.html) {
                return Some(captures[1].to_string());
            }
        }

        None
    }

    fn first_meta(&self, tags: &[&str]) -> Option<String> {
        tags.iter()
            .filter_map(|tag| self.meta_content(tag))
            .find(|content| !content.trim().is_empty())
    }

    pub fn title(&self) -> String {
        self.first_meta(&["og:title", "twitter:title"])
            .or_else(|| {
                static TITLE_TAG: Lazy<Regex> = Lazy::new(|| {
                    Regex::new(r"(?i)<title[^>]*>([^<]+)</title>")
                        .expect("title tag pattern should compile")
                });
                TITLE_TAG
                    .captures(self.html)
                    .map(|captures| captures[1].to_string())
            })
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    pub fn image(&self) -> String {
        self.first_meta(&["og:image", "twitter:image"])
            .unwrap_or_default()
    }

    pub fn creator(&self) -> String {
        self.first_meta(&["author", "og:site_name"])
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

/// Resolves an arbitrary URL into structured media metadata
///
/// Known video-hosting URLs go through the platform's embed-info
/// endpoint; everything else falls back to fetching the document and
/// scanning its metadata tags.
pub struct UrlMetadataService {
    http: HttpClient,
}

#[derive(Deserialize)]
struct OembedResponse {
    title: String,
    author_name: Option<String>,
}

impl UrlMetadataService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn resolve(&self, url: &str) -> AppResult<UrlMetadata> {
        if let Some(video_id) = youtube_video_id(url) {
            if let Some(metadata) = self.fetch_oembed(url, video_id).await {
                return Ok(metadata);
            }
            // oEmbed failure falls through to tag scraping.
        }

        self.scrape_document(url).await
    }

    async fn fetch_oembed(&self, url: &str, video_id: &str) -> Option<UrlMetadata> {
        let watch_url = format!("https://www.youtube.com/watch?v={}", video_id);
        let response = self
            .http
            .get("https://www.youtube.com/oembed")
            .query(&[("url", watch_url.as_str()), ("format", "json")])
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            tracing::debug!(video_id = %video_id, status = %response.status(), "oEmbed lookup failed");
            return None;
        }

        let parsed: OembedResponse = response.json().await.ok()?;

        Some(UrlMetadata {
            title: parsed.title,
            creator: parsed.author_name.unwrap_or_default(),
            cover_image_url: format!(
                "https://img.youtube.com/vi/{}/maxresdefault.jpg",
                video_id
            ),
            external_id: url.to_string(),
            source: "youtube",
        })
    }

    async fn scrape_document(&self, url: &str) -> AppResult<UrlMetadata> {
        let response = self
            .http
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .send()
            .await
            .map_err(|e| {
                tracing::debug!(url = %url, error = %e, "Document fetch failed");
                AppError::InvalidInput("Failed to fetch URL".to_string())
            })?;

        if !response.status().is_success() {
            return Err(AppError::InvalidInput("Failed to fetch URL".to_string()));
        }

        let html = response.text().await?;
        let extractor = MetaTagExtractor::new(&html);

        Ok(UrlMetadata {
            title: extractor.title(),
            creator: extractor.creator(),
            cover_image_url: extractor.image(),
            external_id: url.to_string(),
            source: "opengraph",
        })
    }
}
