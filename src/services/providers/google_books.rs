use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::models::{MediaCategory, MetadataCandidate, Provenance};
use crate::services::providers::{year_from_date, MAX_RESULTS};

/// Google Books adapter: the primary book catalog
pub struct GoogleBooksProvider {
    http: HttpClient,
    api_url: String,
}

#[derive(Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Deserialize)]
struct Volume {
    id: String,
    #[serde(rename = "volumeInfo", default)]
    volume_info: VolumeInfo,
}

#[derive(Deserialize, Default)]
struct VolumeInfo {
    title: Option<String>,
    authors: Option<Vec<String>>,
    #[serde(rename = "publishedDate")]
    published_date: Option<String>,
    #[serde(rename = "imageLinks")]
    image_links: Option<ImageLinks>,
}

#[derive(Deserialize)]
struct ImageLinks {
    #[serde(rename = "extraLarge")]
    extra_large: Option<String>,
    large: Option<String>,
    medium: Option<String>,
    thumbnail: Option<String>,
    #[serde(rename = "smallThumbnail")]
    small_thumbnail: Option<String>,
}

/// Picks the largest available cover and upgrades it for display
///
/// Google serves http links and a tiny default zoom; both get rewritten.
fn pick_cover(links: ImageLinks) -> Option<String> {
    let url = links
        .extra_large
        .or(links.large)
        .or(links.medium)
        .or(links.thumbnail)
        .or(links.small_thumbnail)?;

    Some(url.replace("http://", "https://").replace("zoom=1", "zoom=3"))
}

fn to_candidate(volume: Volume) -> Option<MetadataCandidate> {
    let info = volume.volume_info;
    let title = info.title?;

    Some(MetadataCandidate {
        id: format!("gbooks-{}", volume.id),
        title,
        year: year_from_date(info.published_date.as_deref()),
        cover_image_url: info.image_links.and_then(pick_cover),
        creator: info.authors.and_then(|authors| authors.into_iter().next()),
        category: MediaCategory::Book,
        provenance: Provenance::GoogleBooks,
    })
}

impl GoogleBooksProvider {
    pub fn new(http: HttpClient, api_url: String) -> Self {
        Self { http, api_url }
    }

    pub async fn search(&self, query: &str) -> AppResult<Vec<MetadataCandidate>> {
        let url = format!("{}/volumes", self.api_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("q", query),
                ("maxResults", "8"),
                ("printType", "books"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Google Books returned status {}",
                response.status()
            )));
        }

        let parsed: VolumesResponse = response.json().await?;
        let candidates: Vec<MetadataCandidate> = parsed
            .items
            .into_iter()
            .filter_map(to_candidate)
            .take(MAX_RESULTS)
            .collect();

        tracing::debug!(query = %query, results = candidates.len(), provider = "google_books", "Search completed");

        Ok(candidates)
    }
}
