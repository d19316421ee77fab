use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::models::{MediaCategory, MetadataCandidate, Provenance};
use crate::services::providers::{year_from_date, MAX_RESULTS};

const IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";

/// TMDB multi-type catalog adapter for movie and video searches
///
/// One `search/multi` call filtered to movie and tv kinds; the requested
/// category only decides how matching results are tagged.
pub struct TmdbProvider {
    http: HttpClient,
    api_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct MultiSearchResponse {
    #[serde(default)]
    results: Vec<MultiSearchResult>,
}

#[derive(Deserialize)]
struct MultiSearchResult {
    id: u64,
    media_type: String,
    /// Movies carry `title`, TV shows carry `name`
    title: Option<String>,
    name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    poster_path: Option<String>,
}

fn to_candidate(result: MultiSearchResult, category: MediaCategory) -> Option<MetadataCandidate> {
    if result.media_type != "movie" && result.media_type != "tv" {
        return None;
    }

    let title = result.title.or(result.name)?;
    let date = result.release_date.as_deref().or(result.first_air_date.as_deref());

    Some(MetadataCandidate {
        id: format!("tmdb-{}", result.id),
        title,
        year: year_from_date(date),
        cover_image_url: result
            .poster_path
            .map(|path| format!("{}{}", IMAGE_BASE, path)),
        creator: None,
        category,
        provenance: Provenance::Tmdb,
    })
}

impl TmdbProvider {
    pub fn new(http: HttpClient, api_url: String, api_key: Option<String>) -> Self {
        Self {
            http,
            api_url,
            api_key,
        }
    }

    /// Searches movies and TV, tagging results as `category`
    pub async fn search(
        &self,
        query: &str,
        category: MediaCategory,
    ) -> AppResult<Vec<MetadataCandidate>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Config("TMDB API key not configured".to_string()))?;

        let url = format!("{}/search/multi", self.api_url);
        let response = self
            .http
            .get(&url)
            .query(&[("api_key", api_key), ("query", query), ("page", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "TMDB returned status {}",
                response.status()
            )));
        }

        let parsed: MultiSearchResponse = response.json().await?;
        let candidates: Vec<MetadataCandidate> = parsed
            .results
            .into_iter()
            .filter_map(|result| to_candidate(result, category))
            .take(MAX_RESULTS)
            .collect();

        tracing::debug!(query = %query, results = candidates.len(), provider = "tmdb", "Search completed");

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movie_result_maps_to_candidate() {
        let json = r#"{
            "id": 27205,
            "media_type": "movie",
            "title": "Inception",
            "release_date": "2010-07-16",
            "poster_path": "/inception.jpg"
        }"#;

        let result: MultiSearchResult = serde_json::from_str(json).unwrap();
        let candidate = to_candidate(result, MediaCategory::Movie).unwrap();

        assert_eq!(candidate.id, "tmdb-27205");
        assert_eq!(candidate.title, "Inception");
        assert_eq!(candidate.year, Some(2010));
        assert_eq!(
            candidate.cover_image_url.as_deref(),
            Some("https://image.tmdb.org/t/p/w500/inception.jpg")
        );
        assert_eq!(candidate.provenance, Provenance::Tmdb);
    }

    #[test]
    fn test_tv_result_uses_name_and_first_air_date() {
        let json = r#"{
            "id": 1396,
            "media_type": "tv",
            "name": "Breaking Bad",
            "first_air_date": "2008-01-20"
        }"#;

        let result: MultiSearchResult = serde_json::from_str(json).unwrap();
        let candidate = to_candidate(result, MediaCategory::Video).unwrap();

        assert_eq!(candidate.title, "Breaking Bad");
        assert_eq!(candidate.year, Some(2008));
        assert_eq!(candidate.category, MediaCategory::Video);
        assert!(candidate.cover_image_url.is_none());
    }

    #[test]
    fn test_person_result_is_filtered_out() {
        let json = r#"{
            "id": 6193,
            "media_type": "person",
            "name": "Leonardo DiCaprio"
        }"#;

        let result: MultiSearchResult = serde_json::from_str(json).unwrap();
        assert!(to_candidate(result, MediaCategory::Movie).is_none());
    }
}
