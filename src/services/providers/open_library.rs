use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::models::{MediaCategory, MetadataCandidate, Provenance};
use crate::services::providers::MAX_RESULTS;

/// Open Library adapter: the secondary book catalog, consulted when the
/// primary comes back thin
pub struct OpenLibraryProvider {
    http: HttpClient,
    api_url: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<Doc>,
}

#[derive(Deserialize)]
struct Doc {
    key: String,
    title: Option<String>,
    first_publish_year: Option<i32>,
    cover_i: Option<i64>,
    author_name: Option<Vec<String>>,
}

fn to_candidate(doc: Doc) -> Option<MetadataCandidate> {
    let title = doc.title?;

    Some(MetadataCandidate {
        id: format!("ol-{}", doc.key),
        title,
        year: doc.first_publish_year,
        cover_image_url: doc
            .cover_i
            .map(|cover| format!("https://covers.openlibrary.org/b/id/{}-L.jpg", cover)),
        creator: doc.author_name.and_then(|names| names.into_iter().next()),
        category: MediaCategory::Book,
        provenance: Provenance::OpenLibrary,
    })
}

impl OpenLibraryProvider {
    pub fn new(http: HttpClient, api_url: String) -> Self {
        Self { http, api_url }
    }

    pub async fn search(&self, query: &str) -> AppResult<Vec<MetadataCandidate>> {
        let url = format!("{}/search.json", self.api_url);
        let response = self
            .http
            .get(&url)
            .query(&[("q", query), ("limit", "8")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Open Library returned status {}",
                response.status()
            )));
        }

        let parsed: SearchResponse = response.json().await?;
        let candidates: Vec<MetadataCandidate> = parsed
            .docs
            .into_iter()
            .filter_map(to_candidate)
            .take(MAX_RESULTS)
            .collect();

        tracing::debug!(query = %query, results = candidates.len(), provider = "open_library", "Search completed");

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_maps_to_candidate() {
        let json = r#"{
            "key": "/works/OL262758W",
            "title": "The Hobbit",
            "first_publish_year": 1937,
            "cover_i": 14627060,
            "author_name": ["J.R.R. Tolkien"]
        }"#;

        let doc: Doc = serde_json::from_str(json).unwrap();
        let candidate = to_candidate(doc).unwrap();

        assert_eq!(candidate.id, "ol-/works/OL262758W");
        assert_eq!(candidate.year, Some(1937));
        assert_eq!(
            candidate.cover_image_url.as_deref(),
            Some("https://covers.openlibrary.org/b/id/14627060-L.jpg")
        );
        assert_eq!(candidate.provenance, Provenance::OpenLibrary);
    }

    #[test]
    fn test_doc_without_cover_or_author() {
        let json = r#"{"key": "/works/OL1W", "title": "Obscure Tome"}"#;
        let doc: Doc = serde_json::from_str(json).unwrap();
        let candidate = to_candidate(doc).unwrap();

        assert!(candidate.cover_image_url.is_none());
        assert!(candidate.creator.is_none());
    }
}
