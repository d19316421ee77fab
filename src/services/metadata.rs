use crate::error::{AppError, AppResult};
use crate::models::{MediaCategory, MetadataCandidate};
use crate::services::providers::{
    AudioKind, GoogleBooksProvider, OpenLibraryProvider, SpotifyProvider, TmdbProvider,
    MAX_RESULTS,
};

/// Queries below this length return nothing without a network call.
/// Cost control, not validation.
const MIN_QUERY_LEN: usize = 2;

/// Primary book results at or above this count skip the secondary catalog
const BOOK_PRIMARY_SUFFICIENT: usize = 3;

/// Category-dispatched search across the metadata providers
///
/// Adapter failures are isolated here: a dead provider degrades to an
/// empty list for that adapter instead of blanking the whole response.
/// Only a missing credential (`AppError::Config`) propagates.
pub struct MetadataResolver {
    tmdb: TmdbProvider,
    books_primary: GoogleBooksProvider,
    books_secondary: OpenLibraryProvider,
    audio: SpotifyProvider,
}

/// Lowercase title with all non-alphanumeric characters removed
fn normalize_title_key(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Concatenates primary results before secondary, dropping later
/// duplicates by normalized title (primary wins ties), capped at
/// `MAX_RESULTS`
fn merge_books(
    primary: Vec<MetadataCandidate>,
    secondary: Vec<MetadataCandidate>,
) -> Vec<MetadataCandidate> {
    let mut seen = std::collections::HashSet::new();
    let mut merged = Vec::new();

    for candidate in primary.into_iter().chain(secondary) {
        if seen.insert(normalize_title_key(&candidate.title)) {
            merged.push(candidate);
        }
    }

    merged.truncate(MAX_RESULTS);
    merged
}

/// Degrades an adapter failure to an empty list, except for missing
/// credentials which fail the request
fn isolate(
    result: AppResult<Vec<MetadataCandidate>>,
    provider: &'static str,
) -> AppResult<Vec<MetadataCandidate>> {
    match result {
        Ok(candidates) => Ok(candidates),
        Err(AppError::Config(msg)) => Err(AppError::Config(msg)),
        Err(e) => {
            tracing::warn!(provider = provider, error = %e, "Adapter failed, degrading to empty");
            Ok(Vec::new())
        }
    }
}

impl MetadataResolver {
    pub fn new(
        tmdb: TmdbProvider,
        books_primary: GoogleBooksProvider,
        books_secondary: OpenLibraryProvider,
        audio: SpotifyProvider,
    ) -> Self {
        Self {
            tmdb,
            books_primary,
            books_secondary,
            audio,
        }
    }

    /// Returns up to 8 candidates for a free-text query in one category
    pub async fn search(
        &self,
        query: &str,
        category: MediaCategory,
    ) -> AppResult<Vec<MetadataCandidate>> {
        let query = query.trim();
        if query.len() < MIN_QUERY_LEN {
            return Ok(Vec::new());
        }

        match category {
            MediaCategory::Movie | MediaCategory::Video => {
                isolate(self.tmdb.search(query, category).await, "tmdb")
            }
            MediaCategory::Book => self.search_books(query).await,
            MediaCategory::Album => {
                isolate(self.audio.search(query, AudioKind::Album).await, "spotify")
            }
            MediaCategory::Podcast => {
                isolate(self.audio.search(query, AudioKind::Episode).await, "spotify")
            }
            // No catalog exists for these; manual entry only.
            MediaCategory::Blog | MediaCategory::Idea => Ok(Vec::new()),
        }
    }

    /// Two-tier book resolution: primary first, secondary only when the
    /// primary comes back with fewer than 3 results
    async fn search_books(&self, query: &str) -> AppResult<Vec<MetadataCandidate>> {
        let primary = isolate(self.books_primary.search(query).await, "google_books")?;

        if primary.len() >= BOOK_PRIMARY_SUFFICIENT {
            return Ok(primary);
        }

        let secondary = isolate(self.books_secondary.search(query).await, "open_library")?;

        Ok(merge_books(primary, secondary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provenance;
    use crate::services::clock::SystemClock;
    use crate::services::token_cache::{SpotifyExchanger, TokenCache};
    use std::sync::Arc;

    fn book(title: &str, provenance: Provenance) -> MetadataCandidate {
        MetadataCandidate {
            id: format!("test-{}", title),
            title: title.to_string(),
            year: None,
            cover_image_url: None,
            creator: None,
            category: MediaCategory::Book,
            provenance,
        }
    }

    /// Resolver wired to unreachable endpoints; fine for paths that never
    /// touch the network.
    fn offline_resolver() -> MetadataResolver {
        let http = reqwest::Client::new();
        let tokens = Arc::new(TokenCache::new(
            Arc::new(SpotifyExchanger::new(
                http.clone(),
                "http://localhost:1/token".to_string(),
                None,
                None,
            )),
            Arc::new(SystemClock),
        ));

        MetadataResolver::new(
            TmdbProvider::new(http.clone(), "http://localhost:1".to_string(), None),
            GoogleBooksProvider::new(http.clone(), "http://localhost:1".to_string()),
            OpenLibraryProvider::new(http.clone(), "http://localhost:1".to_string()),
            SpotifyProvider::new(http, "http://localhost:1".to_string(), tokens),
        )
    }

    #[test]
    fn test_normalize_title_key() {
        assert_eq!(normalize_title_key("The Hobbit"), "thehobbit");
        assert_eq!(normalize_title_key("the hobbit!"), "thehobbit");
        assert_eq!(normalize_title_key("Catch-22 (1st ed.)"), "catch221sted");
    }

    #[test]
    fn test_merge_books_dedup_prefers_primary() {
        let primary = vec![book("The Hobbit", Provenance::GoogleBooks)];
        let secondary = vec![
            book("the hobbit!", Provenance::OpenLibrary),
            book("The Two Towers", Provenance::OpenLibrary),
        ];

        let merged = merge_books(primary, secondary);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].title, "The Hobbit");
        assert_eq!(merged[0].provenance, Provenance::GoogleBooks);
        assert_eq!(merged[1].title, "The Two Towers");
    }

    #[test]
    fn test_merge_books_caps_at_eight() {
        let primary: Vec<_> = (0..6)
            .map(|i| book(&format!("Primary {}", i), Provenance::GoogleBooks))
            .collect();
        let secondary: Vec<_> = (0..6)
            .map(|i| book(&format!("Secondary {}", i), Provenance::OpenLibrary))
            .collect();

        let merged = merge_books(primary, secondary);
        assert_eq!(merged.len(), 8);
        assert_eq!(merged[0].title, "Primary 0");
        assert_eq!(merged[7].title, "Secondary 1");
    }

    #[test]
    fn test_isolate_degrades_upstream_failure() {
        let result = isolate(
            Err(AppError::Upstream("TMDB returned status 503".to_string())),
            "tmdb",
        );
        assert_eq!(result.unwrap(), Vec::new());
    }

    #[test]
    fn test_isolate_propagates_missing_credential() {
        let result = isolate(
            Err(AppError::Config("TMDB API key not configured".to_string())),
            "tmdb",
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_short_query_returns_empty_without_network() {
        let resolver = offline_resolver();
        for category in [MediaCategory::Movie, MediaCategory::Book, MediaCategory::Album] {
            let results = resolver.search("a", category).await.unwrap();
            assert!(results.is_empty());
        }
    }

    #[tokio::test]
    async fn test_blog_and_idea_have_no_provider() {
        let resolver = offline_resolver();
        assert!(resolver
            .search("some blog", MediaCategory::Blog)
            .await
            .unwrap()
            .is_empty());
        assert!(resolver
            .search("an idea", MediaCategory::Idea)
            .await
            .unwrap()
            .is_empty());
    }
}
