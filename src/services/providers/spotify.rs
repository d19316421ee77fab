use std::sync::Arc;

use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::models::{MediaCategory, MetadataCandidate, Provenance};
use crate::services::providers::{year_from_date, MAX_RESULTS};
use crate::services::token_cache::TokenCache;

/// Which half of the audio catalog a search targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioKind {
    Album,
    Episode,
}

impl AudioKind {
    fn search_type(&self) -> &'static str {
        match self {
            AudioKind::Album => "album",
            AudioKind::Episode => "episode",
        }
    }

    fn category(&self) -> MediaCategory {
        match self {
            AudioKind::Album => MediaCategory::Album,
            AudioKind::Episode => MediaCategory::Podcast,
        }
    }
}

/// Spotify catalog adapter covering both albums and podcast episodes
///
/// The only adapter that needs a credential exchange: every search
/// acquires a bearer token through the shared `TokenCache` first.
pub struct SpotifyProvider {
    http: HttpClient,
    api_url: String,
    tokens: Arc<TokenCache>,
}

#[derive(Deserialize)]
struct SearchResponse {
    albums: Option<Page<Album>>,
    episodes: Option<Page<Episode>>,
}

#[derive(Deserialize)]
struct Page<T> {
    #[serde(default)]
    items: Vec<Option<T>>,
}

#[derive(Deserialize, Default)]
struct Album {
    id: String,
    name: String,
    release_date: Option<String>,
    #[serde(default)]
    images: Vec<Image>,
    #[serde(default)]
    artists: Vec<Artist>,
}

#[derive(Deserialize, Default)]
struct Episode {
    id: String,
    name: String,
    release_date: Option<String>,
    #[serde(default)]
    images: Vec<Image>,
    show: Option<Show>,
}

#[derive(Deserialize)]
struct Image {
    url: String,
}

#[derive(Deserialize)]
struct Artist {
    name: String,
}

#[derive(Deserialize)]
struct Show {
    name: String,
}

fn album_to_candidate(album: Album) -> MetadataCandidate {
    let creator = if album.artists.is_empty() {
        None
    } else {
        Some(
            album
                .artists
                .into_iter()
                .map(|artist| artist.name)
                .collect::<Vec<_>>()
                .join(", "),
        )
    };

    MetadataCandidate {
        id: format!("spotify-{}", album.id),
        title: album.name,
        year: year_from_date(album.release_date.as_deref()),
        cover_image_url: album.images.into_iter().next().map(|image| image.url),
        creator,
        category: MediaCategory::Album,
        provenance: Provenance::Spotify,
    }
}

fn episode_to_candidate(episode: Episode) -> MetadataCandidate {
    MetadataCandidate {
        id: format!("spotify-{}", episode.id),
        title: episode.name,
        year: year_from_date(episode.release_date.as_deref()),
        cover_image_url: episode.images.into_iter().next().map(|image| image.url),
        creator: episode.show.map(|show| show.name),
        category: MediaCategory::Podcast,
        provenance: Provenance::Spotify,
    }
}

impl SpotifyProvider {
    pub fn new(http: HttpClient, api_url: String, tokens: Arc<TokenCache>) -> Self {
        Self {
            http,
            api_url,
            tokens,
        }
    }

    pub async fn search(&self, query: &str, kind: AudioKind) -> AppResult<Vec<MetadataCandidate>> {
        let token = self.tokens.acquire().await?;

        let url = format!("{}/v1/search", self.api_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[
                ("q", query),
                ("type", kind.search_type()),
                ("limit", "8"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Spotify returned status {}",
                response.status()
            )));
        }

        let parsed: SearchResponse = response.json().await?;

        // Spotify pads result pages with nulls; flatten them away.
        let candidates: Vec<MetadataCandidate> = match kind {
            AudioKind::Album => parsed
                .albums
                .map(|page| page.items)
                .unwrap_or_default()
                .into_iter()
                .flatten()
                .map(album_to_candidate)
                .take(MAX_RESULTS)
                .collect(),
            AudioKind::Episode => parsed
                .episodes
                .map(|page| page.items)
                .unwrap_or_default()
                .into_iter()
                .flatten()
                .map(episode_to_candidate)
                .take(MAX_RESULTS)
                .collect(),
        };

        tracing::debug!(
            query = %query,
            kind = kind.search_type(),
            results = candidates.len(),
            provider = "spotify",
            "Search completed"
        );

        Ok(candidates)
    }
}
