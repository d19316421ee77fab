use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::models::{MediaCategory, UrlMetadata};
use crate::routes::AppState;

/// Searchable kinds accepted by the metadata-search endpoint
///
/// `episode` is the wire name for podcast episode search; the rest map
/// straight onto library categories.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    #[default]
    Album,
    Episode,
    Movie,
    Book,
    Video,
    Podcast,
}

impl SearchKind {
    fn category(self) -> MediaCategory {
        match self {
            SearchKind::Album => MediaCategory::Album,
            SearchKind::Episode | SearchKind::Podcast => MediaCategory::Podcast,
            SearchKind::Movie => MediaCategory::Movie,
            SearchKind::Book => MediaCategory::Book,
            SearchKind::Video => MediaCategory::Video,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MetadataSearchQuery {
    #[serde(default)]
    q: String,
    #[serde(rename = "type", default)]
    kind: SearchKind,
}

/// Handler for free-text metadata search
///
/// Failures keep the `results` key so clients always get a list shape.
pub async fn metadata_search(
    State(state): State<AppState>,
    Query(params): Query<MetadataSearchQuery>,
) -> (StatusCode, Json<Value>) {
    match state.resolver.search(&params.q, params.kind.category()).await {
        Ok(results) => (StatusCode::OK, Json(json!({ "results": results }))),
        Err(e) => {
            tracing::error!(error = %e, "Metadata search failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "results": [], "error": e.to_string() })),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UrlMetadataRequest {
    url: Option<String>,
}

/// Handler for URL metadata extraction (manual entry logging)
pub async fn url_metadata(
    State(state): State<AppState>,
    Json(request): Json<UrlMetadataRequest>,
) -> AppResult<Json<UrlMetadata>> {
    let url = request
        .url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| AppError::InvalidInput("URL is required".to_string()))?;

    let metadata = state.url_metadata.resolve(url).await?;
    Ok(Json(metadata))
}
