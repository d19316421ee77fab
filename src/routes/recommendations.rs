use axum::extract::{Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::routes::AppState;
use crate::services::recommendations::EMPTY_LIBRARY_GUIDANCE;
use crate::services::RecommendationOutcome;

#[derive(Debug, Deserialize)]
pub struct RecommendationsQuery {
    #[serde(default)]
    refresh: Option<String>,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Handler for the weekly recommendations endpoint
///
/// Authentication is rejected before any downstream call happens.
pub async fn recommendations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<RecommendationsQuery>,
) -> AppResult<Json<Value>> {
    let token = bearer_token(&headers)
        .ok_or_else(|| AppError::Auth("missing Authorization header".to_string()))?;

    let user_id = state
        .store
        .resolve_user(token)
        .await?
        .ok_or_else(|| AppError::Auth("invalid or expired credential".to_string()))?;

    let force_refresh = params.refresh.as_deref() == Some("true");

    let payload = match state
        .recommender
        .recommendations_for(user_id, force_refresh)
        .await?
    {
        RecommendationOutcome::Fresh(categories) => {
            json!({ "recommendations": categories, "cached": false })
        }
        RecommendationOutcome::Cached(categories) => {
            json!({ "recommendations": categories, "cached": true })
        }
        RecommendationOutcome::EmptyLibrary => {
            json!({ "recommendations": [], "message": EMPTY_LIBRARY_GUIDANCE })
        }
    };

    Ok(Json(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123 "));
        assert_eq!(bearer_token(&headers), Some("abc123"));
    }

    #[test]
    fn test_bearer_token_missing_or_malformed() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);
    }
}
