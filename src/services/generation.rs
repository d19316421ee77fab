use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::models::RecommendationCategory;

/// Sampling temperature for recommendation generation
const TEMPERATURE: f64 = 0.8;

/// Wraps a single call to the external text-generation endpoint
///
/// The generator's output is untrusted text; implementations must return
/// it fully parsed or fail. No retries happen here: retry policy (if any)
/// belongs to the caller via forced refresh.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecommendationGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> AppResult<Vec<RecommendationCategory>>;
}

/// Gemini `generateContent` client requesting strict JSON output
pub struct GeminiClient {
    http: HttpClient,
    api_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GeneratedPayload {
    categories: Vec<RecommendationCategory>,
}

impl GeminiClient {
    pub fn new(http: HttpClient, api_url: String, api_key: Option<String>) -> Self {
        Self {
            http,
            api_url,
            api_key,
        }
    }
}

/// Extracts a human-readable message from a provider error body
///
/// Tries the structured `{"error": {"message": ...}}` shape first, then
/// falls back to the raw body, then to a status-derived message.
fn extract_provider_error(status: u16, body: &str) -> String {
    #[derive(Deserialize)]
    struct ProviderError {
        error: ProviderErrorBody,
    }

    #[derive(Deserialize)]
    struct ProviderErrorBody {
        message: String,
    }

    if let Ok(parsed) = serde_json::from_str::<ProviderError>(body) {
        return parsed.error.message;
    }

    if !body.trim().is_empty() {
        return body.to_string();
    }

    format!("HTTP {}", status)
}

/// Parses the generator's text output into recommendation categories
///
/// The text is untrusted: anything other than a JSON object carrying a
/// well-formed `categories` array is a parse failure.
fn parse_categories(text: &str) -> AppResult<Vec<RecommendationCategory>> {
    let payload: GeneratedPayload = serde_json::from_str(text)
        .map_err(|e| AppError::Parse(format!("generator returned invalid JSON: {}", e)))?;

    Ok(payload.categories)
}

#[async_trait::async_trait]
impl RecommendationGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> AppResult<Vec<RecommendationCategory>> {
        let api_key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::Config("GEMINI_API_KEY is not configured".to_string()))?;

        let response = self
            .http
            .post(&self.api_url)
            .query(&[("key", api_key)])
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }],
                "generationConfig": {
                    "temperature": TEMPERATURE,
                    "responseMimeType": "application/json",
                }
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = extract_provider_error(status.as_u16(), &body);
            tracing::error!(status = status.as_u16(), message = %message, "Generation request failed");
            return Err(AppError::Generation {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let text = parsed
            .candidates
            .first()
            .and_then(|candidate| candidate.content.parts.first())
            .map(|part| part.text.as_str())
            .ok_or_else(|| AppError::Parse("generator returned no candidates".to_string()))?;

        let categories = parse_categories(text)?;

        tracing::info!(categories = categories.len(), "Recommendations generated");

        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaCategory;

    #[test]
    fn test_parse_categories_valid() {
        let text = r#"{
            "categories": [
                {
                    "categoryTitle": "Albums for late nights",
                    "category": "album",
                    "items": [
                        {
                            "title": "In Rainbows",
                            "creator": "Radiohead",
                            "year": 2007,
                            "reason": "Matches your highest-rated art rock",
                            "query": "In Rainbows Radiohead"
                        }
                    ]
                }
            ]
        }"#;

        let categories = parse_categories(text).unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].category, MediaCategory::Album);
        assert_eq!(categories[0].items[0].title, "In Rainbows");
    }

    #[test]
    fn test_parse_categories_rejects_prose() {
        let err = parse_categories("Sure! Here are some recommendations: ...").unwrap_err();
        assert!(matches!(err, AppError::Parse(_)));
    }

    #[test]
    fn test_parse_categories_rejects_missing_array() {
        let err = parse_categories(r#"{"recommendations": []}"#).unwrap_err();
        assert!(matches!(err, AppError::Parse(_)));
    }

    #[test]
    fn test_extract_provider_error_structured() {
        let body = r#"{"error": {"message": "API key not valid", "code": 400}}"#;
        assert_eq!(extract_provider_error(400, body), "API key not valid");
    }

    #[test]
    fn test_extract_provider_error_raw_body() {
        assert_eq!(extract_provider_error(500, "upstream melted"), "upstream melted");
    }

    #[test]
    fn test_extract_provider_error_status_fallback() {
        assert_eq!(extract_provider_error(503, "  "), "HTTP 503");
    }

    #[tokio::test]
    async fn test_missing_api_key_is_config_error() {
        let client = GeminiClient::new(
            HttpClient::new(),
            "http://localhost/generate".to_string(),
            None,
        );

        match client.generate("prompt").await {
            Err(AppError::Config(_)) => {}
            other => panic!("expected config error, got {:?}", other.map(|c| c.len())),
        }
    }
}
