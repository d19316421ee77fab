use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use uuid::Uuid;

/// Media categories a user can log (and receive recommendations for)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Movie,
    Album,
    Book,
    Podcast,
    Blog,
    Idea,
    Video,
}

impl MediaCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaCategory::Movie => "movie",
            MediaCategory::Album => "album",
            MediaCategory::Book => "book",
            MediaCategory::Podcast => "podcast",
            MediaCategory::Blog => "blog",
            MediaCategory::Idea => "idea",
            MediaCategory::Video => "video",
        }
    }
}

impl Display for MediaCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaCategory::Movie),
            "album" => Ok(MediaCategory::Album),
            "book" => Ok(MediaCategory::Book),
            "podcast" => Ok(MediaCategory::Podcast),
            "blog" => Ok(MediaCategory::Blog),
            "idea" => Ok(MediaCategory::Idea),
            "video" => Ok(MediaCategory::Video),
            other => Err(format!("unknown media category: {}", other)),
        }
    }
}

/// A single entry in a user's media library
///
/// Read-only to this service; created and edited by the user elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibraryItem {
    pub title: String,
    pub category: MediaCategory,
    pub creator: Option<String>,
    pub year: Option<i32>,
    /// 0.5-step rating in [0.5, 5]; unrated items sort last
    pub rating: Option<f32>,
    pub notes: Option<String>,
}

/// One generated recommendation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationItem {
    pub title: String,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    /// Short justification tied to the user's library
    pub reason: String,
    /// Search string usable by the metadata resolver to find cover art
    pub query: String,
}

/// A themed group of 3-4 recommendations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationCategory {
    #[serde(rename = "categoryTitle")]
    pub category_title: String,
    pub category: MediaCategory,
    pub items: Vec<RecommendationItem>,
}

/// The persisted weekly recommendation cache for one user
///
/// Valid for the current cycle iff `updated_at` is on or after the most
/// recent weekly boundary. Only mutated via upsert by the recommendation
/// service; never deleted here.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyCacheEntry {
    pub user_id: Uuid,
    pub categories: Vec<RecommendationCategory>,
    pub updated_at: DateTime<Utc>,
}

/// Which provider produced a metadata candidate
///
/// Internal only: used for merge tie-breaking and logging, stripped from
/// the serialized public shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Tmdb,
    GoogleBooks,
    OpenLibrary,
    Spotify,
}

/// A normalized search result from any metadata provider
///
/// Ephemeral: produced per request, never stored.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetadataCandidate {
    pub id: String,
    pub title: String,
    pub year: Option<i32>,
    pub cover_image_url: Option<String>,
    pub creator: Option<String>,
    pub category: MediaCategory,
    #[serde(skip_serializing)]
    pub provenance: Provenance,
}

/// Structured metadata extracted from an arbitrary URL
///
/// Fields the extraction could not fill are empty strings, which is a
/// successful (if sparse) result; an unfetchable URL is an error instead.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UrlMetadata {
    pub title: String,
    pub creator: String,
    pub cover_image_url: String,
    pub external_id: String,
    pub source: &'static str,
}

/// A provider access token with its (margin-adjusted) expiry
#[derive(Debug, Clone)]
pub struct ProviderToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_category_round_trip() {
        for s in ["movie", "album", "book", "podcast", "blog", "idea", "video"] {
            let category: MediaCategory = s.parse().unwrap();
            assert_eq!(category.as_str(), s);
        }
    }

    #[test]
    fn test_media_category_unknown() {
        assert!("tv".parse::<MediaCategory>().is_err());
    }

    #[test]
    fn test_recommendation_category_serde_rename() {
        let json = r#"{
            "categoryTitle": "Movies you'd love",
            "category": "movie",
            "items": [
                {
                    "title": "Arrival",
                    "creator": "Denis Villeneuve",
                    "year": 2016,
                    "reason": "Slow-burn sci-fi like your top-rated films",
                    "query": "Arrival Denis Villeneuve"
                }
            ]
        }"#;

        let category: RecommendationCategory = serde_json::from_str(json).unwrap();
        assert_eq!(category.category_title, "Movies you'd love");
        assert_eq!(category.category, MediaCategory::Movie);
        assert_eq!(category.items.len(), 1);

        let out = serde_json::to_value(&category).unwrap();
        assert!(out.get("categoryTitle").is_some());
        assert!(out.get("category_title").is_none());
    }

    #[test]
    fn test_candidate_serialization_strips_provenance() {
        let candidate = MetadataCandidate {
            id: "gbooks-abc".to_string(),
            title: "The Hobbit".to_string(),
            year: Some(1937),
            cover_image_url: None,
            creator: Some("J.R.R. Tolkien".to_string()),
            category: MediaCategory::Book,
            provenance: Provenance::GoogleBooks,
        };

        let out = serde_json::to_value(&candidate).unwrap();
        assert_eq!(out["title"], "The Hobbit");
        assert!(out.get("provenance").is_none());
    }
}
