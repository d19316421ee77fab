use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{LibraryItem, MediaCategory, RecommendationCategory, WeeklyCacheEntry};

/// Typed access to the relational store
///
/// The store itself is an external collaborator; this trait is its boundary.
/// Three tables matter here: `sessions` (bearer token -> user), `media_entries`
/// (the user's library, read-only) and `weekly_recommendations` (the cache,
/// upsert-only).
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MediaStore: Send + Sync {
    /// Resolves a bearer credential to a user id, or `None` if the
    /// credential is unknown or expired.
    async fn resolve_user(&self, bearer_token: &str) -> AppResult<Option<Uuid>>;

    /// Reads the user's full library, ordered by rating descending with
    /// unrated items last.
    async fn fetch_library(&self, user_id: Uuid) -> AppResult<Vec<LibraryItem>>;

    /// Reads the weekly recommendation cache entry for a user, if any.
    async fn get_weekly_cache(&self, user_id: Uuid) -> AppResult<Option<WeeklyCacheEntry>>;

    /// Inserts or replaces the weekly cache entry keyed by user.
    ///
    /// The sole mutation of cache state in the system.
    async fn upsert_weekly_cache(&self, entry: &WeeklyCacheEntry) -> AppResult<()>;
}

/// PostgreSQL-backed store implementation
#[derive(Clone)]
pub struct PgMediaStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct LibraryRow {
    title: String,
    category: String,
    creator: Option<String>,
    year: Option<i32>,
    rating: Option<f32>,
    notes: Option<String>,
}

#[derive(sqlx::FromRow)]
struct WeeklyCacheRow {
    user_id: Uuid,
    categories_json: Json<Vec<RecommendationCategory>>,
    updated_at: DateTime<Utc>,
}

impl PgMediaStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MediaStore for PgMediaStore {
    async fn resolve_user(&self, bearer_token: &str) -> AppResult<Option<Uuid>> {
        let user_id: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT user_id
            FROM sessions
            WHERE token = $1 AND expires_at > NOW()
            "#,
        )
        .bind(bearer_token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user_id.map(|(id,)| id))
    }

    async fn fetch_library(&self, user_id: Uuid) -> AppResult<Vec<LibraryItem>> {
        let rows: Vec<LibraryRow> = sqlx::query_as(
            r#"
            SELECT title, category, creator, year, rating, notes
            FROM media_entries
            WHERE user_id = $1
            ORDER BY rating DESC NULLS LAST
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .filter_map(|row| match MediaCategory::from_str(&row.category) {
                Ok(category) => Some(LibraryItem {
                    title: row.title,
                    category,
                    creator: row.creator,
                    year: row.year,
                    rating: row.rating,
                    notes: row.notes,
                }),
                Err(e) => {
                    tracing::warn!(error = %e, title = %row.title, "Skipping library row");
                    None
                }
            })
            .collect();

        Ok(items)
    }

    async fn get_weekly_cache(&self, user_id: Uuid) -> AppResult<Option<WeeklyCacheEntry>> {
        let row: Option<WeeklyCacheRow> = sqlx::query_as(
            r#"
            SELECT user_id, categories_json, updated_at
            FROM weekly_recommendations
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| WeeklyCacheEntry {
            user_id: row.user_id,
            categories: row.categories_json.0,
            updated_at: row.updated_at,
        }))
    }

    async fn upsert_weekly_cache(&self, entry: &WeeklyCacheEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO weekly_recommendations (user_id, categories_json, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
            SET categories_json = EXCLUDED.categories_json,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(entry.user_id)
        .bind(Json(&entry.categories))
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
