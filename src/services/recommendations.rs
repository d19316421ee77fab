use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use uuid::Uuid;

use crate::db::MediaStore;
use crate::error::AppResult;
use crate::models::{LibraryItem, MediaCategory, RecommendationCategory, WeeklyCacheEntry};
use crate::services::clock::Clock;
use crate::services::generation::RecommendationGenerator;

/// Message returned instead of recommendations when the library is empty
pub const EMPTY_LIBRARY_GUIDANCE: &str =
    "Start logging your favorites to get personalized recommendations!";

const PROMPT_PREAMBLE: &str = "You are an expert cultural curator and recommendation engine. \
Below is a user's library of media they have consumed and rated (out of 5).";

const PROMPT_INSTRUCTIONS: &str = r#"Based on their exact tastes, highly rated items, and specific notes, recommend new media for them to consume.
Only recommend things that are highly correlated with what they already enjoy. Do not recommend items they have already logged.

Return YOUR ENTIRE RESPONSE as a single strict JSON object with this exact structure (do not include markdown codeblocks or any other text):
{
  "categories": [
    {
      "categoryTitle": "Movies you'd love",
      "category": "movie",
      "items": [
        {
          "title": "Title of the item",
          "creator": "Director/Author/Artist name",
          "year": 2023,
          "reason": "One concise sentence explaining why this specific user will like this based on their library",
          "query": "Title + Creator (for fetching images)"
        }
      ]
    }
  ]
}

Provide 3 categories that make sense based on their library (e.g., "movie", "book", "album", "podcast").
For each category, provide 3-4 excellent recommendations."#;

/// Terminal outcome of one recommendation request
#[derive(Debug, PartialEq)]
pub enum RecommendationOutcome {
    /// Freshly generated and persisted this request
    Fresh(Vec<RecommendationCategory>),
    /// Served from the still-valid weekly cache
    Cached(Vec<RecommendationCategory>),
    /// The user has no library yet; serve guidance instead
    EmptyLibrary,
}

/// Orchestrates the weekly recommendation pipeline
///
/// One request walks: cache check -> library fetch -> prompt build ->
/// generate -> persist. A valid cache short-circuits everything after the
/// first step; an empty library short-circuits everything after the
/// second. Generation or parse failure leaves the cache untouched, so a
/// later non-forced read either serves a prior valid entry or re-attempts
/// from scratch.
pub struct RecommendationService {
    store: Arc<dyn MediaStore>,
    generator: Arc<dyn RecommendationGenerator>,
    clock: Arc<dyn Clock>,
}

/// Start of the current weekly cycle: the most recent Sunday at 00:00 UTC
///
/// An entry updated exactly at the boundary belongs to the new cycle.
pub fn start_of_week(now: DateTime<Utc>) -> DateTime<Utc> {
    let days_into_week = now.weekday().num_days_from_sunday() as i64;
    let sunday = now.date_naive() - Duration::days(days_into_week);
    sunday.and_time(NaiveTime::MIN).and_utc()
}

fn is_current_cycle(updated_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    updated_at >= start_of_week(now)
}

fn render_item(item: &LibraryItem) -> String {
    let mut line = item.title.clone();
    if let Some(creator) = &item.creator {
        line.push_str(&format!(" by {}", creator));
    }
    if let Some(year) = item.year {
        line.push_str(&format!(" ({})", year));
    }
    if let Some(rating) = item.rating {
        line.push_str(&format!(" - Rating: {}/5", rating));
    }
    if let Some(notes) = &item.notes {
        line.push_str(&format!(" - Note: {}", notes));
    }
    line
}

/// Renders the library grouped by category, in category-encounter order
///
/// This text is the only context the generator sees, so every field
/// present on an item appears in its line.
fn render_library(library: &[LibraryItem]) -> String {
    let mut groups: Vec<(MediaCategory, Vec<String>)> = Vec::new();

    for item in library {
        let line = render_item(item);
        match groups.iter_mut().find(|(category, _)| *category == item.category) {
            Some((_, lines)) => lines.push(line),
            None => groups.push((item.category, vec![line])),
        }
    }

    groups
        .into_iter()
        .map(|(category, lines)| {
            format!(
                "### {}\n{}",
                category.as_str().to_uppercase(),
                lines.join("\n")
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn build_prompt(library: &[LibraryItem]) -> String {
    format!(
        "{} \n\nUSER's LIBRARY:\n{}\n\n{}",
        PROMPT_PREAMBLE,
        render_library(library),
        PROMPT_INSTRUCTIONS
    )
}

impl RecommendationService {
    pub fn new(
        store: Arc<dyn MediaStore>,
        generator: Arc<dyn RecommendationGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            generator,
            clock,
        }
    }

    /// Runs the pipeline for one user
    ///
    /// `force_refresh` skips the cache check but a successful result still
    /// overwrites the cache, extending validity through the next boundary.
    pub async fn recommendations_for(
        &self,
        user_id: Uuid,
        force_refresh: bool,
    ) -> AppResult<RecommendationOutcome> {
        if !force_refresh {
            if let Some(entry) = self.store.get_weekly_cache(user_id).await? {
                if is_current_cycle(entry.updated_at, self.clock.now()) {
                    tracing::debug!(user_id = %user_id, "Weekly cache hit");
                    return Ok(RecommendationOutcome::Cached(entry.categories));
                }
            }
        }

        let library = self.store.fetch_library(user_id).await?;
        if library.is_empty() {
            tracing::debug!(user_id = %user_id, "Empty library, skipping generation");
            return Ok(RecommendationOutcome::EmptyLibrary);
        }

        let prompt = build_prompt(&library);
        let categories = self.generator.generate(&prompt).await?;

        self.store
            .upsert_weekly_cache(&WeeklyCacheEntry {
                user_id,
                categories: categories.clone(),
                updated_at: self.clock.now(),
            })
            .await?;

        tracing::info!(
            user_id = %user_id,
            library_items = library.len(),
            categories = categories.len(),
            forced = force_refresh,
            "Weekly recommendations refreshed"
        );

        Ok(RecommendationOutcome::Fresh(categories))
    }
}
