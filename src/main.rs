use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use medialog_api::config::Config;
use medialog_api::db::{self, PgMediaStore};
use medialog_api::routes::{create_router, AppState};
use medialog_api::services::providers::{
    GoogleBooksProvider, OpenLibraryProvider, SpotifyProvider, TmdbProvider,
};
use medialog_api::services::token_cache::{SpotifyExchanger, TokenCache};
use medialog_api::services::{
    GeminiClient, MetadataResolver, RecommendationService, SystemClock, UrlMetadataService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    let store = Arc::new(PgMediaStore::new(pool));

    // One client so every outbound call shares the bounded timeout.
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()?;

    let clock = Arc::new(SystemClock);

    let tokens = Arc::new(TokenCache::new(
        Arc::new(SpotifyExchanger::new(
            http.clone(),
            config.spotify_token_url.clone(),
            config.spotify_client_id.clone(),
            config.spotify_client_secret.clone(),
        )),
        clock.clone(),
    ));

    let resolver = Arc::new(MetadataResolver::new(
        TmdbProvider::new(
            http.clone(),
            config.tmdb_api_url.clone(),
            config.tmdb_api_key.clone(),
        ),
        GoogleBooksProvider::new(http.clone(), config.google_books_api_url.clone()),
        OpenLibraryProvider::new(http.clone(), config.open_library_api_url.clone()),
        SpotifyProvider::new(http.clone(), config.spotify_api_url.clone(), tokens),
    ));

    let generator = Arc::new(GeminiClient::new(
        http.clone(),
        config.gemini_api_url.clone(),
        config.gemini_api_key.clone(),
    ));

    let recommender = Arc::new(RecommendationService::new(
        store.clone(),
        generator,
        clock.clone(),
    ));

    let state = AppState {
        store,
        recommender,
        resolver,
        url_metadata: Arc::new(UrlMetadataService::new(http)),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    tracing::info!(host = %config.host, port = config.port, "Server running");
    axum::serve(listener, app).await?;

    Ok(())
}
