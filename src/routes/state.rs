use std::sync::Arc;

use crate::db::MediaStore;
use crate::services::{MetadataResolver, RecommendationService, UrlMetadataService};

/// Shared application state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MediaStore>,
    pub recommender: Arc<RecommendationService>,
    pub resolver: Arc<MetadataResolver>,
    pub url_metadata: Arc<UrlMetadataService>,
}
