pub mod clock;
pub mod generation;
pub mod metadata;
pub mod providers;
pub mod recommendations;
pub mod token_cache;
pub mod url_metadata;

pub use clock::{Clock, SystemClock};
pub use generation::{GeminiClient, RecommendationGenerator};
pub use metadata::MetadataResolver;
pub use recommendations::{RecommendationOutcome, RecommendationService};
pub use token_cache::TokenCache;
pub use url_metadata::UrlMetadataService;
