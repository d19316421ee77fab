//! Metadata provider adapters
//!
//! One adapter per third-party catalog, each mapping its wire format into
//! the shared `MetadataCandidate` shape. Adapters return errors freely;
//! the resolver above them decides which failures degrade to an empty
//! list and which propagate.

pub mod google_books;
pub mod open_library;
pub mod spotify;
pub mod tmdb;

pub use google_books::GoogleBooksProvider;
pub use open_library::OpenLibraryProvider;
pub use spotify::{AudioKind, SpotifyProvider};
pub use tmdb::TmdbProvider;

/// Hard cap on candidates returned by any single adapter
pub const MAX_RESULTS: usize = 8;

/// Extracts a year from a `YYYY-MM-DD`-ish date string
pub(crate) fn year_from_date(date: Option<&str>) -> Option<i32> {
    date.and_then(|d| d.get(..4)).and_then(|y| y.parse().ok())
}
