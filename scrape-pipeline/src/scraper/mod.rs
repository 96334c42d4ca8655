use async_trait::async_trait;
use common::error::AppError;

mod chrome;

pub use chrome::ChromeScraper;

/// Sentinel for listing fields the detail page did not expose.
pub const NOT_AVAILABLE: &str = "N/A";

/// One business record as extracted from a detail page, before it is tied
/// to a job and location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRecord {
    pub business_name: String,
    pub phone: String,
    pub website: String,
    pub address: String,
    pub source_url: String,
}

/// Seam between the job runner and the browser session.
///
/// Implementations must not let failures escape this boundary: a broken
/// page, a timeout or a vanished selector degrades to an empty or partial
/// list for that location, never to an error that would abort the job.
#[async_trait]
pub trait LocationScraper: Send + Sync {
    async fn scrape_location(
        &self,
        category: &str,
        city: &str,
        state: &str,
        max_results: usize,
    ) -> Result<Vec<ListingRecord>, AppError>;
}
