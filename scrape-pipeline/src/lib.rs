#![allow(clippy::missing_docs_in_private_items)]

pub mod runner;
pub mod scraper;

pub use runner::JobSupervisor;
pub use scraper::{ChromeScraper, ListingRecord, LocationScraper};
