use std::collections::HashSet;
use std::time::{Duration, Instant};

use common::error::AppError;
use headless_chrome::{Browser, Tab};
use tracing::{info, warn};
use url::Url;

use super::{ListingRecord, LocationScraper, NOT_AVAILABLE};

const SEARCH_BOX: &str = "input#searchboxinput";
const RESULTS_FEED: &str = "div[role='feed']";
const DETAIL_LINKS: &str = "div[role='feed'] a[href*='/maps/place/']";
const WEBSITE_LINK: &str = "a[data-item-id='authority']";
const PHONE_BUTTON: &str = "button[data-item-id^='phone:']";
const ADDRESS_BUTTON: &str = "button[data-item-id='address']";

const SCROLL_FEED_JS: &str = r#"
    (() => {
        const feed = document.querySelector('div[role="feed"]');
        if (feed) feed.scrollTo(0, feed.scrollHeight);
    })()
"#;

const END_OF_LIST_JS: &str = r#"
    document.body.innerText.includes("You've reached the end of the list")
"#;

/// Drives one headless Chrome session through the search-and-extract
/// sequence for a single location. The browser work is blocking, so the
/// trait impl pushes it onto the blocking pool.
#[derive(Clone)]
pub struct ChromeScraper {
    base_url: String,
    scroll_rounds: usize,
    feed_timeout: Duration,
    detail_timeout: Duration,
    detail_pause: Duration,
}

impl ChromeScraper {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            scroll_rounds: 10,
            feed_timeout: Duration::from_secs(15),
            detail_timeout: Duration::from_secs(10),
            detail_pause: Duration::from_millis(500),
        }
    }

    fn scrape_blocking(
        &self,
        category: &str,
        city: &str,
        state: &str,
        max_results: usize,
    ) -> anyhow::Result<Vec<ListingRecord>> {
        let search_term = compose_search_term(category, city, state);
        info!(%search_term, "Starting browser session");

        let browser = Browser::default()?;
        let tab = browser.new_tab()?;

        tab.navigate_to(&self.base_url)?;
        tab.wait_until_navigated()?;

        let search_box = tab.wait_for_element_with_custom_timeout(SEARCH_BOX, self.feed_timeout)?;
        search_box.click()?;
        tab.type_str(&search_term)?;
        tab.press_key("Enter")?;

        // A feed that never shows up means no results for this search,
        // not a failure of the location.
        if tab
            .wait_for_element_with_custom_timeout(RESULTS_FEED, self.feed_timeout)
            .is_err()
        {
            warn!(city, state, "No results feed appeared, returning empty");
            return Ok(Vec::new());
        }

        // Scroll to trigger lazy-loading, stop early at the end marker.
        for _ in 0..self.scroll_rounds {
            tab.evaluate(SCROLL_FEED_JS, false)?;
            if end_of_list_reached(&tab) {
                break;
            }
            std::thread::sleep(Duration::from_secs(1));
        }

        let mut seen = HashSet::new();
        for anchor in tab.find_elements(DETAIL_LINKS).unwrap_or_default() {
            if let Ok(Some(href)) = anchor.get_attribute_value("href") {
                // The page emits both absolute and relative hrefs across
                // requests, normalize before dedup.
                if let Some(normalized) = normalize_href(&self.base_url, &href) {
                    seen.insert(normalized);
                }
            }
        }

        let mut detail_urls: Vec<String> = seen.into_iter().collect();
        detail_urls.sort();
        detail_urls.truncate(max_results);
        info!(
            found = detail_urls.len(),
            city, state, "Collected detail pages to visit"
        );

        let mut results = Vec::new();
        for detail_url in &detail_urls {
            match self.extract_listing(&tab, detail_url) {
                Ok(record) => {
                    info!(business = %record.business_name, "Scraped listing");
                    results.push(record);
                }
                Err(e) => {
                    warn!(url = %detail_url, error = %e, "Skipping listing page");
                }
            }
            std::thread::sleep(self.detail_pause);
        }

        info!(
            count = results.len(),
            city, state, "Finished location scrape"
        );
        Ok(results)
    }

    fn extract_listing(&self, tab: &Tab, detail_url: &str) -> anyhow::Result<ListingRecord> {
        tab.navigate_to(detail_url)?;
        tab.wait_until_navigated()?;

        // Name is the one required field, everything else degrades to N/A
        // independently.
        let heading = tab.wait_for_element_with_custom_timeout("h1", self.detail_timeout)?;
        let business_name = heading.get_inner_text()?.trim().to_string();

        let website = attribute_or_na(tab, WEBSITE_LINK, "href", None);
        let phone = attribute_or_na(tab, PHONE_BUTTON, "aria-label", Some("Phone: "));
        let address = attribute_or_na(tab, ADDRESS_BUTTON, "aria-label", Some("Address: "));

        Ok(ListingRecord {
            business_name,
            phone,
            website,
            address,
            source_url: detail_url.to_owned(),
        })
    }
}

#[async_trait::async_trait]
impl LocationScraper for ChromeScraper {
    async fn scrape_location(
        &self,
        category: &str,
        city: &str,
        state: &str,
        max_results: usize,
    ) -> Result<Vec<ListingRecord>, AppError> {
        let scraper = self.clone();
        let (category, city, state) = (category.to_owned(), city.to_owned(), state.to_owned());

        let started = Instant::now();
        let outcome = tokio::task::spawn_blocking(move || {
            scraper.scrape_blocking(&category, &city, &state, max_results)
        })
        .await?;

        match outcome {
            Ok(records) => {
                info!(
                    count = records.len(),
                    elapsed = ?started.elapsed(),
                    "Location scrape finished"
                );
                Ok(records)
            }
            Err(e) => {
                // Scrape failures stay inside this boundary: the location
                // yields nothing rather than aborting the job.
                warn!(error = %e, "Location scrape failed, degrading to empty result");
                Ok(Vec::new())
            }
        }
    }
}

fn compose_search_term(category: &str, city: &str, state: &str) -> String {
    format!("{category} in {city}, {state}")
}

fn end_of_list_reached(tab: &Tab) -> bool {
    tab.evaluate(END_OF_LIST_JS, false)
        .ok()
        .and_then(|obj| obj.value)
        .and_then(|value| value.as_bool())
        .unwrap_or(false)
}

/// Resolve a detail href against the search page and drop the volatile
/// query/fragment parts so the same place dedups to one URL.
fn normalize_href(base: &str, href: &str) -> Option<String> {
    let base_url = Url::parse(base).ok()?;
    let mut resolved = match Url::parse(href) {
        Ok(absolute) => absolute,
        Err(_) => base_url.join(href).ok()?,
    };

    resolved.set_query(None);
    resolved.set_fragment(None);
    Some(resolved.to_string())
}

fn attribute_or_na(
    tab: &Tab,
    selector: &str,
    attribute: &str,
    strip_prefix: Option<&str>,
) -> String {
    let raw = tab
        .find_element(selector)
        .ok()
        .and_then(|element| element.get_attribute_value(attribute).ok().flatten());

    match raw {
        Some(value) => {
            let trimmed = strip_prefix
                .and_then(|prefix| value.strip_prefix(prefix))
                .unwrap_or(&value)
                .trim();
            if trimmed.is_empty() {
                NOT_AVAILABLE.to_owned()
            } else {
                trimmed.to_owned()
            }
        }
        None => NOT_AVAILABLE.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.google.com/maps";

    #[test]
    fn test_compose_search_term() {
        assert_eq!(
            compose_search_term("cafes", "Reno", "Nevada"),
            "cafes in Reno, Nevada"
        );
    }

    #[test]
    fn test_normalize_absolute_href_strips_query() {
        let href = "https://www.google.com/maps/place/Alpha+Cafe?authuser=0&hl=en";
        assert_eq!(
            normalize_href(BASE, href).expect("normalized"),
            "https://www.google.com/maps/place/Alpha+Cafe"
        );
    }

    #[test]
    fn test_normalize_relative_href_joins_base() {
        let href = "/maps/place/Beta+Cafe?entry=ttu";
        assert_eq!(
            normalize_href(BASE, href).expect("normalized"),
            "https://www.google.com/maps/place/Beta+Cafe"
        );
    }

    #[test]
    fn test_normalize_absolute_and_relative_forms_collapse() {
        let absolute = normalize_href(BASE, "https://www.google.com/maps/place/X?a=1");
        let relative = normalize_href(BASE, "/maps/place/X");
        assert_eq!(absolute, relative);
    }

    #[test]
    fn test_normalize_rejects_garbage_base() {
        assert!(normalize_href("not a url", "/maps/place/X").is_none());
    }
}
