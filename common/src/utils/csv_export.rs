use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::{error::AppError, storage::types::listing::Listing};

const HEADER: [&str; 9] = [
    "business_name",
    "phone",
    "website",
    "address",
    "category",
    "city",
    "state",
    "source_url",
    "scraped_at",
];

/// Render a job's listings as CSV text.
pub fn render_csv(listings: &[Listing]) -> Result<String, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADER)?;

    for listing in listings {
        writer.write_record([
            listing.business_name.as_str(),
            listing.phone.as_str(),
            listing.website.as_str(),
            listing.address.as_str(),
            listing.category.as_str(),
            listing.city.as_str(),
            listing.state.as_str(),
            listing.source_url.as_str(),
            &listing.created_at.to_rfc3339(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Scrape(format!("CSV buffer error: {e}")))?;
    String::from_utf8(bytes).map_err(|e| AppError::Scrape(format!("CSV encoding error: {e}")))
}

pub fn export_file_name(job_id: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    format!("listings_{job_id}_{timestamp}.csv")
}

/// Write the per-job export file under `export_dir`, creating the
/// directory on first use. Returns the path written.
pub async fn write_export_file(
    job_id: &str,
    listings: &[Listing],
    export_dir: &Path,
) -> Result<PathBuf, AppError> {
    let content = render_csv(listings)?;
    tokio::fs::create_dir_all(export_dir).await?;

    let path = export_dir.join(export_file_name(job_id));
    tokio::fs::write(&path, content).await?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_listing(name: &str) -> Listing {
        Listing::new(
            "job-1".to_string(),
            name.to_string(),
            "555-0100".to_string(),
            "N/A".to_string(),
            "1 Main St, Reno".to_string(),
            "cafes".to_string(),
            "Reno".to_string(),
            "Nevada".to_string(),
            "https://maps.example.com/place/x".to_string(),
        )
    }

    #[test]
    fn test_render_includes_header_and_rows() {
        let listings = vec![sample_listing("Alpha Cafe"), sample_listing("Beta Cafe")];
        let csv = render_csv(&listings).expect("render");

        let mut lines = csv.lines();
        assert_eq!(
            lines.next().expect("header"),
            "business_name,phone,website,address,category,city,state,source_url,scraped_at"
        );
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.contains("Alpha Cafe"));
        assert!(csv.contains("Beta Cafe"));
    }

    #[test]
    fn test_fields_with_commas_are_quoted() {
        let csv = render_csv(&[sample_listing("Cafe, The")]).expect("render");
        assert!(csv.contains("\"Cafe, The\""));
        assert!(csv.contains("\"1 Main St, Reno\""));
    }

    #[test]
    fn test_export_file_name_carries_job_id() {
        let name = export_file_name("abc-123");
        assert!(name.starts_with("listings_abc-123_"));
        assert!(name.ends_with(".csv"));
    }

    #[tokio::test]
    async fn test_write_export_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_export_file("job-1", &[sample_listing("Alpha Cafe")], dir.path())
            .await
            .expect("write export");

        let content = tokio::fs::read_to_string(&path).await.expect("read back");
        assert!(content.contains("Alpha Cafe"));
    }
}
