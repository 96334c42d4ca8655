use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};
use uuid::Uuid;

stored_object!(Listing, "listing", {
    job_id: String,
    business_name: String,
    phone: String,
    website: String,
    address: String,
    category: String,
    city: String,
    state: String,
    source_url: String
});

impl Listing {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        job_id: String,
        business_name: String,
        phone: String,
        website: String,
        address: String,
        category: String,
        city: String,
        state: String,
        source_url: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            job_id,
            business_name,
            phone,
            website,
            address,
            category,
            city,
            state,
            source_url,
            created_at: now,
            updated_at: now,
        }
    }

    /// All listings a job produced, in insertion order. Append-only, rows
    /// are never updated or deduplicated after the fact.
    pub async fn for_job(job_id: &str, db: &SurrealDbClient) -> Result<Vec<Self>, AppError> {
        let listings: Vec<Listing> = db
            .client
            .query(
                "SELECT * FROM type::table($table) WHERE job_id = $job_id
                 ORDER BY created_at ASC",
            )
            .bind(("table", Self::table_name()))
            .bind(("job_id", job_id.to_owned()))
            .await?
            .take(0)?;

        Ok(listings)
    }

    pub async fn count_all(db: &SurrealDbClient) -> Result<i64, AppError> {
        #[derive(Deserialize)]
        struct CountResult {
            count: i64,
        }

        let result: Option<CountResult> = db
            .client
            .query("SELECT count() as count FROM type::table($table) GROUP ALL")
            .bind(("table", Self::table_name()))
            .await?
            .take(0)?;

        Ok(result.map(|r| r.count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_db() -> SurrealDbClient {
        let namespace = "test_ns";
        let database = Uuid::new_v4().to_string();
        SurrealDbClient::memory(namespace, &database)
            .await
            .expect("in-memory surrealdb")
    }

    fn sample_listing(job_id: &str, name: &str) -> Listing {
        Listing::new(
            job_id.to_string(),
            name.to_string(),
            "555-0100".to_string(),
            "https://example.com".to_string(),
            "1 Main St".to_string(),
            "cafes".to_string(),
            "Reno".to_string(),
            "Nevada".to_string(),
            "https://maps.example.com/place/x".to_string(),
        )
    }

    #[tokio::test]
    async fn test_for_job_scopes_and_orders() {
        let db = memory_db().await;

        let mut first = sample_listing("job-1", "Alpha Cafe");
        first.created_at = Utc::now() - chrono::Duration::seconds(10);
        db.store_item(first.clone()).await.expect("store");

        let second = sample_listing("job-1", "Beta Cafe");
        db.store_item(second.clone()).await.expect("store");

        db.store_item(sample_listing("job-2", "Other Cafe"))
            .await
            .expect("store");

        let listings = Listing::for_job("job-1", &db).await.expect("fetch");
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].business_name, "Alpha Cafe");
        assert_eq!(listings[1].business_name, "Beta Cafe");
    }

    #[tokio::test]
    async fn test_count_all() {
        let db = memory_db().await;
        assert_eq!(Listing::count_all(&db).await.expect("count"), 0);

        db.store_item(sample_listing("job-1", "Alpha Cafe"))
            .await
            .expect("store");
        db.store_item(sample_listing("job-2", "Beta Cafe"))
            .await
            .expect("store");

        assert_eq!(Listing::count_all(&db).await.expect("count"), 2);
    }
}
