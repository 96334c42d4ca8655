use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};
use uuid::Uuid;

stored_object!(JobLogEntry, "job_log", {
    job_id: String,
    message: String
});

impl JobLogEntry {
    /// Append one human-readable progress line to a job's log.
    pub async fn append(
        job_id: &str,
        message: impl Into<String>,
        db: &SurrealDbClient,
    ) -> Result<Self, AppError> {
        let now = Utc::now();
        let entry = Self {
            id: Uuid::new_v4().to_string(),
            job_id: job_id.to_owned(),
            message: message.into(),
            created_at: now,
            updated_at: now,
        };

        db.store_item(entry.clone()).await?;
        Ok(entry)
    }

    pub async fn for_job(job_id: &str, db: &SurrealDbClient) -> Result<Vec<Self>, AppError> {
        let entries: Vec<JobLogEntry> = db
            .client
            .query(
                "SELECT * FROM type::table($table) WHERE job_id = $job_id
                 ORDER BY created_at ASC",
            )
            .bind(("table", Self::table_name()))
            .bind(("job_id", job_id.to_owned()))
            .await?
            .take(0)?;

        Ok(entries)
    }
}
