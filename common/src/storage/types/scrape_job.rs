use state_machines::state_machine;
use surrealdb::sql::Datetime as SurrealDatetime;
use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

pub const DEFAULT_MAX_RESULTS: u32 = 10;

#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub enum JobStatus {
    #[serde(rename = "Pending")]
    #[default]
    Pending,
    #[serde(rename = "Running")]
    Running,
    #[serde(rename = "Completed")]
    Completed,
    #[serde(rename = "Failed")]
    Failed,
    #[serde(rename = "Cancelled")]
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "Pending",
            JobStatus::Running => "Running",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
            JobStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum JobTransition {
    Start,
    Complete,
    Fail,
    Cancel,
}

impl JobTransition {
    fn as_str(&self) -> &'static str {
        match self {
            JobTransition::Start => "start",
            JobTransition::Complete => "complete",
            JobTransition::Fail => "fail",
            JobTransition::Cancel => "cancel",
        }
    }
}

mod lifecycle {
    use super::state_machine;

    state_machine! {
        name: JobLifecycleMachine,
        initial: Pending,
        states: [Pending, Running, Completed, Failed, Cancelled],
        events {
            start {
                transition: { from: Pending, to: Running }
            }
            complete {
                transition: { from: Running, to: Completed }
            }
            fail {
                transition: { from: Running, to: Failed }
            }
            cancel {
                transition: { from: Pending, to: Cancelled }
                transition: { from: Running, to: Cancelled }
            }
        }
    }

    pub(super) fn pending() -> JobLifecycleMachine<(), Pending> {
        JobLifecycleMachine::new(())
    }

    pub(super) fn running() -> JobLifecycleMachine<(), Running> {
        pending()
            .start()
            .expect("start transition from Pending should exist")
    }
}

fn invalid_transition(status: &JobStatus, event: JobTransition) -> AppError {
    AppError::Validation(format!(
        "Invalid job transition: {} -> {}",
        status.as_str(),
        event.as_str()
    ))
}

fn compute_next_status(status: &JobStatus, event: JobTransition) -> Result<JobStatus, AppError> {
    use lifecycle::*;
    match (status, event) {
        (JobStatus::Pending, JobTransition::Start) => pending()
            .start()
            .map(|_| JobStatus::Running)
            .map_err(|_| invalid_transition(status, event)),
        (JobStatus::Running, JobTransition::Complete) => running()
            .complete()
            .map(|_| JobStatus::Completed)
            .map_err(|_| invalid_transition(status, event)),
        (JobStatus::Running, JobTransition::Fail) => running()
            .fail()
            .map(|_| JobStatus::Failed)
            .map_err(|_| invalid_transition(status, event)),
        (JobStatus::Pending, JobTransition::Cancel) => pending()
            .cancel()
            .map(|_| JobStatus::Cancelled)
            .map_err(|_| invalid_transition(status, event)),
        (JobStatus::Running, JobTransition::Cancel) => running()
            .cancel()
            .map(|_| JobStatus::Cancelled)
            .map_err(|_| invalid_transition(status, event)),
        _ => Err(invalid_transition(status, event)),
    }
}

stored_object!(ScrapeJob, "scrape_job", {
    user_id: String,
    category: String,
    locations: Vec<String>,
    max_results_per_location: u32,
    status: JobStatus,
    progress: u8,
    total_locations: u32,
    current_location: Option<String>,
    error: Option<String>,
    #[serde(
        serialize_with = "serialize_option_datetime",
        deserialize_with = "deserialize_option_datetime",
        default
    )]
    completed_at: Option<DateTime<Utc>>
});

impl ScrapeJob {
    pub fn new(
        user_id: String,
        category: String,
        locations: Vec<String>,
        max_results_per_location: u32,
    ) -> Self {
        let now = Utc::now();
        let total_locations = locations.len() as u32;

        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            category,
            locations,
            max_results_per_location,
            status: JobStatus::Pending,
            progress: 0,
            total_locations,
            current_location: None,
            error: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn create_and_store(
        user_id: String,
        category: String,
        locations: Vec<String>,
        max_results_per_location: u32,
        db: &SurrealDbClient,
    ) -> Result<Self, AppError> {
        let job = Self::new(user_id, category, locations, max_results_per_location);
        db.store_item(job.clone()).await?;
        Ok(job)
    }

    /// Fetch a job on behalf of a user. A job owned by someone else is
    /// reported as not found, existence does not leak across accounts.
    pub async fn get_owned(
        id: &str,
        user_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Self, AppError> {
        db.get_item::<ScrapeJob>(id)
            .await?
            .filter(|job| job.user_id == user_id)
            .ok_or_else(|| AppError::NotFound("Job not found".into()))
    }

    pub async fn list_for_user(
        user_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Vec<Self>, AppError> {
        let jobs: Vec<ScrapeJob> = db
            .client
            .query(
                "SELECT * FROM type::table($table) WHERE user_id = $user_id
                 ORDER BY created_at DESC",
            )
            .bind(("table", Self::table_name()))
            .bind(("user_id", user_id.to_owned()))
            .await?
            .take(0)?;

        Ok(jobs)
    }

    pub async fn mark_running(&self, db: &SurrealDbClient) -> Result<ScrapeJob, AppError> {
        let next = compute_next_status(&self.status, JobTransition::Start)?;
        debug_assert_eq!(next, JobStatus::Running);

        const START_QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET status = $running,
                updated_at = $now
            WHERE status = $pending
            RETURN *;
        "#;

        let now = Utc::now();
        let mut result = db
            .client
            .query(START_QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", self.id.clone()))
            .bind(("running", JobStatus::Running.as_str()))
            .bind(("pending", JobStatus::Pending.as_str()))
            .bind(("now", SurrealDatetime::from(now)))
            .await?;

        let updated: Option<ScrapeJob> = result.take(0)?;
        updated.ok_or_else(|| invalid_transition(&self.status, JobTransition::Start))
    }

    /// Persist the per-location progress snapshot. Progress never moves
    /// backwards: the query keeps the maximum of the stored and the new
    /// value even if two writers race.
    pub async fn record_progress(
        &self,
        progress: u8,
        current_location: &str,
        db: &SurrealDbClient,
    ) -> Result<ScrapeJob, AppError> {
        const PROGRESS_QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET progress = math::max([progress, $progress]),
                current_location = $current_location,
                updated_at = $now
            WHERE status = $running
            RETURN *;
        "#;

        let now = Utc::now();
        let mut result = db
            .client
            .query(PROGRESS_QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", self.id.clone()))
            .bind(("progress", progress.min(100)))
            .bind(("current_location", current_location.to_owned()))
            .bind(("running", JobStatus::Running.as_str()))
            .bind(("now", SurrealDatetime::from(now)))
            .await?;

        let updated: Option<ScrapeJob> = result.take(0)?;
        updated.ok_or_else(|| {
            AppError::Validation(format!(
                "Cannot record progress on a {} job",
                self.status.as_str()
            ))
        })
    }

    pub async fn mark_completed(&self, db: &SurrealDbClient) -> Result<ScrapeJob, AppError> {
        let next = compute_next_status(&self.status, JobTransition::Complete)?;
        debug_assert_eq!(next, JobStatus::Completed);

        const COMPLETE_QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET status = $completed,
                progress = 100,
                current_location = NONE,
                completed_at = $now,
                updated_at = $now
            WHERE status = $running
            RETURN *;
        "#;

        let now = Utc::now();
        let mut result = db
            .client
            .query(COMPLETE_QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", self.id.clone()))
            .bind(("completed", JobStatus::Completed.as_str()))
            .bind(("running", JobStatus::Running.as_str()))
            .bind(("now", SurrealDatetime::from(now)))
            .await?;

        let updated: Option<ScrapeJob> = result.take(0)?;
        updated.ok_or_else(|| invalid_transition(&self.status, JobTransition::Complete))
    }

    pub async fn mark_failed(
        &self,
        error: &str,
        db: &SurrealDbClient,
    ) -> Result<ScrapeJob, AppError> {
        let next = compute_next_status(&self.status, JobTransition::Fail)?;
        debug_assert_eq!(next, JobStatus::Failed);

        const FAIL_QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET status = $failed,
                error = $error,
                completed_at = $now,
                updated_at = $now
            WHERE status = $running
            RETURN *;
        "#;

        let now = Utc::now();
        let mut result = db
            .client
            .query(FAIL_QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", self.id.clone()))
            .bind(("failed", JobStatus::Failed.as_str()))
            .bind(("error", error.to_owned()))
            .bind(("running", JobStatus::Running.as_str()))
            .bind(("now", SurrealDatetime::from(now)))
            .await?;

        let updated: Option<ScrapeJob> = result.take(0)?;
        updated.ok_or_else(|| invalid_transition(&self.status, JobTransition::Fail))
    }

    pub async fn mark_cancelled(&self, db: &SurrealDbClient) -> Result<ScrapeJob, AppError> {
        compute_next_status(&self.status, JobTransition::Cancel)?;

        const CANCEL_QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET status = $cancelled,
                completed_at = $now,
                updated_at = $now
            WHERE status IN $allow_states
            RETURN *;
        "#;

        let now = Utc::now();
        let mut result = db
            .client
            .query(CANCEL_QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", self.id.clone()))
            .bind(("cancelled", JobStatus::Cancelled.as_str()))
            .bind((
                "allow_states",
                vec![JobStatus::Pending.as_str(), JobStatus::Running.as_str()],
            ))
            .bind(("now", SurrealDatetime::from(now)))
            .await?;

        let updated: Option<ScrapeJob> = result.take(0)?;
        updated.ok_or_else(|| invalid_transition(&self.status, JobTransition::Cancel))
    }

    /// Per-status job counts for the admin stats endpoint.
    pub async fn counts_by_status(db: &SurrealDbClient) -> Result<Vec<(String, i64)>, AppError> {
        #[derive(Deserialize)]
        struct StatusCount {
            status: JobStatus,
            count: i64,
        }

        let rows: Vec<StatusCount> = db
            .client
            .query(
                "SELECT status, count() as count FROM type::table($table)
                 GROUP BY status",
            )
            .bind(("table", Self::table_name()))
            .await?
            .take(0)?;

        Ok(rows
            .into_iter()
            .map(|row| (row.status.as_str().to_owned(), row.count))
            .collect())
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

    fn sample_job(user_id: &str) -> ScrapeJob {
        ScrapeJob::new(
            user_id.to_string(),
            "cafes".to_string(),
            vec!["Reno, Nevada".to_string(), "Austin, Texas".to_string()],
            5,
        )
    }

    #[tokio::test]
    async fn test_new_job_defaults() {
        let job = sample_job("user123");

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert_eq!(job.total_locations, 2);
        assert!(job.current_location.is_none());
        assert!(job.error.is_none());
        assert!(job.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_full_lifecycle_to_completed() {
        let db = memory_db().await;
        let job = sample_job("user123");
        db.store_item(job.clone()).await.expect("store");

        let running = job.mark_running(&db).await.expect("start");
        assert_eq!(running.status, JobStatus::Running);

        let progressed = running
            .record_progress(50, "Reno, Nevada", &db)
            .await
            .expect("progress");
        assert_eq!(progressed.progress, 50);
        assert_eq!(progressed.current_location.as_deref(), Some("Reno, Nevada"));

        let completed = progressed.mark_completed(&db).await.expect("complete");
        assert_eq!(completed.status, JobStatus::Completed);
        assert_eq!(completed.progress, 100);
        assert!(completed.completed_at.is_some());
        assert!(completed.current_location.is_none());
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let db = memory_db().await;
        let job = sample_job("user123");
        db.store_item(job.clone()).await.expect("store");

        let running = job.mark_running(&db).await.expect("start");
        let at_sixty = running
            .record_progress(60, "Reno, Nevada", &db)
            .await
            .expect("progress");
        assert_eq!(at_sixty.progress, 60);

        // A stale lower value must not move progress backwards
        let still_sixty = at_sixty
            .record_progress(30, "Austin, Texas", &db)
            .await
            .expect("progress");
        assert_eq!(still_sixty.progress, 60);
    }

    #[tokio::test]
    async fn test_failure_records_error() {
        let db = memory_db().await;
        let job = sample_job("user123");
        db.store_item(job.clone()).await.expect("store");

        let running = job.mark_running(&db).await.expect("start");
        let failed = running
            .mark_failed("browser session lost", &db)
            .await
            .expect("fail");

        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("browser session lost"));
        assert!(failed.completed_at.is_some());
        assert!(failed.progress < 100);
    }

    #[tokio::test]
    async fn test_cancel_from_pending_and_running() {
        let db = memory_db().await;

        let pending = sample_job("user123");
        db.store_item(pending.clone()).await.expect("store");
        let cancelled = pending.mark_cancelled(&db).await.expect("cancel pending");
        assert_eq!(cancelled.status, JobStatus::Cancelled);

        let other = sample_job("user123");
        db.store_item(other.clone()).await.expect("store");
        let running = other.mark_running(&db).await.expect("start");
        let cancelled = running.mark_cancelled(&db).await.expect("cancel running");
        assert_eq!(cancelled.status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_invalid_transitions_rejected() {
        let db = memory_db().await;
        let job = sample_job("user123");
        db.store_item(job.clone()).await.expect("store");

        // Completing a pending job skips Running
        assert!(job.mark_completed(&db).await.is_err());
        assert!(job.mark_failed("nope", &db).await.is_err());

        let running = job.mark_running(&db).await.expect("start");
        let completed = running.mark_completed(&db).await.expect("complete");

        // Terminal states accept nothing further
        assert!(completed.mark_running(&db).await.is_err());
        assert!(completed.mark_cancelled(&db).await.is_err());
    }

    #[tokio::test]
    async fn test_get_owned_hides_foreign_jobs() {
        let db = memory_db().await;
        let job = sample_job("owner");
        db.store_item(job.clone()).await.expect("store");

        let found = ScrapeJob::get_owned(&job.id, "owner", &db)
            .await
            .expect("owner sees job");
        assert_eq!(found.id, job.id);

        let foreign = ScrapeJob::get_owned(&job.id, "intruder", &db).await;
        assert!(matches!(foreign, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_for_user_newest_first() {
        let db = memory_db().await;

        for i in 0..3 {
            let mut job = sample_job("lister");
            job.created_at = Utc::now() - chrono::Duration::minutes(i);
            db.store_item(job).await.expect("store");
        }
        db.store_item(sample_job("someone_else"))
            .await
            .expect("store");

        let jobs = ScrapeJob::list_for_user("lister", &db).await.expect("list");
        assert_eq!(jobs.len(), 3);
        for window in jobs.windows(2) {
            assert!(window[0].created_at >= window[1].created_at);
        }
    }
}
