use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use common::error::AppError;
use common::storage::db::SurrealDbClient;
use common::storage::types::job_log::JobLogEntry;
use common::storage::types::listing::Listing;
use common::storage::types::scrape_job::{JobStatus, ScrapeJob};
use common::utils::csv_export::write_export_file;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::scraper::LocationScraper;

/// Owns the background job tasks. Every submitted job gets its own
/// spawned task and a [`CancellationToken`] kept in the registry until
/// the job reaches a terminal state.
pub struct JobSupervisor {
    db: Arc<SurrealDbClient>,
    scraper: Arc<dyn LocationScraper>,
    export_dir: PathBuf,
    pacing: Duration,
    tokens: Mutex<HashMap<String, CancellationToken>>,
}

impl JobSupervisor {
    pub fn new(
        db: Arc<SurrealDbClient>,
        scraper: Arc<dyn LocationScraper>,
        export_dir: PathBuf,
    ) -> Self {
        Self {
            db,
            scraper,
            export_dir,
            pacing: Duration::from_millis(500),
            tokens: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Register a cancellation token for the job and run it on its own
    /// task. The token is registered before the task starts so a cancel
    /// request arriving immediately after submission still reaches it.
    pub async fn spawn(self: &Arc<Self>, job: ScrapeJob) {
        let token = CancellationToken::new();
        self.tokens
            .lock()
            .await
            .insert(job.id.clone(), token.clone());

        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            let job_id = job.id.clone();
            supervisor.run_job(job, &token).await;
            supervisor.tokens.lock().await.remove(&job_id);
        });
    }

    /// Request cancellation of a job. A live worker observes its token
    /// at the next location boundary; a job without a worker (submitted
    /// before a restart) is finalized directly.
    pub async fn cancel(&self, job: &ScrapeJob) -> Result<(), AppError> {
        if job.status.is_terminal() {
            return Err(AppError::Validation(format!(
                "Job is already {}",
                job.status.as_str()
            )));
        }

        let token = self.tokens.lock().await.get(&job.id).cloned();
        match token {
            Some(token) => {
                token.cancel();
                JobLogEntry::append(&job.id, "Cancellation requested", &self.db).await?;
            }
            None => {
                job.mark_cancelled(&self.db).await?;
                JobLogEntry::append(&job.id, "Job cancelled", &self.db).await?;
            }
        }

        Ok(())
    }

    async fn run_job(&self, job: ScrapeJob, cancel: &CancellationToken) {
        let job_id = job.id.clone();
        match self.drive(job, cancel).await {
            Ok(status) => {
                info!(job_id = %job_id, status = status.as_str(), "Job finished");
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Job aborted");
                self.finalize_aborted(&job_id, cancel, &e).await;
            }
        }
    }

    async fn drive(
        &self,
        job: ScrapeJob,
        cancel: &CancellationToken,
    ) -> Result<JobStatus, AppError> {
        if cancel.is_cancelled() {
            return self.finish_cancelled(&job).await;
        }

        let mut job = job.mark_running(&self.db).await?;
        JobLogEntry::append(
            &job.id,
            format!("Job started with {} locations", job.total_locations),
            &self.db,
        )
        .await?;

        let locations = job.locations.clone();
        let total = locations.len();
        let mut completed = 0usize;

        for (index, raw) in locations.iter().enumerate() {
            if cancel.is_cancelled() {
                return self.finish_cancelled(&job).await;
            }

            let Some((city, state)) = parse_location(raw) else {
                warn!(job_id = %job.id, location = %raw, "Skipping malformed location");
                JobLogEntry::append(
                    &job.id,
                    format!("Skipping malformed location entry: {raw}"),
                    &self.db,
                )
                .await?;
                continue;
            };

            completed += 1;
            job = job
                .record_progress(running_progress(completed, total), raw, &self.db)
                .await?;
            JobLogEntry::append(
                &job.id,
                format!(
                    "Processing location {}/{}: {city}, {state}",
                    index + 1,
                    total
                ),
                &self.db,
            )
            .await?;

            let records = self
                .scraper
                .scrape_location(
                    &job.category,
                    &city,
                    &state,
                    job.max_results_per_location as usize,
                )
                .await?;

            for record in &records {
                let listing = Listing::new(
                    job.id.clone(),
                    record.business_name.clone(),
                    record.phone.clone(),
                    record.website.clone(),
                    record.address.clone(),
                    job.category.clone(),
                    city.clone(),
                    state.clone(),
                    record.source_url.clone(),
                );
                self.db.store_item(listing).await?;
            }

            JobLogEntry::append(
                &job.id,
                format!("Found {} businesses in {city}, {state}", records.len()),
                &self.db,
            )
            .await?;

            // Pacing between locations, woken early by cancellation.
            if index + 1 < total {
                tokio::select! {
                    () = cancel.cancelled() => {}
                    () = tokio::time::sleep(self.pacing) => {}
                }
            }
        }

        if cancel.is_cancelled() {
            return self.finish_cancelled(&job).await;
        }

        let job = job.mark_completed(&self.db).await?;
        JobLogEntry::append(&job.id, "Job completed", &self.db).await?;

        // Export snapshot is best effort, the listings stay queryable
        // either way.
        let listings = Listing::for_job(&job.id, &self.db).await?;
        match write_export_file(&job.id, &listings, &self.export_dir).await {
            Ok(path) => info!(job_id = %job.id, path = %path.display(), "Wrote export file"),
            Err(e) => warn!(job_id = %job.id, error = %e, "Failed to write export file"),
        }

        Ok(job.status)
    }

    async fn finish_cancelled(&self, job: &ScrapeJob) -> Result<JobStatus, AppError> {
        let cancelled = job.mark_cancelled(&self.db).await?;
        JobLogEntry::append(&job.id, "Job cancelled", &self.db).await?;
        Ok(cancelled.status)
    }

    /// Best-effort terminal write after a worker error. Reloads the job
    /// because the in-task snapshot may be stale by the time the error
    /// surfaces.
    async fn finalize_aborted(&self, job_id: &str, cancel: &CancellationToken, error: &AppError) {
        let latest = match self.db.get_item::<ScrapeJob>(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => return,
            Err(e) => {
                error!(job_id, error = %e, "Could not load job for terminal update");
                return;
            }
        };

        if latest.status.is_terminal() {
            return;
        }

        let outcome = if cancel.is_cancelled() {
            latest.mark_cancelled(&self.db).await
        } else {
            latest.mark_failed(&error.to_string(), &self.db).await
        };

        if let Err(e) = outcome {
            error!(job_id, error = %e, "Could not record terminal job state");
        }
    }
}

/// Split a submitted location into (city, state) on the first comma.
/// Entries missing either half are rejected.
fn parse_location(raw: &str) -> Option<(String, String)> {
    let (city, state) = raw.split_once(',')?;
    let city = city.trim();
    let state = state.trim();
    if city.is_empty() || state.is_empty() {
        return None;
    }
    Some((city.to_owned(), state.to_owned()))
}

/// Progress while running is capped at 99: only a completed job reports
/// 100.
fn running_progress(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (completed * 100 + total / 2) / total;
    pct.min(99) as u8
}
