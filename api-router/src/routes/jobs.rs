use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use common::storage::types::{
    job_log::JobLogEntry,
    listing::Listing,
    scrape_job::{JobStatus, ScrapeJob, DEFAULT_MAX_RESULTS},
    user::User,
};
use common::utils::csv_export::{export_file_name, render_csv};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct CreateJobParams {
    pub category: String,
    pub cities_data: Vec<String>,
    pub max_results_per_city: Option<u32>,
}

/// The job shape returned from list and create, everything except the
/// submitted location payload.
#[derive(Debug, Serialize)]
pub struct JobSummary {
    pub id: String,
    pub category: String,
    pub status: JobStatus,
    pub progress: u8,
    pub total_locations: u32,
    pub current_location: Option<String>,
    pub error: Option<String>,
    pub max_results_per_location: u32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&ScrapeJob> for JobSummary {
    fn from(job: &ScrapeJob) -> Self {
        Self {
            id: job.id.clone(),
            category: job.category.clone(),
            status: job.status.clone(),
            progress: job.progress,
            total_locations: job.total_locations,
            current_location: job.current_location.clone(),
            error: job.error.clone(),
            max_results_per_location: job.max_results_per_location,
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }
}

pub async fn create_job(
    State(state): State<ApiState>,
    Extension(user): Extension<User>,
    Json(input): Json<CreateJobParams>,
) -> Result<impl IntoResponse, ApiError> {
    let category = input.category.trim().to_owned();
    if category.is_empty() {
        return Err(ApiError::ValidationError("Category is required".into()));
    }
    if input.cities_data.is_empty() {
        return Err(ApiError::ValidationError(
            "At least one location is required".into(),
        ));
    }

    let max_results = input.max_results_per_city.unwrap_or(DEFAULT_MAX_RESULTS);
    if max_results == 0 {
        return Err(ApiError::ValidationError(
            "max_results_per_city must be at least 1".into(),
        ));
    }

    let job = ScrapeJob::create_and_store(
        user.id.clone(),
        category,
        input.cities_data,
        max_results,
        &state.db,
    )
    .await?;

    JobLogEntry::append(&job.id, "Job created", &state.db).await?;

    info!(
        job_id = %job.id,
        user_id = %user.id,
        locations = job.total_locations,
        "Accepted scrape job"
    );

    state.supervisor.spawn(job.clone()).await;

    Ok((StatusCode::CREATED, Json(JobSummary::from(&job))))
}

pub async fn list_jobs(
    State(state): State<ApiState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let jobs = ScrapeJob::list_for_user(&user.id, &state.db).await?;
    let summaries: Vec<JobSummary> = jobs.iter().map(JobSummary::from).collect();

    Ok(Json(summaries))
}

pub async fn get_job(
    State(state): State<ApiState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = ScrapeJob::get_owned(&id, &user.id, &state.db).await?;
    let logs = JobLogEntry::for_job(&job.id, &state.db).await?;
    let results = Listing::for_job(&job.id, &state.db).await?;

    Ok(Json(json!({
        "job": job,
        "logs": logs,
        "results": results
    })))
}

pub async fn job_results(
    State(state): State<ApiState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = ScrapeJob::get_owned(&id, &user.id, &state.db).await?;
    let results = Listing::for_job(&job.id, &state.db).await?;

    Ok(Json(json!({
        "job_id": job.id,
        "total_results": results.len(),
        "results": results
    })))
}

pub async fn download_results(
    State(state): State<ApiState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = ScrapeJob::get_owned(&id, &user.id, &state.db).await?;

    if job.status != JobStatus::Completed {
        return Err(ApiError::ValidationError(format!(
            "Job is {}, only completed jobs can be downloaded",
            job.status.as_str()
        )));
    }

    let listings = Listing::for_job(&job.id, &state.db).await?;
    let body = render_csv(&listings)?;
    let file_name = export_file_name(&job.id);

    let headers = [
        (header::CONTENT_TYPE, "text/csv".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file_name}\""),
        ),
    ];

    Ok((headers, body))
}

pub async fn cancel_job(
    State(state): State<ApiState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = ScrapeJob::get_owned(&id, &user.id, &state.db).await?;

    state.supervisor.cancel(&job).await?;

    info!(job_id = %job.id, user_id = %user.id, "Cancellation requested");

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "job_id": job.id,
            "status": "cancelling"
        })),
    ))
}
