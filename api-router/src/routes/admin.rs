use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use common::error::AppError;
use common::storage::types::{
    listing::Listing,
    scrape_job::ScrapeJob,
    user::{User, UserSummary},
};
use serde_json::json;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

pub async fn list_users(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let users = User::list_all(&state.db).await?;
    let summaries: Vec<UserSummary> = users.iter().map(UserSummary::from).collect();

    Ok(Json(summaries))
}

pub async fn approve_user(
    State(state): State<ApiState>,
    Extension(admin): Extension<User>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = User::approve(&id, &state.db).await?;

    info!(user_id = %user.id, admin_id = %admin.id, "Approved user");

    Ok(Json(UserSummary::from(&user)))
}

pub async fn delete_user(
    State(state): State<ApiState>,
    Extension(admin): Extension<User>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if id == admin.id {
        return Err(ApiError::ValidationError(
            "You cannot delete your own account".into(),
        ));
    }

    let deleted = state
        .db
        .delete_item::<User>(&id)
        .await
        .map_err(AppError::from)?;

    if deleted.is_none() {
        return Err(ApiError::NotFound("User not found".into()));
    }

    info!(user_id = %id, admin_id = %admin.id, "Deleted user");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_stats(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let (total_users, approved_users) = User::counts(&state.db).await?;
    let job_counts = ScrapeJob::counts_by_status(&state.db).await?;
    let total_listings = Listing::count_all(&state.db).await?;

    let jobs: serde_json::Map<String, serde_json::Value> = job_counts
        .into_iter()
        .map(|(status, count)| (status, json!(count)))
        .collect();

    Ok(Json(json!({
        "users": {
            "total": total_users,
            "approved": approved_users,
            "pending": total_users - approved_users
        },
        "jobs": jobs,
        "listings": { "total": total_listings }
    })))
}
