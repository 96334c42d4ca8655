use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use common::storage::types::user::{User, UserSummary};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct RegisterParams {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    pub username: String,
    pub password: String,
}

pub async fn register(
    State(state): State<ApiState>,
    Json(input): Json<RegisterParams>,
) -> Result<impl IntoResponse, ApiError> {
    let user = User::create_new(input.username, input.email, input.password, &state.db).await?;

    info!(user_id = %user.id, username = %user.username, "Registered new user");

    Ok((StatusCode::CREATED, Json(UserSummary::from(&user))))
}

pub async fn login(
    State(state): State<ApiState>,
    Json(input): Json<LoginParams>,
) -> Result<impl IntoResponse, ApiError> {
    let user = User::authenticate(&input.username, &input.password, &state.db).await?;

    // Valid credentials are not enough until an admin has let the
    // account in.
    if !user.approved {
        return Err(ApiError::Forbidden(
            "Account is awaiting admin approval".to_string(),
        ));
    }

    User::record_login(&user.id, &state.db).await?;
    let token = state.tokens.issue(&user)?;

    info!(user_id = %user.id, "User logged in");

    Ok(Json(json!({
        "token": token,
        "user": UserSummary::from(&user)
    })))
}

pub async fn me(Extension(user): Extension<User>) -> impl IntoResponse {
    Json(UserSummary::from(&user))
}
