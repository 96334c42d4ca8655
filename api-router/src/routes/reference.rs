use axum::{extract::Path, response::IntoResponse, Json};
use common::utils::reference;
use serde_json::json;

use crate::error::ApiError;

pub async fn list_states() -> impl IntoResponse {
    Json(json!({ "states": reference::states() }))
}

pub async fn list_cities(Path(state): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let cities = reference::cities_of(&state)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown state: {state}")))?;

    Ok(Json(json!({ "state": state, "cities": cities })))
}
