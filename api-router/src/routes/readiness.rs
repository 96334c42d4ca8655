use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::api_state::ApiState;

/// Readiness probe: 200 once the database answers and the export
/// directory is usable, else 503. The export directory is otherwise
/// created lazily at job completion, so problems surface here instead
/// of at the first download.
pub async fn ready(State(state): State<ApiState>) -> impl IntoResponse {
    let db_ok = state.db.client.query("RETURN true").await.is_ok();
    let exports_ok = tokio::fs::create_dir_all(&state.config.export_dir)
        .await
        .is_ok();

    let check = |ok: bool| if ok { "ok" } else { "fail" };
    let status = if db_ok && exports_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "ok" } else { "error" },
            "checks": {
                "db": check(db_ok),
                "exports": check(exports_ok)
            }
        })),
    )
}
