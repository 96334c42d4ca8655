use api_state::ApiState;
use axum::{
    extract::FromRef,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Router,
};
use middleware_api_auth::{api_auth, require_admin, require_approved};
use routes::{
    admin::{approve_user, delete_user, get_stats, list_users},
    auth::{login, me, register},
    jobs::{cancel_job, create_job, download_results, get_job, job_results, list_jobs},
    liveness::live,
    readiness::ready,
    reference::{list_cities, list_states},
};

pub mod api_state;
pub mod error;
mod middleware_api_auth;
mod routes;

/// Router for API functionality, version 1
pub fn api_routes_v1<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    // Public, unauthenticated endpoints (probes, reference data, auth entry)
    let public = Router::new()
        .route("/health", get(live))
        .route("/ready", get(ready))
        .route("/states", get(list_states))
        .route("/states/{state}/cities", get(list_cities))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login));

    // Endpoints for authenticated, admin-approved accounts
    let approved = Router::new()
        .route("/auth/me", get(me))
        .route("/jobs", post(create_job).get(list_jobs))
        .route("/jobs/{id}", get(get_job))
        .route("/jobs/{id}/results", get(job_results))
        .route("/jobs/{id}/download", get(download_results))
        .route("/jobs/{id}/cancel", post(cancel_job))
        .route_layer(from_fn(require_approved))
        .route_layer(from_fn_with_state(app_state.clone(), api_auth));

    let admin = Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/{id}/approve", post(approve_user))
        .route("/admin/users/{id}", delete(delete_user))
        .route("/admin/stats", get(get_stats))
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(app_state.clone(), api_auth));

    public.merge(approved).merge(admin)
}
