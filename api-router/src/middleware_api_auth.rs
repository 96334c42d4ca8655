use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use common::storage::types::user::User;

use crate::{api_state::ApiState, error::ApiError};

/// Resolve the bearer token to a stored user and attach it to the
/// request. Token problems and unknown users produce the same response.
pub async fn api_auth(
    State(state): State<ApiState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&request)
        .ok_or_else(|| ApiError::Unauthorized("You have to be authenticated".to_string()))?;

    let claims = state.tokens.decode(&token)?;

    let user = state
        .db
        .get_item::<User>(&claims.sub)
        .await
        .map_err(common::error::AppError::from)?;
    let user =
        user.ok_or_else(|| ApiError::Unauthorized("You have to be authenticated".to_string()))?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Runs after [`api_auth`], so the user extension is already present.
pub async fn require_approved(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<User>()
        .ok_or_else(|| ApiError::Unauthorized("You have to be authenticated".to_string()))?;

    if !user.approved {
        return Err(ApiError::Forbidden(
            "Account is awaiting admin approval".to_string(),
        ));
    }

    Ok(next.run(request).await)
}

pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<User>()
        .ok_or_else(|| ApiError::Unauthorized("You have to be authenticated".to_string()))?;

    if !user.admin {
        return Err(ApiError::Forbidden(
            "Administrator privileges required".to_string(),
        ));
    }

    Ok(next.run(request).await)
}

fn extract_bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer ").map(str::trim))
        .filter(|token| !token.is_empty())
        .map(String::from)
}
