// ============================================================================
// Axum Extractors
// ============================================================================
//
// Custom extractors for Axum routes:
// - AuthenticatedUser: Extracts and validates JWT token from Authorization header
//
// ============================================================================

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::AppError;

/// Extractor for authenticated user ID from JWT token
///
/// Usage:
/// ```rust,ignore
/// async fn handler(user: AuthenticatedUser, ...) -> Result<...> {
///     let user_id = user.0;
///     // ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Uuid);

#[async_trait]
impl FromRequestParts<Arc<AppContext>> for AuthenticatedUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppContext>,
    ) -> Result<Self, Self::Rejection> {
        let user_id = extract_user_id_from_jwt(state, &parts.headers).map_err(|e| {
            tracing::warn!(error = %e, "JWT authentication failed");
            let status = e.status_code();
            let body = json!({
                "success": false,
                "message": e.user_message(),
                "code": e.error_code(),
            });
            (status, axum::Json(body)).into_response()
        })?;

        Ok(AuthenticatedUser(user_id))
    }
}

/// Pulls the bearer token out of the Authorization header and resolves it
/// to a user id. Any verification failure collapses to the same client
/// message so callers cannot probe which check rejected them.
fn extract_user_id_from_jwt(ctx: &AppContext, headers: &HeaderMap) -> Result<Uuid, AppError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Auth("No token provided".to_string()))?;

    // Expected format: "Bearer <token>"
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("No token provided".to_string()))?;

    let claims = ctx
        .auth_manager
        .verify_token(token)
        .map_err(|_| AppError::Auth("Invalid or expired token".to_string()))?;

    // A valid signature over a malformed subject is still an invalid token
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Auth("Invalid or expired token".to_string()))?;

    Ok(user_id)
}
