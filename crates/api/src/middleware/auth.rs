//! Authentication middleware for protected routes.
//!
//! Identity is established upstream by the authentication service, which
//! forwards the user in `x-user-id` and the granted flags in `x-permissions`
//! (comma separated).

use axum::{
    Json,
    extract::{FromRequestParts, Request},
    http::{HeaderMap, StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use saldo_shared::{Permission, Principal, types::UserId};
use serde_json::json;

/// Header carrying the authenticated user ID.
pub const USER_HEADER: &str = "x-user-id";
/// Header carrying the granted permissions.
pub const PERMISSIONS_HEADER: &str = "x-permissions";

fn unauthorized(error: &str, message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": error, "message": message })),
    )
        .into_response()
}

fn principal_from_headers(headers: &HeaderMap) -> Result<Principal, Response> {
    let Some(raw) = headers.get(USER_HEADER).and_then(|h| h.to_str().ok()) else {
        return Err(unauthorized(
            "missing_identity",
            "x-user-id header is required",
        ));
    };
    let user_id: UserId = raw
        .trim()
        .parse()
        .map_err(|_| unauthorized("invalid_identity", "x-user-id must be a UUID"))?;

    let permissions = headers
        .get(PERMISSIONS_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(Principal::parse_permissions)
        .unwrap_or_default();

    Ok(Principal::new(user_id, permissions))
}

/// Authentication middleware that resolves the caller.
///
/// Stores the [`Principal`] in request extensions for handlers to access.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    match principal_from_headers(request.headers()) {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(response) => response,
    }
}

/// Extractor for the authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

impl AuthUser {
    /// Returns the user ID.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.0.user_id
    }

    /// Fails with 403 unless the caller holds `permission`.
    #[allow(clippy::result_large_err)]
    pub fn require(&self, permission: Permission) -> Result<(), Response> {
        if self.0.can(permission) {
            return Ok(());
        }
        Err((
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "forbidden",
                "message": format!("Missing permission: {permission:?}")
            })),
        )
            .into_response())
    }

    /// Fails with 403 unless the caller holds at least one of `permissions`.
    #[allow(clippy::result_large_err)]
    pub fn require_any(&self, permissions: &[Permission]) -> Result<(), Response> {
        match permissions.iter().find(|p| self.0.can(**p)) {
            Some(_) => Ok(()),
            None => Err((
                StatusCode::FORBIDDEN,
                Json(json!({
                    "error": "forbidden",
                    "message": "Insufficient permissions"
                })),
            )
                .into_response()),
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| unauthorized("unauthorized", "Authentication required"))
    }
}
