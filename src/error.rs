use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::repository::RepositoryError;

// --- Gate messages ---

pub const NOT_LOGGED_IN: &str = "User not logged in";
pub const INVALID_OR_EXPIRED: &str = "Invalid or expired token";
pub const INVALID_ACCESS_TOKEN: &str = "Invalid Access Token";
pub const ADMINS_ONLY: &str = "Access denied. Admins only.";
pub const ROLE_DENIED: &str = "Access denied.";
pub const SECRET_MISSING: &str = "Secret key is missing in request body.";
pub const SECRET_INVALID: &str = "Invalid secret key.";
pub const ROUTE_NOT_FOUND: &str = "Route not found";

/// ApiError
///
/// The terminal outcome of a failed gate or handler. Every variant is rendered as
/// `{ "success": false, "message": ... }` with the matching status code, and the
/// message is always one of the fixed strings above so no internal detail leaks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No credential, an invalid/expired credential, or a principal that no longer exists.
    #[error("{0}")]
    Unauthenticated(&'static str),

    /// Role mismatch or wrong operator secret.
    #[error("{0}")]
    Forbidden(&'static str),

    /// A required request field is missing.
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    /// Store failure. The cause is logged where it happens, never returned.
    #[error("Something went wrong!")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// ErrorBody
///
/// Wire shape of every error response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(e: RepositoryError) -> Self {
        tracing::error!(error = %e, "repository failure");
        ApiError::Internal
    }
}
