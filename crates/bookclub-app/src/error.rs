use axum::{
    response::{IntoResponse, Response},
    Json,
};
use bookclub_dal::Error as DalError;
use http::StatusCode;
use serde_json::json;
use tracing::error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Errors returned by API handlers, rendered as `{"error": <message>}`
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("Authentication required")]
    Unauthorized,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Access denied")]
    Forbidden,
    #[error("{0} is locked")]
    Locked(String),
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden | ApiError::Locked(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(ref e) = self {
            error!(error = %e, "internal error");
        }
        let body = json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

impl From<DalError> for ApiError {
    fn from(value: DalError) -> Self {
        match value {
            DalError::RecordNotFound(what) => ApiError::NotFound(what),
            DalError::AlreadyExists(what) => ApiError::Conflict(what),
            DalError::Locked(what) => ApiError::Locked(what),
            DalError::InvalidCredentials => ApiError::InvalidCredentials,
            e @ (DalError::InvalidName(_) | DalError::UnknownSort(_)) => {
                ApiError::BadRequest(e.to_string())
            }
            e => ApiError::Internal(e.into()),
        }
    }
}

impl From<tower_sessions::session::Error> for ApiError {
    fn from(value: tower_sessions::session::Error) -> Self {
        ApiError::Internal(value.into())
    }
}
