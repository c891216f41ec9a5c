use std::collections::HashMap;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use agora_types::api::ErrorBody;

pub type FieldErrors = HashMap<String, Vec<String>>;

/// The three error classes of the application: validation failures carry
/// per-field messages, authorization failures carry a single user-facing
/// reason, and unexpected errors are logged server-side and surface only
/// as a generic message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{message}")]
    Validation {
        message: String,
        field_errors: FieldErrors,
    },
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("internal error")]
    Internal,
}

impl ApiError {
    pub fn validation(field_errors: FieldErrors) -> Self {
        Self::Validation {
            message: "there is a problem with the submitted input".into(),
            field_errors,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        error!("unexpected error: {:#}", err);
        Self::Internal
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, field_errors) = match &self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
            Self::Validation { field_errors, .. } => {
                (StatusCode::BAD_REQUEST, Some(field_errors.clone()))
            }
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, None),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, None),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, None),
            Self::Conflict(_) => (StatusCode::CONFLICT, None),
            Self::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, None),
            Self::Internal => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };

        let body = ErrorBody {
            error: self.to_string(),
            field_errors,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_hide_detail() {
        let err: ApiError = anyhow::anyhow!("connection refused on 10.0.0.7").into();
        assert_eq!(err.to_string(), "internal error");
    }

    #[test]
    fn validation_keeps_field_errors() {
        let mut fields = FieldErrors::new();
        fields.insert("title".into(), vec!["title is required".into()]);
        let err = ApiError::validation(fields);
        match err {
            ApiError::Validation { field_errors, .. } => {
                assert_eq!(field_errors["title"], vec!["title is required"]);
            }
            _ => panic!("expected validation error"),
        }
    }
}
