//! JSON error bodies for the HTTP API: `{"error": {"code", "message"}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::backup::BackupError;
use crate::proxy::ProxyError;
use crate::scrapbook::ScrapbookError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl From<ScrapbookError> for ApiError {
    fn from(err: ScrapbookError) -> Self {
        match err {
            ScrapbookError::NotFound { .. } => Self::not_found(err.to_string()),
            ScrapbookError::Invalid(msg) => Self::bad_request(msg),
            ScrapbookError::Conflict(msg) => Self::new(StatusCode::CONFLICT, "CONFLICT", msg),
        }
    }
}

impl From<BackupError> for ApiError {
    fn from(err: BackupError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_BACKUP", err.to_string())
    }
}

impl From<ProxyError> for ApiError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::InvalidUrl(_) | ProxyError::Disallowed { .. } => Self::bad_request(err.to_string()),
            ProxyError::NoImages => Self::not_found(err.to_string()),
            ProxyError::Upstream { .. } | ProxyError::Network(_) => {
                Self::new(StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", err.to_string())
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<ScrapbookError>() {
            Ok(e) => return e.into(),
            Err(err) => err,
        };
        let err = match err.downcast::<BackupError>() {
            Ok(e) => return e.into(),
            Err(err) => err,
        };
        tracing::error!(error = ?err, "request failed");
        Self::internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.code,
                "message": self.message,
            }
        });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrapbook_errors_map_through_anyhow() {
        let err: ApiError = anyhow::Error::new(ScrapbookError::not_found("story", "s9")).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.message, "story not found: s9");

        let err: ApiError = anyhow::Error::new(ScrapbookError::Conflict("dup".into())).into();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }

    #[test]
    fn backup_errors_hide_the_reason() {
        let err: ApiError = anyhow::Error::new(BackupError::Invalid {
            reason: "not JSON".into(),
        })
        .into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Invalid backup file");
    }

    #[test]
    fn proxy_errors() {
        assert_eq!(ApiError::from(ProxyError::NoImages).status, StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(ProxyError::Upstream { status: 500 }).status,
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::from(ProxyError::Disallowed { host: "x".into() }).status,
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn other_errors_are_internal() {
        let err: ApiError = anyhow::anyhow!("disk on fire").into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "INTERNAL_ERROR");
    }
}
