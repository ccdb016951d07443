pub mod config;
pub mod models;
pub mod util;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Handler error, rendered as a plain-text response.
#[derive(Debug)]
pub enum AppError {
    /// The request was understood but can't be processed.
    Rejected(StatusCode, &'static str),
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::Rejected(status, reason) => {
                tracing::warn!(%status, "Rejected request: {reason}");
                (status, reason).into_response()
            }
            Self::Internal(err) => {
                tracing::error!("{:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Pipeline failed: {}", err))
                    .into_response()
            }
        }
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self { Self::Internal(err.into()) }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[test]
    fn test_error_status() {
        let response =
            AppError::Rejected(StatusCode::BAD_REQUEST, "Missing repository").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let err = AppError::from(anyhow!("connection reset").context("Failed to fetch annotations"));
        assert!(
            matches!(&err, AppError::Internal(e) if e.to_string() == "Failed to fetch annotations")
        );
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
