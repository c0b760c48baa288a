use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::ReidError;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

/// API错误类型
pub enum AppError {
    Unauthorized,
    Internal(anyhow::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Internal(err) => match err.downcast_ref::<ReidError>() {
                Some(ReidError::Decode { .. } | ReidError::InvalidInput(_)) => {
                    StatusCode::BAD_REQUEST
                }
                Some(ReidError::InferenceUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::Unauthorized => (status, "Unauthorized".to_string()).into_response(),
            Self::Internal(err) => (status, format!("Something went wrong: {err}")).into_response(),
        }
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Internal(err.into())
    }
}
