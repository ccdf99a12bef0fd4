use sweep_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("result store disabled")]
    StoreDisabled,

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(feature = "http")]
mod response {
    use axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    };
    use serde::Serialize;
    use tracing::error;

    use super::ApiError;

    #[derive(Serialize)]
    struct ErrorBody {
        status: u16,
        message: String,
    }

    impl ApiError {
        pub fn status_code(&self) -> StatusCode {
            match self {
                ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                ApiError::NotFound(_) | ApiError::StoreDisabled => StatusCode::NOT_FOUND,
                ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                ApiError::Internal(_) | ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }
    }

    impl IntoResponse for ApiError {
        fn into_response(self) -> Response {
            let status = self.status_code();
            if status.is_server_error() {
                error!(error = %self, "request failed");
            }
            let body = ErrorBody {
                status: status.as_u16(),
                message: self.to_string(),
            };
            (status, Json(body)).into_response()
        }
    }
}
