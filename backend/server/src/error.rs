use std::time::Duration;

use axum::{
    http::{StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use gallery::StoreError;
use redis::RedisError;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not enough images to compare, try again later")]
    InsufficientData,

    #[error("Invalid vote: {0}")]
    InvalidInput(String),

    #[error("Image {0} not found")]
    NotFound(u64),

    #[error("Too many votes, slow down")]
    RateLimited { retry_after: Duration },

    #[error("Store failure: {0}")]
    StoreFailure(StoreError),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => AppError::NotFound(id),
            other => AppError::StoreFailure(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::InsufficientData => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::StoreFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        match self {
            AppError::RateLimited { retry_after } => {
                // Round up so clients never retry a moment too early
                let seconds = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);

                (status, [(RETRY_AFTER, seconds.to_string())], self.to_string()).into_response()
            }
            AppError::StoreFailure(ref err) => {
                error!("Store failure: {err}");

                (status, "Internal error").into_response()
            }
            _ => (status, self.to_string()).into_response(),
        }
    }
}

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Invalid {key} value: {message}")]
    Config { key: String, message: String },

    #[error("Redis unavailable: {0}")]
    Redis(#[from] RedisError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
