//! Error types for Faultline

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Malformed body: {0}")]
    Decode(String),

    #[error("Configuration not loaded")]
    NotLoaded,

    #[error("Watcher error: {0}")]
    Watch(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidConfig { .. } => 400,
            Error::Decode(_) => 400,
            // Persist failures surface to the mutating caller as a bad request.
            Error::Io(_) => 400,
            Error::NotLoaded => 500,
            _ => 500,
        }
    }
}

/// HTTP-facing errors for the control plane and dispatch handlers
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration not loaded")]
    NotLoaded,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Core error: {0}")]
    Core(Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotLoaded => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            ApiError::Json(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::Core(err) => (
                StatusCode::from_u16(err.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                err.to_string(),
            ),
        };

        let body = Json(json!({ "error": message }));

        (status, body).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotLoaded => ApiError::NotLoaded,
            other => ApiError::Core(other),
        }
    }
}
