//! Error types for minidfs

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Request Errors ===
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    // === Registry Errors ===
    #[error("Unknown worker: {0}")]
    UnknownWorker(String),

    // === Metadata Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    // === Network Errors ===
    #[error("Transport failure: {0}")]
    Transport(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable code used in JSON error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "invalid_argument",
            Error::MissingField(_) => "missing_field",
            Error::UnknownWorker(_) => "unknown_worker",
            Error::NotFound(_) => "not_found",
            Error::Persistence(_) => "persistence_failure",
            Error::Transport(_) => "transport_failure",
            Error::InvalidConfig(_) => "invalid_config",
            Error::Io(_) | Error::Internal(_) => "internal",
        }
    }

    /// Rebuild an error from a remote `{error, message}` body
    pub fn from_code(code: &str, message: String) -> Self {
        match code {
            "invalid_argument" => Error::InvalidArgument(message),
            "missing_field" => Error::MissingField(message),
            "unknown_worker" => Error::UnknownWorker(message),
            "not_found" => Error::NotFound(message),
            "persistence_failure" => Error::Persistence(message),
            "transport_failure" => Error::Transport(message),
            "invalid_config" => Error::InvalidConfig(message),
            _ => Error::Internal(message),
        }
    }

    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Error::InvalidArgument(_) | Error::MissingField(_) | Error::InvalidConfig(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::UnknownWorker(_) | Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Transport(_) => StatusCode::BAD_GATEWAY,
            Error::Persistence(_) | Error::Io(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        (self.to_http_status(), axum::Json(body)).into_response()
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}
