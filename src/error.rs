//! Error types shared across the crate.
//!
//! External provider failures (`ServiceError`) never leave the text and image
//! clients; they only drive availability transitions and the `source` flag.
//! Persistence failures (`StoreError`) and invalid input reach the caller
//! through `AppError`.

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a remote provider call, classified by how availability reacts.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Quota exhausted or HTTP 429. The client goes unavailable.
    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    /// Server-side or overload failure. The client backs off briefly.
    #[error("provider temporarily unavailable: {0}")]
    Transient(String),

    /// Anything else. No state change.
    #[error("provider call failed: {0}")]
    Other(String),
}

impl ServiceError {
    /// Classifies a non-success response from its status code and body text.
    pub fn classify(status: StatusCode, body: &str) -> Self {
        let lowered = body.to_ascii_lowercase();
        let message = format!("{status} {}", body.trim());
        if status == StatusCode::TOO_MANY_REQUESTS || lowered.contains("quota") {
            ServiceError::RateLimited(message)
        } else if status.is_server_error() || lowered.contains("unavailable") {
            ServiceError::Transient(message)
        } else {
            ServiceError::Other(message)
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ServiceError::classify(status, &err.to_string()),
            None => ServiceError::Other(err.to_string()),
        }
    }
}

/// Persistence failures. Most variants are domain constraint violations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Username already exists")]
    UsernameTaken,

    #[error("Email already exists")]
    EmailTaken,

    #[error("Image not found")]
    ImageNotFound,

    #[error("Image already in favorites")]
    AlreadyFavorited,

    #[error("Favorite not found")]
    FavoriteNotFound,

    #[error("Collection not found")]
    CollectionNotFound,

    #[error("Collection with this name already exists")]
    CollectionNameTaken,

    #[error("Image already in collection")]
    AlreadyInCollection,

    #[error("Image not in collection")]
    NotInCollection,

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored record is malformed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// True for constraint violations the caller caused, false for internal faults.
    pub fn is_domain(&self) -> bool {
        !matches!(self, StoreError::Io(_) | StoreError::Serialization(_))
    }
}

/// Errors surfaced at the application boundary.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Persistence(StoreError),

    #[error("unexpected error: {0}")]
    Unexpected(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn is_client_error(&self) -> bool {
        match self {
            AppError::Validation(_) => true,
            AppError::Persistence(err) => err.is_domain(),
            AppError::Unexpected(_) => false,
        }
    }

    /// Message safe to show a caller; internal details are withheld.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(message) => message.clone(),
            AppError::Persistence(err) if err.is_domain() => err.to_string(),
            AppError::Persistence(_) | AppError::Unexpected(_) => {
                "Internal error, please try again later".to_string()
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidInput(message) => AppError::Validation(message),
            other => AppError::Persistence(other),
        }
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
