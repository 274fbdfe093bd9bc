//! Error handling for the turmas client

use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::fetch::FetchError;

/// Error body returned by PostgREST on a failed request
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiErrorDetails {
    pub code: Option<String>,
    pub message: Option<String>,
    pub details: Option<String>,
    pub hint: Option<String>,
}

impl fmt::Display for ApiErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(code) = &self.code {
            parts.push(format!("Code: {}", code));
        }
        if let Some(message) = &self.message {
            parts.push(format!("Message: {}", message));
        }
        if let Some(details) = &self.details {
            parts.push(format!("Details: {}", details));
        }
        if let Some(hint) = &self.hint {
            parts.push(format!("Hint: {}", hint));
        }
        write!(f, "{}", parts.join(", "))
    }
}

/// Errors raised by the identity service.
///
/// `Api` carries the server's message verbatim so it can be shown to the user
/// as-is (bad credentials, duplicate email, weak password).
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Not logged in")]
    MissingSession,

    #[error("Confirmation email sent to {email}")]
    ConfirmationPending { email: String },

    #[error("Signed in as {email}, but sessions are not being kept")]
    SessionNotKept { email: String },
}

impl From<FetchError> for AuthError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Url(e) => AuthError::Url(e),
            FetchError::Http(e) => AuthError::Network(e),
        }
    }
}

/// Errors raised by the resource store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("API error: {details} (Status: {status})")]
    Api { details: ApiErrorDetails, status: u16 },

    #[error("API error (unparsed): {message} (Status: {status})")]
    UnparsedApi { message: String, status: u16 },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No row {id} in {collection}")]
    NotFound { collection: String, id: Uuid },

    #[error("Row-level security policy violation on {0}")]
    PolicyDenied(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl From<FetchError> for StoreError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Url(e) => StoreError::Url(e),
            FetchError::Http(e) => StoreError::Network(e),
        }
    }
}

/// Client-side validation failures. These block a submission before any
/// request is issued.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Password must be at least {0} characters")]
    PasswordTooShort(usize),

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("A class must be selected")]
    MissingParentSelection,

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),
}

/// Errors returned by a list-form controller operation
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Create is unavailable until a {missing} exists")]
    CreateUnavailable { missing: &'static str },

    #[error("Another request is still in flight")]
    Busy,

    #[error("Operation not allowed while {0}")]
    InvalidState(&'static str),

    #[error("Not logged in")]
    Unauthenticated,
}

/// Unified error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Controller error: {0}")]
    Controller(#[from] ControllerError),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
