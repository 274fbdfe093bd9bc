//! Types for authentication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An authenticated identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    /// The user ID; owner columns are compared against it
    pub id: Uuid,

    /// The user's email address
    pub email: Option<String>,

    /// Metadata supplied at sign-up (carries `full_name`)
    #[serde(default)]
    pub user_metadata: serde_json::Value,

    /// The creation time
    #[serde(default)]
    pub created_at: Option<String>,
}

impl User {
    /// Display name given at sign-up, if any
    pub fn full_name(&self) -> Option<&str> {
        self.user_metadata.get("full_name").and_then(|v| v.as_str())
    }
}

/// Body of a password sign-in request
#[derive(Debug, Serialize)]
pub struct SignInCredentials<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Body of a sign-up request. `data` becomes the user's metadata, which the
/// profile trigger reads.
#[derive(Debug, Serialize)]
pub struct SignUpRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub data: SignUpMetadata<'a>,
}

#[derive(Debug, Serialize)]
pub struct SignUpMetadata<'a> {
    pub full_name: &'a str,
}

/// Error body returned by the identity service. Different endpoints use
/// different field names for the human-readable part.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct AuthErrorBody {
    pub msg: Option<String>,
    pub message: Option<String>,
    pub error_description: Option<String>,
    pub error: Option<String>,
}

impl AuthErrorBody {
    pub(crate) fn into_message(self) -> Option<String> {
        self.msg
            .or(self.error_description)
            .or(self.message)
            .or(self.error)
    }
}
