//! Authentication against the hosted identity service

mod memory;
mod provider;
mod session;
mod types;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;

use crate::config::Config;
use crate::error::AuthError;
use crate::fetch::Fetch;

pub use memory::MemoryAuth;
pub use provider::{SessionProvider, SessionState};
pub use session::Session;
pub use types::*;

/// Email/password identity operations.
///
/// Errors are returned as the service phrased them; nothing is retried.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Sign in with email and password
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    /// Create an identity. `full_name` travels as user metadata and is picked
    /// up by the profile trigger on the database side.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<Session, AuthError>;

    /// Invalidate the given session
    async fn sign_out(&self, session: &Session) -> Result<(), AuthError>;
}

/// Client for the `/auth/v1` endpoints
pub struct Auth {
    url: String,
    key: String,
    client_info: String,
    client: Client,
    timeout: Option<std::time::Duration>,
}

impl Auth {
    /// Create a new Auth client
    pub fn new(config: &Config, client: Client) -> Self {
        Self {
            url: config.base_url(),
            key: config.anon_key.clone(),
            client_info: config.options.client_info.clone(),
            client,
            timeout: config.options.request_timeout,
        }
    }

    fn get_auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.url, path)
    }

    async fn read_session(response: Response, email: &str) -> Result<Session, AuthError> {
        let response = Self::check(response).await?;
        let body: Value = response.json().await?;

        // With email confirmation enabled, sign-up returns the bare user and
        // no tokens.
        if body.get("access_token").is_none() {
            return Err(AuthError::ConfirmationPending {
                email: email.to_string(),
            });
        }

        Ok(serde_json::from_value(body)?)
    }

    async fn check(response: Response) -> Result<Response, AuthError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<AuthErrorBody>(&text)
            .ok()
            .and_then(AuthErrorBody::into_message)
            .unwrap_or(text);

        Err(AuthError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl AuthBackend for Auth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let url = self.get_auth_url("/token");

        let response = Fetch::post(&self.client, &url)
            .api_key(&self.key, &self.client_info)
            .query("grant_type", "password")
            .timeout(self.timeout)
            .json(&SignInCredentials { email, password })?
            .execute_raw()
            .await?;

        Self::read_session(response, email).await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<Session, AuthError> {
        let url = self.get_auth_url("/signup");

        let body = SignUpRequest {
            email,
            password,
            data: SignUpMetadata { full_name },
        };

        let response = Fetch::post(&self.client, &url)
            .api_key(&self.key, &self.client_info)
            .timeout(self.timeout)
            .json(&body)?
            .execute_raw()
            .await?;

        Self::read_session(response, email).await
    }

    async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        let url = self.get_auth_url("/logout");

        let response = Fetch::post(&self.client, &url)
            .api_key(&self.key, &self.client_info)
            .bearer_auth(&session.access_token)
            .timeout(self.timeout)
            .execute_raw()
            .await?;

        Self::check(response).await?;
        Ok(())
    }
}
