//! Store backed by the PostgREST endpoint of a Supabase project

use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::types::{parse_content_range_total, prefer, CountOption, ReturnOption};
use super::{Filter, Query, ResourceStore};
use crate::auth::SessionProvider;
use crate::config::Config;
use crate::error::{ApiErrorDetails, StoreError};
use crate::fetch::FetchBuilder;

/// PostgreSQL error raised by a row-level security `WITH CHECK` failure
const INSUFFICIENT_PRIVILEGE: &str = "42501";

/// Client for `/rest/v1/{collection}`. Requests carry the signed-in user's
/// access token, so the database's row policies see the caller's identity.
pub struct PostgrestStore {
    url: String,
    key: String,
    client_info: String,
    schema: String,
    timeout: Option<Duration>,
    client: Client,
    session: Arc<SessionProvider>,
}

impl PostgrestStore {
    pub fn new(config: &Config, client: Client, session: Arc<SessionProvider>) -> Self {
        Self {
            url: config.base_url(),
            key: config.anon_key.clone(),
            client_info: config.options.client_info.clone(),
            schema: config.options.db_schema.clone(),
            timeout: config.options.request_timeout,
            client,
            session,
        }
    }

    fn get_url(&self, collection: &str) -> String {
        format!("{}/rest/v1/{}", self.url, collection)
    }

    fn request(&self, method: Method, collection: &str) -> FetchBuilder<'_> {
        let url = self.get_url(collection);
        let token = self
            .session
            .access_token()
            .unwrap_or_else(|| self.key.clone());

        let mut fetch = FetchBuilder::new(&self.client, &url, method)
            .api_key(&self.key, &self.client_info)
            .bearer_auth(&token)
            .timeout(self.timeout);

        if self.schema != "public" {
            fetch = fetch
                .header("Accept-Profile", &self.schema)
                .header("Content-Profile", &self.schema);
        }
        fetch
    }

    async fn check(response: Response, collection: &str) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error response".to_string());

        match serde_json::from_str::<ApiErrorDetails>(&text) {
            Ok(details) if details.code.as_deref() == Some(INSUFFICIENT_PRIVILEGE) => {
                Err(StoreError::PolicyDenied(collection.to_string()))
            }
            Ok(details) if details.code.as_deref().is_some_and(|c| c.starts_with("23")) => {
                let message = match &details.message {
                    Some(message) => message.clone(),
                    None => details.to_string(),
                };
                Err(StoreError::Constraint(message))
            }
            Ok(details) => Err(StoreError::Api {
                details,
                status: status.as_u16(),
            }),
            Err(_) => Err(StoreError::UnparsedApi {
                message: text,
                status: status.as_u16(),
            }),
        }
    }

    async fn rows(response: Response) -> Result<Vec<Value>, StoreError> {
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str::<Value>(&body)? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            row => Ok(vec![row]),
        }
    }

    fn first_or_not_found(
        rows: Vec<Value>,
        collection: &str,
        id: Uuid,
    ) -> Result<Value, StoreError> {
        rows.into_iter().next().ok_or_else(|| StoreError::NotFound {
            collection: collection.to_string(),
            id,
        })
    }
}

#[async_trait]
impl ResourceStore for PostgrestStore {
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Value>, StoreError> {
        let response = self
            .request(Method::GET, collection)
            .query_pairs(query.to_params())
            .execute_raw()
            .await?;

        let response = Self::check(response, collection).await?;
        Self::rows(response).await
    }

    async fn insert(&self, collection: &str, row: Value) -> Result<Value, StoreError> {
        let response = self
            .request(Method::POST, collection)
            .header("Prefer", &prefer(Some(ReturnOption::Representation), None))
            .json(&row)?
            .execute_raw()
            .await?;

        let response = Self::check(response, collection).await?;
        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::PolicyDenied(collection.to_string()))
    }

    async fn update(&self, collection: &str, id: Uuid, patch: Value) -> Result<Value, StoreError> {
        let response = self
            .request(Method::PATCH, collection)
            .query_pairs(Filter::new().eq("id", id).to_params())
            .header("Prefer", &prefer(Some(ReturnOption::Representation), None))
            .json(&patch)?
            .execute_raw()
            .await?;

        let response = Self::check(response, collection).await?;
        Self::first_or_not_found(Self::rows(response).await?, collection, id)
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<(), StoreError> {
        let response = self
            .request(Method::DELETE, collection)
            .query_pairs(Filter::new().eq("id", id).to_params())
            .header("Prefer", &prefer(Some(ReturnOption::Representation), None))
            .execute_raw()
            .await?;

        let response = Self::check(response, collection).await?;
        Self::first_or_not_found(Self::rows(response).await?, collection, id).map(|_| ())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let response = self
            .request(Method::HEAD, collection)
            .query("select", "id")
            .query_pairs(filter.to_params())
            .header("Prefer", &prefer(None, Some(CountOption::Exact)))
            .execute_raw()
            .await?;

        let response = Self::check(response, collection).await?;
        response
            .headers()
            .get(reqwest::header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| {
                StoreError::Deserialization("missing or invalid Content-Range header".to_string())
            })
    }
}

