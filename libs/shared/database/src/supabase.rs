use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Postgres error code raised by an exclusion constraint.
pub const EXCLUSION_VIOLATION: &str = "23P01";
/// Postgres error code raised by a unique constraint.
pub const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Overlapping rows rejected by an exclusion constraint.
    #[error("Constraint violation ({code}): {message}")]
    Conflict { code: String, message: String },

    #[error("Duplicate key: {0}")]
    Duplicate(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Invalid header value: {0}")]
    Header(String),
}

impl DatabaseError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, DatabaseError::Conflict { .. })
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap, DatabaseError> {
        let mut headers = HeaderMap::new();

        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.anon_key).map_err(|e| DatabaseError::Header(e.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| DatabaseError::Header(e.to_string()))?,
            );
        }

        Ok(headers)
    }

    /// Header asking PostgREST to echo mutated rows back.
    pub fn return_representation() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);
        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);
            return Err(Self::classify_error(status, &error_text));
        }

        let text = response.text().await?;
        // RPCs returning void come back as an empty body.
        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| DatabaseError::Decode(e.to_string()))
    }

    fn classify_error(status: StatusCode, body: &str) -> DatabaseError {
        let parsed: Option<PostgrestError> = serde_json::from_str(body).ok();
        let code = parsed.as_ref().and_then(|p| p.code.clone());
        let message = parsed
            .and_then(|p| p.message)
            .unwrap_or_else(|| body.to_string());

        match (status.as_u16(), code.as_deref()) {
            (_, Some(EXCLUSION_VIOLATION)) | (409, None) => DatabaseError::Conflict {
                code: code.unwrap_or_else(|| "409".to_string()),
                message,
            },
            (_, Some(UNIQUE_VIOLATION)) => DatabaseError::Duplicate(message),
            (401 | 403, _) => DatabaseError::Auth(message),
            (404, _) => DatabaseError::NotFound(message),
            (status, _) => DatabaseError::Api { status, message },
        }
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}
