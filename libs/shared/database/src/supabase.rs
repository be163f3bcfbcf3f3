use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
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
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>, returning: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.anon_key).unwrap_or_else(|_| HeaderValue::from_static("")));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if returning {
            // PostgREST returns the affected rows instead of 204
            headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        }

        if let Some(token) = auth_token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers
    }

    /// Issue a request against PostgREST and deserialize the response body.
    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
    {
        self.request_inner(method, path, auth_token, body, false).await
    }

    /// Like `request`, but asks PostgREST to return the written rows.
    pub async fn write<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Value,
    ) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
    {
        self.request_inner(method, path, auth_token, Some(body), true).await
    }

    /// Issue a request and discard the response body.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
    ) -> Result<(), SupabaseError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let response = self
            .client
            .request(method, &url)
            .headers(self.get_headers(auth_token, false))
            .send()
            .await?;

        self.check_status(response).await.map(|_| ())
    }

    async fn request_inner<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        returning: bool,
    ) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let mut req = self
            .client
            .request(method, &url)
            .headers(self.get_headers(auth_token, returning));

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;
        let response = self.check_status(response).await?;

        let data = response.json::<T>().await?;
        Ok(data)
    }

    async fn check_status(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, SupabaseError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        error!("API error ({}): {}", status, error_text);

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SupabaseError::Auth(error_text),
            StatusCode::NOT_FOUND => SupabaseError::NotFound(error_text),
            StatusCode::CONFLICT => SupabaseError::Conflict(error_text),
            _ => SupabaseError::Api {
                status: status.as_u16(),
                message: error_text,
            },
        })
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}
