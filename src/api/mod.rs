//! HTTP client for the security API.
//!
//! Thin wrapper over reqwest with bearer auth. Requests are single-attempt:
//! a failed page fetch aborts the current harvest, and retry policy is the
//! caller's responsibility. HTTP 429 surfaces as `RateLimited` so callers
//! can back off instead of treating it as a generic transport failure.

use crate::error::{Rep365Error, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

/// API client holding the session's bearer token.
///
/// Constructed explicitly and passed into harvesters — there is no ambient
/// process-wide session state.
pub struct ApiClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// Make a GET request and deserialize the JSON response
    pub async fn get<T: for<'de> Deserialize<'de>>(&self, endpoint: &str) -> Result<T> {
        let url = self.url(endpoint);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = resp.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(Rep365Error::RateLimited { retry_after });
        }

        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            let enhanced_error = crate::error::enhance_api_error(&error_text);
            return Err(Rep365Error::Api(format!(
                "HTTP {}: {}",
                status, enhanced_error
            )));
        }

        let data = resp.json::<T>().await?;
        Ok(data)
    }

    /// Fetch one page of a collection endpoint using offset pagination
    pub async fn get_page(&self, resource: &str, offset: usize, limit: usize) -> Result<Page> {
        let sep = if resource.contains('?') { '&' } else { '?' };
        let endpoint = format!("{}{}offset={}&limit={}", resource, sep, offset, limit);
        self.get(&endpoint).await
    }

    /// Make a DELETE request (used by remediation actions)
    pub async fn delete(&self, endpoint: &str) -> Result<()> {
        let url = self.url(endpoint);
        let resp = self
            .client
            .delete(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = resp.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(Rep365Error::RateLimited { retry_after });
        }

        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            let enhanced_error = crate::error::enhance_api_error(&error_text);
            return Err(Rep365Error::Api(format!(
                "HTTP {}: {}",
                status, enhanced_error
            )));
        }

        Ok(())
    }
}

/// One page of a paginated collection response.
///
/// Collection endpoints declare the total available count alongside each
/// page's own items.
#[derive(Debug, Deserialize)]
pub struct Page {
    pub items: Vec<Value>,

    #[serde(rename = "totalCount")]
    pub total_count: usize,
}

impl Page {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
