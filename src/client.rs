// Thin HTTP client injected into HTTP-backed runners

use reqwest::header::HeaderMap;
use serde_json::Value;
use std::time::Duration;

use crate::error::CollectError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A base URL plus a reqwest client. Runners receive this fully
/// constructed; the engine never resolves addresses or credentials itself.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        ApiClient::with_headers(base_url, HeaderMap::new())
    }

    /// Product APIs usually want an auth header on every request; callers
    /// resolve the token and hand the finished header set in.
    pub fn with_headers(base_url: impl Into<String>, headers: HeaderMap) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .unwrap_or_default();
        ApiClient { base_url, http }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` and decode the body as JSON. A non-2xx response is an
    /// [`CollectError::UnexpectedStatus`], distinct from transport errors.
    pub async fn get(&self, path: &str) -> Result<Value, CollectError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CollectError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }
        Ok(response.json().await?)
    }
}
