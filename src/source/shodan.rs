//! Blocking client for the Shodan REST API.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use super::{FetchError, HostSource};
use crate::error::{Result, ShowdownError};
use crate::record::{HostIdentifier, HostRecord};

pub const DEFAULT_BASE_URL: &str = "https://api.shodan.io/";

/// Attempts per host on 429 / 5xx before giving up.
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Account details returned by `/api-info`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiInfo {
    #[serde(default)]
    pub plan: String,
    #[serde(default)]
    pub query_credits: i64,
    #[serde(default)]
    pub scan_credits: i64,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: String,
}

pub struct ShodanClient {
    client: Client,
    base: Url,
    key: String,
}

impl ShodanClient {
    pub fn new(key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(key: impl Into<String>, base: &str) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ShowdownError::Config("Shodan API key is empty".into()));
        }
        let base = Url::parse(base)
            .map_err(|e| ShowdownError::Config(format!("invalid API base URL '{base}': {e}")))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("showdown/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ShowdownError::Source(e.to_string()))?;
        Ok(Self {
            client,
            base,
            key: key.trim().to_string(),
        })
    }

    /// Verify the key and report the account plan.
    pub fn api_info(&self) -> Result<ApiInfo> {
        let url = self.endpoint("api-info").map_err(|e| ShowdownError::Source(e.to_string()))?;
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| ShowdownError::Source(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let message = error_message(response);
            return Err(ShowdownError::Source(format!("Error calling Shodan ({status}): {message}")));
        }
        response
            .json::<ApiInfo>()
            .map_err(|e| ShowdownError::Source(e.to_string()))
    }

    fn endpoint(&self, path: &str) -> std::result::Result<Url, FetchError> {
        let mut url = self
            .base
            .join(path)
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        url.query_pairs_mut().append_pair("key", &self.key);
        Ok(url)
    }
}

impl HostSource for ShodanClient {
    fn fetch(&self, id: &HostIdentifier) -> std::result::Result<HostRecord, FetchError> {
        let url = self.endpoint(&format!("shodan/host/{id}"))?;

        let mut attempt = 1;
        loop {
            let response = self
                .client
                .get(url.clone())
                .send()
                .map_err(|e| FetchError::Transport(e.to_string()))?;
            let status = response.status();

            if status.is_success() {
                let body = response
                    .text()
                    .map_err(|e| FetchError::Transport(e.to_string()))?;
                return Ok(HostRecord::from_json(&body)?);
            }

            if status == StatusCode::NOT_FOUND {
                return Err(FetchError::NotFound(id.clone()));
            }

            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < MAX_ATTEMPTS {
                tracing::debug!(host = %id, %status, attempt, "retrying Shodan request");
                std::thread::sleep(RETRY_BACKOFF * attempt);
                attempt += 1;
                continue;
            }

            return Err(FetchError::Api(format!("{status}: {}", error_message(response))));
        }
    }
}

fn error_message(response: reqwest::blocking::Response) -> String {
    let text = response.text().unwrap_or_default();
    serde_json::from_str::<ApiErrorBody>(&text)
        .map(|b| b.error)
        .unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_key() {
        assert!(ShodanClient::new("  ").is_err());
    }

    #[test]
    fn builds_host_endpoint_with_key() {
        let client = ShodanClient::new("abc123").unwrap();
        let url = client.endpoint("shodan/host/1.2.3.4").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.shodan.io/shodan/host/1.2.3.4?key=abc123"
        );
    }

    #[test]
    fn rejects_bad_base_url() {
        assert!(ShodanClient::with_base_url("k", "not a url").is_err());
    }
}
