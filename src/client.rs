use anyhow::{Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use std::time::Duration;

use crate::config::Credentials;
use crate::error::{ApiError, Decoded, decode_body};
use crate::util::{redact_params, urljoin};

/// Dashboard region; selects the host every request is sent to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Region {
    #[default]
    Us,
    Eu,
}

impl Region {
    fn base_url(self) -> &'static str {
        match self {
            Region::Us => "https://dashboard.swrve.com/api/1/",
            Region::Eu => "https://eu-dashboard.swrve.com/api/1/",
        }
    }
}

/// HTTP gateway for the Swrve non-client APIs.
///
/// Issues authenticated GETs against the dashboard, attaches the credential
/// parameters to every request, and turns any unsuccessful exchange into an
/// [`ApiError`]. This layer never retries; retry is the bulk downloader's
/// concern.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    credentials: Credentials,
    http: HttpClient,
}

impl ApiClient {
    pub fn new(region: Region, credentials: Credentials) -> Result<Self> {
        Self::build(region.base_url().to_string(), credentials, Duration::from_secs(60))
    }

    /// Points the client at a different base URL. Intended for tests and
    /// proxied deployments.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Result<Self> {
        Self::build(self.base_url, self.credentials, timeout)
    }

    fn build(base_url: String, credentials: Credentials, timeout: Duration) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("swrve-export-rs/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("swrve-export-rs")),
        );

        let http = HttpClient::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url,
            credentials,
            http,
        })
    }

    pub(crate) fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Resolves a path against the configured base URL.
    pub(crate) fn endpoint(&self, path: &str) -> String {
        urljoin(&self.base_url, path)
    }

    /// Sends a GET to `url` with the credential parameters plus any `params`
    /// whose value is present, and returns the decoded JSON payload.
    ///
    /// Fails with [`ApiError`] on a non-2xx status or when the body is an
    /// object carrying an `error` key (which some endpoints return with
    /// HTTP 200). Default parameters are copied per call; nothing here
    /// mutates shared state.
    pub fn send(&self, url: &str, params: &[(&str, Option<&str>)]) -> Result<Value> {
        let mut query = self.credentials.to_params();
        for (k, v) in params {
            if let Some(v) = v {
                query.push((k.to_string(), v.to_string()));
            }
        }

        let resp = self
            .http
            .get(url)
            .query(&query)
            .send()
            .with_context(|| format!("request to {} failed to complete", url))?;

        let status = resp.status();
        let text = resp.text().unwrap_or_default();

        if !status.is_success() {
            let message = crate::error::vendor_message(&text);
            return Err(ApiError {
                status_code: status.as_u16(),
                message,
                url: url.to_string(),
                params: redact_params(&query),
            }
            .into());
        }

        let value = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("failed to parse API JSON (url={}, status={})", url, status))?;

        match decode_body(value) {
            Decoded::Payload(value) => Ok(value),
            Decoded::Failure(message) => Err(ApiError {
                status_code: status.as_u16(),
                message: Some(message),
                url: url.to_string(),
                params: redact_params(&query),
            }
            .into()),
        }
    }
}
