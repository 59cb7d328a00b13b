use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::debug;

use crate::error::LocusError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Fails with [`LocusError::Network`] unless the status is 2xx.
    pub fn error_for_status(self, url: &str) -> Result<Self, LocusError> {
        if self.is_success() {
            return Ok(self);
        }
        Err(LocusError::Network {
            status: self.status,
            url: url.to_string(),
        })
    }

    pub fn json(&self) -> Result<Value, LocusError> {
        serde_json::from_str(&self.body)
            .map_err(|err| LocusError::ResponseShape(format!("invalid JSON payload: {err}")))
    }
}

/// Outbound HTTP seam used by every remote adapter.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str) -> Result<HttpResponse, LocusError>;
    fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse, LocusError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, LocusError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, LocusError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("locus-data/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| LocusError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| LocusError::Http(err.to_string()))?;
        Ok(Self { client })
    }

    fn send_with_retries<F>(&self, mut make_req: F) -> Result<HttpResponse, LocusError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        debug!(status, attempt, delay, "retrying request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    let body = resp
                        .text()
                        .map_err(|err| LocusError::Http(err.to_string()))?;
                    return Ok(HttpResponse { status, body });
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(LocusError::Http(err.to_string()));
                }
            }
        }
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<HttpResponse, LocusError> {
        debug!(url, "GET");
        self.send_with_retries(|| self.client.get(url))
    }

    fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse, LocusError> {
        debug!(url, "POST");
        let payload = body.to_string();
        self.send_with_retries(|| {
            self.client
                .post(url)
                .header(CONTENT_TYPE, "application/json")
                .body(payload.clone())
        })
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
