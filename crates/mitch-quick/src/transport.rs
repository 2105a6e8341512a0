use std::collections::VecDeque;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

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
}

/// Network boundary for requests the runtime issues itself.
pub trait Transport {
    fn get(&mut self, path: &str) -> Result<HttpResponse>;
}

pub struct HttpTransport {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::msg(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

impl Transport for HttpTransport {
    fn get(&mut self, path: &str) -> Result<HttpResponse> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let res = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .map_err(|e| Error::msg(format!("GET {url} failed: {e}")))?;
        let status = res.status().as_u16();
        let body = res
            .text()
            .map_err(|e| Error::msg(format!("GET {url}: failed to read body: {e}")))?;
        Ok(HttpResponse { status, body })
    }
}

/// Canned responses, consumed in order. Used by `replay` scripts and tests.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: VecDeque<Result<HttpResponse>>,
    pub requested: Vec<String>,
}

impl ScriptedTransport {
    pub fn push(&mut self, response: Result<HttpResponse>) {
        self.responses.push_back(response);
    }

    pub fn push_ok(&mut self, body: impl Into<String>) {
        self.push(Ok(HttpResponse::ok(body)));
    }
}

impl Transport for ScriptedTransport {
    fn get(&mut self, path: &str) -> Result<HttpResponse> {
        self.requested.push(path.to_string());
        self.responses
            .pop_front()
            .unwrap_or_else(|| Err(Error::msg(format!("no scripted response for {path}"))))
    }
}

/// GET + JSON decode. Transport failures are retried up to `max_retries`
/// more times; a non-2xx status or a bad body is returned at once.
pub fn fetch_json<T: DeserializeOwned>(
    transport: &mut dyn Transport,
    path: &str,
    max_retries: u32,
) -> Result<T> {
    let mut attempt = 0u32;
    let res = loop {
        match transport.get(path) {
            Ok(res) => break res,
            Err(e) if attempt < max_retries => {
                attempt += 1;
                tracing::debug!(path, attempt, error = %e, "retrying request");
            }
            Err(e) => return Err(e),
        }
    };
    if !res.is_success() {
        return Err(Error::msg(format!("GET {path} returned status {}", res.status)));
    }
    Ok(serde_json::from_str(&res.body)?)
}
