//! HTTP transport backed by reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::EntityError;
use crate::transport::{Headers, Method, Request, Response, Transport};

/// [`Transport`] that talks JSON over HTTP to one API host.
pub struct HttpTransport {
    http: Client,
    base_url: String,
    headers: Vec<(String, String)>,
}

impl HttpTransport {
    /// Create a transport for the given base URL with default timeouts.
    pub fn new(base_url: impl Into<String>) -> Result<Self, EntityError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Use a preconfigured reqwest client.
    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            headers: Vec::new(),
        }
    }

    /// Send `name: value` with every request (e.g. `Authorization`).
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Pagination cursors arrive as absolute URLs and pass through unchanged;
    /// everything else is an endpoint path under the base URL.
    fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}/{}", self.base_url, url.trim_start_matches('/'))
        }
    }

    async fn handle_response(&self, response: reqwest::Response) -> Result<Response, EntityError> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EntityError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let headers: Headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                Some((name.as_str().to_string(), value.to_str().ok()?.to_string()))
            })
            .collect();

        let bytes = response.bytes().await?;
        let data = if bytes.iter().all(u8::is_ascii_whitespace) {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };

        Ok(Response { data, headers })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: Request) -> Result<Response, EntityError> {
        let url = self.resolve(&request.url);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.http.request(method, &url);
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(method = %request.method, url = %url, "sending request");
        let response = builder.send().await?;
        let result = self.handle_response(response).await;
        if let Err(ref e) = result {
            warn!(method = %request.method, url = %url, error = %e, "request failed");
        }
        result
    }
}
