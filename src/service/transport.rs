//! HTTP transport for the trace service

use anyhow::{Context, Result};
use async_trait::async_trait;
use url::Url;

/// Raw request/response exchange with the trace service.
///
/// Endpoints are relative names (`"trace"`, `"getTraceItems"`); implementations
/// resolve them against the service root. Bodies are returned undecoded.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// `GET {root}/{endpoint}`
    async fn get(&self, endpoint: &str) -> Result<String>;

    /// `POST {root}/{endpoint}` with a multipart form
    async fn post_form(&self, endpoint: &str, fields: Vec<(String, String)>) -> Result<String>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: reqwest::Client,
    root: String,
}

impl HttpTransport {
    /// Create a transport rooted at `root_url`
    pub fn new(root_url: &str) -> Result<Self> {
        let parsed = Url::parse(root_url)
            .with_context(|| format!("Invalid trace service root URL: {}", root_url))?;

        // No request timeout: a hung call keeps the pipeline busy until it returns
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        tracing::debug!("Created HTTP transport for: {}", parsed);

        Ok(Self {
            client,
            root: root_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.root, endpoint)
    }

    async fn read_body(url: &str, resp: reqwest::Response) -> Result<String> {
        if !resp.status().is_success() {
            anyhow::bail!("HTTP request failed: {} (status: {})", url, resp.status());
        }

        resp.text()
            .await
            .with_context(|| format!("Failed to read response body from: {}", url))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, endpoint: &str) -> Result<String> {
        let url = self.endpoint_url(endpoint);
        tracing::debug!("GET {}", url);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch from: {}", url))?;

        Self::read_body(&url, resp).await
    }

    async fn post_form(&self, endpoint: &str, fields: Vec<(String, String)>) -> Result<String> {
        let url = self.endpoint_url(endpoint);
        tracing::debug!("POST {} ({} field(s))", url, fields.len());

        let form = fields
            .into_iter()
            .fold(reqwest::multipart::Form::new(), |form, (name, value)| {
                form.text(name, value)
            });

        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("Failed to post to: {}", url))?;

        Self::read_body(&url, resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_trims_trailing_slash() {
        let transport = HttpTransport::new("http://gis.example/TraceService.asmx/").unwrap();
        assert_eq!(
            transport.endpoint_url("getTraceItems"),
            "http://gis.example/TraceService.asmx/getTraceItems"
        );
    }

    #[test]
    fn test_rejects_invalid_root() {
        assert!(HttpTransport::new("not a url").is_err());
    }
}
