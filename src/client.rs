//! HTTP client abstraction used by the probes


use crate::{
    error::{AppError, Result},
    models::Config,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{header, Client, Method};
use std::{pin::Pin, time::Duration};

/// Streamed body chunks, in either direction
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// HTTP client trait for abstraction and testing
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Start a GET and hand back the response body as a stream.
    ///
    /// A non-2xx status is reported as `EndpointRejected`.
    async fn open_download(&self, url: &str) -> Result<ByteStream>;

    /// POST a streamed body and return the response status
    async fn upload(&self, url: &str, body: ByteStream) -> Result<u16>;

    /// Issue a HEAD request with its own timeout and return the final status
    async fn head(&self, url: &str, timeout: Duration) -> Result<u16>;
}

/// Settings applied to every request of a client
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub connect_timeout: Duration,
    pub io_timeout: Duration,
    pub user_agent: String,
    pub max_redirects: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout: crate::defaults::DEFAULT_CONNECT_TIMEOUT,
            io_timeout: crate::defaults::DEFAULT_IO_TIMEOUT,
            user_agent: crate::defaults::DEFAULT_USER_AGENT.to_string(),
            max_redirects: 10,
        }
    }
}

impl ClientSettings {
    /// Settings taken from the merged configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            io_timeout: config.io_timeout(),
            user_agent: config.user_agent.clone(),
            ..Self::default()
        }
    }
}

/// reqwest-backed implementation of [`HttpClient`]
#[derive(Debug, Clone)]
pub struct NetworkClient {
    client: Client,
    settings: ClientSettings,
}

impl NetworkClient {
    /// Create a new network client
    pub fn new(settings: ClientSettings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.io_timeout)
            .user_agent(settings.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(settings.max_redirects))
            .build()
            .map_err(|e| AppError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, settings })
    }

    /// Create a client from the merged configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(ClientSettings::from_config(config))
    }

    /// Settings this client was built with
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    fn request(&self, method: Method, url: &str) -> Result<reqwest::RequestBuilder> {
        let parsed = url::Url::parse(url)?;
        Ok(self.client.request(method, parsed))
    }
}

/// Map a transport error to the endpoint taxonomy
fn transport_error(url: &str, error: reqwest::Error) -> AppError {
    let error: AppError = error.into();
    AppError::endpoint_unreachable(format!("{}: {}", url, error))
}

fn rejected(url: &str, status: reqwest::StatusCode) -> AppError {
    AppError::endpoint_rejected(format!("{} answered HTTP {}", url, status))
}

#[async_trait]
impl HttpClient for NetworkClient {
    async fn open_download(&self, url: &str) -> Result<ByteStream> {
        let response = self
            .request(Method::GET, url)?
            .header(header::ACCEPT, "*/*")
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(rejected(url, status));
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(AppError::from));
        Ok(Box::pin(stream))
    }

    async fn upload(&self, url: &str, body: ByteStream) -> Result<u16> {
        let response = self
            .request(Method::POST, url)?
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(reqwest::Body::wrap_stream(body))
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        Ok(response.status().as_u16())
    }

    async fn head(&self, url: &str, timeout: Duration) -> Result<u16> {
        let response = self
            .request(Method::HEAD, url)?
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::timeout(format!("{} did not answer within {}s", url, timeout.as_secs()))
                } else {
                    transport_error(url, e)
                }
            })?;

        Ok(response.status().as_u16())
    }
}
