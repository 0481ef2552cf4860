//! HTTP transport for pages, player scripts and media streams

use crate::download::retry::{RetryConfig, RetryExecutor};
use crate::error::MediaError;
use reqwest::{redirect, Client, ClientBuilder, Response};
use std::time::Duration;
use tracing::debug;

/// Desktop browser user agent sent by default
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/103.0.5060.134 Safari/537.36";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Timeout for page/script requests and connection set-up
    pub timeout: Duration,
    pub user_agent: String,
    pub follow_redirects: bool,
    pub max_redirects: usize,
    /// Retries for page/script requests
    pub max_retries: u32,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            follow_redirects: true,
            max_redirects: 10,
            max_retries: 2,
        }
    }
}

impl HttpClientConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Thin wrapper over a shared `reqwest::Client`
#[derive(Clone)]
pub struct VideoClient {
    client: Client,
    config: HttpClientConfig,
    retry: RetryExecutor,
}

impl VideoClient {
    pub fn new() -> Result<Self, MediaError> {
        Self::with_config(HttpClientConfig::default())
    }

    pub fn with_config(config: HttpClientConfig) -> Result<Self, MediaError> {
        let policy = if config.follow_redirects {
            redirect::Policy::limited(config.max_redirects)
        } else {
            redirect::Policy::none()
        };

        let client = ClientBuilder::new()
            .connect_timeout(config.timeout)
            .gzip(true)
            .brotli(true)
            .redirect(policy)
            .user_agent(config.user_agent.clone())
            .build()?;

        let retry = RetryExecutor::with_config(
            RetryConfig::default().with_max_retries(config.max_retries),
        );

        Ok(Self {
            client,
            config,
            retry,
        })
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Fetch a complete text body, retrying transient failures
    pub async fn get_text(&self, url: &str) -> Result<String, MediaError> {
        debug!("GET {}", url);
        self.retry
            .execute(url, || {
                let request = self.client.get(url).timeout(self.config.timeout);
                let url = url.to_string();
                Box::pin(async move {
                    let response = check_status(request.send().await?, &url)?;
                    Ok(response.text().await?)
                })
            })
            .await
    }

    /// Start a streaming GET; the body is read by the caller
    pub async fn get_stream(&self, url: &str) -> Result<Response, MediaError> {
        debug!("GET (stream) {}", url);
        let response = self.client.get(url).send().await?;
        check_status(response, url)
    }
}

fn check_status(response: Response, url: &str) -> Result<Response, MediaError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(MediaError::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_config_default() {
        let config = HttpClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert!(config.follow_redirects);
        assert_eq!(config.max_retries, 2);
    }

    #[tokio::test]
    async fn test_get_text_sends_user_agent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/page")
            .match_header("user-agent", "test-agent/1.0")
            .with_body("hello")
            .create_async()
            .await;

        let client =
            VideoClient::with_config(HttpClientConfig::default().with_user_agent("test-agent/1.0"))
                .unwrap();
        let body = client.get_text(&format!("{}/page", server.url())).await.unwrap();

        assert_eq!(body, "hello");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_text_follows_redirects() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/old")
            .with_status(302)
            .with_header("location", "/new")
            .create_async()
            .await;
        let _mock = server
            .mock("GET", "/new")
            .with_body("moved")
            .create_async()
            .await;

        let client = VideoClient::new().unwrap();
        let body = client.get_text(&format!("{}/old", server.url())).await.unwrap();
        assert_eq!(body, "moved");
    }

    #[tokio::test]
    async fn test_get_text_status_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let client = VideoClient::new().unwrap();
        let err = client
            .get_text(&format!("{}/missing", server.url()))
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::HttpStatus { status: 404, .. }));
        mock.assert_async().await;
    }
}
