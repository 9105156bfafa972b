//! HTTP page fetcher backed by reqwest.

use async_trait::async_trait;
use kvtrace_core::{ConfigError, FetchConfig, FetchError, PageFetcher};

/// Fetches pages over HTTP(S) with a GET request.
///
/// The body is returned whatever the status code; only transport failures
/// and unreadable bodies are errors.
#[derive(Clone)]
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    /// Build a client with the configured timeout and user agent.
    pub fn new(config: &FetchConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "fetch".to_string(),
                value: config.user_agent.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::RequestFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url, status = status.as_u16(), "Fetched page with error status");
        }

        response.text().await.map_err(|e| FetchError::InvalidBody {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvtrace_core::KvTraceConfig;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answer one connection on a local port with `response`.
    async fn serve_once(response: &'static str) -> (SocketAddr, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 2048];
            let _ = socket.read(&mut request).await.unwrap();
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        (addr, handle)
    }

    fn fetcher() -> HttpPageFetcher {
        HttpPageFetcher::new(&KvTraceConfig::local_defaults().fetch).unwrap()
    }

    #[tokio::test]
    async fn test_success_returns_body() {
        let (addr, server) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
        )
        .await;
        let body = fetcher().fetch(&format!("http://{}/", addr)).await.unwrap();
        assert_eq!(body, "hello");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status_still_returns_body() {
        let (addr, server) = serve_once(
            "HTTP/1.1 404 Not Found\r\nContent-Type: text/plain\r\nContent-Length: 9\r\nConnection: close\r\n\r\nnot found",
        )
        .await;
        let body = fetcher()
            .fetch(&format!("http://{}/missing", addr))
            .await
            .unwrap();
        assert_eq!(body, "not found");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_refused_is_request_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{}/", addr);
        let err = fetcher().fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::RequestFailed { url: failed, .. } if failed == url));
    }

    #[test]
    fn test_builds_from_default_config() {
        let config = KvTraceConfig::local_defaults();
        assert!(HttpPageFetcher::new(&config.fetch).is_ok());
    }

    #[tokio::test]
    async fn test_malformed_url_is_request_failure() {
        let config = KvTraceConfig::local_defaults();
        let fetcher = HttpPageFetcher::new(&config.fetch).unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::RequestFailed { url, .. } if url == "not a url"));
    }
}
