//! Network fetch collaborator.
//!
//! Implementations live outside the core: `kvtrace-cache` ships a reqwest
//! client and `kvtrace-test-utils` a scripted mock.

use crate::FetchError;
use async_trait::async_trait;

/// Fetches the body of a resource by URL.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url` and return the response body as text.
    ///
    /// # Returns
    /// * `Ok(String)` - The response body
    /// * `Err(FetchError)` - Connection failure or non-success status
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}
