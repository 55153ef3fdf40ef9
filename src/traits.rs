use crate::model::Index;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to fetch index at {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("Failed to parse index at {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Index at {url} is not a key-value mapping")]
    Malformed { url: String },
    #[error("Fetching index for '{path}' timed out after {timeout:?}")]
    Timeout { path: String, timeout: Duration },
}

#[async_trait]
pub trait IndexFetcher: Send + Sync {
    /// Retrieves the directory listing at `relative_path` below the store root.
    async fn fetch_index(&self, relative_path: &str) -> Result<Index, IndexError>;
}
