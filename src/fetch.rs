//! HTTP implementation of [`IndexFetcher`].
//!
//! Every directory of the remote store exposes an `index.json` resource. Some
//! stores serve it wrapped for script inclusion (`var index = {...};`), so the
//! body is unwrapped before parsing.

use crate::model::Index;
use crate::traits::{IndexError, IndexFetcher};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

/// Name of the listing resource inside each directory.
const INDEX_FILE: &str = "index.json";

/// Fetches directory listings from a remote static-file store.
#[derive(Debug, Clone)]
pub struct HttpIndexFetcher {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpIndexFetcher {
    /// Creates a fetcher rooted at `base_url` whose requests fail after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Fetch`] if the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, IndexError> {
        let base_url = base_url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IndexError::Fetch {
                url: base_url.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// Resolves the `index.json` URL for a path relative to the store root.
    pub fn index_url(&self, relative_path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = relative_path.trim_matches('/');
        if path.is_empty() {
            format!("{base}/{INDEX_FILE}")
        } else {
            format!("{base}/{path}/{INDEX_FILE}")
        }
    }

    fn map_reqwest_error(
        &self,
        relative_path: &str,
        url: &str,
        err: &reqwest::Error,
    ) -> IndexError {
        if err.is_timeout() {
            IndexError::Timeout {
                path: relative_path.to_string(),
                timeout: self.timeout,
            }
        } else {
            IndexError::Fetch {
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl IndexFetcher for HttpIndexFetcher {
    async fn fetch_index(&self, relative_path: &str) -> Result<Index, IndexError> {
        info!(path = %relative_path, "Indexing");
        let url = self.index_url(relative_path);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(relative_path, &url, &e))?
            .error_for_status()
            .map_err(|e| self.map_reqwest_error(relative_path, &url, &e))?;

        let body = response
            .text()
            .await
            .map_err(|e| self.map_reqwest_error(relative_path, &url, &e))?;
        debug!(url = %url, bytes = body.len(), "Index body received");

        parse_index(&url, &body)
    }
}

/// Strips a script wrapper: anything before the first `{` and a trailing `;`.
/// Bodies without an object fall back to the first `[`, so a bare array
/// still parses and is reported as malformed.
pub fn unwrap_body(body: &str) -> &str {
    let start = body
        .find('{')
        .or_else(|| body.find('['))
        .unwrap_or(body.len());
    body[start..].trim_end().trim_end_matches(';').trim_end()
}

/// Parses an `index.json` body fetched from `url`.
///
/// # Errors
///
/// [`IndexError::Parse`] if the unwrapped body is not JSON (or an entry does
/// not have the expected field types), [`IndexError::Malformed`] if the JSON
/// is not an object.
pub fn parse_index(url: &str, body: &str) -> Result<Index, IndexError> {
    let value: serde_json::Value =
        serde_json::from_str(unwrap_body(body)).map_err(|source| IndexError::Parse {
            url: url.to_string(),
            source,
        })?;

    if !value.is_object() {
        return Err(IndexError::Malformed {
            url: url.to_string(),
        });
    }

    serde_json::from_value(value).map_err(|source| IndexError::Parse {
        url: url.to_string(),
        source,
    })
}
