//! Complete Log Download
//!
//! The build log API returns the log in chunks and, for finished builds,
//! a short-lived URL to the complete raw log. Downloading it is the only
//! network access the processor makes, behind the [`LogFetcher`] seam.

use async_trait::async_trait;
use log::debug;
use reqwest::StatusCode;

use crate::error::{LogError, Result};
use crate::{APP_NAME, VERSION};

/// Downloads the complete log text from a temporary URL.
#[async_trait]
pub trait LogFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Fetches logs over HTTP(S).
pub struct HttpLogFetcher {
    client: reqwest::Client,
}

impl HttpLogFetcher {
    /// Creates a fetcher with its own HTTP client.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("{}/{}", APP_NAME.to_lowercase(), VERSION))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl LogFetcher for HttpLogFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        debug!("Downloading complete log");

        let response = self.client.get(url).send().await?;
        if response.status() != StatusCode::OK {
            return Err(LogError::FetchStatus(response.status().as_u16()));
        }

        let text = response.text().await?;
        debug!("Downloaded complete log ({} bytes)", text.len());
        Ok(text)
    }
}

/// Never downloads; the chunked log is always used.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFetch;

#[async_trait]
impl LogFetcher for NoFetch {
    async fn fetch(&self, _url: &str) -> Result<String> {
        Err(LogError::Offline)
    }
}
