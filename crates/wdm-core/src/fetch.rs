//! HTTP body fetch (blocking libcurl) behind a seam the aggregator can mock.
//!
//! Runs in the current thread; call from `spawn_blocking` when used from
//! async code.

use anyhow::{Context, Result};
use std::time::Duration;

/// Fetch capability: one URL in, the full response body out.
pub trait Fetch: Send + Sync {
    /// Fetch the response body. Follows redirects; non-2xx is an error.
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// libcurl-backed fetcher used in production.
pub struct HttpFetcher {
    connect_timeout: Duration,
    timeout: Duration,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        HttpFetcher {
            connect_timeout: Duration::from_secs(15),
            timeout: Duration::from_secs(300),
        }
    }
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let mut body: Vec<u8> = Vec::new();

        let mut easy = curl::easy::Easy::new();
        easy.url(url).context("invalid URL")?;
        easy.follow_location(true)?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.timeout(self.timeout)?;

        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform().context("GET request failed")?;
        }

        let code = easy.response_code().context("no response code")?;
        if !(200..300).contains(&code) {
            anyhow::bail!("GET {} returned HTTP {}", url, code);
        }

        Ok(body)
    }
}
