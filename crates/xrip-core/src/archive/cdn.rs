//! Network fallback for content keys absent from the local packs.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub struct CdnClient {
    base_url: String,
    agent: ureq::Agent,
}

impl CdnClient {
    pub fn new(base_url: impl Into<String>) -> CdnClient {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(FETCH_TIMEOUT))
            .build();
        CdnClient {
            base_url: base_url.into(),
            agent: config.into(),
        }
    }

    /// Fetch the block for `key`. One retry on transport failure.
    pub fn fetch(&self, key: u64) -> Result<Vec<u8>> {
        let url = format!("{}/{key:016x}", self.base_url.trim_end_matches('/'));
        match self.fetch_once(&url) {
            Ok(body) => Ok(body),
            Err(first) => {
                warn!("CDN fetch {key:#x} failed, retrying: {first}");
                self.fetch_once(&url)
            }
        }
    }

    fn fetch_once(&self, url: &str) -> Result<Vec<u8>> {
        let mut response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| Error::Network(format!("GET {url}: {e}")))?;
        let body = response
            .body_mut()
            .read_to_vec()
            .map_err(|e| Error::Network(format!("reading {url}: {e}")))?;
        debug!("Fetched {} bytes from {url}", body.len());
        Ok(body)
    }
}
