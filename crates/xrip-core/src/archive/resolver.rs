//! Content key resolution: local pack first, network fallback.

use tracing::{debug, warn};

use crate::archive::pack::PackStore;
use crate::error::{Error, Result};

/// Network boundary for keys the local packs cannot serve. Object-safe
/// so tests can inject a fake.
pub trait RemoteFetcher: Send + Sync {
    fn fetch(&self, key: u64) -> Result<Vec<u8>>;
}

#[cfg(feature = "cdn")]
impl RemoteFetcher for crate::archive::cdn::CdnClient {
    fn fetch(&self, key: u64) -> Result<Vec<u8>> {
        crate::archive::cdn::CdnClient::fetch(self, key)
    }
}

pub struct ContentResolver {
    pack: PackStore,
    remote: Option<Box<dyn RemoteFetcher>>,
}

impl ContentResolver {
    pub fn new(pack: PackStore, remote: Option<Box<dyn RemoteFetcher>>) -> ContentResolver {
        ContentResolver { pack, remote }
    }

    /// Resolve one content key to a decompressed block.
    pub fn get_block(&self, key: u64, expected_size: u64) -> Result<Vec<u8>> {
        if self.pack.contains(key) {
            return self.pack.extract(key, expected_size);
        }
        if let Some(remote) = &self.remote {
            let mut block = remote.fetch(key)?;
            if expected_size != 0 && (expected_size as usize) < block.len() {
                block.truncate(expected_size as usize);
            }
            return Ok(block);
        }
        Err(Error::ArchiveMissing { key })
    }

    /// Resolve a quality ladder ordered from highest to lowest tier.
    ///
    /// The best locally resolvable tier wins. When a higher tier exists
    /// only remotely, the top tier is fetched over the network; if that
    /// fails or no network is configured, the local tier is used. The
    /// returned count is how many steps below the top the chosen tier
    /// sits, so callers can halve reported dimensions per step.
    pub fn get_tiered(&self, ladder: &[(u64, u64)]) -> Result<(Vec<u8>, usize)> {
        let best_local = ladder.iter().position(|&(key, _)| self.pack.contains(key));

        if best_local != Some(0)
            && let Some(remote) = &self.remote
            && let Some(&(top_key, top_size)) = ladder.first()
        {
            match remote.fetch(top_key) {
                Ok(mut block) => {
                    if top_size != 0 && (top_size as usize) < block.len() {
                        block.truncate(top_size as usize);
                    }
                    debug!("Resolved top tier {top_key:#x} remotely");
                    return Ok((block, 0));
                }
                Err(e) if best_local.is_some() => {
                    warn!("Remote tier {top_key:#x} unavailable, using local tier: {e}");
                }
                Err(e) => return Err(e),
            }
        }

        match best_local {
            Some(step) => {
                let (key, size) = ladder[step];
                Ok((self.pack.extract(key, size)?, step))
            }
            None => Err(Error::ArchiveMissing {
                key: ladder.first().map(|&(key, _)| key).unwrap_or(0),
            }),
        }
    }
}
