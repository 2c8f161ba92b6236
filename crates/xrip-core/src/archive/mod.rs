//! Content-addressed archive block resolution.

#[cfg(feature = "cdn")]
pub mod cdn;
pub mod pack;
pub mod resolver;

pub use pack::{BlockEntry, Compression, PackIndex, PackStore};
pub use resolver::{ContentResolver, RemoteFetcher};

#[cfg(feature = "cdn")]
pub use cdn::CdnClient;
