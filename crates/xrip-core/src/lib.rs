//! # xrip-core
//!
//! Core library for the xrip live-process asset extractor.
//!
//! This crate provides:
//! - Attached-process memory reading behind a fault-isolating trait
//! - Bit-exact codecs for packed vertex data (positions, tangent
//!   frames, face indices, half floats)
//! - Content-block resolution across local packs and an optional CDN
//! - Per-build asset handlers driven by constant layout tables
//! - Linked asset-pool discovery and a multi-threaded import session
//!
//! ## Feature Flags
//!
//! - `cdn`: Enables the HTTP fallback for streamed content blocks.
//!   Without it, only local pack files are consulted.

pub mod archive;
pub mod assets;
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod games;
pub mod memory;
pub mod pool;
pub mod scene;
pub mod session;
pub mod state;

pub use archive::{BlockEntry, Compression, ContentResolver, PackIndex, PackStore, RemoteFetcher};
pub use assets::{AssetDescriptor, AssetStatus, AssetType};
pub use cache::DedupCache;
pub use config::Config;
pub use error::{Error, Result};
pub use games::{
    GameAssetHandler, GameLayout, HandlerDeps, ModernHandler, SurfaceMaterial, UnsupportedHandler,
    create_handler,
};
pub use memory::{ReadMemory, RemotePtr, SliceReader};
pub use pool::{NameIndex, PoolDefinition, PoolWalker, pool_definitions};
pub use scene::{
    Anim, Bone, Lod, Material, Model, Notetrack, SceneRoot, Skeleton, Sound, Submesh, Texture,
    TextureSlot, VertexWeight,
};
pub use session::{
    AssetSink, DiscoveryReport, ImportSession, ImportSummary, ProgressObserver, SilentObserver,
    discover,
};
pub use state::LoaderState;

#[cfg(target_os = "windows")]
pub use memory::{ProcessHandle, ProcessInfo};

#[cfg(feature = "cdn")]
pub use archive::cdn::CdnClient;
