//! Per-build asset decode strategies.
//!
//! One handler is selected at session start from the 64-bit build
//! identifier the loader stub publishes. Unknown builds still get a
//! handler; it answers every operation with `UnsupportedBuild` so the
//! session degrades instead of aborting.

pub mod layout;
pub mod modern;

use std::sync::Arc;

use crate::archive::ContentResolver;
use crate::assets::AssetDescriptor;
use crate::cache::DedupCache;
use crate::error::{Error, Result};
use crate::memory::{ReadMemory, RemotePtr};
use crate::scene::{Anim, Material, Model, Sound, Texture};

pub use layout::{BUILD_MW22, BUILD_MW23, GameLayout};
pub use modern::ModernHandler;

/// Shared collaborators handed to every handler at construction.
#[derive(Clone)]
pub struct HandlerDeps {
    pub reader: Arc<dyn ReadMemory>,
    pub resolver: Arc<ContentResolver>,
    pub cache: Arc<DedupCache>,
}

/// Transient surface header, valid for one decode call.
#[derive(Debug, Clone, Default)]
pub struct RawSurface {
    pub vertex_count: u32,
    pub face_count: u32,
    pub position_offset: u32,
    pub tangent_offset: u32,
    pub uv_offset: u32,
    pub color_offset: u32,
    pub face_table_offset: u32,
    pub face_table_count: u32,
    pub packed_indices_offset: u32,
    pub indices_offset: u32,
    pub weights_offset: u32,
    pub weight_counts: [u16; 8],
    pub scale: f32,
    pub offsets: [f32; 3],
    pub material_ptr: RemotePtr,
}

#[derive(Debug, Clone, Default)]
pub struct RawLod {
    pub distance: f32,
    pub stream_info_ptr: RemotePtr,
    pub surfaces: Vec<RawSurface>,
}

/// Model header plus per-LOD surface headers, read but not yet decoded.
#[derive(Debug, Clone, Default)]
pub struct RawModel {
    pub name: String,
    pub pointer: RemotePtr,
    pub hash: u64,
    pub bone_info_ptr: RemotePtr,
    pub lods: Vec<RawLod>,
}

/// One interned scene material per surface, produced by the pre-pass.
/// `index: None` marks a surface whose material was null or unreadable.
#[derive(Debug, Clone, Copy, Default)]
pub struct SurfaceMaterial {
    pub index: Option<u32>,
    pub hash: u64,
}

/// The per-build capability set. Object-safe; selected once per session.
pub trait GameAssetHandler: Send + Sync {
    fn build_id(&self) -> u64;

    fn read_model(&self, asset: &AssetDescriptor) -> Result<RawModel>;
    fn read_image(&self, asset: &AssetDescriptor) -> Result<Arc<Texture>>;
    fn read_sound(&self, asset: &AssetDescriptor) -> Result<Sound>;
    fn read_anim(&self, asset: &AssetDescriptor) -> Result<Anim>;
    fn read_material(&self, asset: &AssetDescriptor) -> Result<Arc<Material>>;
    fn read_material_from_ptr(&self, ptr: RemotePtr) -> Result<Arc<Material>>;

    /// Decode every surface's material in LOD-major order, one entry
    /// per surface. Null or unreadable materials yield `None`. Touches
    /// no shared state; callers may run it from any worker.
    fn surface_materials(&self, raw: &RawModel) -> Result<Vec<Option<Arc<Material>>>>;

    /// Decode geometry. `materials` carries one interned entry per
    /// surface in LOD-major order; the caller interns them into the
    /// scene before this runs.
    fn translate_model(&self, raw: &RawModel, materials: &[SurfaceMaterial]) -> Result<Model>;

    /// Alternate streamed-header path some builds use. Not wired for
    /// the builds supported here.
    fn load_streamed_model_data(&self, raw: &RawModel) -> Result<Vec<u8>>;
}

/// Total fallback variant for unrecognized builds.
pub struct UnsupportedHandler {
    build_id: u64,
}

impl UnsupportedHandler {
    pub fn new(build_id: u64) -> UnsupportedHandler {
        UnsupportedHandler { build_id }
    }

    fn unsupported<T>(&self) -> Result<T> {
        Err(Error::UnsupportedBuild(self.build_id))
    }
}

impl GameAssetHandler for UnsupportedHandler {
    fn build_id(&self) -> u64 {
        self.build_id
    }

    fn read_model(&self, _asset: &AssetDescriptor) -> Result<RawModel> {
        self.unsupported()
    }

    fn read_image(&self, _asset: &AssetDescriptor) -> Result<Arc<Texture>> {
        self.unsupported()
    }

    fn read_sound(&self, _asset: &AssetDescriptor) -> Result<Sound> {
        self.unsupported()
    }

    fn read_anim(&self, _asset: &AssetDescriptor) -> Result<Anim> {
        self.unsupported()
    }

    fn read_material(&self, _asset: &AssetDescriptor) -> Result<Arc<Material>> {
        self.unsupported()
    }

    fn read_material_from_ptr(&self, _ptr: RemotePtr) -> Result<Arc<Material>> {
        self.unsupported()
    }

    fn surface_materials(&self, _raw: &RawModel) -> Result<Vec<Option<Arc<Material>>>> {
        self.unsupported()
    }

    fn translate_model(&self, _raw: &RawModel, _materials: &[SurfaceMaterial]) -> Result<Model> {
        self.unsupported()
    }

    fn load_streamed_model_data(&self, _raw: &RawModel) -> Result<Vec<u8>> {
        self.unsupported()
    }
}

/// Select the handler for `build_id`. Always succeeds; unknown builds
/// get [`UnsupportedHandler`].
pub fn create_handler(build_id: u64, deps: HandlerDeps) -> Arc<dyn GameAssetHandler> {
    match layout::layout_for(build_id) {
        Some(layout) => Arc::new(ModernHandler::new(layout, deps)),
        None => Arc::new(UnsupportedHandler::new(build_id)),
    }
}
