//! Engine-agnostic intermediate scene representation.
//!
//! Everything here is produced by the game handlers and consumed by an
//! external importer. Materials are interned per content hash through
//! [`SceneRoot`] so submeshes can reference them by index.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    pub lods: Vec<Lod>,
    pub skeleton: Skeleton,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lod {
    pub distance: f32,
    pub submeshes: Vec<Submesh>,
}

/// One bone influence on a vertex.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VertexWeight {
    pub bone: u16,
    pub influence: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Submesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tangents: Vec<[f32; 3]>,
    /// One entry per UV channel, each with one coordinate pair per vertex.
    pub uv_channels: Vec<Vec<[f32; 2]>>,
    pub colors: Vec<[f32; 4]>,
    /// Per-vertex bone influences; empty for rigid meshes.
    pub weights: Vec<Vec<VertexWeight>>,
    pub faces: Vec<[u16; 3]>,
    pub material_hash: u64,
    /// Index into the owning scene's material list. Valid once the
    /// material pre-pass has run.
    pub material_index: Option<u32>,
}

impl Submesh {
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Skeleton {
    pub bones: Vec<Bone>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bone {
    pub name: String,
    /// Index of the parent bone, -1 for roots.
    pub parent: i32,
    pub position: [f32; 3],
    pub rotation: [f32; 4],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextureSlot {
    /// Semantic index within the material's layout (albedo, normal, ...).
    pub semantic: u32,
    pub image_hash: u64,
    pub image_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub hash: u64,
    pub slots: Vec<TextureSlot>,
    pub params: Vec<(String, f32)>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Texture {
    pub name: String,
    pub key: u64,
    pub width: u32,
    pub height: u32,
    pub format: u8,
    /// Container-ready bytes (DDS header already prepended).
    #[serde(skip)]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sound {
    pub name: String,
    pub channels: u16,
    pub frame_rate: u32,
    pub frame_count: u32,
    #[serde(skip)]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notetrack {
    pub name: String,
    pub frame: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Anim {
    pub name: String,
    pub framerate: f32,
    pub frame_count: u32,
    pub looping: bool,
    pub additive: bool,
    pub bone_names: Vec<String>,
    pub notetracks: Vec<Notetrack>,
}

/// Per-session scene container. Interns materials by content hash; a
/// hash seen twice yields the same index both times.
#[derive(Debug, Default, Serialize)]
pub struct SceneRoot {
    pub models: Vec<Model>,
    pub materials: Vec<Arc<Material>>,
    material_map: HashMap<u64, u32>,
}

impl SceneRoot {
    pub fn new() -> SceneRoot {
        SceneRoot::default()
    }

    /// Index of the material for `hash`, if the pre-pass registered it.
    pub fn material_index(&self, hash: u64) -> Option<u32> {
        self.material_map.get(&hash).copied()
    }

    /// Intern a material, returning its index. A hash already present
    /// keeps its first registration; `material` is dropped.
    pub fn add_material(&mut self, material: Arc<Material>) -> u32 {
        if let Some(&index) = self.material_map.get(&material.hash) {
            return index;
        }
        let index = self.materials.len() as u32;
        self.material_map.insert(material.hash, index);
        self.materials.push(material);
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_interning_is_idempotent() {
        let mut scene = SceneRoot::new();
        let a = Arc::new(Material {
            name: "mtl_wood".into(),
            hash: 0xABCD,
            ..Default::default()
        });
        let b = Arc::new(Material {
            name: "mtl_wood_dup".into(),
            hash: 0xABCD,
            ..Default::default()
        });
        let first = scene.add_material(a);
        let second = scene.add_material(b);
        assert_eq!(first, second);
        assert_eq!(scene.materials.len(), 1);
        assert_eq!(scene.materials[0].name, "mtl_wood");
        assert_eq!(scene.material_index(0xABCD), Some(first));
    }
}
