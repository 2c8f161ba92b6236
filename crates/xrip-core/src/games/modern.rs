//! Layout-parameterized handler for the modern builds.
//!
//! All record reads go through the injected layout table; the decode
//! logic itself is shared between builds. Failure policy follows the
//! component contract: a bad surface yields an empty submesh, a bad
//! asset yields an error the session counts and skips, and only a lost
//! process aborts the batch.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::assets::AssetDescriptor;
use crate::codec::{dds, faces, half, position, tangent};
use crate::error::{Error, Result};
use crate::games::layout::{GameLayout, HASH_MASK};
use crate::games::{GameAssetHandler, HandlerDeps, RawLod, RawModel, RawSurface, SurfaceMaterial};
use crate::memory::{ReadMemory, RemotePtr, SliceReader, field};
use crate::scene::{
    Anim, Bone, Lod, Material, Model, Notetrack, Skeleton, Sound, Submesh, Texture, TextureSlot,
    VertexWeight,
};

const MAX_LODS: u32 = 8;
const MAX_MIPS: u32 = 32;
const MAX_NAME_LEN: usize = 256;

/// Sentinel for "this vertex stream is absent".
const NO_STREAM: u32 = 0xFFFF_FFFF;

pub struct ModernHandler {
    layout: &'static GameLayout,
    deps: HandlerDeps,
}

impl ModernHandler {
    pub fn new(layout: &'static GameLayout, deps: HandlerDeps) -> ModernHandler {
        ModernHandler { layout, deps }
    }

    fn reader(&self) -> &dyn ReadMemory {
        self.deps.reader.as_ref()
    }

    fn read_surface(&self, ptr: RemotePtr, material_ptr: RemotePtr) -> Result<RawSurface> {
        let l = &self.layout.surface;
        let buf = self.reader().read_bytes(ptr, l.size)?;
        let mut weight_counts = [0u16; 8];
        for (i, slot) in weight_counts.iter_mut().enumerate() {
            *slot = field::u16_at(&buf, l.weight_counts + i * 2)?;
        }
        Ok(RawSurface {
            vertex_count: field::u32_at(&buf, l.vertex_count)?,
            face_count: field::u32_at(&buf, l.face_count)?,
            position_offset: field::u32_at(&buf, l.position_offset)?,
            tangent_offset: field::u32_at(&buf, l.tangent_offset)?,
            uv_offset: field::u32_at(&buf, l.uv_offset)?,
            color_offset: field::u32_at(&buf, l.color_offset)?,
            face_table_offset: field::u32_at(&buf, l.face_table_offset)?,
            face_table_count: field::u32_at(&buf, l.face_table_count)?,
            packed_indices_offset: field::u32_at(&buf, l.packed_indices_offset)?,
            indices_offset: field::u32_at(&buf, l.indices_offset)?,
            weights_offset: field::u32_at(&buf, l.weights_offset)?,
            weight_counts,
            scale: field::f32_at(&buf, l.scale)?,
            offsets: [
                field::f32_at(&buf, l.offsets)?,
                field::f32_at(&buf, l.offsets + 4)?,
                field::f32_at(&buf, l.offsets + 8)?,
            ],
            material_ptr,
        })
    }

    fn read_skeleton(&self, bone_info_ptr: RemotePtr) -> Result<Skeleton> {
        if bone_info_ptr.is_null() {
            return Ok(Skeleton::default());
        }
        let l = &self.layout.bone_info;
        let buf = self.reader().read_bytes(bone_info_ptr, l.size)?;
        let count = field::u32_at(&buf, l.bone_count)? as u64;
        let names = RemotePtr(field::u64_at(&buf, l.name_hashes_ptr)?);
        let parents = RemotePtr(field::u64_at(&buf, l.parents_ptr)?);
        let rotations = RemotePtr(field::u64_at(&buf, l.rotations_ptr)?);
        let translations = RemotePtr(field::u64_at(&buf, l.translations_ptr)?);

        let mut bones = Vec::with_capacity(count as usize);
        for i in 0..count {
            let hash = self.reader().read_u64(names.index(i, 8))?;
            let parent = self.reader().read_u16(parents.index(i, 2))? as i16;
            let mut rotation = [0f32; 4];
            for (c, out) in rotation.iter_mut().enumerate() {
                *out = self.reader().read_f32(rotations.index(i, 16).offset(c as u64 * 4))?;
            }
            let mut translation = [0f32; 3];
            for (c, out) in translation.iter_mut().enumerate() {
                *out = self
                    .reader()
                    .read_f32(translations.index(i, 12).offset(c as u64 * 4))?;
            }
            bones.push(Bone {
                name: format!("bone_{hash:x}"),
                parent: parent as i32,
                position: translation,
                rotation,
            });
        }
        Ok(Skeleton { bones })
    }

    /// Fetch one LOD's combined geometry blob: resident buffer when the
    /// process still holds it, archive block otherwise.
    fn load_streamed_geometry(&self, lod: &RawLod) -> Result<Vec<u8>> {
        let l = &self.layout.stream_info;
        let buf = self.reader().read_bytes(lod.stream_info_ptr, l.size)?;
        let buffer_ptr = RemotePtr(field::u64_at(&buf, l.buffer_ptr)?);
        let buffer_size = field::u64_at(&buf, l.buffer_size)?;
        if !buffer_ptr.is_null() {
            return self.reader().read_bytes(buffer_ptr, buffer_size as usize);
        }
        let stream_key = field::u64_at(&buf, l.stream_key)?;
        self.deps.resolver.get_block(stream_key, buffer_size)
    }

    fn decode_surface(&self, blob: &[u8], surface: &RawSurface) -> Result<Submesh> {
        let vcount = surface.vertex_count as usize;
        let mut mesh = Submesh {
            material_hash: 0,
            ..Default::default()
        };

        mesh.positions.reserve(vcount);
        mesh.normals.reserve(vcount);
        mesh.tangents.reserve(vcount);
        let mut uvs = Vec::with_capacity(vcount);
        for v in 0..vcount {
            let packed = field::u64_at(blob, surface.position_offset as usize + v * 8)?;
            mesh.positions
                .push(position::unpack(packed, surface.scale, surface.offsets));

            let frame = field::u32_at(blob, surface.tangent_offset as usize + v * 4)?;
            let (t, n) = tangent::unpack(frame);
            mesh.tangents.push(t);
            mesh.normals.push(n);

            let base = surface.uv_offset as usize + v * 4;
            uvs.push([
                half::to_f32(field::u16_at(blob, base)?),
                half::to_f32(field::u16_at(blob, base + 2)?),
            ]);
        }
        mesh.uv_channels.push(uvs);

        if surface.color_offset != NO_STREAM {
            mesh.colors.reserve(vcount);
            for v in 0..vcount {
                let rgba = field::u32_at(blob, surface.color_offset as usize + v * 4)?;
                mesh.colors.push([
                    (rgba & 0xFF) as f32 / 255.0,
                    (rgba >> 8 & 0xFF) as f32 / 255.0,
                    (rgba >> 16 & 0xFF) as f32 / 255.0,
                    (rgba >> 24) as f32 / 255.0,
                ]);
            }
        }

        if surface.weights_offset != NO_STREAM && surface.weight_counts.iter().any(|&c| c != 0) {
            mesh.weights = decode_weights(blob, surface)?;
        }

        let blob_reader = SliceReader(blob);
        mesh.faces.reserve(surface.face_count as usize);
        for tri in 0..surface.face_count as u64 {
            let [a, b, c] = faces::unpack_face_indices(
                &blob_reader,
                RemotePtr(surface.face_table_offset as u64),
                surface.face_table_count as u64,
                RemotePtr(surface.packed_indices_offset as u64),
                RemotePtr(surface.indices_offset as u64),
                tri,
            )?;
            // Winding is stored reversed.
            mesh.faces.push([c, b, a]);
        }
        Ok(mesh)
    }

    fn asset_name(&self, name_ptr: RemotePtr, fallback: &str) -> String {
        if name_ptr.is_null() {
            return fallback.to_string();
        }
        match self.reader().read_string(name_ptr, MAX_NAME_LEN) {
            Ok(name) if !name.is_empty() => name,
            _ => fallback.to_string(),
        }
    }
}

/// Cascading bone-weight decode. The stream is grouped by influence
/// class (vertices with i+1 influences), then by influence slot; each
/// slot entry is a u16 bone index followed by a u16 weight, with the
/// weight field of slot 0 unused padding. Slot 0's weight is implied
/// as one minus the explicit rest.
fn decode_weights(blob: &[u8], surface: &RawSurface) -> Result<Vec<Vec<VertexWeight>>> {
    let vcount = surface.vertex_count as usize;
    let mut weights: Vec<Vec<VertexWeight>> = vec![Vec::new(); vcount];
    let mut cursor = surface.weights_offset as usize;
    let mut vertex_base = 0usize;

    for class in 0..8usize {
        let count = surface.weight_counts[class] as usize;
        if vertex_base + count > vcount {
            return Err(Error::MalformedAsset(format!(
                "weight counts exceed {vcount} vertices"
            )));
        }
        for slot in 0..=class {
            for v in vertex_base..vertex_base + count {
                let bone = field::u16_at(blob, cursor)?;
                cursor += 2;
                if slot == 0 {
                    weights[v].push(VertexWeight {
                        bone,
                        influence: 1.0,
                    });
                    cursor += 2; // padding in the slot-0 weight field
                } else {
                    let w = field::u16_at(blob, cursor)? as f32 / 65536.0;
                    cursor += 2;
                    weights[v].push(VertexWeight { bone, influence: w });
                    weights[v][0].influence -= w;
                }
            }
        }
        vertex_base += count;
    }
    Ok(weights)
}

impl GameAssetHandler for ModernHandler {
    fn build_id(&self) -> u64 {
        self.layout.build_id
    }

    fn read_model(&self, asset: &AssetDescriptor) -> Result<RawModel> {
        let l = &self.layout.model;
        let buf = self.reader().read_bytes(asset.pointer, l.size)?;
        let hash = field::u64_at(&buf, l.hash)? & HASH_MASK;
        let name_ptr = RemotePtr(field::u64_at(&buf, l.name_ptr)?);
        let name = if asset.name.is_empty() {
            self.asset_name(name_ptr, &format!("xmodel_{hash:x}"))
        } else {
            asset.name.clone()
        };

        let lod_count = field::u32_at(&buf, l.lod_count)?;
        if lod_count > MAX_LODS {
            return Err(Error::MalformedAsset(format!(
                "{name}: implausible LOD count {lod_count}"
            )));
        }
        let lods_ptr = RemotePtr(field::u64_at(&buf, l.lods_ptr)?);
        let material_handles = RemotePtr(field::u64_at(&buf, l.material_handles_ptr)?);

        let mut lods = Vec::with_capacity(lod_count as usize);
        let mut surface_index = 0u64;
        for i in 0..lod_count as u64 {
            let lod_buf = self
                .reader()
                .read_bytes(lods_ptr.index(i, self.layout.lod.size as u64), self.layout.lod.size)?;
            let ll = &self.layout.lod;
            let surf_count = field::u32_at(&lod_buf, ll.surf_count)?;
            let surfs_ptr = RemotePtr(field::u64_at(&lod_buf, ll.surfs_ptr)?);

            let mut lod = RawLod {
                distance: field::f32_at(&lod_buf, ll.distance)?,
                stream_info_ptr: RemotePtr(field::u64_at(&lod_buf, ll.stream_info_ptr)?),
                surfaces: Vec::with_capacity(surf_count as usize),
            };
            for s in 0..surf_count as u64 {
                let material_ptr = self.reader().read_ptr(material_handles.index(surface_index, 8))?;
                surface_index += 1;
                lod.surfaces.push(self.read_surface(
                    surfs_ptr.index(s, self.layout.surface.size as u64),
                    material_ptr,
                )?);
            }
            lods.push(lod);
        }

        Ok(RawModel {
            name,
            pointer: asset.pointer,
            hash,
            bone_info_ptr: RemotePtr(field::u64_at(&buf, l.bone_info_ptr)?),
            lods,
        })
    }

    fn read_image(&self, asset: &AssetDescriptor) -> Result<Arc<Texture>> {
        let l = &self.layout.image;
        let header = self.reader().read_bytes(asset.pointer, l.size)?;
        let hash = field::u64_at(&header, l.hash)? & HASH_MASK;

        self.deps.cache.texture(hash, || {
            let name = if asset.name.is_empty() {
                self.asset_name(
                    RemotePtr(field::u64_at(&header, l.name_ptr)?),
                    &format!("ximage_{hash:x}"),
                )
            } else {
                asset.name.clone()
            };
            let stored_width = field::u16_at(&header, l.width)? as u32;
            let stored_height = field::u16_at(&header, l.height)? as u32;
            let format_tag = field::u8_at(&header, l.format)? as usize;
            let dxgi = self
                .layout
                .dxgi_formats
                .get(format_tag)
                .copied()
                .filter(|&f| f != 0)
                .ok_or_else(|| {
                    Error::MalformedAsset(format!("{name}: unknown pixel format tag {format_tag}"))
                })?;

            let loaded_ptr = RemotePtr(field::u64_at(&header, l.loaded_image_ptr)?);
            let (pixels, width, height) = if !loaded_ptr.is_null() {
                let size = field::u64_at(&header, l.loaded_size)?;
                let pixels = self.reader().read_bytes(loaded_ptr, size as usize)?;
                (pixels, stored_width, stored_height)
            } else {
                let mip_count = (field::u8_at(&header, l.mip_count)? as u32).min(MAX_MIPS);
                if mip_count == 0 {
                    return Err(Error::MalformedAsset(format!("{name}: no mip ladder")));
                }
                let mips_ptr = RemotePtr(field::u64_at(&header, l.mips_ptr)?);
                // Stored lowest quality first; the resolver wants
                // highest first.
                let mut ladder = Vec::with_capacity(mip_count as usize);
                for i in (0..mip_count as u64).rev() {
                    let entry = self
                        .reader()
                        .read_bytes(mips_ptr.index(i, self.layout.mip.size as u64), self.layout.mip.size)?;
                    ladder.push((
                        field::u64_at(&entry, self.layout.mip.hash)?,
                        field::u32_at(&entry, self.layout.mip.block_size)? as u64,
                    ));
                }
                let (pixels, steps) = self.deps.resolver.get_tiered(&ladder)?;
                (pixels, stored_width >> steps, stored_height >> steps)
            };

            let mut data = dds::build_header(width, height, 1, dxgi, false);
            data.extend_from_slice(&pixels);
            debug!("Decoded image {name} ({width}x{height})");
            Ok(Arc::new(Texture {
                name,
                key: hash,
                width,
                height,
                format: dxgi,
                data,
            }))
        })
    }

    fn read_sound(&self, asset: &AssetDescriptor) -> Result<Sound> {
        let l = &self.layout.sound;
        let buf = self.reader().read_bytes(asset.pointer, l.size)?;
        let name = if asset.name.is_empty() {
            self.asset_name(RemotePtr(field::u64_at(&buf, l.name_ptr)?), "xsound")
        } else {
            asset.name.clone()
        };

        let seek_table_size = field::u32_at(&buf, l.seek_table_size)? as u64;
        let data_size = field::u32_at(&buf, l.data_size)? as u64;
        let stream_key = field::u64_at(&buf, l.stream_key)?;
        if stream_key == 0 {
            return Err(Error::MalformedAsset(format!("{name}: no stream key")));
        }

        // Blocks are stored 16-byte aligned with the seek table in front.
        let padded = (data_size + seek_table_size + 4095) & !0xF;
        let mut data = self.deps.resolver.get_block(stream_key, padded)?;
        if (seek_table_size as usize) < data.len() {
            data.drain(..seek_table_size as usize);
        }
        data.truncate(data_size as usize);

        Ok(Sound {
            name,
            channels: field::u16_at(&buf, l.channels)?,
            frame_rate: field::u32_at(&buf, l.frame_rate)?,
            frame_count: field::u32_at(&buf, l.frame_count)?,
            data,
        })
    }

    fn read_anim(&self, asset: &AssetDescriptor) -> Result<Anim> {
        let l = &self.layout.anim;
        let buf = self.reader().read_bytes(asset.pointer, l.size)?;
        let name = if asset.name.is_empty() {
            self.asset_name(RemotePtr(field::u64_at(&buf, l.name_ptr)?), "xanim")
        } else {
            asset.name.clone()
        };

        let bone_count = field::u32_at(&buf, l.bone_count)? as u64;
        let names_ptr = RemotePtr(field::u64_at(&buf, l.bone_names_ptr)?);
        let mut bone_names = Vec::with_capacity(bone_count as usize);
        for i in 0..bone_count {
            let hash = self.reader().read_u64(names_ptr.index(i, 8))?;
            bone_names.push(format!("bone_{hash:x}"));
        }

        let note_count = field::u32_at(&buf, l.notetrack_count)? as u64;
        let notes_ptr = RemotePtr(field::u64_at(&buf, l.notetracks_ptr)?);
        let nl = &self.layout.notetrack;
        let mut notetracks = Vec::with_capacity(note_count as usize);
        for i in 0..note_count {
            let entry = self
                .reader()
                .read_bytes(notes_ptr.index(i, nl.size as u64), nl.size)?;
            let name_ptr = RemotePtr(field::u64_at(&entry, nl.name_ptr)?);
            notetracks.push(Notetrack {
                name: self.asset_name(name_ptr, "notetrack"),
                frame: field::u32_at(&entry, nl.frame)?,
            });
        }

        let flags = field::u8_at(&buf, l.flags)?;
        Ok(Anim {
            name,
            framerate: field::f32_at(&buf, l.framerate)?,
            frame_count: field::u32_at(&buf, l.frame_count)?,
            looping: flags & 0x1 != 0,
            additive: flags & 0x2 != 0,
            bone_names,
            notetracks,
        })
    }

    fn read_material(&self, asset: &AssetDescriptor) -> Result<Arc<Material>> {
        self.read_material_from_ptr(asset.pointer)
    }

    fn read_material_from_ptr(&self, ptr: RemotePtr) -> Result<Arc<Material>> {
        let l = &self.layout.material;
        let buf = self.reader().read_bytes(ptr, l.size)?;
        let hash = field::u64_at(&buf, l.hash)? & HASH_MASK;

        self.deps.cache.material(hash, || {
            let image_count = field::u8_at(&buf, l.image_count)? as u64;
            let table_ptr = RemotePtr(field::u64_at(&buf, l.image_table_ptr)?);
            let tl = &self.layout.texture_def;
            let il = &self.layout.image;

            let mut slots = Vec::with_capacity(image_count as usize);
            for i in 0..image_count {
                let def = self
                    .reader()
                    .read_bytes(table_ptr.index(i, tl.size as u64), tl.size)?;
                let image_ptr = RemotePtr(field::u64_at(&def, tl.image_ptr)?);
                if image_ptr.is_null() {
                    continue;
                }
                let image = match self.reader().read_bytes(image_ptr, il.size) {
                    Ok(image) => image,
                    Err(Error::ReadFault { address }) => {
                        warn!("Material {hash:#x}: image record unreadable at {address:#x}");
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                let image_hash = field::u64_at(&image, il.hash)? & HASH_MASK;
                let image_name = self.asset_name(
                    RemotePtr(field::u64_at(&image, il.name_ptr)?),
                    &format!("ximage_{image_hash:x}"),
                );
                // Engine placeholder slots carry a `$` prefix; editor
                // stand-ins a leading dash. Neither is a real texture.
                if image_name.starts_with('$') || image_name.starts_with('-') {
                    continue;
                }
                slots.push(TextureSlot {
                    semantic: field::u32_at(&def, tl.semantic)?,
                    image_hash,
                    image_name,
                });
            }

            Ok(Arc::new(Material {
                name: format!("xmaterial_{hash:x}"),
                hash,
                slots,
                params: Vec::new(),
            }))
        })
    }

    fn surface_materials(&self, raw: &RawModel) -> Result<Vec<Option<Arc<Material>>>> {
        let mut materials = Vec::new();
        for lod in &raw.lods {
            for surface in &lod.surfaces {
                if surface.material_ptr.is_null() {
                    materials.push(None);
                    continue;
                }
                match self.read_material_from_ptr(surface.material_ptr) {
                    Ok(material) => materials.push(Some(material)),
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!("{}: material at {} skipped: {e}", raw.name, surface.material_ptr);
                        materials.push(None);
                    }
                }
            }
        }
        Ok(materials)
    }

    fn translate_model(&self, raw: &RawModel, materials: &[SurfaceMaterial]) -> Result<Model> {
        let surface_total: usize = raw.lods.iter().map(|lod| lod.surfaces.len()).sum();
        if materials.len() != surface_total {
            return Err(Error::MalformedAsset(
                "one material entry per surface required".into(),
            ));
        }

        let skeleton = self.read_skeleton(raw.bone_info_ptr)?;

        let mut model = Model {
            name: raw.name.clone(),
            lods: Vec::with_capacity(raw.lods.len()),
            skeleton,
        };
        let mut surface_index = 0usize;
        for raw_lod in &raw.lods {
            let blob = match self.load_streamed_geometry(raw_lod) {
                Ok(blob) => blob,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("{}: geometry blob unavailable: {e}", raw.name);
                    surface_index += raw_lod.surfaces.len();
                    model.lods.push(Lod {
                        distance: raw_lod.distance,
                        submeshes: Vec::new(),
                    });
                    continue;
                }
            };

            let mut lod = Lod {
                distance: raw_lod.distance,
                submeshes: Vec::with_capacity(raw_lod.surfaces.len()),
            };
            for surface in &raw_lod.surfaces {
                let entry = materials[surface_index];
                surface_index += 1;
                let mut mesh = match self.decode_surface(&blob, surface) {
                    Ok(mesh) => mesh,
                    Err(e) => {
                        warn!("{}: surface skipped: {e}", raw.name);
                        Submesh::default()
                    }
                };
                mesh.material_index = entry.index;
                mesh.material_hash = entry.hash;
                lod.submeshes.push(mesh);
            }
            model.lods.push(lod);
        }
        Ok(model)
    }

    fn load_streamed_model_data(&self, _raw: &RawModel) -> Result<Vec<u8>> {
        // These builds stream geometry per LOD, not per model.
        Err(Error::UnsupportedBuild(self.layout.build_id))
    }
}
