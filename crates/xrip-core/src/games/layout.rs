//! Per-build record layout tables.
//!
//! Every supported build publishes its asset records at fixed byte
//! offsets. The tables below are immutable constants handed to a
//! handler at construction; nothing in here is read at runtime from
//! globals. Offsets are into the raw record buffer fetched from the
//! attached process.

/// Pool directory entry stride (Root, End, LookupTable, HeaderMemory,
/// AssetMemory).
pub const POOL_ENTRY_STRIDE: u64 = 40;

/// Asset node: Header, Temp, Next, Previous.
pub const NODE_HEADER: u64 = 0;
pub const NODE_TEMP: u64 = 8;
pub const NODE_NEXT: u64 = 16;
pub const NODE_STRIDE: u64 = 32;

/// Content hashes carry flag bits in the top nibble.
pub const HASH_MASK: u64 = 0x0FFF_FFFF_FFFF_FFFF;

#[derive(Debug, Clone, Copy)]
pub struct PoolIds {
    pub model: u32,
    pub image: u32,
    pub material: u32,
    pub anim: u32,
    pub sound: u32,
}

/// Model record: name, skeleton indirection, LOD table.
#[derive(Debug, Clone, Copy)]
pub struct ModelLayout {
    pub size: usize,
    pub hash: usize,
    pub name_ptr: usize,
    pub bone_info_ptr: usize,
    pub lod_count: usize,
    pub lods_ptr: usize,
    /// Per-surface material handle array (u64 per surface, all LODs).
    pub material_handles_ptr: usize,
}

/// Skeleton info record referenced from the model.
#[derive(Debug, Clone, Copy)]
pub struct BoneInfoLayout {
    pub size: usize,
    pub bone_count: usize,
    pub name_hashes_ptr: usize,
    pub parents_ptr: usize,
    pub rotations_ptr: usize,
    pub translations_ptr: usize,
}

/// LOD record: distance, surface table, streamed-geometry indirection.
#[derive(Debug, Clone, Copy)]
pub struct LodLayout {
    pub size: usize,
    pub distance: usize,
    pub surf_count: usize,
    pub surfs_ptr: usize,
    pub stream_info_ptr: usize,
}

/// Streamed-geometry info: resident buffer or content key.
#[derive(Debug, Clone, Copy)]
pub struct StreamInfoLayout {
    pub size: usize,
    pub buffer_ptr: usize,
    pub buffer_size: usize,
    pub stream_key: usize,
}

/// Surface record: counts, blob offsets, weight cascade, quantization.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceLayout {
    pub size: usize,
    pub vertex_count: usize,
    pub face_count: usize,
    pub position_offset: usize,
    pub tangent_offset: usize,
    pub uv_offset: usize,
    pub color_offset: usize,
    pub face_table_offset: usize,
    pub face_table_count: usize,
    pub packed_indices_offset: usize,
    pub indices_offset: usize,
    pub weights_offset: usize,
    /// Eight u16 counters; index i counts vertices with i+1 influences.
    pub weight_counts: usize,
    pub scale: usize,
    pub offsets: usize,
}

/// Image record: dimensions, format tag, resident pixels or mip ladder.
#[derive(Debug, Clone, Copy)]
pub struct ImageLayout {
    pub size: usize,
    pub hash: usize,
    pub name_ptr: usize,
    pub width: usize,
    pub height: usize,
    pub mip_count: usize,
    pub format: usize,
    pub loaded_image_ptr: usize,
    pub loaded_size: usize,
    pub mips_ptr: usize,
}

/// Mip ladder entry, highest quality last.
#[derive(Debug, Clone, Copy)]
pub struct MipLayout {
    pub size: usize,
    pub hash: usize,
    pub block_size: usize,
}

/// Material record: hash, image table.
#[derive(Debug, Clone, Copy)]
pub struct MaterialLayout {
    pub size: usize,
    pub hash: usize,
    pub image_count: usize,
    pub image_table_ptr: usize,
}

/// Image table entry within a material.
#[derive(Debug, Clone, Copy)]
pub struct TextureDefLayout {
    pub size: usize,
    pub semantic: usize,
    pub image_ptr: usize,
}

/// Sound record: stream key plus framing.
#[derive(Debug, Clone, Copy)]
pub struct SoundLayout {
    pub size: usize,
    pub hash: usize,
    pub name_ptr: usize,
    pub channels: usize,
    pub frame_rate: usize,
    pub frame_count: usize,
    pub seek_table_size: usize,
    pub data_size: usize,
    pub stream_key: usize,
}

/// Anim record header.
#[derive(Debug, Clone, Copy)]
pub struct AnimLayout {
    pub size: usize,
    pub hash: usize,
    pub name_ptr: usize,
    pub framerate: usize,
    pub frame_count: usize,
    pub bone_count: usize,
    pub bone_names_ptr: usize,
    pub notetrack_count: usize,
    pub notetracks_ptr: usize,
    pub flags: usize,
}

/// Notetrack entry: name pointer + frame.
#[derive(Debug, Clone, Copy)]
pub struct NotetrackLayout {
    pub size: usize,
    pub name_ptr: usize,
    pub frame: usize,
}

/// The full layout set for one game build.
#[derive(Debug, Clone, Copy)]
pub struct GameLayout {
    pub build_id: u64,
    pub pools: PoolIds,
    pub model: ModelLayout,
    pub bone_info: BoneInfoLayout,
    pub lod: LodLayout,
    pub stream_info: StreamInfoLayout,
    pub surface: SurfaceLayout,
    pub image: ImageLayout,
    pub mip: MipLayout,
    pub material: MaterialLayout,
    pub texture_def: TextureDefLayout,
    pub sound: SoundLayout,
    pub anim: AnimLayout,
    pub notetrack: NotetrackLayout,
    /// Pixel format tag -> DXGI format.
    pub dxgi_formats: &'static [u8],
}

pub const BUILD_MW22: u64 = 0x3232_5241_5744_4F4D;
pub const BUILD_MW23: u64 = 0x3332_5241_5744_4F4D;

const MODERN_DXGI: &[u8] = &[
    0,  // invalid
    61, // R8
    49, // R8G8
    28, // R8G8B8A8
    71, // BC1
    74, // BC2
    77, // BC3
    80, // BC4
    83, // BC5
    95, // BC6H
    98, // BC7
    10, // R16G16B16A16F
    2,  // R32G32B32A32F
];

pub const MW22: GameLayout = GameLayout {
    build_id: BUILD_MW22,
    pools: PoolIds {
        model: 9,
        image: 21,
        material: 11,
        anim: 7,
        sound: 22,
    },
    model: ModelLayout {
        size: 0xE8,
        hash: 0x00,
        name_ptr: 0x08,
        bone_info_ptr: 0x10,
        lod_count: 0x18,
        lods_ptr: 0x20,
        material_handles_ptr: 0x28,
    },
    bone_info: BoneInfoLayout {
        size: 0x30,
        bone_count: 0x00,
        name_hashes_ptr: 0x08,
        parents_ptr: 0x10,
        rotations_ptr: 0x18,
        translations_ptr: 0x20,
    },
    lod: LodLayout {
        size: 0x40,
        distance: 0x00,
        surf_count: 0x04,
        surfs_ptr: 0x08,
        stream_info_ptr: 0x10,
    },
    stream_info: StreamInfoLayout {
        size: 0x20,
        buffer_ptr: 0x00,
        buffer_size: 0x08,
        stream_key: 0x10,
    },
    surface: SurfaceLayout {
        size: 0x60,
        vertex_count: 0x00,
        face_count: 0x04,
        position_offset: 0x08,
        tangent_offset: 0x0C,
        uv_offset: 0x10,
        color_offset: 0x14,
        face_table_offset: 0x18,
        face_table_count: 0x1C,
        packed_indices_offset: 0x20,
        indices_offset: 0x24,
        weights_offset: 0x28,
        weight_counts: 0x2C,
        scale: 0x3C,
        offsets: 0x40,
    },
    image: ImageLayout {
        size: 0x50,
        hash: 0x00,
        name_ptr: 0x08,
        width: 0x10,
        height: 0x12,
        mip_count: 0x14,
        format: 0x15,
        loaded_image_ptr: 0x18,
        loaded_size: 0x20,
        mips_ptr: 0x28,
    },
    mip: MipLayout {
        size: 0x10,
        hash: 0x00,
        block_size: 0x08,
    },
    material: MaterialLayout {
        size: 0x40,
        hash: 0x00,
        image_count: 0x08,
        image_table_ptr: 0x10,
    },
    texture_def: TextureDefLayout {
        size: 0x10,
        semantic: 0x00,
        image_ptr: 0x08,
    },
    sound: SoundLayout {
        size: 0x50,
        hash: 0x00,
        name_ptr: 0x08,
        channels: 0x10,
        frame_rate: 0x14,
        frame_count: 0x18,
        seek_table_size: 0x1C,
        data_size: 0x20,
        stream_key: 0x28,
    },
    anim: AnimLayout {
        size: 0x60,
        hash: 0x00,
        name_ptr: 0x08,
        framerate: 0x10,
        frame_count: 0x14,
        bone_count: 0x18,
        bone_names_ptr: 0x20,
        notetrack_count: 0x28,
        notetracks_ptr: 0x30,
        flags: 0x38,
    },
    notetrack: NotetrackLayout {
        size: 0x10,
        name_ptr: 0x00,
        frame: 0x08,
    },
    dxgi_formats: MODERN_DXGI,
};

/// Differs from MW22 in pool numbering and a widened model header.
pub const MW23: GameLayout = GameLayout {
    build_id: BUILD_MW23,
    pools: PoolIds {
        model: 11,
        image: 24,
        material: 13,
        anim: 8,
        sound: 25,
    },
    model: ModelLayout {
        size: 0xF8,
        hash: 0x00,
        name_ptr: 0x08,
        bone_info_ptr: 0x18,
        lod_count: 0x20,
        lods_ptr: 0x28,
        material_handles_ptr: 0x30,
    },
    ..MW22
};

/// Resolve a build identifier to its layout table.
pub fn layout_for(build_id: u64) -> Option<&'static GameLayout> {
    match build_id {
        BUILD_MW22 => Some(&MW22),
        BUILD_MW23 => Some(&MW23),
        _ => None,
    }
}
