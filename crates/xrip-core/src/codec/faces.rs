//! Chunked bit-packed face index decode.
//!
//! Face indices are stored as sub-indices relative to a per-chunk base,
//! packed LSB-first at a chunk-specific bit width. Each 40-byte chunk
//! record carries the base face index, the stored width selector, the
//! face count, and a byte offset into the shared packed stream. The
//! final sub-index + base is a position into a flat u16 vertex index
//! array.

use crate::error::{Error, Result};
use crate::memory::{ReadMemory, RemotePtr};

const CHUNK_STRIDE: u64 = 40;
const CHUNK_BASE_OFFSET: u64 = 28;
const CHUNK_BITS_OFFSET: u64 = 34;
const CHUNK_COUNT_OFFSET: u64 = 35;
const CHUNK_DATA_OFFSET: u64 = 36;

/// Width in bits of one packed sub-index. The stored selector is the
/// raw field minus one; width is the position of its highest set bit
/// plus one, or zero when no bits remain.
fn sub_index_width(bits: u8) -> u32 {
    if bits == 0 {
        0
    } else {
        8 - bits.leading_zeros()
    }
}

/// Read the packed sub-index at `index` from the stream at `packed`.
/// A sub-index straddles at most two bytes.
fn read_sub_index(
    reader: &dyn ReadMemory,
    packed: RemotePtr,
    index: u32,
    width: u32,
) -> Result<u32> {
    let bit_offset = index * width;
    let byte_ptr = packed.offset((bit_offset >> 3) as u64);
    let shift = bit_offset & 7;
    let mask = (1u32 << width) - 1;

    let first = reader.read_u8(byte_ptr)? as u32;
    if shift == 0 {
        return Ok(first & mask);
    }

    let head_bits = 8 - shift;
    if head_bits >= width {
        return Ok(first >> shift & mask);
    }

    let second = reader.read_u8(byte_ptr.offset(1))? as u32;
    let head = first >> shift & ((1 << head_bits) - 1);
    let tail = second & ((1 << (width - head_bits)) - 1);
    Ok(head | tail << head_bits)
}

/// Decode the three vertex indices of face `face_index`.
///
/// Walks the chunk table subtracting per-chunk face counts until the
/// owning chunk is found, then extracts three sub-indices, rebases
/// them, and resolves each through the flat index array.
pub fn unpack_face_indices(
    reader: &dyn ReadMemory,
    tables: RemotePtr,
    table_count: u64,
    packed_indices: RemotePtr,
    indices: RemotePtr,
    face_index: u64,
) -> Result<[u16; 3]> {
    let mut local = face_index;
    for i in 0..table_count {
        let chunk = tables.offset(i * CHUNK_STRIDE);
        let count = reader.read_u8(chunk.offset(CHUNK_COUNT_OFFSET))? as u64;
        if local >= count {
            local -= count;
            continue;
        }

        let bits = reader.read_u8(chunk.offset(CHUNK_BITS_OFFSET))?.wrapping_sub(1);
        let base = reader.read_u32(chunk.offset(CHUNK_BASE_OFFSET))? as u64;
        let data_offset = reader.read_u32(chunk.offset(CHUNK_DATA_OFFSET))? as u64;
        let packed = packed_indices.offset(data_offset);
        let width = sub_index_width(bits);

        let mut face = [0u16; 3];
        for (corner, out) in face.iter_mut().enumerate() {
            let sub = read_sub_index(reader, packed, (local * 3) as u32 + corner as u32, width)?;
            let position = sub as u64 + base;
            *out = reader.read_u16(indices.offset(position * 2))?;
        }
        return Ok(face);
    }
    Err(Error::MalformedAsset(format!(
        "face {face_index} outside {table_count}-chunk table"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MockMemoryBuilder;

    const TABLES: u64 = 0x1000;
    const PACKED: u64 = 0x2000;
    const INDICES: u64 = 0x3000;

    /// Pack sub-index values LSB-first at a fixed bit width.
    fn pack_bits(values: &[u32], width: u32) -> Vec<u8> {
        let mut out = vec![0u8; (values.len() * width as usize).div_ceil(8)];
        for (i, &v) in values.iter().enumerate() {
            for bit in 0..width {
                if v >> bit & 1 != 0 {
                    let pos = i * width as usize + bit as usize;
                    out[pos >> 3] |= 1 << (pos & 7);
                }
            }
        }
        out
    }

    fn chunk_record(base: u32, bits: u8, count: u8, data_offset: u32) -> Vec<u8> {
        let mut rec = vec![0u8; 40];
        rec[28..32].copy_from_slice(&base.to_le_bytes());
        rec[34] = bits;
        rec[35] = count;
        rec[36..40].copy_from_slice(&data_offset.to_le_bytes());
        rec
    }

    /// Two chunks: 2 faces at 2-bit sub-indices, then 3 faces at 3-bit,
    /// rebased past the first chunk's span.
    fn build_fixture() -> (crate::memory::MockMemoryReader, Vec<u16>) {
        // Stored width selector is width-producing value + 1.
        let mut tables = chunk_record(0, 3, 2, 0);
        tables.extend(chunk_record(4, 5, 3, 2));

        let mut packed = pack_bits(&[0, 1, 2, 3, 0, 1], 2);
        assert_eq!(packed.len(), 2);
        packed.extend(pack_bits(&[0, 1, 2, 3, 4, 0, 1, 2, 3], 3));

        let index_array: Vec<u16> = (0..9).map(|k| 50 + k * 3).collect();
        let mut index_bytes = Vec::new();
        for v in &index_array {
            index_bytes.extend_from_slice(&v.to_le_bytes());
        }

        let reader = MockMemoryBuilder::new()
            .bytes(TABLES, &tables)
            .bytes(PACKED, &packed)
            .bytes(INDICES, &index_bytes)
            .build();
        (reader, index_array)
    }

    #[test]
    fn test_every_face_resolves_below_vertex_count() {
        let (reader, _) = build_fixture();
        let vertex_count = 80u16;
        for face in 0..5u64 {
            let tri = unpack_face_indices(
                &reader,
                RemotePtr(TABLES),
                2,
                RemotePtr(PACKED),
                RemotePtr(INDICES),
                face,
            )
            .unwrap();
            for idx in tri {
                assert!(idx < vertex_count, "face {face} index {idx}");
            }
        }
    }

    #[test]
    fn test_chunk_rebase_and_straddled_reads() {
        let (reader, index_array) = build_fixture();
        let lookup = |positions: [usize; 3]| positions.map(|p| index_array[p]);

        // Chunk 0, base 0: faces use packed values directly.
        let tri = unpack_face_indices(
            &reader,
            RemotePtr(TABLES),
            2,
            RemotePtr(PACKED),
            RemotePtr(INDICES),
            1,
        )
        .unwrap();
        assert_eq!(tri, lookup([3, 0, 1]));

        // Chunk 1, base 4: local face 1 starts at bit 9 so its first
        // sub-index straddles a byte boundary.
        let tri = unpack_face_indices(
            &reader,
            RemotePtr(TABLES),
            2,
            RemotePtr(PACKED),
            RemotePtr(INDICES),
            3,
        )
        .unwrap();
        assert_eq!(tri, lookup([7, 8, 4]));
    }

    #[test]
    fn test_face_past_table_is_rejected() {
        let (reader, _) = build_fixture();
        let err = unpack_face_indices(
            &reader,
            RemotePtr(TABLES),
            2,
            RemotePtr(PACKED),
            RemotePtr(INDICES),
            5,
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedAsset(_)));
    }
}
