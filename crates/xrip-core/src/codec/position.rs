//! Quantized vertex position decode.
//!
//! Positions are stored as three 21-bit unsigned fields packed into a
//! u64, normalized over the surface bounding box. The vertical (Y) axis
//! sign is flipped on decode to match the output coordinate convention.

const FIELD_MAX: u32 = 0x1F_FFFF;

/// Extract field `i` (bits [21*i, 21*(i+1))) as a signed normalized value.
fn field(packed: u64, shift: u32) -> f32 {
    ((packed >> shift) & FIELD_MAX as u64) as f32 * (1.0 / FIELD_MAX as f32 * 2.0) - 1.0
}

/// Decode a packed position into model space.
pub fn unpack(packed: u64, scale: f32, offset: [f32; 3]) -> [f32; 3] {
    let x = field(packed, 0) * scale + offset[0];
    let y = field(packed, 21) * scale + offset[1];
    let z = field(packed, 42) * scale + offset[2];
    [x, -y, z]
}

/// Quantize a model-space position (test/reference inverse of [`unpack`]).
pub fn pack(position: [f32; 3], scale: f32, offset: [f32; 3]) -> u64 {
    let quantize = |v: f32, off: f32| -> u64 {
        let normalized = ((v - off) / scale + 1.0) * 0.5;
        let clamped = normalized.clamp(0.0, 1.0);
        ((clamped * FIELD_MAX as f32).round() as u64) & FIELD_MAX as u64
    };
    quantize(position[0], offset[0])
        | quantize(-position[1], offset[1]) << 21
        | quantize(position[2], offset[2]) << 42
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_fields_decode_to_scale_extents() {
        // X and Y fields at maximum, Z at zero, scale 10, no offset:
        // raw decode is (10, 10, -10); the Y flip lands on (10, -10, -10).
        let packed = (FIELD_MAX as u64) | (FIELD_MAX as u64) << 21;
        let [x, y, z] = unpack(packed, 10.0, [0.0; 3]);
        assert!((x - 10.0).abs() < 1e-4);
        assert!((y + 10.0).abs() < 1e-4);
        assert!((z + 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_round_trip_within_one_quantization_step() {
        let scale = 25.0f32;
        let offset = [1.0f32, -2.0, 3.5];
        let step = 2.0 / FIELD_MAX as f32 * scale;
        let samples = [
            [0.0f32, 0.0, 0.0],
            [1.0, -2.0, 3.5],
            [-20.0, 10.0, 14.0],
            [24.9, 22.9, -21.0],
            [0.125, -0.25, 0.0625],
        ];
        for pos in samples {
            let packed = pack(pos, scale, offset);
            let out = unpack(packed, scale, offset);
            for axis in 0..3 {
                assert!(
                    (out[axis] - pos[axis]).abs() <= step,
                    "{pos:?} -> {out:?} axis {axis}"
                );
            }
        }
    }

    #[test]
    fn test_zero_packed_is_negative_extent() {
        let [x, y, z] = unpack(0, 1.0, [0.0; 3]);
        assert!((x + 1.0).abs() < 1e-6);
        assert!((y - 1.0).abs() < 1e-6);
        assert!((z + 1.0).abs() < 1e-6);
    }
}
