//! Packed tangent-frame decode.
//!
//! The frame is a unit quaternion with its largest component dropped.
//! Bits [30,32) select which component was dropped; the remaining three
//! are 10/10/9-bit fixed point, divided by sqrt(2) so their squares sum
//! below one. The basis rotated by the quaternion yields the tangent and
//! bitangent; the normal is their cross product.

const INV_SQRT2: f32 = 1.0 / 1.414_213_5;

/// Decode a packed 32-bit tangent frame into `(tangent, normal)`.
pub fn unpack(packed: u32) -> ([f32; 3], [f32; 3]) {
    let dropped = packed >> 30;

    let a = ((packed & 0x3FF) as f32 / 511.5 - 1.0) * INV_SQRT2;
    let b = ((packed >> 10 & 0x3FF) as f32 / 511.5 - 1.0) * INV_SQRT2;
    let c = ((packed >> 20 & 0x1FF) as f32 / 255.5 - 1.0) * INV_SQRT2;

    let sum = a * a + b * b + c * c;
    let d = if sum <= 1.0 { (1.0 - sum).sqrt() } else { 0.0 };

    let [qx, qy, qz, qw] = match dropped {
        0 => [d, a, b, c],
        1 => [a, d, b, c],
        2 => [a, b, d, c],
        _ => [a, b, c, d],
    };

    let tangent = [
        1.0 - 2.0 * (qy * qy + qz * qz),
        2.0 * (qx * qy + qw * qz),
        2.0 * (qx * qz - qw * qy),
    ];
    let bitangent = [
        2.0 * (qx * qy - qw * qz),
        1.0 - 2.0 * (qx * qx + qz * qz),
        2.0 * (qy * qz + qw * qx),
    ];
    let normal = cross(tangent, bitangent);
    (tangent, normal)
}

fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
        a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
    }

    fn length(v: [f32; 3]) -> f32 {
        dot(v, v).sqrt()
    }

    #[test]
    fn test_identity_quaternion_frame() {
        // a = b = c = 0 means stored fields at midpoint 511.5 / 255.5;
        // fields are integers so use the nearest representable frame and
        // only check the frame properties.
        let packed: u32 = 0x1FF << 20 | 0x1FF << 10 | 0x1FF | 0x80 << 22;
        let (tangent, normal) = unpack(packed & 0x3FFF_FFFF | (3 << 30));
        assert!((length(tangent) - 1.0).abs() < 1e-3);
        assert!((length(normal) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_all_frames_unit_and_orthogonal() {
        // Deterministic sweep over the packed domain, all four dropped-
        // component selectors included.
        let mut value: u32 = 0x2468_ACE1;
        for _ in 0..20_000 {
            value = value.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let (tangent, normal) = unpack(value);
            let lt = length(tangent);
            let ln = length(normal);
            assert!((0.999..=1.001).contains(&lt), "|t|={lt} for {value:#x}");
            assert!((0.999..=1.001).contains(&ln), "|n|={ln} for {value:#x}");
            assert!(
                dot(tangent, normal).abs() < 0.01,
                "t.n={} for {value:#x}",
                dot(tangent, normal)
            );
        }
    }
}
