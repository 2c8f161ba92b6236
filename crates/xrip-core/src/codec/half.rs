//! IEEE-754 half-precision conversions.
//!
//! Branchless bit manipulation; the only data-dependent masks handle the
//! subnormal boundary and the infinity/NaN range.

const SHIFT: i32 = 13;
const SHIFT_SIGN: u32 = 16;

const INF_N: i32 = 0x7F80_0000; // f32 infinity
const MAX_N: i32 = 0x477F_E000; // largest f16 normal, as f32 bits
const MIN_N: i32 = 0x3880_0000; // smallest f16 normal, as f32 bits
const SIGN_N: u32 = 0x8000_0000;

const INF_C: i32 = INF_N >> SHIFT;
const NAN_N: i32 = (INF_C + 1) << SHIFT;
const MAX_C: i32 = MAX_N >> SHIFT;
const MIN_C: i32 = MIN_N >> SHIFT;

const MUL_N: u32 = 0x5200_0000; // (1 << 23) / MIN_N
const MUL_C: u32 = 0x3380_0000; // MIN_N / (1 << (23 - SHIFT))

const SUB_C: i32 = 0x003FF; // largest f32 subnormal, downshifted
const NOR_C: i32 = 0x00400; // smallest f32 normal, downshifted

const MAX_D: i32 = INF_C - MAX_C - 1;
const MIN_D: i32 = MIN_C - SUB_C - 1;

fn mask(cond: bool) -> i32 {
    if cond { -1 } else { 0 }
}

pub fn from_f32(value: f32) -> u16 {
    let mut v = value.to_bits() as i32;
    let sign = (v as u32) & SIGN_N;
    v ^= sign as i32;
    let sign = sign >> SHIFT_SIGN;

    // Subnormal halves: scale into integer range via a float multiply.
    let s = f32::from_bits(MUL_N) * f32::from_bits(v as u32);
    let s = s as i32;

    v ^= (s ^ v) & mask(MIN_N > v);
    v ^= (INF_N ^ v) & mask(INF_N > v && v > MAX_N);
    v ^= (NAN_N ^ v) & mask(NAN_N > v && v > INF_N);

    v = ((v as u32) >> SHIFT) as i32;
    v ^= (v.wrapping_sub(MAX_D) ^ v) & mask(v > MAX_C);
    v ^= (v.wrapping_sub(MIN_D) ^ v) & mask(v > SUB_C);

    ((v as u32) | sign) as u16
}

pub fn to_f32(value: u16) -> f32 {
    let mut v = value as i32;
    let sign = v & 0x8000;
    v ^= sign;
    let sign = (sign as u32) << SHIFT_SIGN;

    v ^= (v.wrapping_add(MIN_D) ^ v) & mask(v > SUB_C);
    v ^= (v.wrapping_add(MAX_D) ^ v) & mask(v > MAX_C);

    // Subnormal halves: rescale by the inverse multiplier.
    let s = f32::from_bits(MUL_C) * v as f32;
    let subnormal = mask(NOR_C > v);

    v <<= SHIFT;
    v ^= (s.to_bits() as i32 ^ v) & subnormal;

    f32::from_bits(v as u32 | sign)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_encodings() {
        assert_eq!(from_f32(0.0), 0x0000);
        assert_eq!(from_f32(1.0), 0x3C00);
        assert_eq!(from_f32(-1.0), 0xBC00);
        assert_eq!(from_f32(0.5), 0x3800);
        assert_eq!(from_f32(2.0), 0x4000);
        assert_eq!(from_f32(65504.0), 0x7BFF);
        assert_eq!(from_f32(f32::INFINITY), 0x7C00);
        assert_eq!(from_f32(f32::NEG_INFINITY), 0xFC00);
    }

    #[test]
    fn test_known_decodings() {
        assert_eq!(to_f32(0x0000), 0.0);
        assert_eq!(to_f32(0x3C00), 1.0);
        assert_eq!(to_f32(0xBC00), -1.0);
        assert_eq!(to_f32(0x3800), 0.5);
        assert_eq!(to_f32(0x7BFF), 65504.0);
        assert_eq!(to_f32(0x7C00), f32::INFINITY);
        // Smallest positive subnormal: 2^-24.
        assert_eq!(to_f32(0x0001), 2.0f32.powi(-24));
        // Smallest normal: 2^-14.
        assert_eq!(to_f32(0x0400), 2.0f32.powi(-14));
    }

    #[test]
    fn test_overflow_saturates_to_infinity() {
        assert_eq!(from_f32(1.0e6), 0x7C00);
        assert_eq!(from_f32(-1.0e6), 0xFC00);
    }

    #[test]
    fn test_nan_stays_nan() {
        let h = from_f32(f32::NAN);
        assert!(to_f32(h).is_nan());
    }

    #[test]
    fn test_round_trip_all_finite_halves() {
        // Every finite half value must survive half -> f32 -> half exactly.
        for bits in 0u16..=0xFFFF {
            let exp = bits & 0x7C00;
            if exp == 0x7C00 {
                continue; // inf/NaN payloads not byte-stable
            }
            let f = to_f32(bits);
            assert_eq!(from_f32(f), bits, "bits {bits:#06x} -> {f}");
        }
    }

    #[test]
    fn test_negative_zero() {
        assert_eq!(from_f32(-0.0), 0x8000);
        assert_eq!(to_f32(0x8000).to_bits(), (-0.0f32).to_bits());
    }
}
