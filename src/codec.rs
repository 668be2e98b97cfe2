//! Conversions between normalized float samples and fixed-point PCM.
//!
//! Every format is a zero-sized type implementing [`FixedFormat`]. The
//! conversions are pure and total: out-of-range input saturates at
//! full-scale and `NaN` encodes to zero.
//!
//! # Truncation
//!
//! `encode` scales by the format's full-scale magnitude and then takes the
//! floor (toward negative infinity). All scales are powers of two, so the
//! multiplication is exact in `f32` and the same rule applies to every
//! depth without DC bias differences between them.
//!
//! ```
//! use jacktoalsa::codec::{FixedFormat, S16};
//!
//! assert_eq!(S16::encode(1.0), 32767);
//! assert_eq!(S16::encode(-1.0), -32768);
//! assert_eq!(S16::encode(0.5), 16384);
//! assert_eq!(S16::decode(-16384), -0.5);
//! ```

/// A signed fixed-point PCM format as seen by the device.
pub trait FixedFormat {
    /// Container type of one sample in the interleaved device buffer.
    type Sample: Copy + Default + Send + 'static;

    /// Full-scale magnitude used as the scale factor in both directions.
    const FULL_SCALE: f32;
    /// Most negative encodable value.
    const MIN: Self::Sample;
    /// Largest positive encodable value.
    const MAX: Self::Sample;

    /// Converts a normalized float sample, saturating at full-scale.
    fn encode(sample: f32) -> Self::Sample;

    /// Converts a fixed-point sample back to a normalized float.
    fn decode(sample: Self::Sample) -> f32;
}

/// 16-bit signed PCM.
#[derive(Clone, Copy, Debug)]
pub struct S16;

/// 24-bit signed PCM in a 32-bit container, true 24-bit full-scale (2^23).
#[derive(Clone, Copy, Debug)]
pub struct S24;

/// 24-bit signed PCM in a 32-bit container at the legacy 2^22 scale.
///
/// This keeps one bit of headroom below true 24-bit full-scale, so a
/// full-scale float lands 6 dB under the device's maximum. Kept for setups
/// tuned against the older conversion.
#[derive(Clone, Copy, Debug)]
pub struct S24Headroom;

/// 32-bit signed PCM.
///
/// Graph samples are `f32`, so only fixed values that are exactly
/// representable as `f32` survive a decode/encode round trip unchanged.
#[derive(Clone, Copy, Debug)]
pub struct S32;

impl FixedFormat for S16 {
    type Sample = i16;

    const FULL_SCALE: f32 = 32_768.0;
    const MIN: i16 = i16::MIN;
    const MAX: i16 = i16::MAX;

    #[inline]
    fn encode(sample: f32) -> i16 {
        if sample >= 1.0 {
            Self::MAX
        } else if sample <= -1.0 {
            Self::MIN
        } else {
            // NaN casts to 0
            (sample * Self::FULL_SCALE).floor() as i16
        }
    }

    #[inline]
    fn decode(sample: i16) -> f32 {
        sample as f32 / Self::FULL_SCALE
    }
}

impl FixedFormat for S24 {
    type Sample = i32;

    const FULL_SCALE: f32 = 8_388_608.0;
    const MIN: i32 = -8_388_608;
    const MAX: i32 = 8_388_607;

    #[inline]
    fn encode(sample: f32) -> i32 {
        encode_i32(sample, Self::FULL_SCALE, Self::MIN, Self::MAX)
    }

    #[inline]
    fn decode(sample: i32) -> f32 {
        sample as f32 / Self::FULL_SCALE
    }
}

impl FixedFormat for S24Headroom {
    type Sample = i32;

    const FULL_SCALE: f32 = 4_194_304.0;
    const MIN: i32 = -4_194_304;
    const MAX: i32 = 4_194_303;

    #[inline]
    fn encode(sample: f32) -> i32 {
        encode_i32(sample, Self::FULL_SCALE, Self::MIN, Self::MAX)
    }

    #[inline]
    fn decode(sample: i32) -> f32 {
        sample as f32 / Self::FULL_SCALE
    }
}

impl FixedFormat for S32 {
    type Sample = i32;

    const FULL_SCALE: f32 = 2_147_483_648.0;
    const MIN: i32 = i32::MIN;
    const MAX: i32 = i32::MAX;

    #[inline]
    fn encode(sample: f32) -> i32 {
        encode_i32(sample, Self::FULL_SCALE, Self::MIN, Self::MAX)
    }

    #[inline]
    fn decode(sample: i32) -> f32 {
        // i32 -> f32 rounds to the nearest representable value first
        sample as f32 / Self::FULL_SCALE
    }
}

#[inline]
fn encode_i32(sample: f32, scale: f32, min: i32, max: i32) -> i32 {
    if sample >= 1.0 {
        max
    } else if sample <= -1.0 {
        min
    } else {
        (sample * scale).floor() as i32
    }
}
