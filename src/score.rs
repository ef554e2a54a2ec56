//! Packing of a (service type, score) pair into one 32-bit word.
//!
//! Layout, most significant byte first:
//!
//! | bits  | field                           |
//! |-------|---------------------------------|
//! | 24-31 | service type (`u8`)             |
//! | 8-23  | score (`i16`, two's complement) |
//! | 0-7   | reserved, always zero           |
//!
//! Scores above [`MAX_SCORE`] saturate on encode. Scores below `i16::MIN`
//! saturate to `i16::MIN`.

use bytemuck::{Pod, Zeroable};

/// Highest score that survives encoding unchanged.
pub const MAX_SCORE: i32 = 30_000;

const SERVICE_TYPE_SHIFT: u32 = 24;
const SCORE_SHIFT: u32 = 8;

/// A packed (service type, score) pair as stored in a posting record.
///
/// # Examples
///
/// ```
/// use deskdex::score::{self, AmalgamatedScore};
///
/// let packed = score::encode(3, 42);
/// assert_eq!(packed.service_type(), 3);
/// assert_eq!(packed.score(), 42);
/// assert_eq!(AmalgamatedScore::from_raw(packed.raw()), packed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
#[repr(transparent)]
pub struct AmalgamatedScore(u32);

impl AmalgamatedScore {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub fn service_type(self) -> u8 {
        decode_service_type(self)
    }

    pub fn score(self) -> i16 {
        decode_score(self)
    }
}

/// Pack a service type and a score, saturating the score to
/// `[i16::MIN, MAX_SCORE]`.
pub fn encode(service_type: u8, score: i32) -> AmalgamatedScore {
    let clamped = score.clamp(i32::from(i16::MIN), MAX_SCORE) as i16;
    AmalgamatedScore(
        (u32::from(service_type) << SERVICE_TYPE_SHIFT)
            | (u32::from(clamped as u16) << SCORE_SHIFT),
    )
}

pub fn decode_service_type(item: AmalgamatedScore) -> u8 {
    (item.0 >> SERVICE_TYPE_SHIFT) as u8
}

pub fn decode_score(item: AmalgamatedScore) -> i16 {
    (item.0 >> SCORE_SHIFT) as u16 as i16
}
