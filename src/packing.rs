//! Lane packing and hex record rendering.
//!
//! A packed word is `bits * lane_count` wide with lane 0 in the
//! least-significant sub-field. The hardware memory model addresses lanes
//! this way, so the order is fixed.

use std::fmt;

use crate::error::ConfigError;
use crate::quantization::{field_mask, MAX_BITS};

/// Widest memory word a layout may describe.
pub const MAX_WORD_BITS: usize = 4096;

/// Width of one lane and the number of lanes per memory word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneLayout {
    bits: u32,
    lane_count: usize,
}

impl LaneLayout {
    pub fn new(bits: u32, lane_count: usize) -> Result<Self, ConfigError> {
        check_bits(bits)?;
        match (bits as usize).checked_mul(lane_count) {
            Some(word_bits) if lane_count > 0 && word_bits <= MAX_WORD_BITS => {
                Ok(LaneLayout { bits, lane_count })
            }
            _ => Err(ConfigError::InvalidLaneCount(lane_count)),
        }
    }

    /// One value per word.
    pub fn scalar(bits: u32) -> Result<Self, ConfigError> {
        Self::new(bits, 1)
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn lane_count(&self) -> usize {
        self.lane_count
    }

    pub fn word_bits(&self) -> usize {
        self.bits as usize * self.lane_count
    }

    /// Hex digits per output line.
    pub fn hex_digits(&self) -> usize {
        self.word_bits() / 4
    }

    /// Number of words needed for `len` values.
    pub fn words_for(&self, len: usize) -> usize {
        len.div_ceil(self.lane_count)
    }
}

/// One memory row. Lanes are stored individually, so the word may be far
/// wider than any native integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedWord {
    lanes: Vec<u64>,
    bits: u32,
}

impl PackedWord {
    /// Build a word from up to `layout.lane_count()` values. Each value is
    /// masked to the lane width; missing lanes are zero.
    pub fn from_lanes(layout: &LaneLayout, values: &[u64]) -> Self {
        assert!(
            values.len() <= layout.lane_count,
            "{} values do not fit in {} lanes",
            values.len(),
            layout.lane_count
        );
        let mask = field_mask(layout.bits);
        let mut lanes = vec![0u64; layout.lane_count];
        for (lane, &v) in lanes.iter_mut().zip(values) {
            *lane = v & mask;
        }
        PackedWord {
            lanes,
            bits: layout.bits,
        }
    }

    pub fn lane(&self, index: usize) -> u64 {
        self.lanes[index]
    }

    /// Lanes from least to most significant.
    pub fn lanes(&self) -> &[u64] {
        &self.lanes
    }

    pub fn lane_bits(&self) -> u32 {
        self.bits
    }

    pub fn width_bits(&self) -> usize {
        self.bits as usize * self.lanes.len()
    }

    /// The word as a native integer when it is narrow enough.
    pub fn to_u128(&self) -> Option<u128> {
        if self.width_bits() > 128 {
            return None;
        }
        Some(
            self.lanes
                .iter()
                .enumerate()
                .fold(0u128, |word, (i, &lane)| word | ((lane as u128) << (i * self.bits as usize))),
        )
    }
}

/// Renders the full-width integer: most-significant lane first, each lane
/// zero-padded to `bits / 4` digits.
impl fmt::LowerHex for PackedWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = (self.bits / 4) as usize;
        for lane in self.lanes.iter().rev() {
            write!(f, "{:0width$x}", lane, width = width)?;
        }
        Ok(())
    }
}

/// Split quantized values into words of `layout.lane_count()` lanes. The
/// final word is zero-padded when the length does not divide evenly.
pub fn pack_words<'a>(values: &'a [u64], layout: &'a LaneLayout) -> impl Iterator<Item = PackedWord> + 'a {
    values
        .chunks(layout.lane_count)
        .map(move |chunk| PackedWord::from_lanes(layout, chunk))
}

/// Scalar-mode record: one masked value, `bits / 4` lowercase digits.
pub fn scalar_record(value: u64, bits: u32) -> String {
    format!("{:x}", ScalarRecord { value, bits })
}

/// Shared by [`scalar_record`] and the streaming writer.
pub(crate) struct ScalarRecord {
    pub value: u64,
    pub bits: u32,
}

impl fmt::LowerHex for ScalarRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:0width$x}",
            self.value & field_mask(self.bits),
            width = (self.bits / 4) as usize
        )
    }
}

/// One hex line per value.
pub fn emit_scalar(values: &[u64], bits: u32) -> Result<Vec<String>, ConfigError> {
    check_bits(bits)?;
    Ok(values.iter().map(|&v| scalar_record(v, bits)).collect())
}

/// One hex line per packed word of `lane_count` lanes.
pub fn emit_packed(values: &[u64], bits: u32, lane_count: usize) -> Result<Vec<String>, ConfigError> {
    let layout = LaneLayout::new(bits, lane_count)?;
    Ok(pack_words(values, &layout)
        .map(|word| format!("{:x}", word))
        .collect())
}

/// Hex output needs whole digits per lane.
fn check_bits(bits: u32) -> Result<(), ConfigError> {
    if bits == 0 || bits > MAX_BITS {
        return Err(ConfigError::InvalidBits(bits));
    }
    if bits % 4 != 0 {
        return Err(ConfigError::UnalignedBits(bits));
    }
    Ok(())
}
