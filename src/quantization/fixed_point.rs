use super::{Quantizer, RoundingMode};
use crate::error::ConfigError;

/// Widest supported field. A lane always fits a `u64`.
pub const MAX_BITS: u32 = 64;

// Any f64 at or beyond 2^127 is a multiple of 2^75, so it wraps to zero in
// every field of at most 64 bits.
const WRAP_LIMIT: f64 = (1u128 << 127) as f64;

/// Signed two's-complement fixed-point format: `bits` total, of which
/// `frac_bits` sit after the binary point.
///
/// Quantized values are returned as the unsigned `bits`-wide field, so
/// anything outside the signed range wraps around instead of saturating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPoint {
    bits: u32,
    frac_bits: u32,
    rounding: RoundingMode,
}

impl FixedPoint {
    pub fn new(bits: u32, frac_bits: u32, rounding: RoundingMode) -> Result<Self, ConfigError> {
        if bits == 0 || bits > MAX_BITS {
            return Err(ConfigError::InvalidBits(bits));
        }
        if frac_bits >= bits {
            return Err(ConfigError::InvalidFracBits { bits, frac_bits });
        }
        Ok(FixedPoint {
            bits,
            frac_bits,
            rounding,
        })
    }

    /// The Q8.8 format the hardware datapath uses.
    pub fn q8_8() -> Self {
        FixedPoint {
            bits: 16,
            frac_bits: 8,
            rounding: RoundingMode::HalfEven,
        }
    }

    pub fn frac_bits(&self) -> u32 {
        self.frac_bits
    }

    pub fn rounding(&self) -> RoundingMode {
        self.rounding
    }

    /// `2^frac_bits`, exact in f64.
    pub fn scale(&self) -> f64 {
        (1u64 << self.frac_bits) as f64
    }

    /// Weight of one least-significant bit.
    pub fn step(&self) -> f64 {
        1.0 / self.scale()
    }

    pub fn mask(&self) -> u64 {
        field_mask(self.bits)
    }

    /// Smallest and largest real values representable without wrapping.
    pub fn representable_range(&self) -> (f64, f64) {
        let half = 2f64.powi(self.bits as i32 - 1);
        (-half / self.scale(), (half - 1.0) / self.scale())
    }

    /// Reinterpret the top bit of a field as the sign bit.
    pub fn signed(&self, field: u64) -> i64 {
        let shift = 64 - self.bits;
        ((field << shift) as i64) >> shift
    }

    /// Reduce an already rounded integer into the unsigned field.
    ///
    /// Exact for every finite input. Non-finite inputs map to 0; callers that
    /// care reject them before quantizing.
    fn wrap(&self, raw: f64) -> u64 {
        if !raw.is_finite() || raw.abs() >= WRAP_LIMIT {
            return 0;
        }
        (raw as i128 as u64) & self.mask()
    }
}

impl Default for FixedPoint {
    fn default() -> Self {
        Self::q8_8()
    }
}

impl Quantizer for FixedPoint {
    fn bits(&self) -> u32 {
        self.bits
    }

    fn quantize(&self, real_val: f64) -> u64 {
        self.wrap(self.rounding.round(real_val * self.scale()))
    }

    fn dequantize(&self, q_val: u64) -> f64 {
        self.signed(q_val & self.mask()) as f64 / self.scale()
    }
}

pub fn field_mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}
