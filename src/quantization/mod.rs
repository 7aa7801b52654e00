pub mod fixed_point;
pub mod rounding;

pub use fixed_point::{field_mask, FixedPoint, MAX_BITS};
pub use rounding::RoundingMode;

use crate::error::ConfigError;
use crate::packing::{LaneLayout, PackedWord};

pub trait Quantizer {
    /// Width of the unsigned field every quantized value is masked to.
    fn bits(&self) -> u32;
    fn quantize(&self, real_val: f64) -> u64;
    fn dequantize(&self, q_val: u64) -> f64;
}

/// One-off conversion with the default rounding rule. Prefer building a
/// [`FixedPoint`] once when converting many values.
pub fn quantize(value: f64, bits: u32, frac_bits: u32) -> Result<u64, ConfigError> {
    Ok(FixedPoint::new(bits, frac_bits, RoundingMode::default())?.quantize(value))
}

/// Quantize up to `layout.lane_count()` values into a single word, value 0 in
/// the least-significant lane. Missing trailing lanes are zero.
pub fn quantize_and_pack(quantizer: &impl Quantizer, layout: &LaneLayout, values: &[f32]) -> PackedWord {
    let lanes: Vec<u64> = values
        .iter()
        .map(|&v| quantizer.quantize(v as f64))
        .collect();
    PackedWord::from_lanes(layout, &lanes)
}
