//! Round-trip error statistics for choosing a fixed-point format.
//!
//! The export path never reports range loss; these numbers are for humans.

use crate::matrices::min_and_max;
use crate::quantization::{FixedPoint, Quantizer};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantizationStats {
    pub count: usize,
    pub min: f32,
    pub max: f32,
    pub mean_squared_error: f64,
    pub max_abs_error: f64,
    /// Values outside the representable signed range. These wrap.
    pub wrapped: usize,
    pub non_finite: usize,
}

impl QuantizationStats {
    /// `None` when `values` holds no finite value.
    pub fn compute(values: &[f32], quantizer: &FixedPoint) -> Option<Self> {
        let (min, max) = min_and_max(values)?;
        // Signed field bounds, applied after rounding so either tie rule
        // counts exactly the values that wrap.
        let half = 2f64.powi(quantizer.bits() as i32 - 1);
        let (lo, hi) = (-half, half - 1.0);

        let mut count = 0;
        let mut sum_sq = 0.0;
        let mut max_abs_error: f64 = 0.0;
        let mut wrapped = 0;
        let mut non_finite = 0;

        for &v in values {
            if !v.is_finite() {
                non_finite += 1;
                continue;
            }
            let v = v as f64;
            count += 1;
            let raw = quantizer.rounding().round(v * quantizer.scale());
            if raw < lo || raw > hi {
                wrapped += 1;
            }
            let err = v - quantizer.dequantize(quantizer.quantize(v));
            sum_sq += err * err;
            max_abs_error = max_abs_error.max(err.abs());
        }

        if count == 0 {
            return None;
        }

        Some(QuantizationStats {
            count,
            min,
            max,
            mean_squared_error: sum_sq / count as f64,
            max_abs_error,
            wrapped,
            non_finite,
        })
    }
}

pub fn mean_squared_error(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Number of values must be equal");
    let n = a.len() as f32;
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x - y).powi(2))
        .sum::<f32>()
        / n
}
