use std::ops::Range;

use rand::Rng;

use crate::error::{ExportError, Result};
use crate::quantization::Quantizer;

/// Dense row-major matrix. For weight matrices a row holds every input
/// weight of one output unit, i.e. the shape is `[out_dim, in_dim]`.
#[derive(PartialEq, Debug, Clone)]
pub struct Matrix<T> {
    pub data: Vec<T>,
    pub rows: usize,
    pub cols: usize,
}

impl<T> Matrix<T>
where
    T: Copy,
{
    pub fn from_rows(rows: &[Vec<T>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(ExportError::Shape {
                    tensor: String::from("matrix"),
                    reason: format!("row {} has {} columns, expected {}", i, row.len(), cols),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Matrix {
            data,
            rows: rows.len(),
            cols,
        })
    }

    pub fn row(&self, index: usize) -> &[T] {
        &self.data[index * self.cols..(index + 1) * self.cols]
    }

    /// Every row in full, rows ascending. The hardware expects one output
    /// unit's weights contiguous in memory, so this order is fixed.
    pub fn flatten_row_major(&self) -> Vec<T> {
        let mut flat = Vec::with_capacity(self.rows * self.cols);
        for out_idx in 0..self.rows {
            flat.extend_from_slice(self.row(out_idx));
        }
        flat
    }
}

impl Matrix<f32> {
    /// Quantize every entry, keeping the row-major layout.
    pub fn quantize(&self, quantizer: &impl Quantizer) -> Matrix<u64> {
        Matrix {
            data: self
                .data
                .iter()
                .map(|&v| quantizer.quantize(v as f64))
                .collect(),
            rows: self.rows,
            cols: self.cols,
        }
    }

    pub fn random(rows: usize, cols: usize, range: Range<f32>) -> Self {
        let size = rows * cols;
        let mut data = Vec::<f32>::with_capacity(size);

        let mut rng = rand::rng();

        for _ in 0..size {
            data.push(rng.random_range(range.clone()));
        }

        Matrix { data, rows, cols }
    }

    pub fn random_square(dimension: usize, range: Range<f32>) -> Self {
        Self::random(dimension, dimension, range)
    }

    /// `None` for an empty matrix.
    pub fn min_and_max(&self) -> Option<(f32, f32)> {
        min_and_max(&self.data)
    }
}

impl Matrix<u64> {
    pub fn dequantize(&self, quantizer: &impl Quantizer) -> Matrix<f32> {
        Matrix {
            data: self
                .data
                .iter()
                .map(|&q| quantizer.dequantize(q) as f32)
                .collect(),
            rows: self.rows,
            cols: self.cols,
        }
    }
}

/// NaN entries are skipped.
pub fn min_and_max(values: &[f32]) -> Option<(f32, f32)> {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}
