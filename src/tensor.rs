//! Named, shaped f32 tensors handed over by the model-loading side.

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};
use crate::matrices::Matrix;

/// How a tensor is laid out in hardware memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorRole {
    /// 2-D `[out_dim, in_dim]` weight matrix, one output row contiguous.
    Weight,
    Bias,
    /// Input or intermediate activation vector.
    Activation,
}

impl TensorRole {
    /// Role implied by a parameter name such as `fc1.weight` or `fc2_biases`.
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.contains("weight") {
            TensorRole::Weight
        } else if lower.contains("bias") {
            TensorRole::Bias
        } else {
            TensorRole::Activation
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub name: String,
    pub shape: Vec<usize>,
    pub flat: Vec<f32>,
}

impl Tensor {
    pub fn new(name: impl Into<String>, shape: Vec<usize>, flat: Vec<f32>) -> Result<Self> {
        let tensor = Tensor {
            name: name.into(),
            shape,
            flat,
        };
        tensor.validate()?;
        Ok(tensor)
    }

    /// A 1-D tensor over `flat`.
    pub fn vector(name: impl Into<String>, flat: Vec<f32>) -> Self {
        Tensor {
            name: name.into(),
            shape: vec![flat.len()],
            flat,
        }
    }

    pub fn from_matrix(name: impl Into<String>, matrix: &Matrix<f32>) -> Self {
        Tensor {
            name: name.into(),
            shape: vec![matrix.rows, matrix.cols],
            flat: matrix.flatten_row_major(),
        }
    }

    /// Shape entries are positive and multiply out to the flat length.
    /// Deserialized tensors are not checked until this runs.
    pub fn validate(&self) -> Result<()> {
        if self.shape.iter().any(|&d| d == 0) {
            return Err(self.shape_error(format!("zero-sized dimension in {:?}", self.shape)));
        }
        let expected: usize = self.shape.iter().product();
        if expected != self.flat.len() {
            return Err(self.shape_error(format!(
                "shape {:?} holds {} values, got {}",
                self.shape,
                expected,
                self.flat.len()
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.flat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flat.is_empty()
    }

    pub fn role(&self) -> TensorRole {
        TensorRole::from_name(&self.name)
    }

    pub fn weight_matrix(&self) -> Result<Matrix<f32>> {
        match self.shape.as_slice() {
            &[out_dim, in_dim] => Ok(Matrix {
                data: self.flat.clone(),
                rows: out_dim,
                cols: in_dim,
            }),
            other => Err(self.shape_error(format!(
                "weight matrix must be 2-D [out_dim, in_dim], got {:?}",
                other
            ))),
        }
    }

    /// Values in the order they are laid out in memory: per output row for
    /// weight matrices, natural flatten order otherwise.
    pub fn export_order(&self) -> Result<Vec<f32>> {
        self.validate()?;
        match self.role() {
            TensorRole::Weight => Ok(self.weight_matrix()?.flatten_row_major()),
            TensorRole::Bias | TensorRole::Activation => Ok(self.flat.clone()),
        }
    }

    fn shape_error(&self, reason: String) -> ExportError {
        ExportError::Shape {
            tensor: self.name.clone(),
            reason,
        }
    }
}
