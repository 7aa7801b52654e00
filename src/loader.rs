//! Tensor input for the command-line exporter.
//!
//! The export core only sees [`Tensor`] values; these loaders are the
//! model-side collaborators that produce them.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use half::{bf16, f16};
use safetensors::{Dtype, SafeTensors};

use crate::error::{ExportError, Result};
use crate::plan::TensorSource;
use crate::tensor::Tensor;

/// Named tensors from a `.safetensors` file. F16 and BF16 are widened to
/// f32 on load.
pub struct SafetensorsLoader {
    data: Vec<u8>,
    names: Vec<String>,
}

impl SafetensorsLoader {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_bytes(fs::read(path)?)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let mut names: Vec<String> = SafeTensors::deserialize(&data)
            .map_err(|e| ExportError::Load(e.to_string()))?
            .names()
            .into_iter()
            .map(String::from)
            .collect();
        // The header does not preserve insertion order.
        names.sort();
        Ok(Self { data, names })
    }

    fn tensors(&self) -> Result<SafeTensors<'_>> {
        SafeTensors::deserialize(&self.data).map_err(|e| ExportError::Load(e.to_string()))
    }
}

impl TensorSource for SafetensorsLoader {
    /// Sorted by name.
    fn tensor_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn tensor(&self, name: &str) -> Result<Tensor> {
        let tensors = self.tensors()?;
        let view = tensors
            .tensor(name)
            .map_err(|_| ExportError::MissingTensor(name.to_string()))?;

        let data = view.data();
        let flat: Vec<f32> = match view.dtype() {
            Dtype::F32 => data
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
            Dtype::F16 => data
                .chunks_exact(2)
                .map(|b| f16::from_le_bytes([b[0], b[1]]).to_f32())
                .collect(),
            Dtype::BF16 => data
                .chunks_exact(2)
                .map(|b| bf16::from_le_bytes([b[0], b[1]]).to_f32())
                .collect(),
            other => {
                return Err(ExportError::Load(format!(
                    "tensor '{}' has dtype {:?}, expected F32, F16 or BF16",
                    name, other
                )));
            }
        };

        Tensor::new(name, view.shape().to_vec(), flat)
    }
}

/// Read a single tensor stored as JSON `{"name", "shape", "flat"}`.
pub fn load_json_tensor(path: impl AsRef<Path>) -> Result<Tensor> {
    let json = fs::read_to_string(path)?;
    let tensor: Tensor = serde_json::from_str(&json)?;
    tensor.validate()?;
    Ok(tensor)
}

/// Merge several sources into one map; later sources win on name clashes.
pub fn collect_tensors(sources: &[&dyn TensorSource]) -> Result<BTreeMap<String, Tensor>> {
    let mut all = BTreeMap::new();
    for source in sources {
        for name in source.tensor_names() {
            let tensor = source.tensor(&name)?;
            all.insert(name, tensor);
        }
    }
    Ok(all)
}

#[cfg(test)]
mod tests {
    use safetensors::tensor::TensorView;

    use super::*;

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn model_bytes() -> Vec<u8> {
        let weight = f32_bytes(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let bias: Vec<u8> = [f16::from_f32(0.5), f16::from_f32(-1.5)]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let views = vec![
            (
                "fc1.weight",
                TensorView::new(Dtype::F32, vec![2, 3], &weight).unwrap(),
            ),
            ("fc1.bias", TensorView::new(Dtype::F16, vec![2], &bias).unwrap()),
        ];
        safetensors::serialize(views, &None).unwrap()
    }

    #[test]
    fn loads_f32_and_f16_tensors() {
        let loader = SafetensorsLoader::from_bytes(model_bytes()).unwrap();
        assert_eq!(loader.tensor_names(), vec!["fc1.bias", "fc1.weight"]);

        let w = loader.tensor("fc1.weight").unwrap();
        assert_eq!(w.shape, vec![2, 3]);
        assert_eq!(w.flat, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let b = loader.tensor("fc1.bias").unwrap();
        assert_eq!(b.flat, vec![0.5, -1.5]);
    }

    #[test]
    fn missing_tensor() {
        let loader = SafetensorsLoader::from_bytes(model_bytes()).unwrap();
        assert!(matches!(
            loader.tensor("fc9.weight"),
            Err(ExportError::MissingTensor(_))
        ));
    }

    #[test]
    fn corrupt_file_is_rejected() {
        assert!(matches!(
            SafetensorsLoader::from_bytes(vec![1, 2, 3]),
            Err(ExportError::Load(_))
        ));
    }

    #[test]
    fn merges_sources() {
        let loader = SafetensorsLoader::from_bytes(model_bytes()).unwrap();
        let mut extra = BTreeMap::new();
        extra.insert("input".to_string(), Tensor::vector("input", vec![0.25]));
        let sources: [&dyn TensorSource; 2] = [&loader, &extra];
        let all = collect_tensors(&sources).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.contains_key("input"));
    }
}
