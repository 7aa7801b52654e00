//! Multi-file export plans.
//!
//! A plan names the tensors to export, where each one goes, and whether it
//! is packed. Plans are read from JSON manifests or derived from a layout
//! preset over the tensors a model provides.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ExportError, Result};
use crate::export::{ExportConfig, ExportSummary, FormatConfig, DEFAULT_LANES};
use crate::tensor::{Tensor, TensorRole};

/// Anything that can hand out named tensors.
pub trait TensorSource {
    fn tensor_names(&self) -> Vec<String>;
    fn tensor(&self, name: &str) -> Result<Tensor>;
}

impl TensorSource for BTreeMap<String, Tensor> {
    fn tensor_names(&self) -> Vec<String> {
        self.keys().cloned().collect()
    }

    fn tensor(&self, name: &str) -> Result<Tensor> {
        self.get(name)
            .cloned()
            .ok_or_else(|| ExportError::MissingTensor(name.to_string()))
    }
}

/// The two memory layouts the hardware designs consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Preset {
    /// Every tensor one value per line.
    Scalar,
    /// Weights and activations in 16-lane words, biases one per line.
    Vector,
}

impl Preset {
    pub fn lane_count(self, role: TensorRole) -> Option<usize> {
        match (self, role) {
            (Preset::Scalar, _) | (Preset::Vector, TensorRole::Bias) => None,
            (Preset::Vector, TensorRole::Weight | TensorRole::Activation) => Some(DEFAULT_LANES),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub tensor: String,
    /// Output file name relative to the output directory. Defaults to the
    /// tensor name with dots replaced by underscores, plus `.hex`.
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub lane_count: Option<usize>,
}

impl PlanEntry {
    pub fn file_name(&self) -> String {
        match &self.file {
            Some(file) => file.clone(),
            None => format!("{}.hex", self.tensor.replace('.', "_")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportPlan {
    #[serde(default)]
    pub format: FormatConfig,
    pub entries: Vec<PlanEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportedFile {
    pub tensor: String,
    pub path: PathBuf,
    pub summary: ExportSummary,
}

impl ExportPlan {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ExportError::Plan(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// One entry per name, in the order given.
    pub fn from_preset(preset: Preset, format: FormatConfig, names: &[String]) -> Self {
        let entries = names
            .iter()
            .map(|name| PlanEntry {
                tensor: name.clone(),
                file: None,
                lane_count: preset.lane_count(TensorRole::from_name(name)),
            })
            .collect();
        ExportPlan { format, entries }
    }

    pub fn config_for(&self, entry: &PlanEntry) -> ExportConfig {
        ExportConfig {
            format: self.format,
            lane_count: entry.lane_count,
        }
    }

    /// Validate every entry's configuration up front, then export the
    /// entries in order into `out_dir`, creating it if needed.
    pub fn run(&self, source: &impl TensorSource, out_dir: impl AsRef<Path>) -> Result<Vec<ExportedFile>> {
        let out_dir = out_dir.as_ref();
        let exporters = self
            .entries
            .iter()
            .map(|entry| self.config_for(entry).build())
            .collect::<std::result::Result<Vec<_>, _>>()?;

        fs::create_dir_all(out_dir)?;

        let mut written = Vec::with_capacity(self.entries.len());
        for (entry, exporter) in self.entries.iter().zip(&exporters) {
            let tensor = source.tensor(&entry.tensor)?;
            let path = out_dir.join(entry.file_name());
            let summary = exporter.export_to_file(&tensor, &path)?;
            written.push(ExportedFile {
                tensor: entry.tensor.clone(),
                path,
                summary,
            });
        }

        info!(files = written.len(), dir = %out_dir.display(), "export plan complete");
        Ok(written)
    }
}
