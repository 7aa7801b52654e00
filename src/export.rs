//! Tensor → hex memory-init export pipeline.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConfigError, ExportError, Result};
use crate::packing::LaneLayout;
use crate::quantization::{quantize_and_pack, FixedPoint, Quantizer, RoundingMode};
use crate::tensor::Tensor;
use crate::writer::HexWriter;

/// Lanes per word in the vectorized memory layout.
pub const DEFAULT_LANES: usize = 16;

/// Numeric format shared by every file of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatConfig {
    pub bits: u32,
    pub frac_bits: u32,
    #[serde(default)]
    pub rounding: RoundingMode,
}

impl Default for FormatConfig {
    fn default() -> Self {
        FormatConfig {
            bits: 16,
            frac_bits: 8,
            rounding: RoundingMode::HalfEven,
        }
    }
}

impl FormatConfig {
    pub fn quantizer(&self) -> std::result::Result<FixedPoint, ConfigError> {
        FixedPoint::new(self.bits, self.frac_bits, self.rounding)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(flatten)]
    pub format: FormatConfig,
    /// Absent or 1 writes one value per line.
    #[serde(default)]
    pub lane_count: Option<usize>,
}

impl ExportConfig {
    pub fn scalar(format: FormatConfig) -> Self {
        ExportConfig {
            format,
            lane_count: None,
        }
    }

    pub fn packed(format: FormatConfig, lane_count: usize) -> Self {
        ExportConfig {
            format,
            lane_count: Some(lane_count),
        }
    }

    /// Check the whole configuration before any value is touched.
    pub fn build(&self) -> std::result::Result<Exporter, ConfigError> {
        let quantizer = self.format.quantizer()?;
        let layout = LaneLayout::new(self.format.bits, self.lane_count.unwrap_or(1))?;
        Ok(Exporter { quantizer, layout })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    pub values: usize,
    pub lines: usize,
}

/// A validated export configuration. Holds no state between calls, so one
/// exporter may serve many tensors and threads.
#[derive(Debug, Clone, Copy)]
pub struct Exporter {
    quantizer: FixedPoint,
    layout: LaneLayout,
}

impl Exporter {
    pub fn quantizer(&self) -> &FixedPoint {
        &self.quantizer
    }

    pub fn layout(&self) -> &LaneLayout {
        &self.layout
    }

    pub fn is_scalar(&self) -> bool {
        self.layout.lane_count() == 1
    }

    /// Flatten `tensor` in memory order and stream its records to `sink`.
    pub fn export_tensor<W: Write>(&self, tensor: &Tensor, sink: W) -> Result<ExportSummary> {
        let values = tensor.export_order()?;
        debug!(
            tensor = %tensor.name,
            shape = ?tensor.shape,
            lanes = self.layout.lane_count(),
            "exporting tensor"
        );
        self.export_values(&tensor.name, &values, sink)
    }

    /// Quantize `values` in order and stream the records to `sink`. A
    /// non-finite value aborts the export before its record is written.
    pub fn export_values<W: Write>(&self, name: &str, values: &[f32], sink: W) -> Result<ExportSummary> {
        let mut writer = HexWriter::new(sink);
        let bits = self.quantizer.bits();
        let lane_count = self.layout.lane_count();

        for (chunk_idx, chunk) in values.chunks(lane_count).enumerate() {
            if let Some(offset) = chunk.iter().position(|v| !v.is_finite()) {
                return Err(ExportError::NonFinite {
                    tensor: name.to_string(),
                    index: chunk_idx * lane_count + offset,
                    value: chunk[offset],
                });
            }

            let word = quantize_and_pack(&self.quantizer, &self.layout, chunk);
            if self.is_scalar() {
                writer.write_scalar(word.lane(0), bits)?;
            } else {
                writer.write_word(&word)?;
            }
        }

        let lines = writer.lines_written();
        writer.finish()?;
        Ok(ExportSummary {
            values: values.len(),
            lines,
        })
    }

    /// Create or truncate `path` and write every record of `tensor` to it.
    /// On error the file may be left incomplete; rerunning the export
    /// rewrites it from scratch.
    pub fn export_to_file(&self, tensor: &Tensor, path: impl AsRef<Path>) -> Result<ExportSummary> {
        let path = path.as_ref();
        let file = File::create(path)?;
        let summary = self.export_tensor(tensor, BufWriter::new(file))?;
        info!(
            tensor = %tensor.name,
            path = %path.display(),
            values = summary.values,
            lines = summary.lines,
            "wrote hex file"
        );
        Ok(summary)
    }
}

/// Convenience wrapper: validate `config`, then export `tensor` to `path`.
pub fn export_to_file(tensor: &Tensor, config: &ExportConfig, path: impl AsRef<Path>) -> Result<ExportSummary> {
    config.build()?.export_to_file(tensor, path)
}
