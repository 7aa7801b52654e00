//! Fixed-point quantization and hex memory-init export for neural network
//! tensors.
//!
//! Float tensors are quantized to two's-complement fixed point, optionally
//! packed several lanes per memory word, and written as `$readmemh`-style hex
//! text that a hardware testbench can compare byte for byte.

pub mod error;
pub mod export;
pub mod loader;
pub mod matrices;
pub mod packing;
pub mod plan;
pub mod quantization;
pub mod stats;
pub mod tensor;
pub mod writer;

pub use error::{ConfigError, ExportError, Result};
pub use export::{export_to_file, ExportConfig, ExportSummary, Exporter, FormatConfig, DEFAULT_LANES};
pub use packing::{emit_packed, emit_scalar, LaneLayout, PackedWord};
pub use plan::{ExportPlan, PlanEntry, Preset, TensorSource};
pub use quantization::{quantize, FixedPoint, Quantizer, RoundingMode};
pub use tensor::{Tensor, TensorRole};
