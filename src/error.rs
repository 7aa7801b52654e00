//! Error types for configuration, export and model loading

use thiserror::Error;

/// Invalid fixed-point or packing configuration. Always raised before any
/// value is processed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid bit width {0}: must be between 1 and 64")]
    InvalidBits(u32),

    #[error("Invalid bit width {0} for hex output: must be a multiple of 4")]
    UnalignedBits(u32),

    #[error("Invalid fractional bits {frac_bits}: must be less than bit width {bits}")]
    InvalidFracBits { bits: u32, frac_bits: u32 },

    #[error("Invalid lane count {0}: must be at least 1, with at most 4096 bits per word")]
    InvalidLaneCount(usize),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Non-finite value {value} in tensor '{tensor}' at index {index}")]
    NonFinite {
        tensor: String,
        index: usize,
        value: f32,
    },

    #[error("Invalid tensor shape for '{tensor}': {reason}")]
    Shape { tensor: String, reason: String },

    #[error("Export plan error: {0}")]
    Plan(String),

    #[error("Missing tensor: {0}")]
    MissingTensor(String),

    #[error("Model load error: {0}")]
    Load(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;
