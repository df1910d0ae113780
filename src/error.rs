//! Error types for layered-nn.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NnError>;

#[derive(Error, Debug)]
pub enum NnError {
    /// Operand shapes are incompatible for the requested operation.
    #[error("dimension mismatch in {op}: left is {}x{}, right is {}x{}", left.0, left.1, right.0, right.1)]
    DimensionMismatch {
        op: &'static str,
        left: (usize, usize),
        right: (usize, usize),
    },

    /// Layer `index` produces `output_size` values but layer `index + 1` expects `next_input_size`.
    #[error("layer {index} outputs {output_size} values but layer {} expects {next_input_size}", index + 1)]
    TopologyMismatch {
        index: usize,
        output_size: usize,
        next_input_size: usize,
    },

    #[error("layer sizes must be positive, got {input_size} -> {output_size}")]
    InvalidLayerSize {
        input_size: usize,
        output_size: usize,
    },

    #[error("matrix dimensions must be positive, got {rows}x{cols}")]
    EmptyMatrix {
        rows: usize,
        cols: usize,
    },

    /// A value that JSON cannot carry (NaN or ±inf) was about to be persisted.
    #[error("cannot persist non-finite value: {0}")]
    NonFinite(String),

    #[error("a network needs at least one layer")]
    EmptyNetwork,

    #[error("unknown activation function: {0}")]
    UnknownActivation(String),

    /// A persisted matrix, layer, or network record is missing fields or is inconsistent.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
