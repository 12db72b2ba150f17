// THEORY:
// Every failure the engine can produce is terminal for the current run, so a
// single error enum is enough. The variants are split along the lines a caller
// cares about: bad configuration (`InvalidParameter`, `UnknownAlgorithm`,
// `Config`), bad input data (`UnsupportedImageMode`, `InvalidPaletteEntry`,
// `EmptyPalette`, `MalformedLabels`), broken region-model invariants
// (`PartitionViolation`, `DuplicateIdentifier`, `PixelOutOfBounds`,
// `MissingColorAssignment`) and plain I/O.

use crate::core_modules::segment::SegmentId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PbnError {
    #[error("invalid parameter for {algorithm}: {message}")]
    InvalidParameter { algorithm: String, message: String },

    #[error("unsupported image mode: {0}")]
    UnsupportedImageMode(String),

    #[error("pixel ({x}, {y}) is claimed by segments {first} and {second}")]
    PartitionViolation {
        x: u32,
        y: u32,
        first: SegmentId,
        second: SegmentId,
    },

    #[error("segment id {0} appears more than once")]
    DuplicateIdentifier(SegmentId),

    #[error("segment {id} contains pixel ({x}, {y}) outside a {width}x{height} image")]
    PixelOutOfBounds {
        id: SegmentId,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    #[error("segment {0} has no color assignment")]
    MissingColorAssignment(SegmentId),

    #[error("label raster row {row} has {found} cells, expected {expected}")]
    MalformedLabels {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("invalid palette entry on line {line} ({content:?}): {reason}")]
    InvalidPaletteEntry {
        line: usize,
        content: String,
        reason: String,
    },

    #[error("palette contains no colors")]
    EmptyPalette,

    #[error("unknown {stage} algorithm: {name}")]
    UnknownAlgorithm { stage: &'static str, name: String },

    #[error("pipeline configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl PbnError {
    pub(crate) fn invalid(algorithm: &str, message: impl Into<String>) -> Self {
        PbnError::InvalidParameter {
            algorithm: algorithm.to_string(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for PbnError {
    fn from(err: serde_json::Error) -> Self {
        PbnError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PbnError>;
