// THEORY:
// This file is the main entry point for the `paint_by_number` library crate.
// It turns a source image and a fixed palette into a flat-colored
// "paint-by-number" rendering.
//
// The primary entry point is `Pipeline`: build it from a `PipelineConfig`
// (or from individual stages), then `run` it on an image and a `Palette`.
// The region model (`SegmentedImage`, `ColoredSegmentedImage`) and every
// algorithm are public as well, so each stage can also be used on its own.

pub mod algorithms;
pub mod core_modules;
pub mod diagnostics;
pub mod error;
pub mod output;
pub mod pipeline;

pub use core_modules::palette::Palette;
pub use core_modules::params::{ParamMap, ParamValue, StageSpec};
pub use core_modules::pixel::pixel::Color;
pub use core_modules::segment::{ColoredSegment, Point, Region, Segment, SegmentId};
pub use core_modules::segmented_image::{ColoredSegmentedImage, RegionModel, SegmentedImage};
pub use error::{PbnError, Result};
pub use pipeline::{Pipeline, PipelineConfig, PipelineOutput, PipelineStage};
