// THEORY:
// Coalesces adjacent segments that share a color.
//
// Same-color regions that only touch diagonally still merge (8-connectivity);
// same-color regions that do not touch at all stay separate segments.

use crate::algorithms::Algorithm;
use crate::algorithms::postprocessing::{Postprocessor, color_raster, segments_from_color_raster};
use crate::core_modules::params::ParamMap;
use crate::core_modules::segmented_image::ColoredSegmentedImage;
use crate::error::Result;
use tracing::debug;

pub const NAME: &str = "merge";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeSegments;

impl MergeSegments {
    pub fn new() -> Self {
        Self
    }

    pub fn from_params(params: &ParamMap) -> Result<Self> {
        params.ensure_known(NAME, &[])?;
        Ok(Self)
    }
}

impl Algorithm for MergeSegments {
    fn name(&self) -> &'static str {
        NAME
    }

    fn params(&self) -> ParamMap {
        ParamMap::new()
    }
}

impl Postprocessor for MergeSegments {
    fn process(&self, segments: &ColoredSegmentedImage) -> Result<ColoredSegmentedImage> {
        let raster = color_raster(segments);
        let merged = segments_from_color_raster(
            &raster,
            segments.width(),
            segments.height(),
            &segments.distinct_colors(),
        )?;
        debug!(before = segments.segment_count(), after = merged.segment_count(), "merged segments");
        Ok(merged)
    }
}
