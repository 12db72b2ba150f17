// THEORY:
// Color assignment judges each segment by its average color and picks the
// palette entry closest to it. The average is the integer-truncated mean of
// each channel over the segment's pixels in the source image. The nearest
// palette color is the first one at minimal Euclidean distance, so palette
// order only matters for ties. Geometry is untouched: the result has the same
// ids and the same pixel sets as the input.

use crate::algorithms::Algorithm;
use crate::core_modules::palette::Palette;
use crate::core_modules::params::ParamMap;
use crate::core_modules::pixel::pixel::{Color, ColorAccumulator};
use crate::core_modules::segment::{Region, Segment};
use crate::core_modules::segmented_image::{ColoredSegmentedImage, SegmentedImage};
use crate::error::{PbnError, Result};
use image::RgbImage;

pub trait ColorAssigner: Algorithm {
    fn assign(&self, image: &RgbImage, segments: &SegmentedImage, palette: &Palette)
    -> Result<ColoredSegmentedImage>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    AverageNearest,
}

impl Assignment {
    pub(crate) fn with_params(self, params: &ParamMap) -> Result<Self> {
        params.ensure_known(self.name(), &[])?;
        Ok(self)
    }
}

impl Algorithm for Assignment {
    fn name(&self) -> &'static str {
        match self {
            Assignment::AverageNearest => "average-nearest",
        }
    }

    fn params(&self) -> ParamMap {
        ParamMap::new()
    }
}

impl ColorAssigner for Assignment {
    fn assign(
        &self,
        image: &RgbImage,
        segments: &SegmentedImage,
        palette: &Palette,
    ) -> Result<ColoredSegmentedImage> {
        match self {
            Assignment::AverageNearest => assign_average_nearest(image, segments, palette),
        }
    }
}

/// Truncated mean color of `segment`'s pixels in `image`.
pub fn average_color<R: Region>(image: &RgbImage, segment: &R) -> Color {
    let mut accumulator = ColorAccumulator::new();
    for point in segment.pixels() {
        accumulator.add(Color::from(image.get_pixel(point.x, point.y)));
    }
    accumulator.average()
}

pub fn assign_average_nearest(
    image: &RgbImage,
    segments: &SegmentedImage,
    palette: &Palette,
) -> Result<ColoredSegmentedImage> {
    if image.dimensions() != (segments.width(), segments.height()) {
        return Err(PbnError::invalid(
            "average-nearest",
            format!(
                "image is {}x{} but the segmentation is {}x{}",
                image.width(),
                image.height(),
                segments.width(),
                segments.height()
            ),
        ));
    }

    let colored = segments
        .segments()
        .iter()
        .map(|segment: &Segment| {
            let color = palette.nearest(&average_color(image, segment));
            segment.clone().with_color(color)
        })
        .collect();
    ColoredSegmentedImage::from_segments(colored, segments.width(), segments.height())
}
