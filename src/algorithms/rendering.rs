// THEORY:
// Paints a colored region model back into a flat raster.

use crate::algorithms::Algorithm;
use crate::core_modules::params::ParamMap;
use crate::core_modules::pixel::pixel::Color;
use crate::core_modules::segment::SegmentId;
use crate::core_modules::segmented_image::ColoredSegmentedImage;
use crate::error::Result;
use image::RgbImage;
use std::collections::BTreeMap;

pub const COLORED: &str = "colored";

/// A rendered image, plus the id to color map when it was requested.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub image: RgbImage,
    pub color_map: Option<BTreeMap<SegmentId, Color>>,
}

pub trait Renderer: Algorithm {
    fn render(&self, segments: &ColoredSegmentedImage) -> Result<Rendered>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendering {
    /// Fills every segment with its color. Unassigned pixels stay black.
    Colored { color_map: bool },
}

impl Default for Rendering {
    fn default() -> Self {
        Rendering::Colored { color_map: false }
    }
}

impl Rendering {
    pub fn colored_from_params(params: &ParamMap) -> Result<Self> {
        params.ensure_known(COLORED, &["color_map"])?;
        Ok(Rendering::Colored {
            color_map: params.bool(COLORED, "color_map")?.unwrap_or(false),
        })
    }
}

impl Algorithm for Rendering {
    fn name(&self) -> &'static str {
        match self {
            Rendering::Colored { .. } => COLORED,
        }
    }

    fn params(&self) -> ParamMap {
        match self {
            Rendering::Colored { color_map: true } => ParamMap::new().with("color_map", true),
            Rendering::Colored { color_map: false } => ParamMap::new(),
        }
    }
}

impl Renderer for Rendering {
    fn render(&self, segments: &ColoredSegmentedImage) -> Result<Rendered> {
        match self {
            Rendering::Colored { color_map } => Ok(Rendered {
                image: paint(segments),
                color_map: color_map.then(|| segments.color_map()),
            }),
        }
    }
}

/// Fresh raster with every segment pixel set to the segment's color.
pub fn paint(segments: &ColoredSegmentedImage) -> RgbImage {
    let mut output = RgbImage::new(segments.width(), segments.height());
    for segment in segments.segments() {
        for point in &segment.pixels {
            output.put_pixel(point.x, point.y, segment.color.into());
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::segment::{ColoredSegment, Point};
    use image::Rgb;

    fn sample() -> ColoredSegmentedImage {
        let segments = vec![
            ColoredSegment::new(2, vec![Point::new(0, 0), Point::new(1, 0)], Color::new(10, 20, 30)),
            ColoredSegment::new(7, vec![Point::new(1, 1)], Color::WHITE),
        ];
        ColoredSegmentedImage::from_segments(segments, 2, 2).unwrap()
    }

    #[test]
    fn paints_segments_and_leaves_the_rest_black() {
        let rendered = Rendering::default().render(&sample()).unwrap();
        assert_eq!(rendered.image.get_pixel(1, 0), &Rgb([10, 20, 30]));
        assert_eq!(rendered.image.get_pixel(1, 1), &Rgb([255, 255, 255]));
        assert_eq!(rendered.image.get_pixel(0, 1), &Rgb([0, 0, 0]));
        assert!(rendered.color_map.is_none());
    }

    #[test]
    fn optional_color_map() {
        let renderer = Rendering::colored_from_params(&ParamMap::new().with("color_map", true)).unwrap();
        let rendered = renderer.render(&sample()).unwrap();
        let map = rendered.color_map.unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&7], Color::WHITE);
        assert_eq!(renderer.params().bool(COLORED, "color_map").unwrap(), Some(true));
    }
}
