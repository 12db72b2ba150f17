// THEORY:
// Post-processing rebuilds the partition of a colored region model. Both
// transforms work on a per-pixel color raster rather than on segment ids:
// the old identities are discarded and every output segment is one
// 8-connected component of a single color, with fresh sequential ids.
//
// Output order is fixed so repeated runs compare equal: components are grouped
// by color in order of that color's first appearance in the input segment
// list, and within a color they follow the raster order of their first pixel.

pub mod merge;
pub mod smooth;

use crate::algorithms::Algorithm;
use crate::core_modules::connected_components::connected_components::{Connectivity, label_components};
use crate::core_modules::params::ParamMap;
use crate::core_modules::pixel::pixel::Color;
use crate::core_modules::segment::ColoredSegment;
use crate::core_modules::segmented_image::ColoredSegmentedImage;
use crate::error::Result;

pub use merge::MergeSegments;
pub use smooth::SmoothBoundaries;

pub trait Postprocessor: Algorithm {
    fn process(&self, segments: &ColoredSegmentedImage) -> Result<ColoredSegmentedImage>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Postprocessing {
    Merge(MergeSegments),
    Smooth(SmoothBoundaries),
}

impl Algorithm for Postprocessing {
    fn name(&self) -> &'static str {
        match self {
            Postprocessing::Merge(p) => p.name(),
            Postprocessing::Smooth(p) => p.name(),
        }
    }

    fn params(&self) -> ParamMap {
        match self {
            Postprocessing::Merge(p) => p.params(),
            Postprocessing::Smooth(p) => p.params(),
        }
    }
}

impl Postprocessor for Postprocessing {
    fn process(&self, segments: &ColoredSegmentedImage) -> Result<ColoredSegmentedImage> {
        match self {
            Postprocessing::Merge(p) => p.process(segments),
            Postprocessing::Smooth(p) => p.process(segments),
        }
    }
}

/// Dense row-major color raster; `None` marks unassigned pixels.
pub(crate) fn color_raster(segments: &ColoredSegmentedImage) -> Vec<Option<Color>> {
    let width = segments.width() as usize;
    let mut raster = vec![None; width * segments.height() as usize];
    for segment in segments.segments() {
        for point in &segment.pixels {
            raster[point.y as usize * width + point.x as usize] = Some(segment.color);
        }
    }
    raster
}

/// Splits a color raster into 8-connected single-color segments.
/// `color_order` fixes the grouping; colors missing from it sort last.
pub(crate) fn segments_from_color_raster(
    raster: &[Option<Color>],
    width: u32,
    height: u32,
    color_order: &[Color],
) -> Result<ColoredSegmentedImage> {
    // Color index + 1 per pixel; 0 is the unassigned background.
    let mut colors = color_order.to_vec();
    let indices: Vec<u32> = raster
        .iter()
        .map(|color| match color {
            Some(c) => {
                let index = match colors.iter().position(|known| known == c) {
                    Some(index) => index,
                    None => {
                        colors.push(*c);
                        colors.len() - 1
                    }
                };
                index as u32 + 1
            }
            None => 0,
        })
        .collect();

    let mut components = label_components(&indices, width, height, Connectivity::Eight);
    components.sort_by_key(|component| component.value);

    let segments = components
        .into_iter()
        .enumerate()
        .map(|(id, component)| ColoredSegment::new(id as u32, component.pixels, colors[component.value as usize - 1]))
        .collect();
    ColoredSegmentedImage::from_segments(segments, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::segment::Point;

    const RED: Color = Color::new(255, 0, 0);
    const BLUE: Color = Color::new(0, 0, 255);
    const GREEN: Color = Color::new(0, 255, 0);

    #[test]
    fn components_group_by_color_order_then_raster_order() {
        #[rustfmt::skip]
        let raster = [
            Some(RED),  Some(BLUE), None,       Some(RED),
            Some(RED),  Some(BLUE), None,       Some(GREEN),
        ];
        let rebuilt = segments_from_color_raster(&raster, 4, 2, &[BLUE, RED]).unwrap();
        let summary: Vec<(u32, Color, usize)> = rebuilt
            .segments()
            .iter()
            .map(|s| (s.id, s.color, s.pixels.len()))
            .collect();
        // GREEN is not in the order and sorts last; the two RED blobs keep raster order.
        assert_eq!(summary, vec![(0, BLUE, 2), (1, RED, 2), (2, RED, 1), (3, GREEN, 1)]);
        assert_eq!(rebuilt.segments()[2].pixels, vec![Point::new(3, 0)]);
        assert_eq!(rebuilt.label_at(2, 0), None);
        assert_eq!(rebuilt.label_at(2, 1), None);
    }
}
