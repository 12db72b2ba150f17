// THEORY:
// Segmentation turns a raw RGB raster into a `SegmentedImage` that covers the
// whole image extent. Four strategies with very different computational
// models share that single contract:
//
// 1) `grid`: deterministic square tiling.
// 2) `kmeans`: iterative centroid clustering in a joint position/color space.
// 3) `voronoi`: nearest-seed assignment to randomly sampled pixels in the
//    same feature space.
// 4) `watershed`: marker-based flooding of a gradient map.
//
// Inputs are already `RgbImage`, so the "convertible to 8-bit RGB" check
// happens once, at the boundary (`image_helper::coerce_rgb`), rather than in
// every algorithm.

pub mod grid;
pub mod kmeans;
pub mod voronoi;
pub mod watershed;

use crate::algorithms::Algorithm;
use crate::core_modules::features::{self, Feature};
use crate::core_modules::params::ParamMap;
use crate::core_modules::segmented_image::SegmentedImage;
use crate::error::Result;
use image::RgbImage;

pub use grid::GridSegmentation;
pub use kmeans::KMeansSegmentation;
pub use voronoi::VoronoiSegmentation;
pub use watershed::WatershedSegmentation;

/// Capability of producing a full-coverage partition from an image.
pub trait Segmenter: Algorithm {
    fn segment(&self, image: &RgbImage) -> Result<SegmentedImage>;
}

/// The closed set of segmentation strategies.
#[derive(Debug, Clone, PartialEq)]
pub enum Segmentation {
    Grid(GridSegmentation),
    KMeans(KMeansSegmentation),
    Voronoi(VoronoiSegmentation),
    Watershed(WatershedSegmentation),
}

impl Algorithm for Segmentation {
    fn name(&self) -> &'static str {
        match self {
            Segmentation::Grid(s) => s.name(),
            Segmentation::KMeans(s) => s.name(),
            Segmentation::Voronoi(s) => s.name(),
            Segmentation::Watershed(s) => s.name(),
        }
    }

    fn params(&self) -> ParamMap {
        match self {
            Segmentation::Grid(s) => s.params(),
            Segmentation::KMeans(s) => s.params(),
            Segmentation::Voronoi(s) => s.params(),
            Segmentation::Watershed(s) => s.params(),
        }
    }
}

impl Segmenter for Segmentation {
    fn segment(&self, image: &RgbImage) -> Result<SegmentedImage> {
        match self {
            Segmentation::Grid(s) => s.segment(image),
            Segmentation::KMeans(s) => s.segment(image),
            Segmentation::Voronoi(s) => s.segment(image),
            Segmentation::Watershed(s) => s.segment(image),
        }
    }
}

/// Labels each pixel with the index of its nearest centre in feature space.
pub(crate) fn nearest_labels(points: &[Feature], centres: &[Feature]) -> Vec<u32> {
    points
        .iter()
        .map(|point| features::nearest(point, centres).0 as u32)
        .collect()
}
