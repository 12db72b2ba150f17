// THEORY:
// Boundary smoothing runs grayscale morphology on a raster of color indices.
//
// Algorithm steps:
// 1.  **Indexing**: Each distinct color gets an index in order of first
//     appearance in the segment list. Unassigned pixels get a reserved index
//     one past the last color.
// 2.  **Morphology**: `iterations` rounds of closing followed by opening with
//     a disk or square element of radius `kernel_size`.
// 3.  **Repair**: Morphology never invents values, but it can erase a color
//     completely or spread the reserved index over assigned pixels. Pixels of
//     an erased color, and assigned pixels that picked up the reserved index,
//     take the most common valid index among their 3x3 neighbours (lowest
//     index on ties). Pixels that started unassigned stay unassigned.
// 4.  **Re-segmentation**: 8-connected components of the repaired raster
//     become the new segments, with fresh ids.
//
// Thin regions can disappear; the result is not idempotent in general.

use crate::algorithms::Algorithm;
use crate::algorithms::postprocessing::{Postprocessor, color_raster, segments_from_color_raster};
use crate::core_modules::morphology::{KernelShape, StructuringElement, close, open};
use crate::core_modules::params::ParamMap;
use crate::core_modules::pixel::pixel::Color;
use crate::core_modules::segmented_image::ColoredSegmentedImage;
use crate::error::{PbnError, Result};
use tracing::debug;

pub const NAME: &str = "smooth";

#[derive(Debug, Clone, PartialEq)]
pub struct SmoothBoundaries {
    pub iterations: u32,
    /// Radius of the structuring element.
    pub kernel_size: u32,
    pub kernel_shape: KernelShape,
}

impl Default for SmoothBoundaries {
    fn default() -> Self {
        Self {
            iterations: 1,
            kernel_size: 1,
            kernel_shape: KernelShape::Disk,
        }
    }
}

impl SmoothBoundaries {
    pub fn new(iterations: u32, kernel_size: u32, kernel_shape: KernelShape) -> Result<Self> {
        if iterations < 1 {
            return Err(PbnError::invalid(NAME, "iterations must be >= 1"));
        }
        if kernel_size < 1 {
            return Err(PbnError::invalid(NAME, "kernel_size must be >= 1"));
        }
        Ok(Self {
            iterations,
            kernel_size,
            kernel_shape,
        })
    }

    pub fn from_params(params: &ParamMap) -> Result<Self> {
        params.ensure_known(NAME, &["iterations", "kernel_size", "kernel_shape"])?;
        let defaults = Self::default();
        let iterations = params.int(NAME, "iterations")?.unwrap_or(defaults.iterations as i64);
        let kernel_size = params.int(NAME, "kernel_size")?.unwrap_or(defaults.kernel_size as i64);
        let kernel_shape = match params.text("kernel_shape") {
            Some(text) => text
                .parse::<KernelShape>()
                .map_err(|_| PbnError::invalid(NAME, format!("kernel_shape must be disk or square, got {text}")))?,
            None => defaults.kernel_shape,
        };
        let to_u32 = |key: &str, value: i64| {
            u32::try_from(value).map_err(|_| PbnError::invalid(NAME, format!("{key} must be >= 1, got {value}")))
        };
        Self::new(to_u32("iterations", iterations)?, to_u32("kernel_size", kernel_size)?, kernel_shape)
    }
}

impl Algorithm for SmoothBoundaries {
    fn name(&self) -> &'static str {
        NAME
    }

    fn params(&self) -> ParamMap {
        ParamMap::new()
            .with("iterations", self.iterations)
            .with("kernel_size", self.kernel_size)
            .with("kernel_shape", self.kernel_shape.to_string().as_str())
    }
}

impl Postprocessor for SmoothBoundaries {
    fn process(&self, segments: &ColoredSegmentedImage) -> Result<ColoredSegmentedImage> {
        let (width, height) = (segments.width(), segments.height());
        let colors = segments.distinct_colors();
        let reserved = colors.len() as i32;

        let original: Vec<i32> = color_raster(segments)
            .into_iter()
            .map(|color| match color {
                Some(c) => colors.iter().position(|known| *known == c).map_or(reserved, |i| i as i32),
                None => reserved,
            })
            .collect();

        let element = StructuringElement::new(self.kernel_shape, self.kernel_size);
        let mut smoothed = original.clone();
        for _ in 0..self.iterations {
            smoothed = close(&smoothed, width, height, &element);
            smoothed = open(&smoothed, width, height, &element);
        }

        let repaired = repair(&original, &smoothed, width, height, colors.len());
        let raster: Vec<Option<Color>> = repaired
            .iter()
            .map(|&index| colors.get(index as usize).copied())
            .collect();

        let result = segments_from_color_raster(&raster, width, height, &colors)?;
        debug!(before = segments.segment_count(), after = result.segment_count(), "smoothed boundaries");
        Ok(result)
    }
}

/// Applies step 3 of the algorithm. `reserved == color_count`.
fn repair(original: &[i32], smoothed: &[i32], width: u32, height: u32, color_count: usize) -> Vec<i32> {
    let reserved = color_count as i32;
    let mut survives = vec![false; color_count];
    for &index in smoothed {
        if index < reserved {
            survives[index as usize] = true;
        }
    }

    let (w, h) = (width as i64, height as i64);
    let mut repaired = smoothed.to_vec();
    for (i, (&before, &after)) in original.iter().zip(smoothed.iter()).enumerate() {
        if before == reserved {
            repaired[i] = reserved;
            continue;
        }
        let erased = !survives[before as usize];
        if !erased && after != reserved {
            continue;
        }

        let (x, y) = ((i as i64) % w, (i as i64) / w);
        let mut votes = vec![0u32; color_count];
        for dy in -1..=1 {
            for dx in -1..=1 {
                let (nx, ny) = (x + dx, y + dy);
                if (dx, dy) == (0, 0) || nx < 0 || ny < 0 || nx >= w || ny >= h {
                    continue;
                }
                let value = smoothed[(ny * w + nx) as usize];
                if value < reserved {
                    votes[value as usize] += 1;
                }
            }
        }
        // `max_by_key` keeps the last maximum, so scan in reverse for the lowest index.
        let majority = votes
            .iter()
            .enumerate()
            .rev()
            .filter(|&(_, count)| *count > 0)
            .max_by_key(|&(_, count)| *count)
            .map(|(index, _)| index as i32);

        repaired[i] = match majority {
            Some(index) => index,
            None if after != reserved => after,
            None => before,
        };
    }
    repaired
}
