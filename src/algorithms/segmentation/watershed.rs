// THEORY:
// Marker-based watershed. The image is treated as a relief map whose height is
// edge strength; basins are grown from markers placed in the valleys until
// they meet on the ridges.
//
// Algorithm steps:
// 1.  **Relief**: Rec. 709 gray level in [0, 1], then the Sobel gradient
//     magnitude `sqrt((gx² + gy²) / 2)` with 1/4-scaled kernels and replicated
//     edges.
// 2.  **Shallow-minimum suppression**: with `h = h_minima_threshold * range`,
//     every basin shallower than `h` is filled by reconstruction by erosion of
//     `gradient + h` over the gradient. `h = 0` skips this step.
// 3.  **Markers**: a pixel is a candidate if it equals the minimum of its
//     `(2 * min_distance + 1)²` window and lies strictly below the global
//     maximum. Candidates are accepted lowest-first (raster order on ties)
//     unless an accepted marker lies within Chebyshev distance `min_distance`.
//     A completely flat map still gets one marker at its first minimum.
// 4.  **Flooding**: a priority queue keyed by
//     `gradient + compactness * distance to the marker`, ties in insertion
//     order, labels each pixel when it is first reached through a 4- or
//     8-connected neighbour.
//
// Every pixel of a non-empty image is reachable from some marker, so the
// result always covers the image.

use crate::algorithms::Algorithm;
use crate::algorithms::segmentation::Segmenter;
use crate::core_modules::connected_components::connected_components::{Connectivity, neighbours};
use crate::core_modules::params::ParamMap;
use crate::core_modules::pixel::pixel::Color;
use crate::core_modules::segmented_image::SegmentedImage;
use crate::error::{PbnError, Result};
use image::RgbImage;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::debug;

pub const NAME: &str = "watershed";

#[derive(Debug, Clone, PartialEq)]
pub struct WatershedSegmentation {
    /// 1 for 4-connected flooding, 2 for 8-connected.
    pub connectivity: u8,
    /// Weight of the distance-to-marker penalty. 0 is the classic watershed.
    pub compactness: f64,
    /// Minimum Chebyshev separation between markers, in pixels.
    pub min_distance: u32,
    /// Basin depth to suppress, as a fraction of the gradient range.
    pub h_minima_threshold: f64,
}

impl Default for WatershedSegmentation {
    fn default() -> Self {
        Self {
            connectivity: 1,
            compactness: 0.0,
            min_distance: 10,
            h_minima_threshold: 0.1,
        }
    }
}

impl WatershedSegmentation {
    pub fn new(connectivity: u8, compactness: f64, min_distance: u32, h_minima_threshold: f64) -> Result<Self> {
        if !(connectivity == 1 || connectivity == 2) {
            return Err(PbnError::invalid(NAME, format!("connectivity must be 1 or 2, got {connectivity}")));
        }
        if !compactness.is_finite() || compactness < 0.0 {
            return Err(PbnError::invalid(NAME, format!("compactness must be >= 0, got {compactness}")));
        }
        if min_distance < 1 {
            return Err(PbnError::invalid(NAME, "min_distance must be >= 1"));
        }
        if !(0.0..=1.0).contains(&h_minima_threshold) {
            return Err(PbnError::invalid(
                NAME,
                format!("h_minima_threshold must be between 0 and 1, got {h_minima_threshold}"),
            ));
        }
        Ok(Self {
            connectivity,
            compactness,
            min_distance,
            h_minima_threshold,
        })
    }

    pub fn from_params(params: &ParamMap) -> Result<Self> {
        params.ensure_known(NAME, &["connectivity", "compactness", "min_distance", "h_minima_threshold"])?;
        let defaults = Self::default();
        let connectivity = params.int(NAME, "connectivity")?.unwrap_or(defaults.connectivity as i64);
        let min_distance = params.int(NAME, "min_distance")?.unwrap_or(defaults.min_distance as i64);
        let connectivity = u8::try_from(connectivity)
            .map_err(|_| PbnError::invalid(NAME, format!("connectivity must be 1 or 2, got {connectivity}")))?;
        let min_distance = u32::try_from(min_distance)
            .map_err(|_| PbnError::invalid(NAME, format!("min_distance must be >= 1, got {min_distance}")))?;
        Self::new(
            connectivity,
            params.float(NAME, "compactness")?.unwrap_or(defaults.compactness),
            min_distance,
            params.float(NAME, "h_minima_threshold")?.unwrap_or(defaults.h_minima_threshold),
        )
    }

    fn flood_connectivity(&self) -> Connectivity {
        if self.connectivity == 2 {
            Connectivity::Eight
        } else {
            Connectivity::Four
        }
    }
}

impl Algorithm for WatershedSegmentation {
    fn name(&self) -> &'static str {
        NAME
    }

    fn params(&self) -> ParamMap {
        ParamMap::new()
            .with("connectivity", self.connectivity as i64)
            .with("compactness", self.compactness)
            .with("min_distance", self.min_distance)
            .with("h_minima_threshold", self.h_minima_threshold)
    }
}

impl Segmenter for WatershedSegmentation {
    fn segment(&self, image: &RgbImage) -> Result<SegmentedImage> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return SegmentedImage::from_label_buffer(width, height, &[]);
        }

        let gray: Vec<f64> = image.pixels().map(|p| Color::from(p).gray_level()).collect();
        let gradient = sobel_magnitude(&gray, width, height);

        let (low, high) = min_max(&gradient);
        let h = self.h_minima_threshold * (high - low);
        let relief = if h > 0.0 {
            suppress_shallow_minima(&gradient, width, height, h)
        } else {
            gradient.clone()
        };

        let markers = find_markers(&relief, width, height, self.min_distance);
        debug!(markers = markers.len(), h, "watershed markers placed");

        let labels = flood(&gradient, width, height, &markers, self.flood_connectivity(), self.compactness);
        SegmentedImage::from_label_buffer(width, height, &labels)
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

/// Sobel gradient magnitude with replicated borders.
pub(crate) fn sobel_magnitude(gray: &[f64], width: u32, height: u32) -> Vec<f64> {
    let (w, h) = (width as i64, height as i64);
    let at = |x: i64, y: i64| -> f64 {
        let cx = x.clamp(0, w - 1);
        let cy = y.clamp(0, h - 1);
        gray[(cy * w + cx) as usize]
    };

    let mut magnitude = Vec::with_capacity(gray.len());
    for y in 0..h {
        for x in 0..w {
            // Horizontal edges respond to the vertical derivative and vice versa.
            let gy = (at(x - 1, y - 1) + 2.0 * at(x, y - 1) + at(x + 1, y - 1)
                - at(x - 1, y + 1)
                - 2.0 * at(x, y + 1)
                - at(x + 1, y + 1))
                / 4.0;
            let gx = (at(x - 1, y - 1) + 2.0 * at(x - 1, y) + at(x - 1, y + 1)
                - at(x + 1, y - 1)
                - 2.0 * at(x + 1, y)
                - at(x + 1, y + 1))
                / 4.0;
            magnitude.push(((gx * gx + gy * gy) / 2.0).sqrt());
        }
    }
    magnitude
}

/// Fills every basin shallower than `h`: reconstruction by erosion of
/// `values + h` above `values`, using alternating raster scans until stable.
pub(crate) fn suppress_shallow_minima(values: &[f64], width: u32, height: u32, h: f64) -> Vec<f64> {
    let (w, hgt) = (width as usize, height as usize);
    let mut marker: Vec<f64> = values.iter().map(|v| v + h).collect();

    // Causal neighbours of the forward scan; the backward scan mirrors them.
    const FORWARD: [(i64, i64); 4] = [(-1, -1), (0, -1), (1, -1), (-1, 0)];

    let relax = |marker: &mut Vec<f64>, x: usize, y: usize, sign: i64| -> bool {
        let index = y * w + x;
        let mut lowest = marker[index];
        for &(dx, dy) in &FORWARD {
            let nx = x as i64 + dx * sign;
            let ny = y as i64 + dy * sign;
            if nx >= 0 && ny >= 0 && (nx as usize) < w && (ny as usize) < hgt {
                lowest = lowest.min(marker[ny as usize * w + nx as usize]);
            }
        }
        let updated = lowest.max(values[index]);
        if updated < marker[index] {
            marker[index] = updated;
            true
        } else {
            false
        }
    };

    loop {
        let mut changed = false;
        for y in 0..hgt {
            for x in 0..w {
                changed |= relax(&mut marker, x, y, 1);
            }
        }
        for y in (0..hgt).rev() {
            for x in (0..w).rev() {
                changed |= relax(&mut marker, x, y, -1);
            }
        }
        if !changed {
            break;
        }
    }
    marker
}

/// Sliding minimum over a `(2r+1)` window, first along rows then columns.
fn window_minimum(values: &[f64], width: u32, height: u32, radius: u32) -> Vec<f64> {
    let (w, h, r) = (width as usize, height as usize, radius as usize);
    let mut rows = vec![0.0; values.len()];
    for y in 0..h {
        for x in 0..w {
            let start = x.saturating_sub(r);
            let end = (x + r).min(w - 1);
            rows[y * w + x] = values[y * w + start..=y * w + end]
                .iter()
                .fold(f64::INFINITY, |m, &v| m.min(v));
        }
    }
    let mut result = vec![0.0; values.len()];
    for y in 0..h {
        let start = y.saturating_sub(r);
        let end = (y + r).min(h - 1);
        for x in 0..w {
            result[y * w + x] = (start..=end).map(|yy| rows[yy * w + x]).fold(f64::INFINITY, f64::min);
        }
    }
    result
}

/// Marker pixel indices in acceptance order.
pub(crate) fn find_markers(relief: &[f64], width: u32, height: u32, min_distance: u32) -> Vec<usize> {
    let (w, h) = (width as usize, height as usize);
    let (low, high) = min_max(relief);
    let window = window_minimum(relief, width, height, min_distance);

    let mut candidates: Vec<usize> = (0..relief.len())
        .filter(|&i| relief[i] == window[i] && relief[i] < high)
        .collect();
    candidates.sort_by(|&a, &b| relief[a].total_cmp(&relief[b]).then(a.cmp(&b)));

    let radius = min_distance as usize;
    let mut blocked = vec![false; relief.len()];
    let mut markers = Vec::new();
    for index in candidates {
        if blocked[index] {
            continue;
        }
        markers.push(index);
        let (x, y) = (index % w, index / w);
        for by in y.saturating_sub(radius)..=(y + radius).min(h - 1) {
            for bx in x.saturating_sub(radius)..=(x + radius).min(w - 1) {
                blocked[by * w + bx] = true;
            }
        }
    }

    if markers.is_empty() {
        if let Some(first) = relief.iter().position(|&v| v == low) {
            markers.push(first);
        }
    }
    markers
}

/// A pixel waiting in the flooding queue.
struct Pending {
    priority: f64,
    age: u64,
    index: usize,
    label: u32,
    origin: usize,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    // Reversed so `BinaryHeap` pops the lowest priority, then the oldest entry.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.age.cmp(&self.age))
    }
}

/// Grows one basin per marker; marker `i` produces label `i`.
pub(crate) fn flood(
    relief: &[f64],
    width: u32,
    height: u32,
    markers: &[usize],
    connectivity: Connectivity,
    compactness: f64,
) -> Vec<u32> {
    let w = width as usize;
    let mut labels: Vec<Option<u32>> = vec![None; relief.len()];
    let mut queue = BinaryHeap::new();
    let mut age = 0u64;

    for (label, &index) in markers.iter().enumerate() {
        labels[index] = Some(label as u32);
        queue.push(Pending {
            priority: relief[index],
            age,
            index,
            label: label as u32,
            origin: index,
        });
        age += 1;
    }

    while let Some(current) = queue.pop() {
        let x = (current.index % w) as u32;
        let y = (current.index / w) as u32;
        for neighbour in neighbours(x, y, width, height, connectivity) {
            if labels[neighbour].is_some() {
                continue;
            }
            labels[neighbour] = Some(current.label);
            let mut priority = relief[neighbour];
            if compactness > 0.0 {
                let dx = (neighbour % w) as f64 - (current.origin % w) as f64;
                let dy = (neighbour / w) as f64 - (current.origin / w) as f64;
                priority += compactness * (dx * dx + dy * dy).sqrt();
            }
            queue.push(Pending {
                priority,
                age,
                index: neighbour,
                label: current.label,
                origin: current.origin,
            });
            age += 1;
        }
    }

    // Unreached pixels only occur without markers, i.e. for empty images.
    labels.into_iter().map(|label| label.unwrap_or(0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Two flat halves separated by a vertical edge.
    fn halves(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| if x < width / 2 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) })
    }

    #[test]
    fn validates_parameters() {
        assert!(WatershedSegmentation::new(3, 0.0, 10, 0.1).is_err());
        assert!(WatershedSegmentation::new(1, -0.5, 10, 0.1).is_err());
        assert!(WatershedSegmentation::new(1, 0.0, 0, 0.1).is_err());
        assert!(WatershedSegmentation::new(1, 0.0, 10, 1.5).is_err());
        assert!(WatershedSegmentation::new(2, 0.5, 1, 1.0).is_ok());
        assert_eq!(WatershedSegmentation::from_params(&ParamMap::new()).unwrap(), WatershedSegmentation::default());
        assert!(WatershedSegmentation::from_params(&ParamMap::new().with("connectivity", 0)).is_err());
    }

    #[test]
    fn sobel_is_zero_on_flat_and_peaks_on_edges() {
        let flat = sobel_magnitude(&[0.5; 9], 3, 3);
        assert!(flat.iter().all(|&v| v == 0.0));

        let gray: Vec<f64> = (0..16).map(|i| if i % 4 < 2 { 0.0 } else { 1.0 }).collect();
        let edges = sobel_magnitude(&gray, 4, 4);
        assert!(edges[1] > 0.0 && edges[2] > 0.0);
        assert_eq!(edges[0], 0.0);
        assert_eq!(edges[3], 0.0);
    }

    #[test]
    fn shallow_basins_are_filled() {
        // A dip of depth 0.2 next to a dip of depth 1.0.
        let values = vec![1.0, 0.8, 1.0, 0.0, 1.0];
        let filled = suppress_shallow_minima(&values, 5, 1, 0.5);
        assert_eq!(filled[1], 1.0);
        assert_eq!(filled[3], 0.5);
    }

    #[test]
    fn markers_respect_min_distance() {
        let relief = vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0];
        assert_eq!(find_markers(&relief, 7, 1, 1), vec![0, 2, 4, 6]);
        assert_eq!(find_markers(&relief, 7, 1, 2), vec![0, 4]);
        assert_eq!(find_markers(&[0.3; 6], 3, 2, 1), vec![0]);
    }

    #[test]
    fn flat_image_is_one_segment() {
        let image = RgbImage::from_pixel(6, 4, Rgb([40, 80, 120]));
        let segmented = WatershedSegmentation::default().segment(&image).unwrap();
        assert_eq!(segmented.segment_count(), 1);
        assert!(segmented.labels().is_total());
    }

    #[test]
    fn splits_along_a_strong_edge() {
        let image = halves(12, 6);
        let segmenter = WatershedSegmentation::new(1, 0.0, 2, 0.0).unwrap();
        let segmented = segmenter.segment(&image).unwrap();
        assert!(segmented.labels().is_total());
        assert!(segmented.segment_count() >= 2);
        assert_ne!(segmented.label_at(0, 0), segmented.label_at(11, 5));
        // No region straddles the edge from the far left to the far right.
        for segment in segmented.segments() {
            let touches_left = segment.pixels.iter().any(|p| p.x == 0);
            let touches_right = segment.pixels.iter().any(|p| p.x == 11);
            assert!(!(touches_left && touches_right));
        }
    }

    #[test]
    fn compact_and_eight_connected_runs_cover_the_image() {
        let image = RgbImage::from_fn(10, 10, |x, y| Rgb([(x * 25) as u8, (y * 25) as u8, ((x * y) % 255) as u8]));
        for (connectivity, compactness) in [(1, 0.0), (2, 0.0), (1, 0.01), (2, 1.0)] {
            let segmenter = WatershedSegmentation::new(connectivity, compactness, 3, 0.05).unwrap();
            let segmented = segmenter.segment(&image).unwrap();
            assert!(segmented.labels().is_total());
        }
    }
}
