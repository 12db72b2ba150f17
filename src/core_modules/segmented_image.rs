// THEORY:
// The `RegionModel` is the data structure every stage of the engine hands to
// the next. It owns the image extent, an ordered list of segments, and a dense
// label raster derived from that list.
//
// Key architectural principles:
// 1.  **Validated Construction**: The only ways in are `from_segments` and
//     `from_labels`. Both check the partition invariants (unique ids, no pixel
//     claimed twice, every pixel inside the image) and return a `Result`, so a
//     broken partition can never exist as a value.
// 2.  **Derived Raster**: The label raster is a pure function of the segment
//     list. Each cell is written exactly once during construction, so the
//     raster does not depend on segment order.
// 3.  **Immutability**: There are no mutating methods. Every transform (color
//     assignment, merge, smooth) builds a new model. `Clone` is a deep copy;
//     nothing is shared between a model and its clone.
// 4.  **One Model, Two Flavours**: `SegmentedImage` and
//     `ColoredSegmentedImage` are the same generic type over the `Region`
//     trait, so the invariant checks are written once.

use crate::core_modules::pixel::pixel::Color;
use crate::core_modules::segment::{ColoredSegment, Point, Region, Segment, SegmentId};
use crate::error::{PbnError, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A dense width x height raster of segment ids. `None` marks a pixel that no
/// segment owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelGrid {
    width: u32,
    height: u32,
    cells: Vec<Option<SegmentId>>,
}

impl LabelGrid {
    /// Creates a grid with every cell unassigned.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![None; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Option<SegmentId> {
        self.cells[self.index(x, y)]
    }

    /// Row-major cells.
    pub fn cells(&self) -> &[Option<SegmentId>] {
        &self.cells
    }

    /// True when every pixel belongs to some segment.
    pub fn is_total(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    pub fn to_rows(&self) -> Vec<Vec<Option<SegmentId>>> {
        if self.width == 0 {
            return vec![Vec::new(); self.height as usize];
        }
        self.cells.chunks(self.width as usize).map(|row| row.to_vec()).collect()
    }
}

/// A validated partition of an image into segments.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionModel<S: Region> {
    width: u32,
    height: u32,
    segments: Vec<S>,
    labels: LabelGrid,
    positions: HashMap<SegmentId, usize>,
}

/// Segments without colors, as produced by segmentation.
pub type SegmentedImage = RegionModel<Segment>;
/// Segments with exactly one color each, as produced by color assignment.
pub type ColoredSegmentedImage = RegionModel<ColoredSegment>;

impl<S: Region> RegionModel<S> {
    /// Scatters the segments' pixels into a label raster, rejecting repeated
    /// ids, out-of-bounds pixels, and pixels claimed twice.
    pub fn from_segments(segments: Vec<S>, width: u32, height: u32) -> Result<Self> {
        let mut labels = LabelGrid::new(width, height);
        let mut positions = HashMap::with_capacity(segments.len());

        for (position, segment) in segments.iter().enumerate() {
            let id = segment.id();
            if positions.insert(id, position).is_some() {
                return Err(PbnError::DuplicateIdentifier(id));
            }
            for point in segment.pixels() {
                if point.x >= width || point.y >= height {
                    return Err(PbnError::PixelOutOfBounds {
                        id,
                        x: point.x,
                        y: point.y,
                        width,
                        height,
                    });
                }
                let index = labels.index(point.x, point.y);
                if let Some(first) = labels.cells[index] {
                    return Err(PbnError::PartitionViolation {
                        x: point.x,
                        y: point.y,
                        first,
                        second: id,
                    });
                }
                labels.cells[index] = Some(id);
            }
        }

        Ok(Self {
            width,
            height,
            segments,
            labels,
            positions,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn segments(&self) -> &[S] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<S> {
        self.segments
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn labels(&self) -> &LabelGrid {
        &self.labels
    }

    /// The label raster as rows of optional ids.
    pub fn label_rows(&self) -> Vec<Vec<Option<SegmentId>>> {
        self.labels.to_rows()
    }

    pub fn label_at(&self, x: u32, y: u32) -> Option<SegmentId> {
        self.labels.get(x, y)
    }

    pub fn segment(&self, id: SegmentId) -> Option<&S> {
        self.positions.get(&id).map(|&position| &self.segments[position])
    }

    /// The partition as a set of sorted pixel sets, ignoring ids. Two models
    /// with equal pixel sets differ at most by segment numbering.
    pub fn pixel_sets(&self) -> BTreeSet<Vec<Point>> {
        self.segments
            .iter()
            .map(|segment| {
                let mut pixels = segment.pixels().to_vec();
                pixels.sort_unstable_by_key(|p| (p.y, p.x));
                pixels
            })
            .collect()
    }

    /// Promotes to a colored model. A segment's color comes from `color_map`
    /// when present there, otherwise from the segment itself; a segment with
    /// neither fails with `MissingColorAssignment`.
    pub fn promote(&self, color_map: Option<&HashMap<SegmentId, Color>>) -> Result<ColoredSegmentedImage> {
        let mut colored = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            let id = segment.id();
            let color = color_map
                .and_then(|map| map.get(&id).copied())
                .or_else(|| segment.color())
                .ok_or(PbnError::MissingColorAssignment(id))?;
            colored.push(ColoredSegment::new(id, segment.pixels().to_vec(), color));
        }
        // Geometry is unchanged, so the validated raster carries over.
        Ok(RegionModel {
            width: self.width,
            height: self.height,
            segments: colored,
            labels: self.labels.clone(),
            positions: self.positions.clone(),
        })
    }
}

impl SegmentedImage {
    /// Groups a rectangular label raster into segments, one per distinct
    /// label, in order of first appearance.
    pub fn from_labels(rows: &[Vec<SegmentId>]) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        for (row, cells) in rows.iter().enumerate() {
            if cells.len() != width {
                return Err(PbnError::MalformedLabels {
                    row,
                    expected: width,
                    found: cells.len(),
                });
            }
        }
        let flat: Vec<SegmentId> = rows.iter().flatten().copied().collect();
        Self::from_label_buffer(width as u32, height as u32, &flat)
    }

    /// Same as `from_labels` for a row-major buffer of `width * height` labels.
    pub fn from_label_buffer(width: u32, height: u32, labels: &[SegmentId]) -> Result<Self> {
        let expected = width as usize * height as usize;
        if labels.len() != expected {
            return Err(PbnError::MalformedLabels {
                row: 0,
                expected,
                found: labels.len(),
            });
        }

        let mut order: HashMap<SegmentId, usize> = HashMap::new();
        let mut segments: Vec<Segment> = Vec::new();
        for (index, &label) in labels.iter().enumerate() {
            let point = Point::new((index % width.max(1) as usize) as u32, (index / width.max(1) as usize) as u32);
            let position = *order.entry(label).or_insert_with(|| {
                segments.push(Segment::new(label, Vec::new()));
                segments.len() - 1
            });
            segments[position].pixels.push(point);
        }

        Self::from_segments(segments, width, height)
    }
}

impl ColoredSegmentedImage {
    /// Strips colors, keeping ids and geometry.
    pub fn uncolored(&self) -> SegmentedImage {
        RegionModel {
            width: self.width,
            height: self.height,
            segments: self.segments.iter().map(ColoredSegment::to_segment).collect(),
            labels: self.labels.clone(),
            positions: self.positions.clone(),
        }
    }

    /// Segment id to color.
    pub fn color_map(&self) -> BTreeMap<SegmentId, Color> {
        self.segments.iter().map(|s| (s.id, s.color)).collect()
    }

    /// Distinct colors in order of first appearance in the segment list.
    pub fn distinct_colors(&self) -> Vec<Color> {
        let mut seen = Vec::new();
        for segment in &self.segments {
            if !seen.contains(&segment.color) {
                seen.push(segment.color);
            }
        }
        seen
    }
}
