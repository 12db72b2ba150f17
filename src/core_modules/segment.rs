// THEORY:
// A `Segment` is the unit of the region model: an identifier plus the set of
// pixel coordinates it owns. It is a "dumb" record: it knows nothing about its
// neighbours and does not validate itself. The containing `RegionModel`
// enforces the partition rules.
//
// Color is not part of `Segment`. A segmentation algorithm produces plain
// segments, and only color assignment attaches a color, producing a
// `ColoredSegment`. Both implement the `Region` trait so the
// region model can be written once for either.

use crate::core_modules::pixel::pixel::Color;

/// Identifier of a segment, unique within its region model.
pub type SegmentId = u32;

/// A 2D pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Shared view over plain and colored segments.
pub trait Region: Clone {
    fn id(&self) -> SegmentId;
    fn pixels(&self) -> &[Point];
    /// The attached color, if this kind of region carries one.
    fn color(&self) -> Option<Color>;
}

/// A set of pixel coordinates sharing one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Unique within the containing region model.
    pub id: SegmentId,
    /// Coordinates owned by this segment.
    pub pixels: Vec<Point>,
}

impl Segment {
    pub fn new(id: SegmentId, pixels: Vec<Point>) -> Self {
        Self { id, pixels }
    }

    /// Attaches a color, producing the colored form of this segment.
    pub fn with_color(self, color: Color) -> ColoredSegment {
        ColoredSegment {
            id: self.id,
            pixels: self.pixels,
            color,
        }
    }
}

impl Region for Segment {
    fn id(&self) -> SegmentId {
        self.id
    }

    fn pixels(&self) -> &[Point] {
        &self.pixels
    }

    fn color(&self) -> Option<Color> {
        None
    }
}

/// A segment with exactly one color, fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColoredSegment {
    pub id: SegmentId,
    pub pixels: Vec<Point>,
    pub color: Color,
}

impl ColoredSegment {
    pub fn new(id: SegmentId, pixels: Vec<Point>, color: Color) -> Self {
        Self { id, pixels, color }
    }

    /// Drops the color, keeping identity and geometry.
    pub fn to_segment(&self) -> Segment {
        Segment::new(self.id, self.pixels.clone())
    }
}

impl Region for ColoredSegment {
    fn id(&self) -> SegmentId {
        self.id
    }

    fn pixels(&self) -> &[Point] {
        &self.pixels
    }

    fn color(&self) -> Option<Color> {
        Some(self.color)
    }
}
