// THEORY:
// Grayscale morphology on dense integer rasters.
//
// Dilation takes the maximum and erosion the minimum over a structuring
// element centred on each pixel. Offsets that fall outside the raster are
// ignored, which is the same as padding with the neutral value of each
// operation. Every output value is therefore one of the input values.

use std::fmt;
use std::str::FromStr;

/// Shape of the structuring element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelShape {
    /// All offsets with `dx² + dy² <= r²`.
    Disk,
    /// All offsets with `|dx| <= r` and `|dy| <= r`.
    Square,
}

impl FromStr for KernelShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disk" => Ok(KernelShape::Disk),
            "square" => Ok(KernelShape::Square),
            other => Err(format!("unknown kernel shape {other:?} (expected disk or square)")),
        }
    }
}

impl fmt::Display for KernelShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelShape::Disk => write!(f, "disk"),
            KernelShape::Square => write!(f, "square"),
        }
    }
}

/// A structuring element: a set of offsets around the origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuringElement {
    offsets: Vec<(i32, i32)>,
}

impl StructuringElement {
    pub fn new(shape: KernelShape, radius: u32) -> Self {
        let r = radius as i32;
        let mut offsets = Vec::new();
        for dy in -r..=r {
            for dx in -r..=r {
                let inside = match shape {
                    KernelShape::Square => true,
                    KernelShape::Disk => dx * dx + dy * dy <= r * r,
                };
                if inside {
                    offsets.push((dx, dy));
                }
            }
        }
        Self { offsets }
    }

    pub fn offsets(&self) -> &[(i32, i32)] {
        &self.offsets
    }
}

fn apply(
    values: &[i32],
    width: u32,
    height: u32,
    element: &StructuringElement,
    pick: fn(i32, i32) -> i32,
) -> Vec<i32> {
    let (w, h) = (width as i32, height as i32);
    let mut out = Vec::with_capacity(values.len());
    for y in 0..h {
        for x in 0..w {
            let mut acc = values[(y * w + x) as usize];
            for &(dx, dy) in element.offsets() {
                let (nx, ny) = (x + dx, y + dy);
                if nx >= 0 && ny >= 0 && nx < w && ny < h {
                    acc = pick(acc, values[(ny * w + nx) as usize]);
                }
            }
            out.push(acc);
        }
    }
    out
}

pub fn dilate(values: &[i32], width: u32, height: u32, element: &StructuringElement) -> Vec<i32> {
    apply(values, width, height, element, i32::max)
}

pub fn erode(values: &[i32], width: u32, height: u32, element: &StructuringElement) -> Vec<i32> {
    apply(values, width, height, element, i32::min)
}

/// Dilation followed by erosion. Fills gaps narrower than the element.
pub fn close(values: &[i32], width: u32, height: u32, element: &StructuringElement) -> Vec<i32> {
    erode(&dilate(values, width, height, element), width, height, element)
}

/// Erosion followed by dilation. Removes features narrower than the element.
pub fn open(values: &[i32], width: u32, height: u32, element: &StructuringElement) -> Vec<i32> {
    dilate(&erode(values, width, height, element), width, height, element)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_sizes() {
        assert_eq!(StructuringElement::new(KernelShape::Square, 1).offsets().len(), 9);
        assert_eq!(StructuringElement::new(KernelShape::Disk, 1).offsets().len(), 5);
        assert_eq!(StructuringElement::new(KernelShape::Disk, 2).offsets().len(), 13);
        assert_eq!(StructuringElement::new(KernelShape::Square, 0).offsets(), &[(0, 0)]);
    }

    #[test]
    fn opening_removes_isolated_peak() {
        let mut values = vec![0; 25];
        values[12] = 5;
        let element = StructuringElement::new(KernelShape::Square, 1);
        assert_eq!(open(&values, 5, 5, &element), vec![0; 25]);
    }

    #[test]
    fn closing_fills_isolated_pit() {
        let mut values = vec![3; 25];
        values[12] = 0;
        let element = StructuringElement::new(KernelShape::Disk, 1);
        assert_eq!(close(&values, 5, 5, &element), vec![3; 25]);
    }

    #[test]
    fn outputs_are_drawn_from_inputs() {
        let values = vec![4, 1, 9, 1, 4, 9, 9, 1, 4];
        let element = StructuringElement::new(KernelShape::Disk, 1);
        for v in close(&values, 3, 3, &element).into_iter().chain(open(&values, 3, 3, &element)) {
            assert!([1, 4, 9].contains(&v));
        }
    }

    #[test]
    fn shape_parsing() {
        assert_eq!("Disk".parse::<KernelShape>(), Ok(KernelShape::Disk));
        assert_eq!("square".parse::<KernelShape>(), Ok(KernelShape::Square));
        assert!("circle".parse::<KernelShape>().is_err());
    }
}
