// THEORY:
// Regular square tiling. The last row and column of cells are clipped at the
// image border. Cell ids follow the raster order of each cell's top-left
// corner.

use crate::algorithms::Algorithm;
use crate::algorithms::segmentation::Segmenter;
use crate::core_modules::params::ParamMap;
use crate::core_modules::segment::{Point, Segment};
use crate::core_modules::segmented_image::SegmentedImage;
use crate::error::{PbnError, Result};
use image::RgbImage;

pub const NAME: &str = "grid";

#[derive(Debug, Clone, PartialEq)]
pub struct GridSegmentation {
    /// Side length of one cell in pixels.
    cell_size: u32,
}

impl GridSegmentation {
    pub fn new(cell_size: u32) -> Result<Self> {
        if cell_size < 1 {
            return Err(PbnError::invalid(NAME, "cell_size must be >= 1"));
        }
        Ok(Self { cell_size })
    }

    pub fn from_params(params: &ParamMap) -> Result<Self> {
        params.ensure_known(NAME, &["cell_size"])?;
        let cell_size = params.required_int(NAME, "cell_size")?;
        let cell_size = u32::try_from(cell_size)
            .map_err(|_| PbnError::invalid(NAME, format!("cell_size {cell_size} is out of range")))?;
        Self::new(cell_size)
    }

    pub fn cell_size(&self) -> u32 {
        self.cell_size
    }
}

impl Algorithm for GridSegmentation {
    fn name(&self) -> &'static str {
        NAME
    }

    fn params(&self) -> ParamMap {
        ParamMap::new().with("cell_size", self.cell_size)
    }
}

impl Segmenter for GridSegmentation {
    fn segment(&self, image: &RgbImage) -> Result<SegmentedImage> {
        let (width, height) = image.dimensions();
        let grid_width = width.div_ceil(self.cell_size);
        let grid_height = height.div_ceil(self.cell_size);
        let num_cells = grid_width as usize * grid_height as usize;

        let mut segments = Vec::with_capacity(num_cells);
        for cell_index in 0..num_cells {
            let cell_y = cell_index as u32 / grid_width;
            let cell_x = cell_index as u32 % grid_width;
            let start_x = cell_x * self.cell_size;
            let start_y = cell_y * self.cell_size;
            let end_x = (start_x + self.cell_size).min(width);
            let end_y = (start_y + self.cell_size).min(height);

            let mut pixels = Vec::with_capacity(((end_x - start_x) * (end_y - start_y)) as usize);
            for y in start_y..end_y {
                for x in start_x..end_x {
                    pixels.push(Point::new(x, y));
                }
            }
            segments.push(Segment::new(cell_index as u32, pixels));
        }

        SegmentedImage::from_segments(segments, width, height)
    }
}
