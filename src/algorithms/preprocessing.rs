// THEORY:
// Palette-dependent image transforms applied before segmentation.
//
// Each preprocessor takes an RGB raster and the palette and returns a fresh
// raster of the same size. None of them has parameters.

use crate::algorithms::Algorithm;
use crate::core_modules::palette::Palette;
use crate::core_modules::params::ParamMap;
use crate::core_modules::pixel::pixel::Color;
use crate::error::Result;
use image::{Rgb, RgbImage};

pub trait Preprocessor: Algorithm {
    fn process(&self, image: &RgbImage, palette: &Palette) -> Result<RgbImage>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preprocessing {
    /// Returns the image unchanged.
    Nop,
    /// Error-diffusion dithering onto the palette.
    FloydSteinberg,
    /// Every pixel replaced by its nearest palette color.
    Nearest,
}

impl Preprocessing {
    pub(crate) fn with_params(self, params: &ParamMap) -> Result<Self> {
        params.ensure_known(self.name(), &[])?;
        Ok(self)
    }
}

impl Algorithm for Preprocessing {
    fn name(&self) -> &'static str {
        match self {
            Preprocessing::Nop => "nop",
            Preprocessing::FloydSteinberg => "floyd-steinberg",
            Preprocessing::Nearest => "nearest",
        }
    }

    fn params(&self) -> ParamMap {
        ParamMap::new()
    }
}

impl Preprocessor for Preprocessing {
    fn process(&self, image: &RgbImage, palette: &Palette) -> Result<RgbImage> {
        Ok(match self {
            Preprocessing::Nop => image.clone(),
            Preprocessing::FloydSteinberg => floyd_steinberg(image, palette),
            Preprocessing::Nearest => quantize_nearest(image, palette),
        })
    }
}

pub fn quantize_nearest(image: &RgbImage, palette: &Palette) -> RgbImage {
    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        *pixel = palette.nearest(&Color::from(*pixel)).into();
    }
    output
}

/// Floyd-Steinberg dithering in raster order. The quantization error of each
/// pixel is spread 7/16 right, 3/16 down-left, 5/16 down and 1/16 down-right.
pub fn floyd_steinberg(image: &RgbImage, palette: &Palette) -> RgbImage {
    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);
    let mut buffer: Vec<[f64; 3]> = image
        .pixels()
        .map(|p| [p[0] as f64, p[1] as f64, p[2] as f64])
        .collect();
    let mut output = RgbImage::new(width, height);

    for y in 0..h {
        for x in 0..w {
            let old = buffer[y * w + x];
            // Accumulated error can push a channel past the u8 range; the
            // lookup sees the truncated value unclamped.
            let new = palette.colors()[palette.nearest_index_rgb(old.map(|c| c.trunc() as i32))];
            output.put_pixel(x as u32, y as u32, Rgb::from(new));

            let error = [
                old[0] - new.red as f64,
                old[1] - new.green as f64,
                old[2] - new.blue as f64,
            ];
            let mut diffuse = |tx: usize, ty: usize, weight: f64| {
                let cell = &mut buffer[ty * w + tx];
                for (channel, e) in cell.iter_mut().zip(error.iter()) {
                    *channel += e * weight;
                }
            };

            if x + 1 < w {
                diffuse(x + 1, y, 7.0 / 16.0);
            }
            if y + 1 < h {
                if x > 0 {
                    diffuse(x - 1, y + 1, 3.0 / 16.0);
                }
                diffuse(x, y + 1, 5.0 / 16.0);
                if x + 1 < w {
                    diffuse(x + 1, y + 1, 1.0 / 16.0);
                }
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn black_and_white() -> Palette {
        Palette::new(vec![Color::BLACK, Color::WHITE]).unwrap()
    }

    #[test]
    fn nop_returns_an_identical_copy() {
        let image = RgbImage::from_fn(3, 2, |x, y| Rgb([x as u8 * 10, y as u8 * 20, 7]));
        let processed = Preprocessing::Nop.process(&image, &black_and_white()).unwrap();
        assert_eq!(processed, image);
    }

    #[test]
    fn nearest_only_emits_palette_colors() {
        let image = RgbImage::from_fn(4, 4, |x, y| Rgb([(x * 60) as u8, (y * 60) as u8, 100]));
        let palette = black_and_white();
        let processed = Preprocessing::Nearest.process(&image, &palette).unwrap();
        assert!(processed.pixels().all(|p| palette.colors().contains(&Color::from(p))));
        assert_eq!(processed.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(processed.get_pixel(3, 3), &Rgb([255, 255, 255]));
    }

    #[test]
    fn dithering_mid_gray_mixes_black_and_white() {
        let image = RgbImage::from_pixel(8, 8, Rgb([128, 128, 128]));
        let palette = black_and_white();
        let dithered = Preprocessing::FloydSteinberg.process(&image, &palette).unwrap();
        let white = dithered.pixels().filter(|p| p.0 == [255, 255, 255]).count();
        let black = dithered.pixels().filter(|p| p.0 == [0, 0, 0]).count();
        assert_eq!(white + black, 64);
        assert!(white > 16 && black > 16, "white={white} black={black}");
    }

    #[test]
    fn dithering_palette_colors_is_lossless() {
        let image = RgbImage::from_fn(5, 5, |x, y| if (x + y) % 2 == 0 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) });
        let dithered = floyd_steinberg(&image, &black_and_white());
        assert_eq!(dithered, image);
    }

    #[test]
    fn diffused_error_is_not_clamped_before_lookup() {
        // Pixel 0 ties and takes the first entry, pushing -10 * 7/16 onto red
        // of pixel 1. Truncated to (-4, 0, 0) it sits closer to blue.
        let palette = Palette::new(vec![Color::new(10, 0, 0), Color::new(0, 0, 10)]).unwrap();
        let dithered = floyd_steinberg(&RgbImage::new(2, 1), &palette);
        assert_eq!(dithered.get_pixel(0, 0), &Rgb([10, 0, 0]));
        assert_eq!(dithered.get_pixel(1, 0), &Rgb([0, 0, 10]));
    }

    #[test]
    fn rejects_parameters() {
        let params = ParamMap::new().with("strength", 2);
        assert!(Preprocessing::FloydSteinberg.with_params(&params).is_err());
        assert_eq!(Preprocessing::Nop.with_params(&ParamMap::new()).unwrap(), Preprocessing::Nop);
    }
}
