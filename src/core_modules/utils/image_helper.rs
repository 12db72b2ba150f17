pub mod image_helper {
    use crate::error::{PbnError, Result};
    use image::codecs::png::PngEncoder;
    use image::codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding};
    use image::{ColorType, DynamicImage, ExtendedColorType, GrayImage, ImageEncoder, RgbImage};
    use std::io::BufWriter;
    use std::path::Path;

    /// Converts any image with a known color layout into 8-bit RGB.
    pub fn coerce_rgb(image: &DynamicImage) -> Result<RgbImage> {
        match image.color() {
            ColorType::Rgb8 => Ok(image.as_rgb8().cloned().unwrap_or_else(|| image.to_rgb8())),
            ColorType::L8
            | ColorType::La8
            | ColorType::Rgba8
            | ColorType::L16
            | ColorType::La16
            | ColorType::Rgb16
            | ColorType::Rgba16
            | ColorType::Rgb32F
            | ColorType::Rgba32F => Ok(image.to_rgb8()),
            other => Err(PbnError::UnsupportedImageMode(format!("{other:?}"))),
        }
    }

    /// Writes a binary PPM (P6).
    pub fn save_ppm(path: &Path, image: &RgbImage) -> Result<()> {
        let output = BufWriter::new(std::fs::File::create(path)?);
        let encoder = PnmEncoder::new(output).with_subtype(PnmSubtype::Pixmap(SampleEncoding::Binary));
        encoder.write_image(image.as_raw(), image.width(), image.height(), ExtendedColorType::Rgb8)?;
        Ok(())
    }

    pub fn save_png_rgb(path: &Path, image: &RgbImage) -> Result<()> {
        let output = BufWriter::new(std::fs::File::create(path)?);
        let encoder = PngEncoder::new(output);
        encoder.write_image(image.as_raw(), image.width(), image.height(), ExtendedColorType::Rgb8)?;
        Ok(())
    }

    pub fn save_png_gray(path: &Path, image: &GrayImage) -> Result<()> {
        let output = BufWriter::new(std::fs::File::create(path)?);
        let encoder = PngEncoder::new(output);
        encoder.write_image(image.as_raw(), image.width(), image.height(), ExtendedColorType::L8)?;
        Ok(())
    }
}
