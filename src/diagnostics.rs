// THEORY:
// Diagnostics are side artifacts that let a user see what each stage did.
// They are recomputed from the current region model and the working image
// without touching pipeline state:
//
// 1) Boundary mask: 255 wherever a pixel's 4-neighbour belongs to a different
//    segment (or one of the two is unassigned), 0 elsewhere.
// 2) Boundary overlay: the working image with mask pixels blended toward
//    black.
// 3) Average-color preview: every segment filled with the truncated mean of
//    its pixels in the working image.
//
// Where the artifacts go is the sink's business. `DirectorySink` writes PNG
// files under deterministic names, `MemorySink` keeps them for inspection.

use crate::algorithms::assignment::average_color;
use crate::core_modules::params::ParamMap;
use crate::core_modules::pixel::pixel::Color;
use crate::core_modules::segment::Region;
use crate::core_modules::segmented_image::RegionModel;
use crate::core_modules::utils::image_helper::image_helper;
use crate::error::{PbnError, Result};
use crate::output::serialize_params;
use crate::pipeline::PipelineStage;
use image::{GrayImage, Luma, RgbImage};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// How strongly boundary pixels are pulled toward black in overlays.
pub const OVERLAY_ALPHA: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// The image produced by a preprocessing step.
    Image,
    BoundaryMask,
    BoundaryOverlay,
    AveragePreview,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArtifactKind::Image => "image",
            ArtifactKind::BoundaryMask => "boundaries",
            ArtifactKind::BoundaryOverlay => "overlay",
            ArtifactKind::AveragePreview => "average",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactImage {
    Gray(GrayImage),
    Rgb(RgbImage),
}

/// One diagnostic image and where in the run it was taken.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    /// Running counter over all emitting steps of the run.
    pub stage_index: usize,
    pub stage: PipelineStage,
    /// Position within a multi-step stage; 0 for single-step stages.
    pub step: usize,
    pub algorithm: String,
    pub params: ParamMap,
    pub kind: ArtifactKind,
    pub image: ArtifactImage,
}

impl Artifact {
    /// `{stage_index:02}_{stage}_{step}_{algorithm}[_{params}]_{kind}.png`
    pub fn file_name(&self) -> String {
        let mut name = format!("{:02}_{}_{}_{}", self.stage_index, self.stage, self.step, self.algorithm);
        if !self.params.is_empty() {
            name.push('_');
            name.push_str(&serialize_params(&self.params));
        }
        format!("{name}_{}.png", self.kind)
    }
}

/// Receives diagnostic artifacts as the pipeline produces them.
pub trait DiagnosticSink {
    fn emit(&mut self, artifact: Artifact) -> Result<()>;
}

/// Writes every artifact as a PNG into one directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Fails unless `dir` is an existing directory.
    pub fn new(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(PbnError::Config(format!(
                "intermediate output directory {} does not exist or is not a directory",
                dir.display()
            )));
        }
        Ok(Self { dir: dir.to_path_buf() })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DiagnosticSink for DirectorySink {
    fn emit(&mut self, artifact: Artifact) -> Result<()> {
        let path = self.dir.join(artifact.file_name());
        debug!(path = %path.display(), "writing diagnostic artifact");
        match &artifact.image {
            ArtifactImage::Gray(image) => image_helper::save_png_gray(&path, image),
            ArtifactImage::Rgb(image) => image_helper::save_png_rgb(&path, image),
        }
    }
}

/// Keeps artifacts in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub artifacts: Vec<Artifact>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&mut self, artifact: Artifact) -> Result<()> {
        self.artifacts.push(artifact);
        Ok(())
    }
}

pub fn boundary_mask<S: Region>(model: &RegionModel<S>) -> GrayImage {
    let (width, height) = (model.width(), model.height());
    let labels = model.labels();
    GrayImage::from_fn(width, height, |x, y| {
        let here = labels.get(x, y);
        let differs = (x + 1 < width && labels.get(x + 1, y) != here)
            || (y + 1 < height && labels.get(x, y + 1) != here)
            || (x > 0 && labels.get(x - 1, y) != here)
            || (y > 0 && labels.get(x, y - 1) != here);
        Luma([if differs { 255 } else { 0 }])
    })
}

/// `base` with mask pixels blended toward black. Sizes must match.
pub fn boundary_overlay(base: &RgbImage, mask: &GrayImage) -> Result<RgbImage> {
    if base.dimensions() != mask.dimensions() {
        return Err(PbnError::Config(format!(
            "overlay base is {:?} but mask is {:?}",
            base.dimensions(),
            mask.dimensions()
        )));
    }
    let mut overlay = base.clone();
    for (pixel, edge) in overlay.pixels_mut().zip(mask.pixels()) {
        if edge[0] > 0 {
            *pixel = Color::from(*pixel).blend(&Color::BLACK, OVERLAY_ALPHA).into();
        }
    }
    Ok(overlay)
}

/// Each segment painted with its average color in `image`. Unassigned
/// pixels stay black.
pub fn average_color_preview<S: Region>(image: &RgbImage, model: &RegionModel<S>) -> RgbImage {
    let mut preview = RgbImage::new(model.width(), model.height());
    for segment in model.segments() {
        let color = average_color(image, segment);
        for point in segment.pixels() {
            preview.put_pixel(point.x, point.y, color.into());
        }
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::segmented_image::SegmentedImage;
    use image::Rgb;

    fn halves() -> SegmentedImage {
        SegmentedImage::from_labels(&[vec![0, 0, 1, 1], vec![0, 0, 1, 1]]).unwrap()
    }

    #[test]
    fn mask_marks_both_sides_of_a_boundary() {
        let mask = boundary_mask(&halves());
        let row: Vec<u8> = (0..4).map(|x| mask.get_pixel(x, 0)[0]).collect();
        assert_eq!(row, vec![0, 255, 255, 0]);
    }

    #[test]
    fn overlay_darkens_only_boundaries() {
        let base = RgbImage::from_pixel(4, 2, Rgb([100, 200, 50]));
        let overlay = boundary_overlay(&base, &boundary_mask(&halves())).unwrap();
        assert_eq!(overlay.get_pixel(0, 0), &Rgb([100, 200, 50]));
        assert_eq!(overlay.get_pixel(1, 1), &Rgb([40, 80, 20]));
        assert!(boundary_overlay(&RgbImage::new(1, 1), &GrayImage::new(2, 2)).is_err());
    }

    #[test]
    fn preview_uses_segment_means() {
        let image = RgbImage::from_fn(4, 2, |x, _| Rgb([(x * 10) as u8, 0, 0]));
        let preview = average_color_preview(&image, &halves());
        assert_eq!(preview.get_pixel(0, 1), &Rgb([5, 0, 0]));
        assert_eq!(preview.get_pixel(3, 0), &Rgb([25, 0, 0]));
    }

    #[test]
    fn artifact_file_names_are_deterministic() {
        let artifact = Artifact {
            stage_index: 3,
            stage: PipelineStage::Postprocessing,
            step: 1,
            algorithm: "smooth".to_string(),
            params: ParamMap::new().with("iterations", 2),
            kind: ArtifactKind::BoundaryOverlay,
            image: ArtifactImage::Rgb(RgbImage::new(1, 1)),
        };
        assert_eq!(artifact.file_name(), "03_postprocessing_1_smooth_iterations-2_overlay.png");
    }

    #[test]
    fn directory_sink_validates_and_writes() {
        assert!(DirectorySink::new(Path::new("/definitely/not/here")).is_err());
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(dir.path()).unwrap();
        let artifact = Artifact {
            stage_index: 1,
            stage: PipelineStage::Segmentation,
            step: 0,
            algorithm: "grid".to_string(),
            params: ParamMap::new(),
            kind: ArtifactKind::BoundaryMask,
            image: ArtifactImage::Gray(boundary_mask(&halves())),
        };
        let name = artifact.file_name();
        sink.emit(artifact).unwrap();
        assert!(dir.path().join(name).is_file());
    }
}
