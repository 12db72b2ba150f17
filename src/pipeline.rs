// THEORY:
// The `pipeline` module is the top-level API of the engine. It chains the
// stages in a fixed order and owns no algorithmic logic of its own:
//
//   Preprocessing -> Segmentation -> Assignment -> Postprocessing -> Rendering -> Done
//
// Key architectural principles:
// 1) Eager validation: `Pipeline::from_config` resolves every algorithm name
//    and checks every parameter before any pixel is touched.
// 2) Fresh values per stage: every stage receives the previous stage's output
//    by reference and returns a new image or region model. Nothing is mutated
//    in place, so diagnostics can look at any intermediate result.
// 3) All or nothing: the first error aborts the run. There is no partial
//    output.
// 4) Side artifacts: when a `DiagnosticSink` is supplied, every step emits a
//    boundary mask, a boundary overlay and an average-color preview of the
//    current region model (preprocessing steps emit their output image).

use crate::algorithms::Algorithm;
use crate::algorithms::assignment::{Assignment, ColorAssigner};
use crate::algorithms::postprocessing::{Postprocessing, Postprocessor};
use crate::algorithms::preprocessing::{Preprocessing, Preprocessor};
use crate::algorithms::registry;
use crate::algorithms::rendering::{Renderer, Rendering};
use crate::algorithms::segmentation::{Segmentation, Segmenter};
use crate::core_modules::palette::Palette;
use crate::core_modules::params::{ParamMap, StageSpec};
use crate::core_modules::pixel::pixel::Color;
use crate::core_modules::segment::{Region, SegmentId};
use crate::core_modules::segmented_image::RegionModel;
use crate::core_modules::utils::image_helper::image_helper;
use crate::diagnostics::{
    Artifact, ArtifactImage, ArtifactKind, DiagnosticSink, average_color_preview, boundary_mask, boundary_overlay,
};
use crate::error::Result;
use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, info_span};

/// Declarative description of a run, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub preprocessing: Vec<StageSpec>,
    pub segmentation: StageSpec,
    #[serde(default = "default_assignment")]
    pub assignment: StageSpec,
    #[serde(default)]
    pub postprocessing: Vec<StageSpec>,
    #[serde(default = "default_rendering")]
    pub rendering: StageSpec,
}

fn default_assignment() -> StageSpec {
    StageSpec::new("average-nearest", ParamMap::new())
}

fn default_rendering() -> StageSpec {
    StageSpec::new("colored", ParamMap::new())
}

impl PipelineConfig {
    /// No preprocessing or postprocessing, average-nearest assignment and
    /// colored rendering around the given segmentation.
    pub fn new(segmentation: StageSpec) -> Self {
        Self {
            preprocessing: Vec::new(),
            segmentation,
            assignment: default_assignment(),
            postprocessing: Vec::new(),
            rendering: default_rendering(),
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

/// The states a run passes through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Preprocessing,
    Segmentation,
    Assignment,
    Postprocessing,
    Rendering,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PipelineStage::Preprocessing => "preprocessing",
            PipelineStage::Segmentation => "segmentation",
            PipelineStage::Assignment => "assignment",
            PipelineStage::Postprocessing => "postprocessing",
            PipelineStage::Rendering => "rendering",
            PipelineStage::Done => "done",
        })
    }
}

/// The result of a complete run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub image: RgbImage,
    /// Present when the renderer was asked for one.
    pub color_map: Option<BTreeMap<SegmentId, Color>>,
    /// Number of segments in the final region model.
    pub segment_count: usize,
    /// Every state the run went through, ending with `Done`.
    pub visited: Vec<PipelineStage>,
}

/// A fully validated chain of stages.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    preprocessing: Vec<Preprocessing>,
    segmentation: Segmentation,
    assignment: Assignment,
    postprocessing: Vec<Postprocessing>,
    rendering: Rendering,
}

/// Numbers and forwards artifacts when a sink is attached.
struct Recorder<'a> {
    sink: Option<&'a mut dyn DiagnosticSink>,
    stage_index: usize,
}

impl Recorder<'_> {
    fn enabled(&self) -> bool {
        self.sink.is_some()
    }

    fn emit(
        &mut self,
        stage: PipelineStage,
        step: usize,
        algorithm: &dyn Algorithm,
        images: Vec<(ArtifactKind, ArtifactImage)>,
    ) -> Result<()> {
        let Some(sink) = self.sink.as_deref_mut() else {
            return Ok(());
        };
        for (kind, image) in images {
            sink.emit(Artifact {
                stage_index: self.stage_index,
                stage,
                step,
                algorithm: algorithm.name().to_string(),
                params: algorithm.params(),
                kind,
                image,
            })?;
        }
        self.stage_index += 1;
        Ok(())
    }

    /// Emits mask, overlay and average preview of `model` over `working`.
    fn emit_model<S: Region>(
        &mut self,
        stage: PipelineStage,
        step: usize,
        algorithm: &dyn Algorithm,
        working: &RgbImage,
        model: &RegionModel<S>,
    ) -> Result<()> {
        if !self.enabled() {
            return Ok(());
        }
        let mask = boundary_mask(model);
        let overlay = boundary_overlay(working, &mask)?;
        let preview = average_color_preview(working, model);
        self.emit(
            stage,
            step,
            algorithm,
            vec![
                (ArtifactKind::BoundaryMask, ArtifactImage::Gray(mask)),
                (ArtifactKind::BoundaryOverlay, ArtifactImage::Rgb(overlay)),
                (ArtifactKind::AveragePreview, ArtifactImage::Rgb(preview)),
            ],
        )
    }
}

impl Pipeline {
    pub fn new(
        preprocessing: Vec<Preprocessing>,
        segmentation: Segmentation,
        assignment: Assignment,
        postprocessing: Vec<Postprocessing>,
        rendering: Rendering,
    ) -> Self {
        Self {
            preprocessing,
            segmentation,
            assignment,
            postprocessing,
            rendering,
        }
    }

    /// Resolves and validates every stage of `config`.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            preprocessing: config
                .preprocessing
                .iter()
                .map(registry::build_preprocessing)
                .collect::<Result<_>>()?,
            segmentation: registry::build_segmentation(&config.segmentation)?,
            assignment: registry::build_assignment(&config.assignment)?,
            postprocessing: config
                .postprocessing
                .iter()
                .map(registry::build_postprocessing)
                .collect::<Result<_>>()?,
            rendering: registry::build_rendering(&config.rendering)?,
        })
    }

    /// Name and parameters of every configured step, in execution order.
    pub fn describe(&self) -> Vec<(&'static str, ParamMap)> {
        let mut stages: Vec<(&'static str, ParamMap)> =
            self.preprocessing.iter().map(|p| (p.name(), p.params())).collect();
        stages.push((self.segmentation.name(), self.segmentation.params()));
        stages.push((self.assignment.name(), self.assignment.params()));
        stages.extend(self.postprocessing.iter().map(|p| (p.name(), p.params())));
        stages.push((self.rendering.name(), self.rendering.params()));
        stages
    }

    pub fn run(
        &self,
        image: &DynamicImage,
        palette: &Palette,
        diagnostics: Option<&mut dyn DiagnosticSink>,
    ) -> Result<PipelineOutput> {
        let mut recorder = Recorder {
            sink: diagnostics,
            stage_index: 0,
        };
        let mut visited = Vec::with_capacity(6);
        info!(
            width = image.width(),
            height = image.height(),
            palette = palette.len(),
            "starting paint-by-number run"
        );

        // Stage 1: Preprocessing
        visited.push(PipelineStage::Preprocessing);
        let mut working = image_helper::coerce_rgb(image)?;
        for (step, preprocessor) in self.preprocessing.iter().enumerate() {
            let _span = info_span!("preprocessing", step, algorithm = preprocessor.name()).entered();
            working = preprocessor.process(&working, palette)?;
            if recorder.enabled() {
                recorder.emit(
                    PipelineStage::Preprocessing,
                    step,
                    preprocessor,
                    vec![(ArtifactKind::Image, ArtifactImage::Rgb(working.clone()))],
                )?;
            }
        }

        // Stage 2: Segmentation
        visited.push(PipelineStage::Segmentation);
        let segmented = {
            let _span = info_span!("segmentation", algorithm = self.segmentation.name()).entered();
            let segmented = self.segmentation.segment(&working)?;
            info!(segments = segmented.segment_count(), "segmentation finished");
            segmented
        };
        recorder.emit_model(PipelineStage::Segmentation, 0, &self.segmentation, &working, &segmented)?;

        // Stage 3: Color assignment
        visited.push(PipelineStage::Assignment);
        let mut colored = {
            let _span = info_span!("assignment", algorithm = self.assignment.name()).entered();
            let colored = self.assignment.assign(&working, &segmented, palette)?;
            debug!(colors = colored.distinct_colors().len(), "colors assigned");
            colored
        };
        recorder.emit_model(PipelineStage::Assignment, 0, &self.assignment, &working, &colored)?;

        // Stage 4: Post-processing chain
        visited.push(PipelineStage::Postprocessing);
        for (step, postprocessor) in self.postprocessing.iter().enumerate() {
            let _span = info_span!("postprocessing", step, algorithm = postprocessor.name()).entered();
            colored = postprocessor.process(&colored)?;
            info!(segments = colored.segment_count(), "post-processing step finished");
            recorder.emit_model(PipelineStage::Postprocessing, step, postprocessor, &working, &colored)?;
        }

        // Stage 5: Rendering
        visited.push(PipelineStage::Rendering);
        let rendered = {
            let _span = info_span!("rendering", algorithm = self.rendering.name()).entered();
            self.rendering.render(&colored)?
        };

        visited.push(PipelineStage::Done);
        info!(segments = colored.segment_count(), "run complete");
        Ok(PipelineOutput {
            image: rendered.image,
            color_map: rendered.color_map,
            segment_count: colored.segment_count(),
            visited,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemorySink;
    use image::Rgb;

    fn red_blue_palette() -> Palette {
        Palette::new(vec![Color::new(255, 0, 0), Color::new(0, 0, 255)]).unwrap()
    }

    #[test]
    fn config_defaults_fill_in_assignment_and_rendering() {
        let config = PipelineConfig::from_json(r#"{"segmentation": {"algorithm": "grid", "params": {"cell_size": 2}}}"#)
            .unwrap();
        assert_eq!(config, PipelineConfig::new(StageSpec::new("grid", ParamMap::new().with("cell_size", 2))));
        assert!(PipelineConfig::from_json("{").is_err());
    }

    #[test]
    fn null_seed_in_json_builds_an_unseeded_stage() {
        let config = PipelineConfig::from_json(
            r#"{"segmentation": {"algorithm": "voronoi", "params": {"num_seeds": 3, "seed": null}}}"#,
        )
        .unwrap();
        let pipeline = Pipeline::from_config(&config).unwrap();
        assert_eq!(pipeline.describe()[0].1.text("seed").as_deref(), Some("none"));
    }

    #[test]
    fn from_config_rejects_bad_stages_eagerly() {
        let mut config = PipelineConfig::new("grid:cell_size=2".parse().unwrap());
        config.postprocessing.push("merge".parse().unwrap());
        assert!(Pipeline::from_config(&config).is_ok());

        config.postprocessing.push("blur".parse().unwrap());
        assert!(Pipeline::from_config(&config).is_err());

        let config = PipelineConfig::new("grid:cell_size=0".parse().unwrap());
        assert!(Pipeline::from_config(&config).is_err());
    }

    #[test]
    fn visits_every_state_in_order() {
        let pipeline = Pipeline::from_config(&PipelineConfig::new("grid:cell_size=2".parse().unwrap())).unwrap();
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([250, 10, 10])));
        let output = pipeline.run(&image, &red_blue_palette(), None).unwrap();
        assert_eq!(
            output.visited,
            vec![
                PipelineStage::Preprocessing,
                PipelineStage::Segmentation,
                PipelineStage::Assignment,
                PipelineStage::Postprocessing,
                PipelineStage::Rendering,
                PipelineStage::Done,
            ]
        );
        assert_eq!(output.segment_count, 4);
        assert!(output.image.pixels().all(|p| p.0 == [255, 0, 0]));
    }

    #[test]
    fn diagnostics_cover_every_step() {
        let config = PipelineConfig {
            preprocessing: vec!["nearest".parse().unwrap()],
            segmentation: "grid:cell_size=1".parse().unwrap(),
            assignment: default_assignment(),
            postprocessing: vec!["merge".parse().unwrap(), "smooth".parse().unwrap()],
            rendering: "colored:color_map=true".parse().unwrap(),
        };
        let pipeline = Pipeline::from_config(&config).unwrap();
        let image = DynamicImage::ImageRgb8(RgbImage::from_fn(6, 6, |x, _| {
            if x < 3 { Rgb([240, 0, 0]) } else { Rgb([0, 0, 240]) }
        }));

        let mut sink = MemorySink::new();
        let output = pipeline.run(&image, &red_blue_palette(), Some(&mut sink)).unwrap();
        assert_eq!(output.segment_count, 2);
        assert_eq!(output.color_map.map(|m| m.len()), Some(2));

        // 1 preprocessing image + 3 artifacts for segmentation, assignment and each postprocessing step.
        assert_eq!(sink.artifacts.len(), 1 + 3 * 4);
        let indices: Vec<usize> = sink.artifacts.iter().map(|a| a.stage_index).collect();
        assert_eq!(indices, vec![0, 1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4]);
        assert_eq!(sink.artifacts[0].kind, ArtifactKind::Image);
        assert_eq!(sink.artifacts.last().map(|a| a.stage), Some(PipelineStage::Postprocessing));
    }

    #[test]
    fn describe_lists_steps_in_order() {
        let mut config = PipelineConfig::new("voronoi:num_seeds=3,seed=1".parse().unwrap());
        config.preprocessing.push("floyd-steinberg".parse().unwrap());
        let pipeline = Pipeline::from_config(&config).unwrap();
        let names: Vec<&str> = pipeline.describe().iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["floyd-steinberg", "voronoi", "average-nearest", "colored"]);
    }
}
