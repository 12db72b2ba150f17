// THEORY:
// Maps algorithm names to stage implementations.
//
// Each stage has a kind enum whose `FromStr`/`Display` use the command-line
// names, and whose `build` validates a parameter map and returns the
// configured stage.

use crate::algorithms::assignment::Assignment;
use crate::algorithms::postprocessing::{MergeSegments, Postprocessing, SmoothBoundaries};
use crate::algorithms::preprocessing::Preprocessing;
use crate::algorithms::rendering::Rendering;
use crate::algorithms::segmentation::{
    GridSegmentation, KMeansSegmentation, Segmentation, VoronoiSegmentation, WatershedSegmentation,
};
use crate::core_modules::params::{ParamMap, StageSpec};
use crate::error::{PbnError, Result};
use std::fmt;
use std::str::FromStr;

/// Declares a kind enum with its name table, `FromStr` and `Display`.
macro_rules! kind_enum {
    ($kind:ident, $stage:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $kind {
            $($variant),+
        }

        impl $kind {
            pub const ALL: &'static [$kind] = &[$($kind::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($kind::$variant => $name),+
                }
            }
        }

        impl FromStr for $kind {
            type Err = PbnError;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok($kind::$variant),)+
                    _ => Err(PbnError::UnknownAlgorithm {
                        stage: $stage,
                        name: s.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $kind {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

kind_enum!(PreprocessingKind, "preprocessing", {
    Nop => "nop",
    FloydSteinberg => "floyd-steinberg",
    Nearest => "nearest",
});

kind_enum!(SegmentationKind, "segmentation", {
    Grid => "grid",
    Voronoi => "voronoi",
    KMeans => "kmeans",
    Watershed => "watershed",
});

kind_enum!(AssignmentKind, "assignment", {
    AverageNearest => "average-nearest",
});

kind_enum!(PostprocessingKind, "postprocessing", {
    Merge => "merge",
    Smooth => "smooth",
});

kind_enum!(RenderingKind, "rendering", {
    Colored => "colored",
});

impl PreprocessingKind {
    pub fn build(&self, params: &ParamMap) -> Result<Preprocessing> {
        let stage = match self {
            PreprocessingKind::Nop => Preprocessing::Nop,
            PreprocessingKind::FloydSteinberg => Preprocessing::FloydSteinberg,
            PreprocessingKind::Nearest => Preprocessing::Nearest,
        };
        stage.with_params(params)
    }
}

impl SegmentationKind {
    pub fn build(&self, params: &ParamMap) -> Result<Segmentation> {
        Ok(match self {
            SegmentationKind::Grid => Segmentation::Grid(GridSegmentation::from_params(params)?),
            SegmentationKind::Voronoi => Segmentation::Voronoi(VoronoiSegmentation::from_params(params)?),
            SegmentationKind::KMeans => Segmentation::KMeans(KMeansSegmentation::from_params(params)?),
            SegmentationKind::Watershed => Segmentation::Watershed(WatershedSegmentation::from_params(params)?),
        })
    }
}

impl AssignmentKind {
    pub fn build(&self, params: &ParamMap) -> Result<Assignment> {
        match self {
            AssignmentKind::AverageNearest => Assignment::AverageNearest.with_params(params),
        }
    }
}

impl PostprocessingKind {
    pub fn build(&self, params: &ParamMap) -> Result<Postprocessing> {
        Ok(match self {
            PostprocessingKind::Merge => Postprocessing::Merge(MergeSegments::from_params(params)?),
            PostprocessingKind::Smooth => Postprocessing::Smooth(SmoothBoundaries::from_params(params)?),
        })
    }
}

impl RenderingKind {
    pub fn build(&self, params: &ParamMap) -> Result<Rendering> {
        match self {
            RenderingKind::Colored => Rendering::colored_from_params(params),
        }
    }
}

pub fn build_preprocessing(spec: &StageSpec) -> Result<Preprocessing> {
    spec.algorithm.parse::<PreprocessingKind>()?.build(&spec.params)
}

pub fn build_segmentation(spec: &StageSpec) -> Result<Segmentation> {
    spec.algorithm.parse::<SegmentationKind>()?.build(&spec.params)
}

pub fn build_assignment(spec: &StageSpec) -> Result<Assignment> {
    spec.algorithm.parse::<AssignmentKind>()?.build(&spec.params)
}

pub fn build_postprocessing(spec: &StageSpec) -> Result<Postprocessing> {
    spec.algorithm.parse::<PostprocessingKind>()?.build(&spec.params)
}

pub fn build_rendering(spec: &StageSpec) -> Result<Rendering> {
    spec.algorithm.parse::<RenderingKind>()?.build(&spec.params)
}
