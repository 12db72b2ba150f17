// THEORY:
// Nearest-seed partition in the joint position/color feature space.
//
// `num_seeds` distinct pixels are drawn uniformly without replacement and
// every pixel joins the seed closest to it (Euclidean, lowest seed index on
// ties). Like k-means, the regions need not be contiguous in the image.

use crate::algorithms::Algorithm;
use crate::algorithms::segmentation::{Segmenter, nearest_labels};
use crate::core_modules::features::{Feature, pixel_features};
use crate::core_modules::params::{ParamMap, ParamValue};
use crate::core_modules::segmented_image::SegmentedImage;
use crate::error::{PbnError, Result};
use image::RgbImage;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;

pub const NAME: &str = "voronoi";

#[derive(Debug, Clone, PartialEq)]
pub struct VoronoiSegmentation {
    pub num_seeds: usize,
    pub spatial_weight: f64,
    pub color_weight: f64,
    pub seed: Option<u64>,
}

impl VoronoiSegmentation {
    pub fn new(num_seeds: usize, spatial_weight: f64, color_weight: f64, seed: Option<u64>) -> Result<Self> {
        if num_seeds < 1 {
            return Err(PbnError::invalid(NAME, "num_seeds must be >= 1"));
        }
        for (key, weight) in [("spatial_weight", spatial_weight), ("color_weight", color_weight)] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(PbnError::invalid(NAME, format!("{key} must be finite and >= 0, got {weight}")));
            }
        }
        Ok(Self {
            num_seeds,
            spatial_weight,
            color_weight,
            seed,
        })
    }

    pub fn from_params(params: &ParamMap) -> Result<Self> {
        params.ensure_known(NAME, &["num_seeds", "spatial_weight", "color_weight", "seed"])?;
        let num_seeds = params.required_int(NAME, "num_seeds")?;
        let num_seeds = usize::try_from(num_seeds)
            .map_err(|_| PbnError::invalid(NAME, format!("num_seeds must be >= 1, got {num_seeds}")))?;
        Self::new(
            num_seeds,
            params.float(NAME, "spatial_weight")?.unwrap_or(1.0),
            params.float(NAME, "color_weight")?.unwrap_or(1.0),
            params.seed(NAME, "seed")?,
        )
    }
}

impl Algorithm for VoronoiSegmentation {
    fn name(&self) -> &'static str {
        NAME
    }

    fn params(&self) -> ParamMap {
        let seed = match self.seed {
            Some(seed) => ParamValue::Int(seed as i64),
            None => ParamValue::Text("none".to_string()),
        };
        ParamMap::new()
            .with("num_seeds", self.num_seeds as i64)
            .with("spatial_weight", self.spatial_weight)
            .with("color_weight", self.color_weight)
            .with("seed", seed)
    }
}

impl Segmenter for VoronoiSegmentation {
    fn segment(&self, image: &RgbImage) -> Result<SegmentedImage> {
        let (width, height) = image.dimensions();
        let pixel_count = width as usize * height as usize;
        if self.num_seeds > pixel_count {
            return Err(PbnError::invalid(
                NAME,
                format!("num_seeds {} exceeds the {pixel_count} pixels of the image", self.num_seeds),
            ));
        }

        let data = pixel_features(image, self.spatial_weight, self.color_weight);
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        let seeds: Vec<Feature> = index::sample(&mut rng, pixel_count, self.num_seeds)
            .into_iter()
            .map(|i| data[i])
            .collect();

        let labels = nearest_labels(&data, &seeds);
        SegmentedImage::from_label_buffer(width, height, &labels)
    }
}
