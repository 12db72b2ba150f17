// THEORY:
// Centroid clustering of pixels in the joint position/color feature space.
//
// Each restart seeds its centroids with k-means++ and then runs Lloyd
// iterations until the total centroid shift drops to `tolerance` or
// `max_iter` is reached. The restart with the lowest inertia wins. All
// restarts draw from one random source, so a fixed `seed` reproduces the
// labels exactly. Clusters mix spatial and color distance, so a segment is
// not necessarily contiguous.

use crate::algorithms::Algorithm;
use crate::algorithms::segmentation::{Segmenter, nearest_labels};
use crate::core_modules::features::{self, Feature, pixel_features};
use crate::core_modules::params::{ParamMap, ParamValue};
use crate::core_modules::segmented_image::SegmentedImage;
use crate::error::{PbnError, Result};
use image::RgbImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

pub const NAME: &str = "kmeans";

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansSegmentation {
    pub num_clusters: usize,
    pub spatial_weight: f64,
    pub color_weight: f64,
    pub seed: Option<u64>,
    /// Number of independent restarts.
    pub n_init: usize,
    pub max_iter: usize,
    /// Convergence threshold on the summed squared centroid shift.
    pub tolerance: f64,
}

/// Outcome of one restart.
struct Clustering {
    centroids: Vec<Feature>,
    inertia: f64,
    iterations: usize,
}

impl KMeansSegmentation {
    pub fn new(num_clusters: usize, spatial_weight: f64, color_weight: f64, seed: Option<u64>) -> Result<Self> {
        let segmentation = Self {
            num_clusters,
            spatial_weight,
            color_weight,
            seed,
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
        };
        segmentation.validate()?;
        Ok(segmentation)
    }

    pub fn from_params(params: &ParamMap) -> Result<Self> {
        params.ensure_known(
            NAME,
            &["num_clusters", "spatial_weight", "color_weight", "seed", "n_init", "max_iter", "tolerance"],
        )?;
        let segmentation = Self {
            num_clusters: non_negative(params.required_int(NAME, "num_clusters")?, "num_clusters")?,
            spatial_weight: params.float(NAME, "spatial_weight")?.unwrap_or(1.0),
            color_weight: params.float(NAME, "color_weight")?.unwrap_or(1.0),
            seed: params.seed(NAME, "seed")?,
            n_init: non_negative(params.int(NAME, "n_init")?.unwrap_or(10), "n_init")?,
            max_iter: non_negative(params.int(NAME, "max_iter")?.unwrap_or(300), "max_iter")?,
            tolerance: params.float(NAME, "tolerance")?.unwrap_or(1e-4),
        };
        segmentation.validate()?;
        Ok(segmentation)
    }

    fn validate(&self) -> Result<()> {
        if self.num_clusters < 1 {
            return Err(PbnError::invalid(NAME, "num_clusters must be >= 1"));
        }
        for (key, weight) in [("spatial_weight", self.spatial_weight), ("color_weight", self.color_weight)] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(PbnError::invalid(NAME, format!("{key} must be finite and >= 0, got {weight}")));
            }
        }
        if self.n_init < 1 {
            return Err(PbnError::invalid(NAME, "n_init must be >= 1"));
        }
        if self.max_iter < 1 {
            return Err(PbnError::invalid(NAME, "max_iter must be >= 1"));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(PbnError::invalid(NAME, "tolerance must be finite and >= 0"));
        }
        Ok(())
    }

    fn run_once(&self, data: &[Feature], rng: &mut StdRng) -> Clustering {
        let mut centroids = initialize_centroids(data, self.num_clusters, rng);
        let mut iterations = 0;

        for iteration in 1..=self.max_iter {
            iterations = iteration;
            let assignments = nearest_labels(data, &centroids);

            let mut sums = vec![[0.0; 5]; centroids.len()];
            let mut counts = vec![0usize; centroids.len()];
            for (point, &cluster) in data.iter().zip(assignments.iter()) {
                for (sum, value) in sums[cluster as usize].iter_mut().zip(point.iter()) {
                    *sum += value;
                }
                counts[cluster as usize] += 1;
            }

            let mut new_centroids = centroids.clone();
            for (cluster, (sum, &count)) in sums.iter().zip(counts.iter()).enumerate() {
                if count > 0 {
                    new_centroids[cluster] = sum.map(|value| value / count as f64);
                } else {
                    // Empty cluster: move it onto the point worst served by the current centroids.
                    if let Some(index) = farthest_point(data, &assignments, &centroids) {
                        new_centroids[cluster] = data[index];
                    }
                }
            }

            let shift: f64 = centroids
                .iter()
                .zip(new_centroids.iter())
                .map(|(old, new)| features::distance_squared(old, new))
                .sum();
            centroids = new_centroids;
            if shift <= self.tolerance {
                break;
            }
        }

        let inertia = data.iter().map(|point| features::nearest(point, &centroids).1).sum();
        Clustering {
            centroids,
            inertia,
            iterations,
        }
    }
}

fn non_negative(value: i64, key: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| PbnError::invalid(NAME, format!("{key} must be >= 1, got {value}")))
}

/// k-means++: the first centroid is uniform, later ones are drawn with
/// probability proportional to the squared distance to the nearest chosen one.
fn initialize_centroids(data: &[Feature], k: usize, rng: &mut StdRng) -> Vec<Feature> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(data[rng.random_range(0..data.len())]);
    let mut distances: Vec<f64> = data
        .iter()
        .map(|point| features::distance_squared(point, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = distances.iter().sum();
        let chosen = if total <= 0.0 {
            rng.random_range(0..data.len())
        } else {
            let threshold = rng.random::<f64>() * total;
            let mut cumulative = 0.0;
            let mut chosen = data.len() - 1;
            for (index, &distance) in distances.iter().enumerate() {
                cumulative += distance;
                if cumulative > threshold {
                    chosen = index;
                    break;
                }
            }
            chosen
        };
        let centroid = data[chosen];
        for (distance, point) in distances.iter_mut().zip(data.iter()) {
            *distance = distance.min(features::distance_squared(point, &centroid));
        }
        centroids.push(centroid);
    }

    centroids
}

fn farthest_point(data: &[Feature], assignments: &[u32], centroids: &[Feature]) -> Option<usize> {
    data.iter()
        .zip(assignments.iter())
        .map(|(point, &cluster)| features::distance_squared(point, &centroids[cluster as usize]))
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (index, distance)| match best {
            Some((_, best_distance)) if best_distance >= distance => best,
            _ => Some((index, distance)),
        })
        .map(|(index, _)| index)
}

impl Algorithm for KMeansSegmentation {
    fn name(&self) -> &'static str {
        NAME
    }

    fn params(&self) -> ParamMap {
        let seed = match self.seed {
            Some(seed) => ParamValue::Int(seed as i64),
            None => ParamValue::Text("none".to_string()),
        };
        ParamMap::new()
            .with("num_clusters", self.num_clusters as i64)
            .with("spatial_weight", self.spatial_weight)
            .with("color_weight", self.color_weight)
            .with("seed", seed)
    }
}

impl Segmenter for KMeansSegmentation {
    fn segment(&self, image: &RgbImage) -> Result<SegmentedImage> {
        let (width, height) = image.dimensions();
        let pixel_count = width as usize * height as usize;
        if self.num_clusters > pixel_count {
            return Err(PbnError::invalid(
                NAME,
                format!("num_clusters {} exceeds the {pixel_count} pixels of the image", self.num_clusters),
            ));
        }

        let data = pixel_features(image, self.spatial_weight, self.color_weight);
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };

        let mut best: Option<Clustering> = None;
        for restart in 0..self.n_init {
            let clustering = self.run_once(&data, &mut rng);
            debug!(
                restart,
                iterations = clustering.iterations,
                inertia = clustering.inertia,
                "k-means restart finished"
            );
            if best.as_ref().is_none_or(|b| clustering.inertia < b.inertia) {
                best = Some(clustering);
            }
        }

        let centroids = best.map(|b| b.centroids).unwrap_or_default();
        let labels = nearest_labels(&data, &centroids);
        SegmentedImage::from_label_buffer(width, height, &labels)
    }
}
