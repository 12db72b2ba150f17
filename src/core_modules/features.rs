// THEORY:
// The 5-dimensional pixel feature space shared by the clustering and
// Voronoi segmenters: normalized position scaled by a spatial weight followed
// by normalized color scaled by a color weight.

use image::RgbImage;

pub type Feature = [f64; 5];

/// One feature per pixel, row-major: `[x/w·s, y/h·s, r/255·c, g/255·c, b/255·c]`.
pub fn pixel_features(image: &RgbImage, spatial_weight: f64, color_weight: f64) -> Vec<Feature> {
    let (width, height) = image.dimensions();
    let mut features = Vec::with_capacity(width as usize * height as usize);
    for (x, y, pixel) in image.enumerate_pixels() {
        features.push([
            x as f64 / width as f64 * spatial_weight,
            y as f64 / height as f64 * spatial_weight,
            pixel[0] as f64 / 255.0 * color_weight,
            pixel[1] as f64 / 255.0 * color_weight,
            pixel[2] as f64 / 255.0 * color_weight,
        ]);
    }
    features
}

#[inline]
pub fn distance_squared(a: &Feature, b: &Feature) -> f64 {
    a.iter().zip(b.iter()).map(|(p, q)| (p - q) * (p - q)).sum()
}

/// Index of the closest candidate; the lowest index wins ties.
pub fn nearest(feature: &Feature, candidates: &[Feature]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (index, candidate) in candidates.iter().enumerate() {
        let distance = distance_squared(feature, candidate);
        if distance < best.1 {
            best = (index, distance);
        }
    }
    best
}
