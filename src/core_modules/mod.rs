// THEORY:
// `core_modules` holds the primitives every stage is built from. Nothing in
// here knows about pipelines or algorithm names.
//
// Layering, leaves first:
// 1) `pixel`, `palette`: exact colors and the fixed color set.
// 2) `segment`, `segmented_image`: the region model and its partition rules.
// 3) `connected_components`, `morphology`, `features`: raster operations the
//    algorithms share.
// 4) `params`: the key/value configuration every algorithm is built from.

pub mod connected_components;
pub mod features;
pub mod morphology;
pub mod palette;
pub mod params;
pub mod pixel;
pub mod segment;
pub mod segmented_image;
pub mod utils;
