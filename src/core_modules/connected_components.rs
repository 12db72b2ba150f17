// THEORY:
// Connected-component labeling is the region-growing engine behind both
// post-processing transforms. The heavy lifting is done by `imageproc`'s
// two-pass labeller; this module adapts it to the engine's raster of color
// indices and turns its label image back into pixel lists.
//
// Algorithm steps:
// 1.  **Raster Wrapping**: The row-major value slice becomes a
//     `Luma<u32>` image. Value 0 is background and never joins a component.
// 2.  **Labeling**: `connected_components` groups adjacent pixels holding the
//     same value (4- or 8-connected) under one nonzero label.
// 3.  **Data Aggregation**: A raster scan of the label image collects each
//     component's pixels in row-major order. Components are numbered by the
//     raster position of their first pixel, so the output is deterministic
//     whatever numbering the labeller picks.
//
// The watershed flood walks the same adjacency through `neighbours`.

pub mod connected_components {
    use crate::core_modules::segment::Point;
    use image::{ImageBuffer, Luma};
    use imageproc::region_labelling::connected_components;
    use std::collections::HashMap;

    pub use imageproc::region_labelling::Connectivity;

    pub fn offsets(connectivity: Connectivity) -> &'static [(i32, i32)] {
        const FOUR: [(i32, i32); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];
        const EIGHT: [(i32, i32); 8] = [(-1, -1), (0, -1), (1, -1), (-1, 0), (1, 0), (-1, 1), (0, 1), (1, 1)];
        match connectivity {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        }
    }

    /// One maximal group of adjacent pixels holding the same nonzero value.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Component {
        pub value: u32,
        pub pixels: Vec<Point>,
    }

    /// Yields the in-bounds neighbours of `(x, y)` as row-major indices.
    pub fn neighbours(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        connectivity: Connectivity,
    ) -> impl Iterator<Item = usize> {
        offsets(connectivity).iter().filter_map(move |&(dx, dy)| {
            let nx = x as i64 + dx as i64;
            let ny = y as i64 + dy as i64;
            if nx >= 0 && ny >= 0 && nx < width as i64 && ny < height as i64 {
                Some(ny as usize * width as usize + nx as usize)
            } else {
                None
            }
        })
    }

    /// Labels every group of equal, adjacent nonzero values in a row-major
    /// `width x height` raster.
    pub fn label_components(values: &[u32], width: u32, height: u32, connectivity: Connectivity) -> Vec<Component> {
        debug_assert_eq!(values.len(), width as usize * height as usize);
        let raster: ImageBuffer<Luma<u32>, Vec<u32>> =
            ImageBuffer::from_fn(width, height, |x, y| Luma([values[y as usize * width as usize + x as usize]]));
        let labels = connected_components(&raster, connectivity, Luma([0u32]));

        let mut positions: HashMap<u32, usize> = HashMap::new();
        let mut components: Vec<Component> = Vec::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label[0];
            if label == 0 {
                continue;
            }
            let position = *positions.entry(label).or_insert_with(|| {
                components.push(Component {
                    value: raster.get_pixel(x, y)[0],
                    pixels: Vec::new(),
                });
                components.len() - 1
            });
            components[position].pixels.push(Point::new(x, y));
        }
        components
    }
}

#[cfg(test)]
mod tests {
    use super::connected_components::*;
    use crate::core_modules::segment::Point;

    #[test]
    fn diagonal_pixels_join_only_with_eight_connectivity() {
        #[rustfmt::skip]
        let values = [
            1, 0,
            0, 1,
        ];
        let eight = label_components(&values, 2, 2, Connectivity::Eight);
        assert_eq!(eight.len(), 1);
        assert_eq!(eight[0].pixels, vec![Point::new(0, 0), Point::new(1, 1)]);

        let four = label_components(&values, 2, 2, Connectivity::Four);
        assert_eq!(four.len(), 2);
    }

    #[test]
    fn components_partition_foreground_pixels() {
        #[rustfmt::skip]
        let values = [
            1, 1, 2, 2,
            3, 1, 2, 3,
            3, 3, 1, 3,
        ];
        let components = label_components(&values, 4, 3, Connectivity::Four);
        let total: usize = components.iter().map(|c| c.pixels.len()).sum();
        assert_eq!(total, values.len());
        // Components are numbered by their first pixel in raster order.
        let seed_values: Vec<u32> = components.iter().map(|c| c.value).collect();
        assert_eq!(seed_values, vec![1, 2, 3, 3, 1]);
        assert_eq!(components[4].pixels, vec![Point::new(2, 2)]);
    }

    #[test]
    fn adjacent_different_values_stay_apart() {
        #[rustfmt::skip]
        let values = [
            1, 1, 2, 2, 0, 4, 4,
            1, 3, 3, 2, 0, 4, 1,
            0, 3, 0, 0, 0, 0, 1,
            2, 2, 0, 4, 4, 0, 1,
            2, 0, 0, 4, 0, 3, 3,
        ];
        let components = label_components(&values, 7, 5, Connectivity::Eight);
        assert_eq!(components.len(), 8);
        for component in &components {
            assert!(
                component
                    .pixels
                    .iter()
                    .all(|p| values[p.y as usize * 7 + p.x as usize] == component.value)
            );
        }
        let total: usize = components.iter().map(|c| c.pixels.len()).sum();
        assert_eq!(total, values.iter().filter(|&&v| v != 0).count());
    }

    #[test]
    fn background_forms_no_components() {
        let values = [0, 3, 0];
        let components = label_components(&values, 3, 1, Connectivity::Eight);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].pixels, vec![Point::new(1, 0)]);
    }

    #[test]
    fn neighbours_stay_in_bounds() {
        let corner: Vec<usize> = neighbours(0, 0, 3, 3, Connectivity::Eight).collect();
        assert_eq!(corner, vec![1, 3, 4]);
        let centre: Vec<usize> = neighbours(1, 1, 3, 3, Connectivity::Four).collect();
        assert_eq!(centre, vec![1, 3, 5, 7]);
    }
}
