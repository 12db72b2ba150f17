use image::{DynamicImage, Rgb, RgbImage};
use paint_by_number::algorithms::Algorithm;
use paint_by_number::algorithms::postprocessing::{MergeSegments, Postprocessor};
use paint_by_number::algorithms::registry::build_segmentation;
use paint_by_number::algorithms::segmentation::Segmenter;
use paint_by_number::diagnostics::{DiagnosticSink, DirectorySink};
use paint_by_number::output::{make_output_filename, resolve_output_path, save_ppm};
use paint_by_number::{Color, Palette, Pipeline, PipelineConfig, StageSpec};
use std::path::Path;

fn spec(text: &str) -> StageSpec {
    text.parse().unwrap()
}

#[test]
fn solid_red_grid_renders_red() {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 0, 0])));
    let palette = Palette::new(vec![Color::new(255, 0, 0), Color::new(0, 0, 255)]).unwrap();
    let config = PipelineConfig::new(spec("grid:cell_size=2"));
    let pipeline = Pipeline::from_config(&config).unwrap();

    let output = pipeline.run(&image, &palette, None).unwrap();
    assert_eq!(output.segment_count, 4);
    assert_eq!(output.image.dimensions(), (4, 4));
    assert!(output.image.pixels().all(|p| p.0 == [255, 0, 0]));

    // Same check one stage at a time.
    let rgb = image.to_rgb8();
    let segmented = build_segmentation(&spec("grid:cell_size=2")).unwrap().segment(&rgb).unwrap();
    assert!(segmented.segments().iter().all(|s| s.pixels.len() == 4));
}

#[test]
fn diagonal_checkerboard_keeps_exact_colors() {
    let black = Rgb([0, 0, 0]);
    let white = Rgb([255, 255, 255]);
    let mut source = RgbImage::new(2, 2);
    source.put_pixel(0, 0, black);
    source.put_pixel(1, 0, white);
    source.put_pixel(0, 1, white);
    source.put_pixel(1, 1, black);
    let palette = Palette::new(vec![Color::BLACK, Color::WHITE]).unwrap();

    let pipeline = Pipeline::from_config(&PipelineConfig::new(spec("grid:cell_size=1"))).unwrap();
    let output = pipeline.run(&DynamicImage::ImageRgb8(source.clone()), &palette, None).unwrap();
    assert_eq!(output.image, source);
    assert_eq!(output.segment_count, 4);
}

#[test]
fn grid_extremes() {
    let image = RgbImage::from_pixel(7, 5, Rgb([1, 2, 3]));
    let per_pixel = build_segmentation(&spec("grid:cell_size=1")).unwrap().segment(&image).unwrap();
    assert_eq!(per_pixel.segment_count(), 35);
    let whole = build_segmentation(&spec("grid:cell_size=7")).unwrap().segment(&image).unwrap();
    assert_eq!(whole.segment_count(), 1);
}

#[test]
fn seeded_segmentations_are_reproducible() {
    let image = RgbImage::from_fn(12, 9, |x, y| Rgb([(x * 20) as u8, (y * 25) as u8, ((x ^ y) * 16) as u8]));
    for text in ["kmeans:num_clusters=5,seed=11", "voronoi:num_seeds=7,seed=11,spatial_weight=2.0"] {
        let segmenter = build_segmentation(&spec(text)).unwrap();
        let first = segmenter.segment(&image).unwrap();
        let second = segmenter.segment(&image).unwrap();
        assert_eq!(first.label_rows(), second.label_rows(), "{}", segmenter.name());
    }
}

#[test]
fn merge_after_assignment_is_idempotent() {
    let image = RgbImage::from_fn(10, 10, |x, y| {
        if (x / 3 + y / 4) % 2 == 0 { Rgb([230, 20, 20]) } else { Rgb([20, 20, 230]) }
    });
    let palette = Palette::new(vec![Color::new(255, 0, 0), Color::new(0, 0, 255)]).unwrap();
    let segmented = build_segmentation(&spec("grid:cell_size=2")).unwrap().segment(&image).unwrap();
    let colored = paint_by_number::algorithms::assignment::assign_average_nearest(&image, &segmented, &palette).unwrap();

    let once = MergeSegments::new().process(&colored).unwrap();
    let twice = MergeSegments::new().process(&once).unwrap();
    assert_eq!(once.pixel_sets(), twice.pixel_sets());
    assert_eq!(once.label_rows(), twice.label_rows());
    assert!(once.segment_count() <= colored.segment_count());
}

#[test]
fn writes_output_and_diagnostics_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let diagnostics_dir = dir.path().join("steps");
    std::fs::create_dir(&diagnostics_dir).unwrap();

    let mut config = PipelineConfig::new(spec("watershed:min_distance=2,h_minima_threshold=0.0"));
    config.preprocessing.push(spec("floyd-steinberg"));
    config.postprocessing.push(spec("merge"));
    let pipeline = Pipeline::from_config(&config).unwrap();

    let source = RgbImage::from_fn(16, 12, |x, _| if x < 8 { Rgb([200, 60, 60]) } else { Rgb([40, 40, 190]) });
    let palette = Palette::new(vec![Color::new(255, 0, 0), Color::new(0, 0, 255), Color::WHITE]).unwrap();
    let mut sink = DirectorySink::new(&diagnostics_dir).unwrap();
    let output = pipeline
        .run(&DynamicImage::ImageRgb8(source), &palette, Some(&mut sink as &mut dyn DiagnosticSink))
        .unwrap();

    let stages = pipeline.describe();
    let path = resolve_output_path(None, dir.path(), Path::new("in/photo.png"), Path::new("warm.txt"), &stages).unwrap();
    assert_eq!(
        path.file_name().and_then(|n| n.to_str()),
        Some(make_output_filename(Path::new("photo.png"), Path::new("warm.txt"), &stages).as_str())
    );
    save_ppm(&path, &output.image).unwrap();
    assert_eq!(image::open(&path).unwrap().to_rgb8(), output.image);

    let written: Vec<String> = std::fs::read_dir(&diagnostics_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    // 1 preprocessing image, then mask/overlay/average for segmentation, assignment and merge.
    assert_eq!(written.len(), 10);
    assert!(written.iter().any(|n| n == "00_preprocessing_0_floyd-steinberg_image.png"));
    assert!(written.iter().any(|n| n.starts_with("01_segmentation_0_watershed_") && n.ends_with("_boundaries.png")));
    assert!(written.iter().any(|n| n == "03_postprocessing_0_merge_average.png"));
}

#[test]
fn json_config_drives_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.json");
    std::fs::write(
        &path,
        r#"{
            "preprocessing": [{"algorithm": "nop"}],
            "segmentation": {"algorithm": "voronoi", "params": {"num_seeds": 4, "seed": 5}},
            "postprocessing": [{"algorithm": "smooth", "params": {"kernel_shape": "square"}}],
            "rendering": {"algorithm": "colored", "params": {"color_map": true}}
        }"#,
    )
    .unwrap();

    let config = PipelineConfig::load(&path).unwrap();
    let pipeline = Pipeline::from_config(&config).unwrap();
    let image = DynamicImage::ImageRgb8(RgbImage::from_fn(8, 8, |x, y| Rgb([(x * 30) as u8, (y * 30) as u8, 90])));
    let palette = Palette::new(vec![Color::BLACK, Color::WHITE, Color::new(120, 120, 120)]).unwrap();
    let output = pipeline.run(&image, &palette, None).unwrap();

    let color_map = output.color_map.unwrap();
    assert_eq!(color_map.len(), output.segment_count);
    assert!(output.image.pixels().all(|p| palette.colors().contains(&Color::from(p))));
}
