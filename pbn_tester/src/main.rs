use anyhow::{Context, Result, bail};
use clap::Parser;
use paint_by_number::diagnostics::{DiagnosticSink, DirectorySink};
use paint_by_number::output::{resolve_output_path, save_ppm};
use paint_by_number::{Palette, Pipeline, PipelineConfig, StageSpec};
use std::path::PathBuf;
use tracing::info;

/// Turns an image into a flat-colored paint-by-number rendering (binary PPM).
///
/// Stage specs are written `name` or `name:key=value,key=value`, for example
/// `grid:cell_size=8` or `kmeans:num_clusters=12,seed=3`.
#[derive(Parser, Debug)]
#[command(name = "pbn_tester", version)]
struct Cli {
    /// Image to turn into a paint by number.
    input: PathBuf,

    /// Palette file with one `R,G,B` or `#RRGGBB` color per line.
    palette: PathBuf,

    /// Preprocessing step (nop, floyd-steinberg, nearest). Repeatable.
    #[arg(long = "preprocess", value_name = "SPEC")]
    preprocess: Vec<StageSpec>,

    /// Segmentation (grid, voronoi, kmeans, watershed).
    #[arg(long = "segment", value_name = "SPEC")]
    segment: Option<StageSpec>,

    /// Color assignment. Default: average-nearest.
    #[arg(long = "assign", value_name = "SPEC")]
    assign: Option<StageSpec>,

    /// Post-processing step (merge, smooth). Repeatable.
    #[arg(long = "postprocess", value_name = "SPEC")]
    postprocess: Vec<StageSpec>,

    /// Rendering. Default: colored.
    #[arg(long = "render", value_name = "SPEC")]
    render: Option<StageSpec>,

    /// JSON pipeline file. Stage flags given on the command line override it.
    #[arg(long, value_name = "JSON")]
    config: Option<PathBuf>,

    /// Directory for the auto-named output file.
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Exact output path. Overrides --dir.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for per-stage diagnostic images.
    #[arg(long, value_name = "DIR")]
    intermediate_dir: Option<PathBuf>,
}

impl Cli {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match (&self.config, &self.segment) {
            (Some(path), _) => PipelineConfig::load(path)
                .with_context(|| format!("failed to load pipeline config {}", path.display()))?,
            (None, Some(segment)) => PipelineConfig::new(segment.clone()),
            (None, None) => bail!("either --segment or --config is required"),
        };
        if let Some(segment) = &self.segment {
            config.segmentation = segment.clone();
        }
        if !self.preprocess.is_empty() {
            config.preprocessing = self.preprocess.clone();
        }
        if let Some(assign) = &self.assign {
            config.assignment = assign.clone();
        }
        if !self.postprocess.is_empty() {
            config.postprocessing = self.postprocess.clone();
        }
        if let Some(render) = &self.render {
            config.rendering = render.clone();
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // --- 1. Argument Parsing & Validation ---
    let cli = Cli::parse();
    let pipeline = Pipeline::from_config(&cli.pipeline_config()?).context("invalid pipeline configuration")?;
    let stages = pipeline.describe();
    let output_path = resolve_output_path(cli.output.as_deref(), &cli.dir, &cli.input, &cli.palette, &stages)?;
    let mut sink = cli
        .intermediate_dir
        .as_deref()
        .map(DirectorySink::new)
        .transpose()
        .context("invalid intermediate output directory")?;

    // --- 2. Input Loading ---
    let image = image::open(&cli.input).with_context(|| format!("failed to open image {}", cli.input.display()))?;
    let palette =
        Palette::load(&cli.palette).with_context(|| format!("failed to load palette {}", cli.palette.display()))?;

    // --- 3. Pipeline Run ---
    let diagnostics = sink.as_mut().map(|s| s as &mut dyn DiagnosticSink);
    let result = pipeline.run(&image, &palette, diagnostics)?;

    // --- 4. Output ---
    save_ppm(&output_path, &result.image).with_context(|| format!("failed to save {}", output_path.display()))?;
    if let Some(color_map) = &result.color_map {
        for (id, color) in color_map {
            println!("{id}\t{}", color.to_hex());
        }
    }
    info!(segments = result.segment_count, path = %output_path.display(), "saved output image");
    println!("Saved output image to: {}", output_path.display());
    Ok(())
}
