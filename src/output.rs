// THEORY:
// Output file naming and writing.
//
// Auto-generated names encode everything needed to reproduce a result:
// `{input_stem}_{palette_stem}_{algorithm}_{params}_..._{algorithm}.ppm`.

use crate::core_modules::params::ParamMap;
use crate::core_modules::utils::image_helper::image_helper;
use crate::error::{PbnError, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};

/// `key-value` pairs joined by `_`, in key order.
pub fn serialize_params(params: &ParamMap) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{key}-{value}"))
        .collect::<Vec<_>>()
        .join("_")
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Builds the descriptive output file name from the configured stages.
pub fn make_output_filename(input: &Path, palette: &Path, stages: &[(&str, ParamMap)]) -> String {
    let mut parts = vec![stem(input), stem(palette)];
    for (name, params) in stages {
        if !name.is_empty() {
            parts.push(name.to_string());
        }
        if !params.is_empty() {
            parts.push(serialize_params(params));
        }
    }
    format!("{}.ppm", parts.join("_"))
}

/// The explicit path when given, otherwise an auto-generated name inside
/// `dir`. Fails if the target directory does not exist.
pub fn resolve_output_path(
    explicit: Option<&Path>,
    dir: &Path,
    input: &Path,
    palette: &Path,
    stages: &[(&str, ParamMap)],
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(parent) = parent {
            if !parent.is_dir() {
                return Err(PbnError::Config(format!(
                    "directory for output file does not exist: {}",
                    parent.display()
                )));
            }
        }
        return Ok(path.to_path_buf());
    }
    if !dir.is_dir() {
        return Err(PbnError::Config(format!("{} does not exist or is not a directory", dir.display())));
    }
    Ok(dir.join(make_output_filename(input, palette, stages)))
}

/// Writes the final image as a binary PPM.
pub fn save_ppm(path: &Path, image: &RgbImage) -> Result<()> {
    image_helper::save_ppm(path, image)
}
