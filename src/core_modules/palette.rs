// THEORY:
// The fixed set of colors a rendering may use, plus the palette text format.
//
// A palette file holds one color per line, either `R,G,B` or `#RRGGBB`.
// Blank lines and lines starting with `#` (that are not hex colors) are
// ignored, as is anything after an inline `#`.

use crate::core_modules::pixel::pixel::Color;
use crate::error::{PbnError, Result};
use std::path::Path;
use tracing::debug;

/// An ordered, non-empty list of colors. Duplicates are allowed; the first
/// occurrence wins every nearest-color tie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Color>,
}

impl Palette {
    pub fn new(colors: Vec<Color>) -> Result<Self> {
        if colors.is_empty() {
            return Err(PbnError::EmptyPalette);
        }
        Ok(Self { colors })
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Index of the palette color closest to `color`. Ties go to the
    /// earliest entry.
    pub fn nearest_index(&self, color: &Color) -> usize {
        self.nearest_index_rgb([color.red as i32, color.green as i32, color.blue as i32])
    }

    /// Same as `nearest_index` for a triple that may lie outside 0..=255,
    /// as produced by error diffusion.
    pub fn nearest_index_rgb(&self, rgb: [i32; 3]) -> usize {
        let mut best_index = 0;
        let mut best_distance = i64::MAX;
        for (index, candidate) in self.colors.iter().enumerate() {
            let distance: i64 = [candidate.red, candidate.green, candidate.blue]
                .iter()
                .zip(rgb)
                .map(|(&c, v)| {
                    let d = v as i64 - c as i64;
                    d * d
                })
                .sum();
            if distance < best_distance {
                best_distance = distance;
                best_index = index;
            }
        }
        best_index
    }

    /// The palette color closest to `color` (Euclidean RGB distance).
    pub fn nearest(&self, color: &Color) -> Color {
        self.colors[self.nearest_index(color)]
    }

    /// Parses palette text. Any malformed line aborts the whole parse.
    pub fn parse(text: &str) -> Result<Self> {
        let mut colors = Vec::new();
        for (index, raw_line) in text.lines().enumerate() {
            if let Some(color) = parse_line(index + 1, raw_line)? {
                colors.push(color);
            }
        }
        debug!(colors = colors.len(), "parsed palette");
        Self::new(colors)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }
}

fn parse_line(line: usize, raw_line: &str) -> Result<Option<Color>> {
    let trimmed = raw_line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let first_token = trimmed.split_whitespace().next().unwrap_or_default();
    if let Some(color) = Color::from_hex(first_token) {
        return Ok(Some(color));
    }
    if trimmed.starts_with('#') {
        return Ok(None);
    }

    let content = match trimmed.find('#') {
        Some(comment_start) => trimmed[..comment_start].trim(),
        None => trimmed,
    };

    let invalid = |reason: String| PbnError::InvalidPaletteEntry {
        line,
        content: raw_line.to_string(),
        reason,
    };

    let fields: Vec<&str> = content.split(',').map(str::trim).collect();
    if fields.len() != 3 {
        return Err(invalid(format!("expected 3 comma-separated values, found {}", fields.len())));
    }

    let mut channels = [0u8; 3];
    for (channel, field) in channels.iter_mut().zip(&fields) {
        let value: i64 = field
            .parse()
            .map_err(|_| invalid(format!("{field:?} is not an integer")))?;
        *channel = u8::try_from(value).map_err(|_| invalid(format!("{value} is outside 0..=255")))?;
    }
    Ok(Some(Color::from(channels)))
}
