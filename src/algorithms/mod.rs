// THEORY:
// Each pipeline stage is a capability trait (`Preprocessor`, `Segmenter`,
// `ColorAssigner`, `Postprocessor`, `Renderer`) with a closed set of
// implementations. A tagged enum per stage (`Segmentation`, `Postprocessing`,
// ...) wraps the implementations and forwards to them by `match`, so the
// pipeline never needs trait objects. The `registry` module maps the textual
// algorithm names used on the command line and in config files onto those
// enums.
//
// All algorithms also implement `Algorithm`, which reports the name and the
// effective parameters. Those drive log lines, diagnostic file names, and the
// auto-generated output file name.

pub mod assignment;
pub mod postprocessing;
pub mod preprocessing;
pub mod registry;
pub mod rendering;
pub mod segmentation;

use crate::core_modules::params::ParamMap;

/// Identity of a configured algorithm.
pub trait Algorithm {
    /// The registry name, e.g. `grid` or `floyd-steinberg`.
    fn name(&self) -> &'static str;
    /// The parameters that identify this configuration, used for naming.
    fn params(&self) -> ParamMap;
}
