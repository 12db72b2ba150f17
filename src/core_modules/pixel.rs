// THEORY (Single-Color Heuristics):
// The `pixel` module is the most fundamental unit of the engine. `Color` is a
// "dumb" data container for one exact RGB triple plus the handful of
// single-color metrics the rest of the system needs: squared Euclidean
// distance for palette matching, a Rec. 709-style gray level for the
// watershed gradient, hex formatting for logs and palette files, and linear
// blending for overlays.
//
// Averaging lives here too. `ColorAccumulator` pools any number of colors and
// reports the integer-truncated mean of each channel, which is exactly the
// "average color" a segment is judged by during color assignment.
//
// Key principles:
// 1) Exactness: channels are `u8`; nothing here rounds a stored color.
// 2) Single-color scope: anything that needs neighbours or whole segments
//    belongs to higher-level modules.

pub mod pixel {
    use image::Rgb;

    pub type Channel = u8;
    pub type DistanceSquared = u32;
    pub type GrayLevel = f64;

    /// A "dumb" data container representing one exact RGB color.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct Color {
        /// The red channel value (0-255).
        pub red: Channel,
        /// The green channel value (0-255).
        pub green: Channel,
        /// The blue channel value (0-255).
        pub blue: Channel,
    }

    impl Color {
        pub const BLACK: Color = Color::new(0, 0, 0);
        pub const WHITE: Color = Color::new(255, 255, 255);

        pub const fn new(red: Channel, green: Channel, blue: Channel) -> Self {
            Self { red, green, blue }
        }

        /// Squared Euclidean distance in RGB space. Ordering by this value is
        /// identical to ordering by the true distance, without the `sqrt`.
        pub fn distance_squared(&self, other: &Color) -> DistanceSquared {
            let dr = self.red as i32 - other.red as i32;
            let dg = self.green as i32 - other.green as i32;
            let db = self.blue as i32 - other.blue as i32;
            (dr * dr + dg * dg + db * db) as DistanceSquared
        }

        /// Gray level in [0, 1] using Rec. 709 weights, the conversion the
        /// watershed gradient is computed on.
        pub fn gray_level(&self) -> GrayLevel {
            (0.2125_f64 * self.red as f64 + 0.7154_f64 * self.green as f64 + 0.0721_f64 * self.blue as f64)
                / 255.0
        }

        /// Linear blend toward `other`; `alpha = 0` keeps `self`, `alpha = 1` yields `other`.
        pub fn blend(&self, other: &Color, alpha: f64) -> Color {
            let alpha = alpha.clamp(0.0, 1.0);
            let mix = |a: Channel, b: Channel| -> Channel {
                (a as f64 * (1.0 - alpha) + b as f64 * alpha).round().clamp(0.0, 255.0) as Channel
            };
            Color::new(
                mix(self.red, other.red),
                mix(self.green, other.green),
                mix(self.blue, other.blue),
            )
        }

        /// Formats as `#RRGGBB`.
        pub fn to_hex(&self) -> String {
            format!("#{:02X}{:02X}{:02X}", self.red, self.green, self.blue)
        }

        /// Parses `#RRGGBB` (case-insensitive). Returns `None` for anything else.
        pub fn from_hex(token: &str) -> Option<Color> {
            let digits = token.strip_prefix('#')?;
            if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
                return None;
            }
            let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
            Some(Color::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
        }
    }

    impl From<Rgb<u8>> for Color {
        fn from(rgb: Rgb<u8>) -> Self {
            Color::new(rgb[0], rgb[1], rgb[2])
        }
    }

    impl From<&Rgb<u8>> for Color {
        fn from(rgb: &Rgb<u8>) -> Self {
            Color::new(rgb[0], rgb[1], rgb[2])
        }
    }

    impl From<Color> for Rgb<u8> {
        fn from(color: Color) -> Self {
            Rgb([color.red, color.green, color.blue])
        }
    }

    impl From<[u8; 3]> for Color {
        fn from(channels: [u8; 3]) -> Self {
            Color::new(channels[0], channels[1], channels[2])
        }
    }

    impl std::fmt::Display for Color {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "({}, {}, {})", self.red, self.green, self.blue)
        }
    }

    /// Pools colors and reports their integer-truncated per-channel mean.
    #[derive(Debug, Clone, Default)]
    pub struct ColorAccumulator {
        sum_r: u64,
        sum_g: u64,
        sum_b: u64,
        count: u64,
    }

    impl ColorAccumulator {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add(&mut self, color: Color) {
            self.sum_r += color.red as u64;
            self.sum_g += color.green as u64;
            self.sum_b += color.blue as u64;
            self.count += 1;
        }

        pub fn count(&self) -> u64 {
            self.count
        }

        /// The truncated mean of everything added so far. An empty accumulator
        /// averages to black.
        pub fn average(&self) -> Color {
            if self.count == 0 {
                return Color::default();
            }
            Color::new(
                (self.sum_r / self.count) as u8,
                (self.sum_g / self.count) as u8,
                (self.sum_b / self.count) as u8,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::pixel::*;

    #[test]
    fn distance_is_symmetric_and_exact() {
        let a = Color::new(0, 0, 0);
        let b = Color::new(3, 4, 0);
        assert_eq!(a.distance_squared(&b), 25);
        assert_eq!(b.distance_squared(&a), 25);
    }

    #[test]
    fn hex_parsing_accepts_only_six_digits() {
        assert_eq!(Color::from_hex("#00FF00"), Some(Color::new(0, 255, 0)));
        assert_eq!(Color::from_hex("#a0b1c2"), Some(Color::new(0xa0, 0xb1, 0xc2)));
        assert_eq!(Color::from_hex("#FFF"), None);
        assert_eq!(Color::from_hex("00FF00"), None);
        assert_eq!(Color::from_hex("#GG0000"), None);
        assert_eq!(Color::new(255, 0, 16).to_hex(), "#FF0010");
    }

    #[test]
    fn accumulator_truncates_the_mean() {
        let mut acc = ColorAccumulator::new();
        acc.add(Color::new(0, 1, 255));
        acc.add(Color::new(1, 2, 254));
        assert_eq!(acc.count(), 2);
        assert_eq!(acc.average(), Color::new(0, 1, 254));
        assert_eq!(ColorAccumulator::new().average(), Color::BLACK);
    }

    #[test]
    fn blend_endpoints() {
        let a = Color::new(200, 100, 0);
        assert_eq!(a.blend(&Color::BLACK, 0.0), a);
        assert_eq!(a.blend(&Color::BLACK, 1.0), Color::BLACK);
        assert_eq!(a.blend(&Color::BLACK, 0.5), Color::new(100, 50, 0));
    }

    #[test]
    fn gray_level_spans_unit_interval() {
        assert_eq!(Color::BLACK.gray_level(), 0.0);
        assert!((Color::WHITE.gray_level() - 1.0).abs() < 1e-9);
    }
}
