//! Pastel colors for language-pair badges.

use rand::Rng;
use serde::{Serialize, Serializer};
use std::fmt;

/// An opaque RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

pub const PASTEL_BLUE: Rgb = Rgb::from_hex(0xB8D0E6);
pub const PASTEL_PINK: Rgb = Rgb::from_hex(0xF5D0E3);
pub const PASTEL_GREEN: Rgb = Rgb::from_hex(0xCCE6C4);
pub const PASTEL_YELLOW: Rgb = Rgb::from_hex(0xF8EAC0);
pub const PASTEL_PURPLE: Rgb = Rgb::from_hex(0xD9CAEE);
pub const PASTEL_ORANGE: Rgb = Rgb::from_hex(0xFFD8C2);
pub const PASTEL_TEAL: Rgb = Rgb::from_hex(0xB8E6D9);
pub const PASTEL_RED: Rgb = Rgb::from_hex(0xF5C6CB);

/// The fixed palette new language pairs draw from.
pub const PASTEL_COLORS: [Rgb; 8] = [
    PASTEL_BLUE,
    PASTEL_PINK,
    PASTEL_GREEN,
    PASTEL_YELLOW,
    PASTEL_PURPLE,
    PASTEL_ORANGE,
    PASTEL_TEAL,
    PASTEL_RED,
];

/// Maximum hue shift in degrees for [`Rgb::variation`].
const HUE_JITTER: f32 = 5.0;

/// Maximum saturation/value shift for [`Rgb::variation`].
const TONE_JITTER: f32 = 0.1;

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Builds a color from a `0xRRGGBB` literal.
    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xFF) as u8,
            g: ((hex >> 8) & 0xFF) as u8,
            b: (hex & 0xFF) as u8,
        }
    }

    /// Returns `(hue in degrees, saturation, value)`.
    pub fn to_hsv(self) -> (f32, f32, f32) {
        let r = self.r as f32 / 255.0;
        let g = self.g as f32 / 255.0;
        let b = self.b as f32 / 255.0;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let hue = if delta == 0.0 {
            0.0
        } else if max == r {
            60.0 * ((g - b) / delta).rem_euclid(6.0)
        } else if max == g {
            60.0 * ((b - r) / delta + 2.0)
        } else {
            60.0 * ((r - g) / delta + 4.0)
        };
        let saturation = if max == 0.0 { 0.0 } else { delta / max };

        (hue, saturation, max)
    }

    pub fn from_hsv(hue: f32, saturation: f32, value: f32) -> Self {
        let hue = hue.rem_euclid(360.0);
        let saturation = saturation.clamp(0.0, 1.0);
        let value = value.clamp(0.0, 1.0);

        let chroma = value * saturation;
        let x = chroma * (1.0 - ((hue / 60.0).rem_euclid(2.0) - 1.0).abs());
        let m = value - chroma;

        let (r, g, b) = match (hue / 60.0) as u32 {
            0 => (chroma, x, 0.0),
            1 => (x, chroma, 0.0),
            2 => (0.0, chroma, x),
            3 => (0.0, x, chroma),
            4 => (x, 0.0, chroma),
            _ => (chroma, 0.0, x),
        };

        let channel = |c: f32| ((c + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        Self::new(channel(r), channel(g), channel(b))
    }

    /// A slightly perturbed copy of this color.
    ///
    /// Hue moves by up to 5 degrees, saturation and value by up to 0.1; the
    /// latter two are clamped to `[0, 1]`.
    pub fn variation<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        let (hue, saturation, value) = self.to_hsv();
        let hue = (hue + rng.gen_range(-HUE_JITTER..=HUE_JITTER)).rem_euclid(360.0);
        let saturation = (saturation + rng.gen_range(-TONE_JITTER..=TONE_JITTER)).clamp(0.0, 1.0);
        let value = (value + rng.gen_range(-TONE_JITTER..=TONE_JITTER)).clamp(0.0, 1.0);
        Self::from_hsv(hue, saturation, value)
    }

    /// A darker, more saturated shade, used for text drawn on top of the
    /// pastel background.
    pub fn darker(self) -> Self {
        let (hue, saturation, value) = self.to_hsv();
        Self::from_hsv(hue, (saturation * 1.2).min(1.0), value * 0.7)
    }

    pub fn to_hex_string(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex_string())
    }
}
