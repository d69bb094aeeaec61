//! Hex, sRGB and OKLCH conversions.
//!
//! Channels are `f64` so out-of-range input can be represented and clamped
//! rather than wrapped. Conversions never fail: malformed hex yields `None`,
//! everything else is clamped into range.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

/// OKLCH color: lightness in `0..=1`, chroma `>= 0`, hue in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Oklch {
    pub l: f64,
    pub c: f64,
    pub h: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColorError {
    #[error("invalid hex color {0:?}: expected 3 or 6 hex digits with an optional '#'")]
    InvalidHex(String),
}

impl Rgb {
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(self) -> String {
        rgb_to_hex(self)
    }

    pub fn to_oklch(self) -> Oklch {
        rgb_to_oklch(self)
    }
}

impl Oklch {
    pub const fn new(l: f64, c: f64, h: f64) -> Self {
        Self { l, c, h }
    }

    pub fn to_rgb(self) -> Rgb {
        oklch_to_rgb(self)
    }
}

impl From<[f64; 3]> for Rgb {
    fn from([r, g, b]: [f64; 3]) -> Self {
        Self { r, g, b }
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self::new(r as f64, g as f64, b as f64)
    }
}

impl FromStr for Rgb {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        hex_to_rgb(s).ok_or_else(|| ColorError::InvalidHex(s.to_string()))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&rgb_to_hex(*self))
    }
}

/// Parses `#rgb`, `#rrggbb`, `rgb` or `rrggbb` (any case, surrounding
/// whitespace ignored).
pub fn hex_to_rgb(hex: &str) -> Option<Rgb> {
    let value = hex.trim();
    let value = value.strip_prefix('#').unwrap_or(value);
    if !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let digits: Vec<u8> = match value.len() {
        3 => value.bytes().flat_map(|c| [c, c]).collect(),
        6 => value.bytes().collect(),
        _ => return None,
    };

    let channel = |i: usize| {
        std::str::from_utf8(&digits[i..i + 2])
            .ok()
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .map(f64::from)
    };
    Some(Rgb::new(channel(0)?, channel(2)?, channel(4)?))
}

/// Formats as lowercase `#rrggbb`, clamping and rounding each channel.
pub fn rgb_to_hex(rgb: Rgb) -> String {
    let c = |v: f64| v.clamp(0.0, 255.0).round() as u8;
    format!("#{:02x}{:02x}{:02x}", c(rgb.r), c(rgb.g), c(rgb.b))
}

fn linear_to_srgb(x: f64) -> f64 {
    if x <= 0.003_130_8 {
        12.92 * x
    } else {
        1.055 * x.powf(1.0 / 2.4) - 0.055
    }
}

fn srgb_to_linear(x: f64) -> f64 {
    if x <= 0.040_45 {
        x / 12.92
    } else {
        ((x + 0.055) / 1.055).powf(2.4)
    }
}

fn normalize_hue(hue: f64) -> f64 {
    ((hue % 360.0) + 360.0) % 360.0
}

/// Lightness is clamped to `0..=1`, chroma to `>= 0`, hue wrapped mod 360.
/// Output channels are rounded to whole numbers in `0..=255`.
pub fn oklch_to_rgb(oklch: Oklch) -> Rgb {
    let l = oklch.l.clamp(0.0, 1.0);
    let c = oklch.c.max(0.0);
    let h = normalize_hue(oklch.h).to_radians();

    // OKLCH -> OKLab
    let a = c * h.cos();
    let b = c * h.sin();

    // OKLab -> LMS (non-linear)
    let l_ = l + 0.396_337_777_4 * a + 0.215_803_757_3 * b;
    let m_ = l - 0.105_561_345_8 * a - 0.063_854_172_8 * b;
    let s_ = l - 0.089_484_177_5 * a - 1.291_485_548 * b;

    let l3 = l_.powi(3);
    let m3 = m_.powi(3);
    let s3 = s_.powi(3);

    // LMS -> linear sRGB
    let r = 4.076_741_662_1 * l3 - 3.307_711_591_3 * m3 + 0.230_969_929_2 * s3;
    let g = -1.268_438_004_6 * l3 + 2.609_757_401_1 * m3 - 0.341_319_396_5 * s3;
    let b = -0.004_196_086_3 * l3 - 0.703_418_614_7 * m3 + 1.707_614_701 * s3;

    let channel = |v: f64| (linear_to_srgb(v).clamp(0.0, 1.0) * 255.0).round();
    Rgb::new(channel(r), channel(g), channel(b))
}

/// Channels are clamped to `0..=255`. Hue is in `0..360`.
pub fn rgb_to_oklch(rgb: Rgb) -> Oklch {
    let r = srgb_to_linear(rgb.r.clamp(0.0, 255.0) / 255.0);
    let g = srgb_to_linear(rgb.g.clamp(0.0, 255.0) / 255.0);
    let b = srgb_to_linear(rgb.b.clamp(0.0, 255.0) / 255.0);

    // linear sRGB -> LMS cube root space
    let l_ = (0.412_221_470_8 * r + 0.536_332_536_3 * g + 0.051_445_992_9 * b).cbrt();
    let m_ = (0.211_903_498_2 * r + 0.680_699_545_1 * g + 0.107_396_956_6 * b).cbrt();
    let s_ = (0.088_302_461_9 * r + 0.281_718_837_6 * g + 0.629_978_700_5 * b).cbrt();

    // LMS -> OKLab
    let l = 0.210_454_255_3 * l_ + 0.793_617_785 * m_ - 0.004_072_046_8 * s_;
    let a = 1.977_998_495_1 * l_ - 2.428_592_205 * m_ + 0.450_593_709_9 * s_;
    let b = 0.025_904_037_1 * l_ + 0.782_771_766_2 * m_ - 0.808_675_766 * s_;

    let c = (a * a + b * b).sqrt();
    let mut h = b.atan2(a) * 180.0 / PI;
    if h < 0.0 {
        h += 360.0;
    }
    Oklch { l, c, h }
}

pub fn is_valid_rgb(rgb: Rgb) -> bool {
    [rgb.r, rgb.g, rgb.b]
        .iter()
        .all(|v| (0.0..=255.0).contains(v))
}

pub fn is_valid_oklch(oklch: Oklch) -> bool {
    (0.0..=1.0).contains(&oklch.l) && oklch.c >= 0.0 && (0.0..=360.0).contains(&oklch.h)
}

pub fn is_valid_hex(hex: &str) -> bool {
    hex_to_rgb(hex).is_some()
}
