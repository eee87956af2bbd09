use std::fmt;
use std::str::FromStr;

use crate::error::{DrawError, DrawResult};

/// RGBA color in normalized 0..=1 channel values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
}

const NAMED_COLORS: &[(&str, u32)] = &[
    ("aqua", 0x00ffff),
    ("black", 0x000000),
    ("blue", 0x0000ff),
    ("cyan", 0x00ffff),
    ("darkgray", 0xa9a9a9),
    ("fuchsia", 0xff00ff),
    ("gold", 0xffd700),
    ("gray", 0x808080),
    ("green", 0x008000),
    ("grey", 0x808080),
    ("lightgray", 0xd3d3d3),
    ("lime", 0x00ff00),
    ("magenta", 0xff00ff),
    ("maroon", 0x800000),
    ("navy", 0x000080),
    ("olive", 0x808000),
    ("orange", 0xffa500),
    ("pink", 0xffc0cb),
    ("purple", 0x800080),
    ("red", 0xff0000),
    ("silver", 0xc0c0c0),
    ("steelblue", 0x4682b4),
    ("teal", 0x008080),
    ("white", 0xffffff),
    ("yellow", 0xffff00),
];

impl Color {
    pub const NONE: Self = Self::rgba(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);

    #[must_use]
    pub const fn rgba(red: f64, green: f64, blue: f64, alpha: f64) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    #[must_use]
    pub const fn rgb(red: f64, green: f64, blue: f64) -> Self {
        Self::rgba(red, green, blue, 1.0)
    }

    /// Builds a color from 0..=255 channels.
    #[must_use]
    pub fn from_rgb8(red: u8, green: u8, blue: u8) -> Self {
        Self::rgb(
            f64::from(red) / 255.0,
            f64::from(green) / 255.0,
            f64::from(blue) / 255.0,
        )
    }

    fn from_packed(rgb: u32) -> Self {
        let [_, red, green, blue] = rgb.to_be_bytes();
        Self::from_rgb8(red, green, blue)
    }

    /// Parses `#rgb`, `#rrggbb`, `rgb(r,g,b)`, `rgba(r,g,b,a)`, a CSS color
    /// name, or `none`/`transparent` (fully transparent black).
    ///
    /// Unrecognized input yields `None`.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let value = input.trim();
        let lower = value.to_ascii_lowercase();
        if lower == "none" || lower == "transparent" {
            return Some(Self::NONE);
        }
        if let Some(hex) = lower.strip_prefix('#') {
            return parse_hex(hex);
        }
        if let Some(args) = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return parse_functional(args);
        }
        NAMED_COLORS
            .iter()
            .find(|(name, _)| *name == lower)
            .map(|(_, rgb)| Self::from_packed(*rgb))
    }

    pub fn validate(self) -> DrawResult<()> {
        for (channel, value) in [
            ("red", self.red),
            ("green", self.green),
            ("blue", self.blue),
            ("alpha", self.alpha),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(DrawError::InvalidColor(format!(
                    "color channel `{channel}` must be finite and in [0, 1]"
                )));
            }
        }
        Ok(())
    }

    /// `#rrggbb`, ignoring alpha.
    #[must_use]
    pub fn to_hex(self) -> String {
        let [red, green, blue] = [self.red, self.green, self.blue].map(channel_to_u8);
        format!("#{red:02x}{green:02x}{blue:02x}")
    }

    #[must_use]
    pub fn with_alpha(self, alpha: f64) -> Self {
        Self { alpha, ..self }
    }

    #[must_use]
    pub fn is_opaque(self) -> bool {
        self.alpha >= 1.0
    }
}

impl fmt::Display for Color {
    /// Hex when opaque, `rgba(..)` otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_opaque() {
            return f.write_str(&self.to_hex());
        }
        let [red, green, blue] = [self.red, self.green, self.blue].map(channel_to_u8);
        write!(f, "rgba({red},{green},{blue},{})", self.alpha.clamp(0.0, 1.0))
    }
}

impl FromStr for Color {
    type Err = DrawError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| DrawError::InvalidColor(format!("cannot parse `{value}`")))
    }
}

fn channel_to_u8(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        3 => {
            let short = u32::from_str_radix(hex, 16).ok()?;
            let expand = |nibble: u32| ((nibble & 0xf) * 0x11) as u8;
            Some(Color::from_rgb8(
                expand(short >> 8),
                expand(short >> 4),
                expand(short),
            ))
        }
        6 => u32::from_str_radix(hex, 16).ok().map(Color::from_packed),
        _ => None,
    }
}

fn parse_functional(args: &str) -> Option<Color> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    let channel = |raw: &str| raw.parse::<f64>().ok().map(|v| v.clamp(0.0, 255.0) / 255.0);
    match parts.as_slice() {
        [r, g, b] => Some(Color::rgb(channel(r)?, channel(g)?, channel(b)?)),
        [r, g, b, a] => Some(Color::rgba(
            channel(r)?,
            channel(g)?,
            channel(b)?,
            a.parse::<f64>().ok()?.clamp(0.0, 1.0),
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::Color;

    #[test]
    fn parses_short_and_long_hex() {
        assert_eq!(Color::parse("#f00").map(Color::to_hex).as_deref(), Some("#ff0000"));
        assert_eq!(
            Color::parse(" #336699 ").map(Color::to_hex).as_deref(),
            Some("#336699")
        );
        assert!(Color::parse("#12345").is_none());
    }

    #[test]
    fn parses_functional_and_named_forms() {
        let color = Color::parse("rgba(255, 0, 0, 0.25)").expect("rgba");
        assert_eq!(color.to_hex(), "#ff0000");
        assert!((color.alpha - 0.25).abs() <= 1e-12);

        assert_eq!(Color::parse("rgb(0,128,0)"), Color::parse("green"));
        assert_eq!(Color::parse("none"), Some(Color::NONE));
        assert!(Color::parse("not-a-color").is_none());
    }

    #[test]
    fn display_switches_to_rgba_when_translucent() {
        assert_eq!(Color::rgb(1.0, 1.0, 1.0).to_string(), "#ffffff");
        assert_eq!(Color::rgba(0.0, 0.0, 1.0, 0.5).to_string(), "rgba(0,0,255,0.5)");
    }

    #[test]
    fn validate_rejects_out_of_range_channels() {
        assert!(Color::rgb(0.2, 0.4, 0.6).validate().is_ok());
        assert!(Color::rgba(1.5, 0.0, 0.0, 1.0).validate().is_err());
    }
}
