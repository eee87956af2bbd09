use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::path::PathModel;
use crate::surface::sprite::SpriteKind;

/// Logical attribute value as supplied by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

pub type AttrMap = IndexMap<String, AttrValue>;

impl AttrValue {
    /// Numbers as-is, text parsed leniently (`"12px"` is not a number).
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(text) => text.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(value) => *value,
            Self::Number(value) => *value != 0.0 && !value.is_nan(),
            Self::Text(text) => !text.is_empty() && text != "false",
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Number(value) => write!(f, "{}", value + 0.0),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Logical keys handled by dedicated reconciliation steps rather than
/// written as plain attributes.
const RESERVED_KEYS: &[&str] = &["hidden", "text", "font", "style", "src", "clip-rect"];

/// Clip rectangle given as `"x y width height"` (commas also separate).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ClipRect {
    /// `None` unless the value holds exactly four finite numbers.
    #[must_use]
    pub fn from_attr(value: &AttrValue) -> Option<Self> {
        let mut numbers = value
            .as_str()?
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .map(|token| token.parse::<f64>().ok().filter(|number| number.is_finite()));
        let rect = Self {
            x: numbers.next()??,
            y: numbers.next()??,
            width: numbers.next()??,
            height: numbers.next()??,
        };
        numbers.next().is_none().then_some(rect)
    }
}

/// Maps a logical attribute name to its host attribute name.
#[must_use]
pub fn translate_name(name: &str) -> &str {
    match name {
        "radius" => "r",
        "radiusX" | "radius_x" => "rx",
        "radiusY" | "radius_y" => "ry",
        "path" => "d",
        "lineWidth" | "line_width" => "stroke-width",
        "fillOpacity" | "fill_opacity" => "fill-opacity",
        "strokeOpacity" | "stroke_opacity" => "stroke-opacity",
        "strokeLinejoin" | "stroke_linejoin" => "stroke-linejoin",
        other => other,
    }
}

/// Host attributes an element of `kind` falls back to when the sprite omits
/// them.
#[must_use]
pub fn default_attributes(kind: SpriteKind) -> &'static [(&'static str, &'static str)] {
    match kind {
        SpriteKind::Circle => &[("cx", "0"), ("cy", "0"), ("r", "0"), ("fill", "none")],
        SpriteKind::Ellipse => &[
            ("cx", "0"),
            ("cy", "0"),
            ("rx", "0"),
            ("ry", "0"),
            ("fill", "none"),
        ],
        SpriteKind::Rect => &[
            ("x", "0"),
            ("y", "0"),
            ("width", "0"),
            ("height", "0"),
            ("rx", "0"),
            ("ry", "0"),
            ("fill", "none"),
        ],
        SpriteKind::Text => &[("x", "0"), ("y", "0"), ("text-anchor", "start"), ("fill", "#000")],
        SpriteKind::Path => &[("d", "M0,0"), ("fill", "none")],
        SpriteKind::Image => &[
            ("x", "0"),
            ("y", "0"),
            ("width", "0"),
            ("height", "0"),
            ("preserveAspectRatio", "none"),
        ],
    }
}

/// Per-kind coordinate fallbacks, applied to translated host attributes.
///
/// * circle/ellipse: `cx` falls back to `x` (and `cy` to `y`) only when `cx`
///   is absent. A present `cx` of `0` is kept. `x`/`y` are then dropped.
/// * rect: a corner radius `r` becomes `rx` and `ry`.
/// * path: with `normalize_path`, `d` is rewritten in absolute `M`/`L`/`C`/`Z`
///   form.
pub fn normalize_attributes(kind: SpriteKind, attrs: &mut IndexMap<String, String>, normalize_path: bool) {
    match kind {
        SpriteKind::Circle | SpriteKind::Ellipse => {
            for (target, source) in [("cx", "x"), ("cy", "y")] {
                let fallback = attrs.shift_remove(source);
                if !attrs.contains_key(target) {
                    if let Some(value) = fallback {
                        attrs.insert(target.to_owned(), value);
                    }
                }
            }
        }
        SpriteKind::Rect => {
            if let Some(radius) = attrs.shift_remove("r") {
                attrs.insert("rx".to_owned(), radius.clone());
                attrs.insert("ry".to_owned(), radius);
            }
        }
        SpriteKind::Path => {
            if normalize_path {
                if let Some(data) = attrs.get_mut("d") {
                    *data = PathModel::parse(data).to_svg_string().to_owned();
                }
            }
        }
        SpriteKind::Text | SpriteKind::Image => {}
    }
}

/// Builds the host attribute set for one reconciliation step: translation,
/// normalization, then default merging.
///
/// When `path_dirty` is false the path data is left out so unchanged
/// geometry is not re-serialized.
#[must_use]
pub fn host_attributes(kind: SpriteKind, attrs: &AttrMap, path_dirty: bool) -> IndexMap<String, String> {
    let mut out: IndexMap<String, String> = attrs
        .iter()
        .filter(|(name, _)| !RESERVED_KEYS.contains(&name.as_str()))
        .map(|(name, value)| (translate_name(name).to_owned(), value.to_string()))
        .collect();
    normalize_attributes(kind, &mut out, path_dirty);
    for (name, value) in default_attributes(kind) {
        if !out.contains_key(*name) {
            out.insert((*name).to_owned(), (*value).to_owned());
        }
    }
    if kind == SpriteKind::Path && !path_dirty {
        out.shift_remove("d");
    }
    out
}

/// Splits inline `name: value; ...` style text into pairs.
pub(crate) fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|declaration| {
            let (name, value) = declaration.split_once(':')?;
            let name = name.trim();
            let value = value.trim();
            (!name.is_empty()).then(|| (name.to_owned(), value.to_owned()))
        })
        .collect()
}

/// Font size in user units from a `font-size` value or a `font` shorthand.
pub(crate) fn font_size_from(value: &str) -> Option<f64> {
    let positive = |size: f64| (size > 0.0).then_some(size);
    if let Ok(size) = value.trim().parse::<f64>() {
        return positive(size);
    }
    value.split_whitespace().find_map(|token| {
        let size = token.split('/').next()?.strip_suffix("px")?.parse::<f64>().ok()?;
        positive(size)
    })
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::{
        AttrMap, AttrValue, ClipRect, font_size_from, host_attributes, normalize_attributes, parse_style,
    };
    use crate::surface::sprite::SpriteKind;

    fn host(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[test]
    fn zero_cx_is_not_treated_as_absent() {
        let mut attrs = host(&[("cx", "0"), ("x", "25"), ("y", "7")]);
        normalize_attributes(SpriteKind::Circle, &mut attrs, false);
        assert_eq!(attrs.get("cx").map(String::as_str), Some("0"));
        assert_eq!(attrs.get("cy").map(String::as_str), Some("7"));
        assert!(!attrs.contains_key("x"));
    }

    #[test]
    fn rect_corner_radius_fans_out() {
        let mut attrs = host(&[("r", "4")]);
        normalize_attributes(SpriteKind::Rect, &mut attrs, false);
        assert_eq!(attrs.get("rx").map(String::as_str), Some("4"));
        assert_eq!(attrs.get("ry").map(String::as_str), Some("4"));
        assert!(!attrs.contains_key("r"));
    }

    #[test]
    fn host_attributes_translate_and_merge_defaults() {
        let mut attrs = AttrMap::new();
        attrs.insert("x".to_owned(), AttrValue::Number(10.0));
        attrs.insert("radius".to_owned(), AttrValue::Number(5.0));
        attrs.insert("lineWidth".to_owned(), AttrValue::Number(2.0));
        attrs.insert("hidden".to_owned(), AttrValue::Bool(true));

        let out = host_attributes(SpriteKind::Circle, &attrs, true);
        assert_eq!(out.get("cx").map(String::as_str), Some("10"));
        assert_eq!(out.get("cy").map(String::as_str), Some("0"));
        assert_eq!(out.get("r").map(String::as_str), Some("5"));
        assert_eq!(out.get("stroke-width").map(String::as_str), Some("2"));
        assert_eq!(out.get("fill").map(String::as_str), Some("none"));
        assert!(!out.contains_key("hidden"));
    }

    #[test]
    fn clean_path_data_is_left_out() {
        let mut attrs = AttrMap::new();
        attrs.insert("path".to_owned(), AttrValue::from("m0 0 l10 0"));
        let dirty = host_attributes(SpriteKind::Path, &attrs, true);
        assert_eq!(dirty.get("d").map(String::as_str), Some("M0,0L10,0"));
        let clean = host_attributes(SpriteKind::Path, &attrs, false);
        assert!(!clean.contains_key("d"));
    }

    #[test]
    fn style_and_font_helpers() {
        assert_eq!(
            parse_style("cursor: pointer; ;opacity:0.5"),
            vec![
                ("cursor".to_owned(), "pointer".to_owned()),
                ("opacity".to_owned(), "0.5".to_owned())
            ]
        );
        assert_eq!(font_size_from("bold 14px Arial"), Some(14.0));
        assert_eq!(font_size_from("12px/1.5 serif"), Some(12.0));
        assert_eq!(font_size_from("Arial"), None);
    }

    #[test]
    fn clip_rect_needs_four_finite_numbers() {
        assert_eq!(
            ClipRect::from_attr(&AttrValue::from("1, 2 30,40")),
            Some(ClipRect {
                x: 1.0,
                y: 2.0,
                width: 30.0,
                height: 40.0,
            })
        );
        for value in ["1 2 3", "1 2 3 4 5", "1 2 three 4", "0 0 NaN 4", ""] {
            assert!(ClipRect::from_attr(&AttrValue::from(value)).is_none(), "{value}");
        }
        assert!(ClipRect::from_attr(&AttrValue::Number(4.0)).is_none());

        let mut attrs = AttrMap::new();
        attrs.insert("clip-rect".to_owned(), AttrValue::from("0 0 5 5"));
        assert!(!host_attributes(SpriteKind::Rect, &attrs, true).contains_key("clip-rect"));
    }
}
