use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::core::color::Color;
use crate::surface::resources::GradientDefinition;

use super::gradient::GradientHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

impl LineCap {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Butt => "butt",
            Self::Round => "round",
            Self::Square => "square",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

impl LineJoin {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Miter => "miter",
            Self::Round => "round",
            Self::Bevel => "bevel",
        }
    }
}

/// Horizontal text anchoring, written as `text-anchor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Start,
    Middle,
    End,
}

impl TextAlign {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Middle => "middle",
            Self::End => "end",
        }
    }
}

/// Fill or stroke paint.
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    None,
    Color(String),
    /// Absolute gradient created by the context.
    Gradient(GradientHandle),
    /// Gradient laid out against the bounding box given to
    /// [`DrawingContext::set_gradient_bbox`](super::DrawingContext::set_gradient_bbox).
    Relative(GradientDefinition),
}

impl Paint {
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl Default for Paint {
    fn default() -> Self {
        Self::Color("#000".to_owned())
    }
}

impl From<&str> for Paint {
    fn from(value: &str) -> Self {
        match value.trim() {
            "" | "none" => Self::None,
            color => Self::Color(color.to_owned()),
        }
    }
}

impl From<String> for Paint {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<Color> for Paint {
    fn from(value: Color) -> Self {
        Self::Color(value.to_string())
    }
}

impl From<GradientHandle> for Paint {
    fn from(value: GradientHandle) -> Self {
        Self::Gradient(value)
    }
}

impl From<GradientDefinition> for Paint {
    fn from(value: GradientDefinition) -> Self {
        Self::Relative(value)
    }
}

/// Target rectangle for [`DrawingContext::draw_image`](super::DrawingContext::draw_image).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ImagePlacement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ImagePlacement {
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Everything `save` snapshots besides the matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextState {
    pub fill: Paint,
    pub stroke: Paint,
    pub fill_opacity: f64,
    pub stroke_opacity: f64,
    pub global_alpha: f64,
    pub line_width: f64,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: f64,
    pub line_dash: SmallVec<[f64; 4]>,
    pub line_dash_offset: f64,
    pub shadow_offset_x: f64,
    pub shadow_offset_y: f64,
    pub shadow_blur: f64,
    pub shadow_color: String,
    pub font: String,
    pub text_align: TextAlign,
    /// Next child of the current group to claim.
    pub(crate) position: usize,
}

impl Default for ContextState {
    fn default() -> Self {
        Self {
            fill: Paint::default(),
            stroke: Paint::default(),
            fill_opacity: 1.0,
            stroke_opacity: 1.0,
            global_alpha: 1.0,
            line_width: 1.0,
            line_cap: LineCap::default(),
            line_join: LineJoin::default(),
            miter_limit: 10.0,
            line_dash: SmallVec::new(),
            line_dash_offset: 0.0,
            shadow_offset_x: 0.0,
            shadow_offset_y: 0.0,
            shadow_blur: 0.0,
            shadow_color: "rgba(0,0,0,0)".to_owned(),
            font: "10px sans-serif".to_owned(),
            text_align: TextAlign::default(),
            position: 0,
        }
    }
}

/// Canvas dash normalization: any negative or non-finite entry rejects the
/// whole pattern, and odd-length patterns are repeated once.
pub(crate) fn normalize_dash(segments: &[f64]) -> Option<SmallVec<[f64; 4]>> {
    if segments.iter().any(|value| !value.is_finite() || *value < 0.0) {
        return None;
    }
    let mut dash: SmallVec<[f64; 4]> = segments.iter().copied().collect();
    if dash.len() % 2 == 1 {
        dash.extend_from_slice(segments);
    }
    Some(dash)
}

#[cfg(test)]
mod tests {
    use super::{Paint, normalize_dash};

    #[test]
    fn odd_dash_patterns_repeat() {
        let dash = normalize_dash(&[5.0, 2.0, 1.0]).expect("valid");
        assert_eq!(dash.as_slice(), &[5.0, 2.0, 1.0, 5.0, 2.0, 1.0]);
        assert!(normalize_dash(&[1.0, -1.0]).is_none());
        assert!(normalize_dash(&[]).expect("empty").is_empty());
    }

    #[test]
    fn none_strings_become_no_paint() {
        assert!(Paint::from("none").is_none());
        assert_eq!(Paint::from("red"), Paint::Color("red".to_owned()));
    }
}
