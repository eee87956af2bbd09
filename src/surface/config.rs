use serde::{Deserialize, Serialize};

use crate::error::{DrawError, DrawResult};

/// Surface bootstrap configuration.
///
/// Serializable so hosts can keep surface setup next to the rest of their
/// configuration instead of rebuilding it in code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceConfig {
    pub width: f64,
    pub height: f64,
    /// Class toggled on hidden sprites. Visibility is kept as a class so
    /// hidden elements still report their geometry.
    #[serde(default = "default_hidden_class")]
    pub hidden_class: String,
    #[serde(default = "default_sprite_id_prefix")]
    pub sprite_id_prefix: String,
    #[serde(default = "default_gradient_id_prefix")]
    pub gradient_id_prefix: String,
    /// Distance between text lines, as a multiple of the font size.
    #[serde(default = "default_text_line_height")]
    pub text_line_height: f64,
    /// First-line baseline shift, as a fraction of the font size.
    #[serde(default = "default_text_baseline_factor")]
    pub text_baseline_factor: f64,
    /// Font size assumed when a text sprite does not declare one.
    #[serde(default = "default_font_size")]
    pub default_font_size: f64,
    #[serde(default = "default_background_fill")]
    pub background_fill: String,
    /// Root `viewBox` as `[x, y, width, height]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_box: Option<[f64; 4]>,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self::new(400.0, 300.0)
    }
}

impl SurfaceConfig {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            hidden_class: default_hidden_class(),
            sprite_id_prefix: default_sprite_id_prefix(),
            gradient_id_prefix: default_gradient_id_prefix(),
            text_line_height: default_text_line_height(),
            text_baseline_factor: default_text_baseline_factor(),
            default_font_size: default_font_size(),
            background_fill: default_background_fill(),
            view_box: None,
        }
    }

    #[must_use]
    pub fn with_hidden_class(mut self, class: impl Into<String>) -> Self {
        self.hidden_class = class.into();
        self
    }

    #[must_use]
    pub fn with_id_prefixes(mut self, sprite: impl Into<String>, gradient: impl Into<String>) -> Self {
        self.sprite_id_prefix = sprite.into();
        self.gradient_id_prefix = gradient.into();
        self
    }

    #[must_use]
    pub fn with_text_metrics(mut self, line_height: f64, baseline_factor: f64) -> Self {
        self.text_line_height = line_height;
        self.text_baseline_factor = baseline_factor;
        self
    }

    #[must_use]
    pub fn with_default_font_size(mut self, font_size: f64) -> Self {
        self.default_font_size = font_size;
        self
    }

    #[must_use]
    pub fn with_background_fill(mut self, fill: impl Into<String>) -> Self {
        self.background_fill = fill.into();
        self
    }

    #[must_use]
    pub fn with_view_box(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.view_box = Some([x, y, width, height]);
        self
    }

    pub fn validate(&self) -> DrawResult<()> {
        if !self.width.is_finite() || !self.height.is_finite() || self.width < 0.0 || self.height < 0.0 {
            return Err(DrawError::InvalidConfig(
                "surface size must be finite and non-negative".to_owned(),
            ));
        }
        if self.hidden_class.trim().is_empty() || self.hidden_class.contains(char::is_whitespace) {
            return Err(DrawError::InvalidConfig(
                "hidden class must be a single non-empty class name".to_owned(),
            ));
        }
        if self.sprite_id_prefix.is_empty() || self.gradient_id_prefix.is_empty() {
            return Err(DrawError::InvalidConfig(
                "element id prefixes must not be empty".to_owned(),
            ));
        }
        if self.sprite_id_prefix == self.gradient_id_prefix {
            return Err(DrawError::InvalidConfig(
                "sprite and gradient id prefixes must differ".to_owned(),
            ));
        }
        for (name, value) in [
            ("text_line_height", self.text_line_height),
            ("text_baseline_factor", self.text_baseline_factor),
            ("default_font_size", self.default_font_size),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(DrawError::InvalidConfig(format!(
                    "`{name}` must be finite and > 0"
                )));
            }
        }
        if let Some([x, y, width, height]) = self.view_box {
            if ![x, y, width, height].iter().all(|value| value.is_finite()) || width < 0.0 || height < 0.0 {
                return Err(DrawError::InvalidConfig(
                    "view box must be finite with a non-negative size".to_owned(),
                ));
            }
        }
        Ok(())
    }

    /// Serializes config to pretty JSON for debug/config files.
    pub fn to_json_pretty(&self) -> DrawResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DrawError::InvalidConfig(format!("failed to serialize config: {e}")))
    }

    /// Deserializes config from JSON.
    pub fn from_json_str(input: &str) -> DrawResult<Self> {
        serde_json::from_str(input)
            .map_err(|e| DrawError::InvalidConfig(format!("failed to parse config: {e}")))
    }
}

fn default_hidden_class() -> String {
    "x-hide-visibility".to_owned()
}

fn default_sprite_id_prefix() -> String {
    "sprite-".to_owned()
}

fn default_gradient_id_prefix() -> String {
    "gradient-".to_owned()
}

fn default_text_line_height() -> f64 {
    1.2
}

fn default_text_baseline_factor() -> f64 {
    0.25
}

fn default_font_size() -> f64 {
    12.0
}

fn default_background_fill() -> String {
    "none".to_owned()
}
