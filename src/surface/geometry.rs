use crate::core::path::PathModel;
use crate::core::types::BBox;
use crate::host::HostDocument;
use crate::surface::attrs::{self, AttrValue};
use crate::surface::config::SurfaceConfig;
use crate::surface::sprite::{Sprite, SpriteId, SpriteKind, Transformable};
use crate::surface::Surface;

/// Average glyph advance as a fraction of the font size.
const GLYPH_WIDTH_FACTOR: f64 = 0.6;

fn number(sprite: &Sprite, names: &[&str]) -> f64 {
    names
        .iter()
        .find_map(|name| sprite.attrs.get(*name).and_then(AttrValue::as_f64))
        .unwrap_or(0.0)
}

/// Font size of a text sprite: `font-size`, then the `font` shorthand, then
/// the configured default.
pub(crate) fn font_size(sprite: &Sprite, config: &SurfaceConfig) -> f64 {
    ["font-size", "font"]
        .iter()
        .find_map(|name| {
            let value = sprite.attrs.get(*name)?;
            match value {
                AttrValue::Number(size) => (*size > 0.0).then_some(*size),
                other => attrs::font_size_from(&other.to_string()),
            }
        })
        .unwrap_or(config.default_font_size)
}

/// Untransformed bounding box of a sprite, computed from its logical
/// attributes. Text extents are estimated from the font size.
pub(crate) fn local_bbox(sprite: &Sprite, config: &SurfaceConfig) -> BBox {
    match sprite.kind {
        SpriteKind::Circle => {
            let cx = number(sprite, &["cx", "x"]);
            let cy = number(sprite, &["cy", "y"]);
            let r = number(sprite, &["r", "radius"]);
            BBox::new(cx - r, cy - r, r * 2.0, r * 2.0)
        }
        SpriteKind::Ellipse => {
            let cx = number(sprite, &["cx", "x"]);
            let cy = number(sprite, &["cy", "y"]);
            let rx = number(sprite, &["rx", "radiusX", "radius_x"]);
            let ry = number(sprite, &["ry", "radiusY", "radius_y"]);
            BBox::new(cx - rx, cy - ry, rx * 2.0, ry * 2.0)
        }
        SpriteKind::Rect | SpriteKind::Image => BBox::new(
            number(sprite, &["x"]),
            number(sprite, &["y"]),
            number(sprite, &["width"]),
            number(sprite, &["height"]),
        ),
        SpriteKind::Path => {
            let data = ["path", "d"]
                .iter()
                .find_map(|name| sprite.attrs.get(*name))
                .map(ToString::to_string)
                .unwrap_or_default();
            PathModel::parse(&data).dimension()
        }
        SpriteKind::Text => {
            let text = sprite.attrs.get("text").map(ToString::to_string).unwrap_or_default();
            let size = font_size(sprite, config);
            let lines: Vec<&str> = text.split('\n').collect();
            let longest = lines.iter().map(|line| line.chars().count()).max().unwrap_or(0);
            let width = longest as f64 * size * GLYPH_WIDTH_FACTOR;
            let height = lines.len() as f64 * size * config.text_line_height;
            let x = number(sprite, &["x"]);
            let y = number(sprite, &["y"]);
            let left = match sprite.attrs.get("text-anchor").and_then(AttrValue::as_str) {
                Some("middle") => x - width * 0.5,
                Some("end") => x - width,
                _ => x,
            };
            BBox::new(left, y - height * 0.5, width, height)
        }
    }
}

impl<D: HostDocument> Surface<D> {
    /// Bounding box of a sprite, optionally mapped through its transform.
    #[must_use]
    pub fn sprite_bbox(&self, id: SpriteId, include_transform: bool) -> Option<BBox> {
        let sprite = self.sprites.get(&id)?;
        let bbox = local_bbox(sprite, self.config());
        if !include_transform {
            return Some(bbox);
        }
        let matrix = sprite.compose_transform(bbox.center());
        Some(matrix.transform_bbox(&bbox, None))
    }
}

#[cfg(test)]
mod tests {
    use super::local_bbox;
    use crate::surface::config::SurfaceConfig;
    use crate::surface::sprite::{Sprite, SpriteDescriptor, SpriteId, SpriteKind};

    fn sprite(descriptor: SpriteDescriptor) -> Sprite {
        Sprite::new(SpriteId::from_raw(1), descriptor)
    }

    #[test]
    fn circle_box_uses_position_fallback() {
        let circle = sprite(
            SpriteDescriptor::new(SpriteKind::Circle)
                .with_attr("x", 10.0)
                .with_attr("y", 20.0)
                .with_attr("radius", 5.0),
        );
        let bbox = local_bbox(&circle, &SurfaceConfig::default());
        assert_eq!((bbox.x, bbox.y, bbox.width, bbox.height), (5.0, 15.0, 10.0, 10.0));
    }

    #[test]
    fn text_box_is_estimated_from_font_size() {
        let text = sprite(
            SpriteDescriptor::new(SpriteKind::Text)
                .with_attr("text", "abcd\nab")
                .with_attr("font", "bold 10px Arial")
                .with_attr("text-anchor", "middle"),
        );
        let config = SurfaceConfig::default();
        let bbox = local_bbox(&text, &config);
        assert!((bbox.width - 24.0).abs() <= 1e-9);
        assert!((bbox.height - 24.0).abs() <= 1e-9);
        assert!((bbox.x + 12.0).abs() <= 1e-9);
    }
}
