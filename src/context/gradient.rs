use tracing::trace;

use crate::core::color::Color;
use crate::core::types::BBox;
use crate::host::HostDocument;
use crate::surface::Surface;
use crate::surface::resources::{GradientDefinition, GradientId, GradientShape, GradientSpec};

/// Gradient created by a drawing context. Stops are added through
/// [`DrawingContext::gradient`](super::DrawingContext::gradient).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GradientHandle(pub(crate) GradientId);

impl GradientHandle {
    #[must_use]
    pub const fn id(self) -> GradientId {
        self.0
    }
}

/// Stop writer for one context gradient.
pub struct GradientStops<'c, D: HostDocument> {
    pub(crate) surface: &'c mut Surface<D>,
    pub(crate) id: GradientId,
}

impl<D: HostDocument> GradientStops<'_, D> {
    /// Appends a stop; `offset` is in `0..=1`. Stops on a gradient that was
    /// already torn down are ignored.
    pub fn add_color_stop(&mut self, offset: f64, color: &str) -> &mut Self {
        if let Err(err) = self
            .surface
            .gradients
            .add_color_stop(&mut self.surface.document, self.id, offset, color)
        {
            trace!(error = %err, "color stop ignored");
        }
        self
    }
}

/// Lays a bounding-box relative definition out in user space.
pub(crate) fn spec_for_bbox(definition: &GradientDefinition, bbox: BBox) -> GradientSpec {
    match definition.shape {
        GradientShape::Linear { angle } => {
            let [x1, y1, x2, y2] = GradientDefinition::linear_vector(angle);
            GradientSpec::Linear {
                x0: bbox.x + x1 * bbox.width,
                y0: bbox.y + y1 * bbox.height,
                x1: bbox.x + x2 * bbox.width,
                y1: bbox.y + y2 * bbox.height,
            }
        }
        GradientShape::Radial {
            center_x,
            center_y,
            radius,
            focal_x,
            focal_y,
        } => {
            let cx = bbox.x + center_x * bbox.width;
            let cy = bbox.y + center_y * bbox.height;
            GradientSpec::Radial {
                x0: focal_x.map_or(cx, |fx| bbox.x + fx * bbox.width),
                y0: focal_y.map_or(cy, |fy| bbox.y + fy * bbox.height),
                r0: 0.0,
                x1: cx,
                y1: cy,
                r1: radius * bbox.width.min(bbox.height),
            }
        }
    }
}

/// Stop color with the stop opacity folded into the alpha channel.
pub(crate) fn stop_color(color: &str, opacity: f64) -> String {
    match Color::parse(color) {
        Some(parsed) if opacity < 1.0 => parsed.with_alpha(parsed.alpha * opacity).to_string(),
        _ => color.to_owned(),
    }
}
