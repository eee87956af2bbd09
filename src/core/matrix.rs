use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::types::BBox;

/// Which side of the existing transform a new transform lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ComposeMode {
    /// The new transform runs before the existing one (local/child space).
    ///
    /// This is how canvas and SVG transform lists chain, so it is the default.
    #[default]
    Prepend,
    /// The new transform runs after the existing one (parent/world space).
    Append,
}

/// Affine transform stored as `(xx, xy, yx, yy, dx, dy)`.
///
/// A point maps as `(x, y) -> (xx*x + yx*y + dx, xy*x + yy*y + dy)`.
///
/// Equality and [`AffineMatrix::is_identity`] are exact floating-point
/// comparisons. Identity matrices are always built from the same literal, so
/// no epsilon is applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 6]", into = "[f64; 6]")]
pub struct AffineMatrix {
    elements: [f64; 6],
}

/// Translate/rotate/scale split of a matrix, see [`AffineMatrix::decompose`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatrixComponents {
    pub translate_x: f64,
    pub translate_y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    /// Radians.
    pub rotation: f64,
}

impl MatrixComponents {
    /// Rebuilds `translate * rotate * scale`, each applied in local space.
    #[must_use]
    pub fn to_matrix(self) -> AffineMatrix {
        let mut matrix = AffineMatrix::IDENTITY;
        matrix
            .translate(self.translate_x, self.translate_y, ComposeMode::Prepend)
            .rotate(self.rotation, ComposeMode::Prepend)
            .scale(self.scale_x, self.scale_y, ComposeMode::Prepend);
        matrix
    }
}

impl Default for AffineMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<[f64; 6]> for AffineMatrix {
    fn from(elements: [f64; 6]) -> Self {
        Self { elements }
    }
}

impl From<AffineMatrix> for [f64; 6] {
    fn from(matrix: AffineMatrix) -> Self {
        matrix.elements
    }
}

impl AffineMatrix {
    pub const IDENTITY: Self = Self {
        elements: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
    };

    #[must_use]
    pub const fn new(xx: f64, xy: f64, yx: f64, yy: f64, dx: f64, dy: f64) -> Self {
        Self {
            elements: [xx, xy, yx, yy, dx, dy],
        }
    }

    #[must_use]
    pub const fn identity() -> Self {
        Self::IDENTITY
    }

    /// Similarity transform mapping `(x0, y0)` to `(x0p, y0p)` and `(x1, y1)`
    /// to `(x1p, y1p)` (rotation, uniform scale and translation only).
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn from_two_point_pairs(
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
        x0p: f64,
        y0p: f64,
        x1p: f64,
        y1p: f64,
    ) -> Self {
        let dx = x1 - x0;
        let dy = y1 - y0;
        let dxp = x1p - x0p;
        let dyp = y1p - y0p;
        let r = 1.0 / (dx * dx + dy * dy);
        let a = dx * dxp + dy * dyp;
        let b = dxp * dy - dx * dyp;
        let c = -a * x0 - b * y0;
        let f = b * x0 - a * y0;
        Self::new(a * r, -b * r, b * r, a * r, c * r + x0p, f * r + y0p)
    }

    /// Uniform scale + translation mapping the midpoint and span of one point
    /// pair onto another. Rotation is ignored.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn pan_zoom_from_two_point_pairs(
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
        x0p: f64,
        y0p: f64,
        x1p: f64,
        y1p: f64,
    ) -> Self {
        let dx = x1 - x0;
        let dy = y1 - y0;
        let cx = (x0 + x1) * 0.5;
        let cy = (y0 + y1) * 0.5;
        let dxp = x1p - x0p;
        let dyp = y1p - y0p;
        let cxp = (x0p + x1p) * 0.5;
        let cyp = (y0p + y1p) * 0.5;
        let scale = ((dxp * dxp + dyp * dyp) / (dx * dx + dy * dy)).sqrt();
        Self::new(scale, 0.0, 0.0, scale, cxp - scale * cx, cyp - scale * cy)
    }

    #[must_use]
    pub const fn xx(&self) -> f64 {
        self.elements[0]
    }

    #[must_use]
    pub const fn xy(&self) -> f64 {
        self.elements[1]
    }

    #[must_use]
    pub const fn yx(&self) -> f64 {
        self.elements[2]
    }

    #[must_use]
    pub const fn yy(&self) -> f64 {
        self.elements[3]
    }

    #[must_use]
    pub const fn dx(&self) -> f64 {
        self.elements[4]
    }

    #[must_use]
    pub const fn dy(&self) -> f64 {
        self.elements[5]
    }

    pub fn set(&mut self, xx: f64, xy: f64, yx: f64, yy: f64, dx: f64, dy: f64) -> &mut Self {
        self.elements = [xx, xy, yx, yy, dx, dy];
        self
    }

    pub fn reset(&mut self) -> &mut Self {
        self.elements = Self::IDENTITY.elements;
        self
    }

    /// Combines `other` with `self` on the side selected by `mode`.
    pub fn compose(&mut self, other: &AffineMatrix, mode: ComposeMode) -> &mut Self {
        let [xx, xy, yx, yy, dx, dy] = other.elements;
        self.compose_elements(xx, xy, yx, yy, dx, dy, mode)
    }

    /// Primitive every other composing operation funnels through.
    #[allow(clippy::too_many_arguments)]
    pub fn compose_elements(
        &mut self,
        xx: f64,
        xy: f64,
        yx: f64,
        yy: f64,
        dx: f64,
        dy: f64,
        mode: ComposeMode,
    ) -> &mut Self {
        let [xx0, xy0, yx0, yy0, dx0, dy0] = self.elements;
        self.elements = match mode {
            // self * other: `other` maps the point first.
            ComposeMode::Prepend => [
                xx * xx0 + xy * yx0,
                xx * xy0 + xy * yy0,
                yx * xx0 + yy * yx0,
                yx * xy0 + yy * yy0,
                dx * xx0 + dy * yx0 + dx0,
                dx * xy0 + dy * yy0 + dy0,
            ],
            // other * self: `self` maps the point first.
            ComposeMode::Append => [
                xx * xx0 + yx * xy0,
                xy * xx0 + yy * xy0,
                xx * yx0 + yx * yy0,
                xy * yx0 + yy * yy0,
                xx * dx0 + yx * dy0 + dx,
                xy * dx0 + yy * dy0 + dy,
            ],
        };
        self
    }

    pub fn translate(&mut self, x: f64, y: f64, mode: ComposeMode) -> &mut Self {
        self.compose_elements(1.0, 0.0, 0.0, 1.0, x, y, mode)
    }

    pub fn scale(&mut self, sx: f64, sy: f64, mode: ComposeMode) -> &mut Self {
        self.scale_about(sx, sy, 0.0, 0.0, mode)
    }

    /// Scales around the pivot `(cx, cy)`, which stays fixed.
    pub fn scale_about(&mut self, sx: f64, sy: f64, cx: f64, cy: f64, mode: ComposeMode) -> &mut Self {
        self.compose_elements(sx, 0.0, 0.0, sy, cx - cx * sx, cy - cy * sy, mode)
    }

    /// Rotates by `angle` radians around the origin.
    pub fn rotate(&mut self, angle: f64, mode: ComposeMode) -> &mut Self {
        self.rotate_about(angle, 0.0, 0.0, mode)
    }

    /// Rotates by `angle` radians around `(cx, cy)`.
    pub fn rotate_about(&mut self, angle: f64, cx: f64, cy: f64, mode: ComposeMode) -> &mut Self {
        let (sin, cos) = angle.sin_cos();
        self.compose_elements(
            cos,
            sin,
            -sin,
            cos,
            cx - cos * cx + cy * sin,
            cy - cos * cy - cx * sin,
            mode,
        )
    }

    /// Rotates by the angle of the vector `(x, y)`.
    pub fn rotate_from_vector(&mut self, x: f64, y: f64, mode: ComposeMode) -> &mut Self {
        let d = x.hypot(y);
        let cos = x / d;
        let sin = y / d;
        self.compose_elements(cos, sin, -sin, cos, 0.0, 0.0, mode)
    }

    /// Horizontal shear by `angle` radians, in local space.
    pub fn skew_x(&mut self, angle: f64) -> &mut Self {
        self.compose_elements(1.0, 0.0, angle.tan(), 1.0, 0.0, 0.0, ComposeMode::Prepend)
    }

    /// Vertical shear by `angle` radians, in local space.
    pub fn skew_y(&mut self, angle: f64) -> &mut Self {
        self.compose_elements(1.0, angle.tan(), 0.0, 1.0, 0.0, 0.0, ComposeMode::Prepend)
    }

    pub fn flip_x(&mut self) -> &mut Self {
        self.compose_elements(-1.0, 0.0, 0.0, 1.0, 0.0, 0.0, ComposeMode::Prepend)
    }

    pub fn flip_y(&mut self) -> &mut Self {
        self.compose_elements(1.0, 0.0, 0.0, -1.0, 0.0, 0.0, ComposeMode::Prepend)
    }

    /// Inverts in place.
    ///
    /// A zero determinant does not fail: the components become non-finite and
    /// propagate through later math. Check [`AffineMatrix::is_finite`].
    pub fn invert(&mut self) -> &mut Self {
        *self = self.inverse();
        self
    }

    #[must_use]
    pub fn inverse(&self) -> Self {
        let [a, b, c, d, e, f] = self.elements;
        let r = 1.0 / (a * d - b * c);
        let (a, b, c, d) = (a * r, b * r, c * r, d * r);
        Self::new(d, -b, -c, a, c * f - d * e, b * e - a * f)
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.elements.iter().all(|value| value.is_finite())
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.elements == Self::IDENTITY.elements
    }

    #[must_use]
    pub fn determinant(&self) -> f64 {
        self.xx() * self.yy() - self.xy() * self.yx()
    }

    /// X component of the transformed point.
    #[must_use]
    pub fn x(&self, x: f64, y: f64) -> f64 {
        x * self.xx() + y * self.yx() + self.dx()
    }

    /// Y component of the transformed point.
    #[must_use]
    pub fn y(&self, x: f64, y: f64) -> f64 {
        x * self.xy() + y * self.yy() + self.dy()
    }

    #[must_use]
    pub fn transform_point(&self, (x, y): (f64, f64)) -> (f64, f64) {
        (self.x(x, y), self.y(x, y))
    }

    /// Transforms every point of `points` in place.
    pub fn transform_list(&self, points: &mut [(f64, f64)]) {
        for point in points.iter_mut() {
            *point = self.transform_point(*point);
        }
    }

    /// Axis-aligned box enclosing the transformed `bbox`.
    ///
    /// With `stroke_radius`, the half extents are shrunk by the radius and then
    /// grown by the radius scaled with [`AffineMatrix::scale_x`] /
    /// [`AffineMatrix::scale_y`], so strokes do not skew with the shape.
    #[must_use]
    pub fn transform_bbox(&self, bbox: &BBox, stroke_radius: Option<f64>) -> BBox {
        let [xx, xy, yx, yy, dx, dy] = self.elements;
        let mut w0 = bbox.width * 0.5;
        let mut h0 = bbox.height * 0.5;
        let cx = bbox.x + w0;
        let cy = bbox.y + h0;

        let (w, h) = match stroke_radius {
            Some(radius) if radius != 0.0 => {
                w0 -= radius;
                h0 -= radius;
                (
                    (w0 * xx).abs() + (h0 * yx).abs() + (self.scale_x() * radius).abs(),
                    (w0 * xy).abs() + (h0 * yy).abs() + (self.scale_y() * radius).abs(),
                )
            }
            _ => (
                (w0 * xx).abs() + (h0 * yx).abs(),
                (w0 * xy).abs() + (h0 * yy).abs(),
            ),
        };

        BBox::new(
            cx * xx + cy * yx + dx - w,
            cx * xy + cy * yy + dy - h,
            w + w,
            h + h,
        )
    }

    #[must_use]
    pub fn scale_x(&self) -> f64 {
        self.xx().hypot(self.yx())
    }

    #[must_use]
    pub fn scale_y(&self) -> f64 {
        self.xy().hypot(self.yy())
    }

    /// Splits the matrix into translation, rotation and signed scale.
    ///
    /// Exact for matrices built as `translate * rotate * scale`: feeding the
    /// result to [`MatrixComponents::to_matrix`] reproduces the matrix up to
    /// rounding. A negative x scale is folded into the rotation (a half turn)
    /// and reported on the y axis instead. Skew cannot be represented, so a
    /// skewed matrix does not round-trip.
    #[must_use]
    pub fn decompose(&self) -> MatrixComponents {
        let [xx, xy, yx, yy, dx, dy] = self.elements;
        let scale_x = xx.hypot(xy);
        let (scale_y, rotation) = if scale_x == 0.0 {
            (yx.hypot(yy), (-yx).atan2(yy))
        } else {
            (self.determinant() / scale_x, xy.atan2(xx))
        };
        MatrixComponents {
            translate_x: dx,
            translate_y: dy,
            scale_x,
            scale_y,
            rotation,
        }
    }

    /// `[xx, xy, yx, yy, dx, dy]`.
    #[must_use]
    pub fn to_vertical_array(&self) -> [f64; 6] {
        self.elements
    }

    /// Row order `[xx, yx, dx, xy, yy, dy]`.
    #[must_use]
    pub fn to_horizontal_array(&self) -> [f64; 6] {
        let [xx, xy, yx, yy, dx, dy] = self.elements;
        [xx, yx, dx, xy, yy, dy]
    }

    /// `matrix(a,b,c,d,e,f)` with nine fractional digits.
    ///
    /// Fixed notation keeps exponent forms (`1e-7`) out of the attribute,
    /// which SVG transform lists reject. Components that round to zero are
    /// written unsigned.
    #[must_use]
    pub fn to_svg(&self) -> String {
        let [a, b, c, d, e, f] = self
            .elements
            .map(|value| if value.abs() < 5e-10 { 0.0 } else { value });
        format!("matrix({a:.9},{b:.9},{c:.9},{d:.9},{e:.9},{f:.9})")
    }
}

impl fmt::Display for AffineMatrix {
    /// Comma-joined components rounded to four decimals.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, value) in self.elements.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            let rounded = (value * 1e4).round() / 1e4 + 0.0;
            write!(f, "{rounded}")?;
        }
        Ok(())
    }
}
