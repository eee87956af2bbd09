use std::cell::OnceCell;
use std::f64::consts::{FRAC_PI_2, TAU};
use std::fmt;
use std::fmt::Write as _;

use crate::core::matrix::AffineMatrix;
use crate::core::types::{BBox, Extent};

/// Control-point distance for a quarter-circle cubic approximation.
const QUARTER_ARC_RHO: f64 = 0.547_443_256_150_549;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathCommand {
    /// Consumes one point.
    MoveTo,
    /// Consumes one point.
    LineTo,
    /// Consumes three points: two controls and the end point.
    CurveTo,
    /// Consumes nothing.
    Close,
}

impl PathCommand {
    #[must_use]
    pub const fn param_count(self) -> usize {
        match self {
            Self::MoveTo | Self::LineTo => 2,
            Self::CurveTo => 6,
            Self::Close => 0,
        }
    }
}

/// Absolute path made of `M`, `L`, `C` and `Z` commands only.
///
/// Arcs and quadratic curves are converted to cubic curves as they are added,
/// and relative SVG commands are resolved while parsing, so every parameter is
/// a point coordinate. The serialized form is cached until the next mutation.
#[derive(Debug, Clone, Default)]
pub struct PathModel {
    commands: Vec<PathCommand>,
    params: Vec<f64>,
    cursor: Option<(f64, f64)>,
    start: (f64, f64),
    svg: OnceCell<String>,
}

impl PartialEq for PathModel {
    fn eq(&self, other: &Self) -> bool {
        self.commands == other.commands
            && self.params == other.params
            && self.cursor == other.cursor
            && self.start == other.start
    }
}

impl PathModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses SVG path data; see [`PathModel::from_svg_string`].
    #[must_use]
    pub fn parse(data: &str) -> Self {
        let mut path = Self::new();
        path.from_svg_string(data);
        path
    }

    #[must_use]
    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    #[must_use]
    pub fn params(&self) -> &[f64] {
        &self.params
    }

    #[must_use]
    pub fn cursor(&self) -> Option<(f64, f64)> {
        self.cursor
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.params.clear();
        self.cursor = None;
        self.start = (0.0, 0.0);
        self.dirt();
    }

    fn dirt(&mut self) {
        self.svg.take();
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        self.params.extend([x, y]);
        self.commands.push(PathCommand::MoveTo);
        self.start = (x, y);
        self.cursor = Some((x, y));
        self.dirt();
    }

    /// Straight segment; starts a subpath when there is no current point.
    pub fn line_to(&mut self, x: f64, y: f64) {
        if self.cursor.is_none() {
            self.move_to(x, y);
            return;
        }
        self.params.extend([x, y]);
        self.commands.push(PathCommand::LineTo);
        self.cursor = Some((x, y));
        self.dirt();
    }

    pub fn bezier_curve_to(&mut self, cx1: f64, cy1: f64, cx2: f64, cy2: f64, x: f64, y: f64) {
        if self.cursor.is_none() {
            self.move_to(cx1, cy1);
        }
        self.params.extend([cx1, cy1, cx2, cy2, x, y]);
        self.commands.push(PathCommand::CurveTo);
        self.cursor = Some((x, y));
        self.dirt();
    }

    /// Degree-elevated to an equivalent cubic curve.
    pub fn quadratic_curve_to(&mut self, cx: f64, cy: f64, x: f64, y: f64) {
        let (x0, y0) = match self.cursor {
            Some(cursor) => cursor,
            None => {
                self.move_to(cx, cy);
                (cx, cy)
            }
        };
        self.bezier_curve_to(
            (2.0 * cx + x0) / 3.0,
            (2.0 * cy + y0) / 3.0,
            (2.0 * cx + x) / 3.0,
            (2.0 * cy + y) / 3.0,
            x,
            y,
        );
    }

    /// Closes the current subpath; the current point returns to its start.
    /// Ignored when there is no current point.
    pub fn close_path(&mut self) {
        if self.cursor.is_some() {
            self.commands.push(PathCommand::Close);
            self.cursor = Some(self.start);
            self.dirt();
        }
    }

    /// Canvas `arcTo`: a line towards `(x1, y1)` ending in an elliptic arc
    /// tangent to both `cursor -> (x1, y1)` and `(x1, y1) -> (x2, y2)`.
    ///
    /// Degenerates to `move_to(x1, y1)` without a current point and to
    /// `line_to(x1, y1)` for a zero radius or collinear points.
    #[allow(clippy::too_many_arguments)]
    pub fn arc_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, rx: f64, ry: f64, rotation: f64) {
        let Some((x0, y0)) = self.cursor else {
            self.move_to(x1, y1);
            return;
        };
        if rx == 0.0 || ry == 0.0 {
            self.line_to(x1, y1);
            return;
        }

        // Work in the space where the ellipse is a unit circle centered on
        // the corner point.
        let (sin, cos) = rotation.sin_cos();
        let to_unit = |x: f64, y: f64| {
            let (dx, dy) = (x - x1, y - y1);
            ((cos * dx + sin * dy) / rx, (-sin * dx + cos * dy) / ry)
        };
        let from_unit = |x: f64, y: f64| {
            (
                x1 + cos * rx * x - sin * ry * y,
                y1 + sin * rx * x + cos * ry * y,
            )
        };

        let (ax, ay) = to_unit(x0, y0);
        let (bx, by) = to_unit(x2, y2);
        let area = bx * ay - by * ax;
        let la = ax.hypot(ay);
        let lb = bx.hypot(by);
        if area == 0.0 || la == 0.0 || lb == 0.0 {
            self.line_to(x1, y1);
            return;
        }

        let (ux, uy) = (ax / la, ay / la);
        let (vx, vy) = (bx / lb, by / lb);
        let half = (ux * vx + uy * vy).clamp(-1.0, 1.0).acos() * 0.5;
        let tangent = 1.0 / half.tan();
        let (bis_x, bis_y) = (ux + vx, uy + vy);
        let bis_len = bis_x.hypot(bis_y);
        let center_distance = 1.0 / half.sin();
        let (cx, cy) = (
            bis_x / bis_len * center_distance,
            bis_y / bis_len * center_distance,
        );

        let start_angle = (uy * tangent - cy).atan2(ux * tangent - cx);
        let end_angle = (vy * tangent - cy).atan2(vx * tangent - cx);

        let (start_x, start_y) = from_unit(ux * tangent, uy * tangent);
        let (center_x, center_y) = from_unit(cx, cy);
        self.line_to(start_x, start_y);
        self.ellipse(
            center_x,
            center_y,
            rx,
            ry,
            rotation,
            start_angle,
            end_angle,
            area < 0.0,
        );
    }

    /// Canvas `ellipse`. The sweep is clamped to one full turn in either
    /// direction; arcs with non-finite angles add nothing.
    #[allow(clippy::too_many_arguments)]
    pub fn ellipse(
        &mut self,
        cx: f64,
        cy: f64,
        radius_x: f64,
        radius_y: f64,
        rotation: f64,
        start_angle: f64,
        end_angle: f64,
        anticlockwise: bool,
    ) {
        if !(start_angle.is_finite() && end_angle.is_finite()) {
            return;
        }
        let sweep = arc_sweep(start_angle, end_angle, anticlockwise);

        let first = self.params.len();
        let count = if anticlockwise {
            let count = approximate_arc(
                &mut self.params,
                cx,
                cy,
                radius_x,
                radius_y,
                rotation,
                start_angle - sweep,
                sweep,
            );
            reverse_points(&mut self.params[first..]);
            count
        } else {
            approximate_arc(
                &mut self.params,
                cx,
                cy,
                radius_x,
                radius_y,
                rotation,
                start_angle,
                sweep,
            )
        };

        let arc_start = (self.params[first], self.params[first + 1]);
        let last = self.params.len();
        let arc_end = (self.params[last - 2], self.params[last - 1]);
        if self.cursor.is_none() {
            self.commands.push(PathCommand::MoveTo);
            self.start = arc_start;
        } else {
            self.commands.push(PathCommand::LineTo);
        }
        self.cursor = Some(arc_end);
        self.commands
            .extend(std::iter::repeat_n(PathCommand::CurveTo, (count - 2) / 6));
        self.dirt();
    }

    pub fn arc(&mut self, x: f64, y: f64, radius: f64, start_angle: f64, end_angle: f64, anticlockwise: bool) {
        self.ellipse(x, y, radius, radius, 0.0, start_angle, end_angle, anticlockwise);
    }

    /// Closed rectangle subpath; zero width or height adds nothing.
    pub fn rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        if width == 0.0 || height == 0.0 {
            return;
        }
        self.move_to(x, y);
        self.line_to(x + width, y);
        self.line_to(x + width, y + height);
        self.line_to(x, y + height);
        self.close_path();
    }

    /// SVG `A` endpoint arc from the current point to `(x2, y2)`.
    ///
    /// `rotation` is in radians. Radii too small to span the endpoints are
    /// scaled up uniformly, as SVG renderers do.
    #[allow(clippy::too_many_arguments)]
    pub fn arc_svg(
        &mut self,
        rx: f64,
        ry: f64,
        rotation: f64,
        large_arc: bool,
        sweep: bool,
        x2: f64,
        y2: f64,
    ) {
        let (x1, y1) = self.cursor.unwrap_or((0.0, 0.0));
        if (x1 == x2 && y1 == y2) || rx == 0.0 || ry == 0.0 {
            self.line_to(x2, y2);
            return;
        }
        let mut rx = rx.abs();
        let mut ry = ry.abs();
        let hdx = (x1 - x2) * 0.5;
        let hdy = (y1 - y2) * 0.5;
        let (sin_phi, cos_phi) = rotation.sin_cos();
        let xp = hdx * cos_phi + hdy * sin_phi;
        let yp = -hdx * sin_phi + hdy * cos_phi;
        let rat_x = xp / rx;
        let rat_y = yp / ry;
        let mut lambda = rat_x * rat_x + rat_y * rat_y;
        let mut cx = (x1 + x2) * 0.5;
        let mut cy = (y1 + y2) * 0.5;
        let mut cpx = 0.0;
        let mut cpy = 0.0;
        if lambda >= 1.0 {
            lambda = lambda.sqrt();
            rx *= lambda;
            ry *= lambda;
        } else {
            lambda = (1.0 / lambda - 1.0).sqrt();
            if large_arc == sweep {
                lambda = -lambda;
            }
            cpx = lambda * rx * rat_y;
            cpy = -lambda * ry * rat_x;
            cx += cos_phi * cpx - sin_phi * cpy;
            cy += sin_phi * cpx + cos_phi * cpy;
        }

        let theta1 = ((yp - cpy) / ry).atan2((xp - cpx) / rx);
        let mut delta = ((-yp - cpy) / ry).atan2((-xp - cpx) / rx) - theta1;
        if sweep {
            if delta <= 0.0 {
                delta += TAU;
            }
        } else if delta >= 0.0 {
            delta -= TAU;
        }
        self.ellipse(cx, cy, rx, ry, rotation, theta1, theta1 + delta, !sweep);
    }

    /// Appends every command of `other`; the current point becomes `other`'s.
    pub fn append(&mut self, other: &PathModel) {
        if other.is_empty() {
            return;
        }
        self.commands.extend_from_slice(&other.commands);
        self.params.extend_from_slice(&other.params);
        self.cursor = other.cursor;
        self.start = other.start;
        self.dirt();
    }

    /// Replaces the content with parsed SVG path data.
    ///
    /// Every SVG command is accepted, relative forms included. Malformed
    /// trailing parameters are dropped.
    pub fn from_svg_string(&mut self, data: &str) {
        self.clear();
        let tokens = tokenize(data);
        let mut index = 0;
        let mut last = (0.0_f64, 0.0_f64);
        let mut control = (0.0_f64, 0.0_f64);
        let mut previous: Option<char> = None;

        while index < tokens.len() {
            let SvgToken::Command(command) = tokens[index] else {
                index += 1;
                continue;
            };
            index += 1;
            let relative = command.is_ascii_lowercase();
            let args_len = svg_arg_count(command);
            let mut first = true;

            if args_len == 0 {
                self.close_path();
                last = self.start;
                previous = Some(command);
                continue;
            }

            loop {
                let Some(args) = take_numbers(&tokens, index, args_len) else {
                    break;
                };
                index += args_len;
                let (ox, oy) = if relative { last } else { (0.0, 0.0) };
                match command.to_ascii_uppercase() {
                    'M' => {
                        last = (ox + args[0], oy + args[1]);
                        if first {
                            self.move_to(last.0, last.1);
                        } else {
                            self.line_to(last.0, last.1);
                        }
                    }
                    'L' => {
                        last = (ox + args[0], oy + args[1]);
                        self.line_to(last.0, last.1);
                    }
                    'H' => {
                        last.0 = if relative { last.0 + args[0] } else { args[0] };
                        self.line_to(last.0, last.1);
                    }
                    'V' => {
                        last.1 = if relative { last.1 + args[0] } else { args[0] };
                        self.line_to(last.0, last.1);
                    }
                    'C' => {
                        control = (ox + args[2], oy + args[3]);
                        let end = (ox + args[4], oy + args[5]);
                        self.bezier_curve_to(ox + args[0], oy + args[1], control.0, control.1, end.0, end.1);
                        last = end;
                    }
                    'S' => {
                        let reflect = matches!(previous, Some('C' | 'c' | 'S' | 's')) || !first;
                        let (c1x, c1y) = if reflect {
                            (2.0 * last.0 - control.0, 2.0 * last.1 - control.1)
                        } else {
                            last
                        };
                        control = (ox + args[0], oy + args[1]);
                        let end = (ox + args[2], oy + args[3]);
                        self.bezier_curve_to(c1x, c1y, control.0, control.1, end.0, end.1);
                        last = end;
                    }
                    'Q' => {
                        control = (ox + args[0], oy + args[1]);
                        let end = (ox + args[2], oy + args[3]);
                        self.quadratic_curve_to(control.0, control.1, end.0, end.1);
                        last = end;
                    }
                    'T' => {
                        let reflect = matches!(previous, Some('Q' | 'q' | 'T' | 't')) || !first;
                        control = if reflect {
                            (2.0 * last.0 - control.0, 2.0 * last.1 - control.1)
                        } else {
                            last
                        };
                        let end = (ox + args[0], oy + args[1]);
                        self.quadratic_curve_to(control.0, control.1, end.0, end.1);
                        last = end;
                    }
                    'A' => {
                        let end = (ox + args[5], oy + args[6]);
                        self.arc_svg(
                            args[0],
                            args[1],
                            args[2].to_radians(),
                            args[3] != 0.0,
                            args[4] != 0.0,
                            end.0,
                            end.1,
                        );
                        last = end;
                    }
                    _ => break,
                }
                first = false;
            }
            previous = Some(command);
        }
    }

    /// Maps every point through `matrix`. Identity matrices are skipped.
    pub fn transform(&mut self, matrix: &AffineMatrix) {
        if matrix.is_identity() {
            return;
        }
        for point in self.params.chunks_exact_mut(2) {
            let (x, y) = (point[0], point[1]);
            point[0] = matrix.x(x, y);
            point[1] = matrix.y(x, y);
        }
        self.cursor = self.cursor.map(|point| matrix.transform_point(point));
        self.start = matrix.transform_point(self.start);
        self.dirt();
    }

    /// Tight bounding box, curve extrema included. Empty paths yield a zero box.
    #[must_use]
    pub fn dimension(&self) -> BBox {
        self.dimension_with(|x, y| (x, y))
    }

    /// Bounding box of the path as if it were transformed by `matrix`.
    #[must_use]
    pub fn dimension_with_transform(&self, matrix: &AffineMatrix) -> BBox {
        self.dimension_with(|x, y| matrix.transform_point((x, y)))
    }

    fn dimension_with(&self, map: impl Fn(f64, f64) -> (f64, f64)) -> BBox {
        let mut extent = Extent::EMPTY;
        let mut last = (0.0, 0.0);
        let mut params = self.params.chunks_exact(2).map(|point| map(point[0], point[1]));
        for command in &self.commands {
            match command {
                PathCommand::MoveTo | PathCommand::LineTo => {
                    if let Some(point) = params.next() {
                        extent.include(point.0, point.1);
                        last = point;
                    }
                }
                PathCommand::CurveTo => {
                    let (Some(c1), Some(c2), Some(end)) = (params.next(), params.next(), params.next())
                    else {
                        break;
                    };
                    let (left, right) = curve_dimension(last.0, c1.0, c2.0, end.0);
                    let (top, bottom) = curve_dimension(last.1, c1.1, c2.1, end.1);
                    extent.include(left, top);
                    extent.include(right, bottom);
                    last = end;
                }
                PathCommand::Close => {}
            }
        }
        extent.to_bbox()
    }

    /// Cached serialized form (`M`, `L`, `C`, `Z` only).
    #[must_use]
    pub fn to_svg_string(&self) -> &str {
        self.svg.get_or_init(|| self.serialize())
    }

    fn serialize(&self) -> String {
        let mut out = String::with_capacity(self.params.len() * 8);
        let mut params = self.params.iter();
        let mut next = || params.next().copied().unwrap_or(0.0);
        for command in &self.commands {
            // Writing into a String cannot fail.
            let _ = match command {
                PathCommand::MoveTo => write!(out, "M{},{}", next(), next()),
                PathCommand::LineTo => write!(out, "L{},{}", next(), next()),
                PathCommand::CurveTo => write!(
                    out,
                    "C{},{} {},{} {},{}",
                    next(),
                    next(),
                    next(),
                    next(),
                    next(),
                    next()
                ),
                PathCommand::Close => write!(out, "Z"),
            };
        }
        out
    }
}

impl fmt::Display for PathModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_svg_string())
    }
}

/// Angle covered by a canvas arc, in `[0, TAU]`. A difference of a full
/// turn or more in the drawing direction is one full turn; anything else
/// wraps into a single turn.
fn arc_sweep(start_angle: f64, end_angle: f64, anticlockwise: bool) -> f64 {
    let delta = if anticlockwise {
        start_angle - end_angle
    } else {
        end_angle - start_angle
    };
    if delta >= TAU { TAU } else { delta.rem_euclid(TAU) }
}

/// Pushes the start point and cubic segments approximating `sweep` radians
/// of the ellipse from `theta1`; returns the number of values pushed.
#[allow(clippy::too_many_arguments)]
fn approximate_arc(
    result: &mut Vec<f64>,
    cx: f64,
    cy: f64,
    rx: f64,
    ry: f64,
    phi: f64,
    theta1: f64,
    mut sweep: f64,
) -> usize {
    let (sin_phi, cos_phi) = phi.sin_cos();
    let (sin_theta1, cos_theta1) = theta1.sin_cos();
    let mut exx = cos_phi * cos_theta1 * rx - sin_phi * sin_theta1 * ry;
    let mut eyx = -cos_phi * sin_theta1 * rx - sin_phi * cos_theta1 * ry;
    let mut exy = sin_phi * cos_theta1 * rx + cos_phi * sin_theta1 * ry;
    let mut eyy = -sin_phi * sin_theta1 * rx + cos_phi * cos_theta1 * ry;
    let mut count = 2;

    result.extend([exx + cx, exy + cy]);
    while sweep >= FRAC_PI_2 {
        let rho = QUARTER_ARC_RHO;
        result.extend([
            exx + eyx * rho + cx,
            exy + eyy * rho + cy,
            exx * rho + eyx + cx,
            exy * rho + eyy + cy,
            eyx + cx,
            eyy + cy,
        ]);
        count += 6;
        sweep -= FRAC_PI_2;
        (exx, eyx) = (eyx, -exx);
        (exy, eyy) = (eyy, -exy);
    }
    if sweep != 0.0 {
        let y1 = (0.329_473_805_281_598_7 + 0.012_120_855_841_304_373 * sweep) * sweep;
        let (y3, x3) = sweep.sin_cos();
        let x2 = x3 + y1 * y3;
        let y2 = y3 - y1 * x3;
        result.extend([
            exx + eyx * y1 + cx,
            exy + eyy * y1 + cy,
            exx * x2 + eyx * y2 + cx,
            exy * x2 + eyy * y2 + cy,
            exx * x3 + eyx * y3 + cx,
            exy * x3 + eyy * y3 + cy,
        ]);
        count += 6;
    }
    count
}

/// Reverses the order of `(x, y)` pairs in place.
fn reverse_points(params: &mut [f64]) {
    let points = params.len() / 2;
    for index in 0..points / 2 {
        let mirror = points - 1 - index;
        params.swap(index * 2, mirror * 2);
        params.swap(index * 2 + 1, mirror * 2 + 1);
    }
}

/// Range covered by one axis of a cubic curve, extrema included.
fn curve_dimension(a: f64, b: f64, c: f64, d: f64) -> (f64, f64) {
    let qa = 3.0 * (-a + 3.0 * (b - c) + d);
    let qb = 6.0 * (a - 2.0 * b + c);
    let qc = -3.0 * (a - b);
    let mut min = a.min(d);
    let mut max = a.max(d);
    let mut include = |t: f64| {
        if 0.0 < t && t < 1.0 {
            let value = interpolate(a, b, c, d, t);
            min = min.min(value);
            max = max.max(value);
        }
    };

    if qa == 0.0 {
        if qb != 0.0 {
            include(-qc / qb);
        }
    } else {
        let delta = qb * qb - 4.0 * qa * qc;
        if delta >= 0.0 {
            let root = delta.sqrt();
            include((root - qb) / 2.0 / qa);
            if root > 0.0 {
                include((-root - qb) / 2.0 / qa);
            }
        }
    }
    (min, max)
}

fn interpolate(a: f64, b: f64, c: f64, d: f64, t: f64) -> f64 {
    let s = 1.0 - t;
    s * s * s * a + 3.0 * s * s * t * b + 3.0 * s * t * t * c + t * t * t * d
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SvgToken {
    Command(char),
    Number(f64),
}

fn svg_arg_count(command: char) -> usize {
    match command.to_ascii_uppercase() {
        'A' => 7,
        'C' => 6,
        'S' | 'Q' => 4,
        'M' | 'L' | 'T' => 2,
        'H' | 'V' => 1,
        _ => 0,
    }
}

fn take_numbers(tokens: &[SvgToken], index: usize, count: usize) -> Option<[f64; 7]> {
    let mut args = [0.0; 7];
    for (slot, token) in args.iter_mut().zip(tokens.get(index..index + count)?) {
        let SvgToken::Number(value) = token else {
            return None;
        };
        *slot = *value;
    }
    Some(args)
}

/// Splits path data into command letters and numbers. Handles packed forms
/// such as `M10-5.5.5` and exponents.
fn tokenize(data: &str) -> Vec<SvgToken> {
    let bytes = data.as_bytes();
    let mut tokens = Vec::new();
    let mut index = 0;
    while index < bytes.len() {
        let byte = bytes[index];
        if byte.is_ascii_alphabetic() && byte != b'e' && byte != b'E' {
            if svg_arg_count(byte as char) > 0 || byte.eq_ignore_ascii_case(&b'z') {
                tokens.push(SvgToken::Command(byte as char));
            }
            index += 1;
            continue;
        }
        if byte.is_ascii_digit() || byte == b'-' || byte == b'+' || byte == b'.' {
            let begin = index;
            let mut seen_dot = false;
            let mut seen_exp = false;
            index += 1;
            if byte == b'.' {
                seen_dot = true;
            }
            while index < bytes.len() {
                let current = bytes[index];
                match current {
                    b'0'..=b'9' => {}
                    b'.' if !seen_dot && !seen_exp => seen_dot = true,
                    b'e' | b'E' if !seen_exp => {
                        seen_exp = true;
                        if matches!(bytes.get(index + 1), Some(b'-' | b'+')) {
                            index += 1;
                        }
                    }
                    _ => break,
                }
                index += 1;
            }
            if let Ok(value) = data[begin..index].parse::<f64>() {
                tokens.push(SvgToken::Number(value));
            }
            continue;
        }
        index += 1;
    }
    tokens
}
