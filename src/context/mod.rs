//! Canvas-style immediate drawing on top of a [`Surface`].
//!
//! A context claims the children of its target group by position: the n-th
//! draw call reuses the n-th child when the tags match, so redrawing the same
//! scene rewrites attributes in place (and skips unchanged ones) instead of
//! rebuilding elements. Children a pass does not claim are destroyed on
//! `restore` and when the context finishes.

mod gradient;
mod state;

use smallvec::SmallVec;
use tracing::trace;

use crate::core::matrix::{AffineMatrix, ComposeMode};
use crate::core::path::PathModel;
use crate::core::types::BBox;
use crate::host::{ElementId, HostDocument};
use crate::surface::Surface;
use crate::surface::resources::{GradientId, GradientSpec, format_number, set_if_changed};

pub use gradient::{GradientHandle, GradientStops};
pub use state::{ContextState, ImagePlacement, LineCap, LineJoin, Paint, TextAlign};

#[derive(Debug, Clone)]
struct SavedState {
    state: ContextState,
    matrix: AffineMatrix,
    group: ElementId,
}

/// Paint already applied to the current path element.
#[derive(Debug, Clone, Copy, Default)]
struct Painted {
    fill: bool,
    stroke: bool,
}

pub struct DrawingContext<'s, D: HostDocument> {
    surface: &'s mut Surface<D>,
    target: ElementId,
    group: ElementId,
    state: ContextState,
    matrix: AffineMatrix,
    stack: Vec<SavedState>,
    path: Option<PathModel>,
    path_element: Option<ElementId>,
    painted: Painted,
    gradient_bbox: Option<BBox>,
    groups_used: SmallVec<[ElementId; 4]>,
    finished: bool,
}

impl<'s, D: HostDocument> DrawingContext<'s, D> {
    pub(crate) fn new(surface: &'s mut Surface<D>, target: ElementId) -> Self {
        let mut groups_used = SmallVec::new();
        groups_used.push(target);
        Self {
            surface,
            target,
            group: target,
            state: ContextState::default(),
            matrix: AffineMatrix::IDENTITY,
            stack: Vec::new(),
            path: None,
            path_element: None,
            painted: Painted::default(),
            gradient_bbox: None,
            groups_used,
            finished: false,
        }
    }

    /// Group the context was opened on.
    #[must_use]
    pub fn target(&self) -> ElementId {
        self.target
    }

    /// Group receiving the next claimed element.
    #[must_use]
    pub fn group(&self) -> ElementId {
        self.group
    }

    #[must_use]
    pub fn matrix(&self) -> AffineMatrix {
        self.matrix
    }

    #[must_use]
    pub fn state(&self) -> &ContextState {
        &self.state
    }

    #[must_use]
    pub fn path(&self) -> Option<&PathModel> {
        self.path.as_ref()
    }

    #[must_use]
    pub fn save_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn document(&self) -> &D {
        &self.surface.document
    }

    // State accessors.

    pub fn set_fill_style(&mut self, paint: impl Into<Paint>) {
        self.state.fill = paint.into();
    }

    #[must_use]
    pub fn fill_style(&self) -> &Paint {
        &self.state.fill
    }

    pub fn set_stroke_style(&mut self, paint: impl Into<Paint>) {
        self.state.stroke = paint.into();
    }

    #[must_use]
    pub fn stroke_style(&self) -> &Paint {
        &self.state.stroke
    }

    pub fn set_fill_opacity(&mut self, opacity: f64) {
        self.state.fill_opacity = opacity;
    }

    #[must_use]
    pub fn fill_opacity(&self) -> f64 {
        self.state.fill_opacity
    }

    pub fn set_stroke_opacity(&mut self, opacity: f64) {
        self.state.stroke_opacity = opacity;
    }

    #[must_use]
    pub fn stroke_opacity(&self) -> f64 {
        self.state.stroke_opacity
    }

    pub fn set_global_alpha(&mut self, alpha: f64) {
        self.state.global_alpha = alpha;
    }

    #[must_use]
    pub fn global_alpha(&self) -> f64 {
        self.state.global_alpha
    }

    pub fn set_line_width(&mut self, width: f64) {
        self.state.line_width = width;
    }

    #[must_use]
    pub fn line_width(&self) -> f64 {
        self.state.line_width
    }

    pub fn set_line_cap(&mut self, cap: LineCap) {
        self.state.line_cap = cap;
    }

    #[must_use]
    pub fn line_cap(&self) -> LineCap {
        self.state.line_cap
    }

    pub fn set_line_join(&mut self, join: LineJoin) {
        self.state.line_join = join;
    }

    #[must_use]
    pub fn line_join(&self) -> LineJoin {
        self.state.line_join
    }

    pub fn set_miter_limit(&mut self, limit: f64) {
        self.state.miter_limit = limit;
    }

    #[must_use]
    pub fn miter_limit(&self) -> f64 {
        self.state.miter_limit
    }

    /// Ignored when any segment is negative or non-finite.
    pub fn set_line_dash(&mut self, segments: &[f64]) {
        if let Some(dash) = state::normalize_dash(segments) {
            self.state.line_dash = dash;
        }
    }

    #[must_use]
    pub fn line_dash(&self) -> &[f64] {
        &self.state.line_dash
    }

    pub fn set_line_dash_offset(&mut self, offset: f64) {
        self.state.line_dash_offset = offset;
    }

    #[must_use]
    pub fn line_dash_offset(&self) -> f64 {
        self.state.line_dash_offset
    }

    pub fn set_shadow(&mut self, offset_x: f64, offset_y: f64, blur: f64, color: impl Into<String>) {
        self.state.shadow_offset_x = offset_x;
        self.state.shadow_offset_y = offset_y;
        self.state.shadow_blur = blur;
        self.state.shadow_color = color.into();
    }

    pub fn set_font(&mut self, font: impl Into<String>) {
        self.state.font = font.into();
    }

    #[must_use]
    pub fn font(&self) -> &str {
        &self.state.font
    }

    pub fn set_text_align(&mut self, align: TextAlign) {
        self.state.text_align = align;
    }

    #[must_use]
    pub fn text_align(&self) -> TextAlign {
        self.state.text_align
    }

    /// Box that bounding-box relative gradients are laid out against.
    pub fn set_gradient_bbox(&mut self, bbox: Option<BBox>) {
        self.gradient_bbox = bbox;
    }

    // Transforms and state stack.

    /// Composes `(a, b, c, d, e, f)` in local space. An open path is moved by
    /// the inverse so already added points keep their place on screen.
    pub fn transform(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) {
        let delta = AffineMatrix::new(a, b, c, d, e, f);
        self.matrix.compose(&delta, ComposeMode::Prepend);
        if let Some(path) = self.path.as_mut().filter(|path| !path.is_empty()) {
            path.transform(&delta.inverse());
            self.path_element = None;
        }
    }

    /// Replaces the current matrix. An open path is first baked into user
    /// space.
    pub fn set_transform(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) {
        if let Some(path) = self.path.as_mut().filter(|path| !path.is_empty()) {
            path.transform(&self.matrix);
            self.path_element = None;
        }
        self.matrix = AffineMatrix::IDENTITY;
        self.transform(a, b, c, d, e, f);
    }

    pub fn set_transform_matrix(&mut self, matrix: &AffineMatrix) {
        let [a, b, c, d, e, f] = matrix.to_vertical_array();
        self.set_transform(a, b, c, d, e, f);
    }

    pub fn reset_transform(&mut self) {
        self.set_transform_matrix(&AffineMatrix::IDENTITY);
    }

    pub fn translate(&mut self, x: f64, y: f64) {
        self.transform(1.0, 0.0, 0.0, 1.0, x, y);
    }

    pub fn scale(&mut self, sx: f64, sy: f64) {
        self.transform(sx, 0.0, 0.0, sy, 0.0, 0.0);
    }

    /// Radians, clockwise in screen space.
    pub fn rotate(&mut self, angle: f64) {
        let (sin, cos) = angle.sin_cos();
        self.transform(cos, sin, -sin, cos, 0.0, 0.0);
    }

    /// Claims a group for subsequent drawing and pushes the current state.
    pub fn save(&mut self) {
        let group = self.claim("g");
        self.stack.push(SavedState {
            state: self.state.clone(),
            matrix: self.matrix,
            group: self.group,
        });
        self.group = group;
        self.state.position = 0;
        if !self.groups_used.contains(&group) {
            self.groups_used.push(group);
        }
    }

    /// Prunes what the saved group did not claim and returns to the parent
    /// group with the saved state and matrix. Without a matching `save` this
    /// does nothing.
    pub fn restore(&mut self) {
        let Some(saved) = self.stack.pop() else {
            return;
        };
        self.prune_children(self.group, self.state.position);
        self.state = saved.state;
        self.group = saved.group;
        self.set_transform_matrix(&saved.matrix);
    }

    // Path building.

    fn path_mut(&mut self) -> &mut PathModel {
        self.path_element = None;
        self.path.get_or_insert_with(PathModel::new)
    }

    pub fn begin_path(&mut self) {
        self.path = Some(PathModel::new());
        self.path_element = None;
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        self.path_mut().move_to(x, y);
    }

    pub fn line_to(&mut self, x: f64, y: f64) {
        self.path_mut().line_to(x, y);
    }

    pub fn quadratic_curve_to(&mut self, cx: f64, cy: f64, x: f64, y: f64) {
        self.path_mut().quadratic_curve_to(cx, cy, x, y);
    }

    pub fn bezier_curve_to(&mut self, cx1: f64, cy1: f64, cx2: f64, cy2: f64, x: f64, y: f64) {
        self.path_mut().bezier_curve_to(cx1, cy1, cx2, cy2, x, y);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn arc_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, rx: f64, ry: f64, rotation: f64) {
        self.path_mut().arc_to(x1, y1, x2, y2, rx, ry, rotation);
    }

    pub fn arc(&mut self, x: f64, y: f64, radius: f64, start_angle: f64, end_angle: f64, anticlockwise: bool) {
        self.path_mut().arc(x, y, radius, start_angle, end_angle, anticlockwise);
    }

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
        self.path_mut()
            .ellipse(cx, cy, radius_x, radius_y, rotation, start_angle, end_angle, anticlockwise);
    }

    /// SVG `A` segment from the current point.
    #[allow(clippy::too_many_arguments)]
    pub fn arc_svg(&mut self, rx: f64, ry: f64, rotation: f64, large_arc: bool, sweep: bool, x2: f64, y2: f64) {
        self.path_mut().arc_svg(rx, ry, rotation, large_arc, sweep, x2, y2);
    }

    pub fn close_path(&mut self) {
        self.path_mut().close_path();
    }

    pub fn rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.path_mut().rect(x, y, width, height);
    }

    pub fn append_path(&mut self, other: &PathModel) {
        self.path_mut().append(other);
    }

    // Painting.

    /// Fills the current path. Does nothing without a non-empty path.
    pub fn fill(&mut self) {
        let Some(element) = self.materialize_path() else {
            return;
        };
        self.write_fill(element);
        if !self.painted.stroke && self.surface.document.attribute(element, "stroke").is_some() {
            set_if_changed(&mut self.surface.document, element, "stroke", "none");
        }
        self.painted.fill = true;
        self.track_paint(element);
    }

    /// Strokes the current path. Does nothing without a non-empty path.
    pub fn stroke(&mut self) {
        let Some(element) = self.materialize_path() else {
            return;
        };
        if !self.painted.fill {
            set_if_changed(&mut self.surface.document, element, "fill", "none");
        }
        self.write_stroke(element);
        self.painted.stroke = true;
        self.track_paint(element);
    }

    /// Fills then strokes the current path, skipping paints that are `none`
    /// or fully transparent. Unless `transform_fill_stroke` is set, `inverse`
    /// is applied first so line widths and gradients ignore the shape's own
    /// transform.
    pub fn fill_stroke(&mut self, transform_fill_stroke: bool, inverse: &AffineMatrix) {
        if !transform_fill_stroke {
            let [a, b, c, d, e, f] = inverse.to_vertical_array();
            self.transform(a, b, c, d, e, f);
        }
        if !self.state.fill.is_none() && self.state.fill_opacity != 0.0 {
            self.fill();
        }
        if !self.state.stroke.is_none() && self.state.stroke_opacity != 0.0 {
            self.stroke();
        }
    }

    /// Fills a rectangle without touching the current path.
    pub fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        let saved = (self.path.take(), self.path_element.take(), self.painted);
        self.begin_path();
        self.rect(x, y, width, height);
        self.fill();
        (self.path, self.path_element, self.painted) = saved;
    }

    /// Strokes a rectangle without touching the current path.
    pub fn stroke_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        let saved = (self.path.take(), self.path_element.take(), self.painted);
        self.begin_path();
        self.rect(x, y, width, height);
        self.stroke();
        (self.path, self.path_element, self.painted) = saved;
    }

    pub fn fill_text(&mut self, text: &str, x: f64, y: f64) {
        let element = self.claim_text(text, x, y);
        self.write_fill(element);
        if self.surface.document.attribute(element, "stroke").is_some() {
            set_if_changed(&mut self.surface.document, element, "stroke", "none");
        }
        self.track_paint(element);
    }

    pub fn stroke_text(&mut self, text: &str, x: f64, y: f64) {
        let element = self.claim_text(text, x, y);
        set_if_changed(&mut self.surface.document, element, "fill", "none");
        self.write_stroke(element);
        self.track_paint(element);
    }

    pub fn draw_image(&mut self, src: &str, placement: ImagePlacement) {
        let element = self.claim("image");
        let doc = &mut self.surface.document;
        set_if_changed(doc, element, "href", src);
        set_if_changed(doc, element, "x", &format_number(placement.x));
        set_if_changed(doc, element, "y", &format_number(placement.y));
        set_if_changed(doc, element, "width", &format_number(placement.width));
        set_if_changed(doc, element, "height", &format_number(placement.height));
        set_if_changed(doc, element, "preserveAspectRatio", "none");
        if self.state.global_alpha < 1.0 {
            set_if_changed(doc, element, "opacity", &format_number(self.state.global_alpha));
        } else if doc.attribute(element, "opacity").is_some() {
            doc.remove_attribute(element, "opacity");
        }
        self.write_transform(element);
    }

    // Gradients.

    pub fn create_linear_gradient(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) -> GradientHandle {
        self.create_gradient(&GradientSpec::Linear { x0, y0, x1, y1 })
    }

    /// Gradient from the focal circle `(x0, y0, r0)` to `(x1, y1, r1)`; stop
    /// offsets are compressed into the ring between the two radii.
    #[allow(clippy::too_many_arguments)]
    pub fn create_radial_gradient(&mut self, x0: f64, y0: f64, r0: f64, x1: f64, y1: f64, r1: f64) -> GradientHandle {
        self.create_gradient(&GradientSpec::Radial {
            x0,
            y0,
            r0,
            x1,
            y1,
            r1,
        })
    }

    fn create_gradient(&mut self, spec: &GradientSpec) -> GradientHandle {
        GradientHandle(self.surface.get_or_create_gradient(spec, self.group))
    }

    /// Stop writer for a gradient created by this context.
    pub fn gradient(&mut self, handle: GradientHandle) -> GradientStops<'_, D> {
        GradientStops {
            surface: &mut *self.surface,
            id: handle.0,
        }
    }

    pub fn add_color_stop(&mut self, handle: GradientHandle, offset: f64, color: &str) {
        self.gradient(handle).add_color_stop(offset, color);
    }

    /// Ends the pass: unwinds open saves, prunes unclaimed children and drops
    /// gradients this pass did not claim. Dropping the context does the same.
    pub fn finish(mut self) {
        self.finalize();
    }

    fn finalize(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        while !self.stack.is_empty() {
            self.restore();
        }
        self.prune_children(self.group, self.state.position);
        let groups = std::mem::take(&mut self.groups_used);
        for group in groups {
            if self.surface.document.contains(group) {
                self.surface.gradients.sweep_unclaimed(&mut self.surface.document, group);
            }
        }
        trace!(claimed = self.state.position, "drawing pass finished");
    }

    // Element claiming.

    fn claim(&mut self, tag: &str) -> ElementId {
        let group = self.group;
        let position = self.state.position;
        self.state.position += 1;
        let existing = self.surface.document.children(group).get(position).copied();
        if let Some(child) = existing {
            if self.surface.document.tag(child) == Some(tag) {
                return child;
            }
            self.prune_children(group, position);
        }
        let element = self.surface.document.create_element(tag);
        self.surface.document.append_child(group, element);
        trace!(tag, position, "context element created");
        element
    }

    fn prune_children(&mut self, group: ElementId, from: usize) {
        let doomed: Vec<ElementId> = self.surface.document.children(group).iter().skip(from).copied().collect();
        if doomed.is_empty() {
            return;
        }
        trace!(pruned = doomed.len(), from, "unclaimed context elements pruned");
        for element in doomed {
            self.surface.destroy_element(element);
        }
    }

    /// Claims a `path` element for the current path, writing its data and
    /// transform once per element.
    fn materialize_path(&mut self) -> Option<ElementId> {
        let path = self.path.as_ref().filter(|path| !path.is_empty())?;
        if let Some(element) = self.path_element {
            if self.surface.document.contains(element) {
                return Some(element);
            }
        }
        let data = path.to_svg_string().to_owned();
        let element = self.claim("path");
        set_if_changed(&mut self.surface.document, element, "d", &data);
        self.write_transform(element);
        self.path_element = Some(element);
        self.painted = Painted::default();
        Some(element)
    }

    fn claim_text(&mut self, text: &str, x: f64, y: f64) -> ElementId {
        let element = self.claim("text");
        let doc = &mut self.surface.document;
        set_if_changed(doc, element, "x", &format_number(x));
        set_if_changed(doc, element, "y", &format_number(y));
        set_if_changed(doc, element, "text-anchor", self.state.text_align.as_str());
        if doc.style(element, "font") != Some(self.state.font.as_str()) {
            doc.set_style(element, "font", &self.state.font);
        }
        let tspan = match doc.children(element).first().copied() {
            Some(child) if doc.tag(child) == Some("tspan") => child,
            _ => {
                let tspan = doc.create_element("tspan");
                doc.append_child(element, tspan);
                tspan
            }
        };
        if doc.text(tspan) != Some(text) {
            doc.set_text(tspan, text);
        }
        self.write_transform(element);
        element
    }

    fn write_transform(&mut self, element: ElementId) {
        let doc = &mut self.surface.document;
        if self.matrix.is_identity() {
            if doc.attribute(element, "transform").is_some() {
                doc.remove_attribute(element, "transform");
            }
        } else {
            set_if_changed(doc, element, "transform", &self.matrix.to_svg());
        }
    }

    fn write_fill(&mut self, element: ElementId) {
        let paint = self.state.fill.clone();
        let value = self.paint_value(&paint);
        let opacity = self.state.fill_opacity * self.state.global_alpha;
        let doc = &mut self.surface.document;
        set_if_changed(doc, element, "fill", &value);
        set_if_changed(doc, element, "fill-opacity", &format_number(opacity));
    }

    fn write_stroke(&mut self, element: ElementId) {
        let paint = self.state.stroke.clone();
        let value = self.paint_value(&paint);
        let state = &self.state;
        let doc = &mut self.surface.document;
        set_if_changed(doc, element, "stroke", &value);
        set_if_changed(
            doc,
            element,
            "stroke-opacity",
            &format_number(state.stroke_opacity * state.global_alpha),
        );
        set_if_changed(doc, element, "stroke-width", &format_number(state.line_width));
        set_if_changed(doc, element, "stroke-linecap", state.line_cap.as_str());
        set_if_changed(doc, element, "stroke-linejoin", state.line_join.as_str());
        set_if_changed(doc, element, "stroke-miterlimit", &format_number(state.miter_limit));
        if state.line_dash.is_empty() {
            for name in ["stroke-dasharray", "stroke-dashoffset"] {
                if doc.attribute(element, name).is_some() {
                    doc.remove_attribute(element, name);
                }
            }
        } else {
            let dash = state
                .line_dash
                .iter()
                .map(|segment| format_number(*segment))
                .collect::<Vec<_>>()
                .join(",");
            set_if_changed(doc, element, "stroke-dasharray", &dash);
            set_if_changed(doc, element, "stroke-dashoffset", &format_number(state.line_dash_offset));
        }
    }

    /// Host paint value. Relative gradients without a layout box fall back to
    /// their first stop color.
    fn paint_value(&mut self, paint: &Paint) -> String {
        match paint {
            Paint::None => "none".to_owned(),
            Paint::Color(color) => color.clone(),
            Paint::Gradient(handle) => self.gradient_url(handle.0),
            Paint::Relative(definition) => {
                let definition = definition.normalized();
                let Some(bbox) = self.gradient_bbox else {
                    return definition
                        .stops
                        .first()
                        .map_or_else(|| "none".to_owned(), |stop| gradient::stop_color(&stop.color, stop.opacity));
                };
                let handle = self.create_gradient(&gradient::spec_for_bbox(&definition, bbox));
                let mut stops = self.gradient(handle);
                for stop in &definition.stops {
                    stops.add_color_stop(stop.offset / 100.0, &gradient::stop_color(&stop.color, stop.opacity));
                }
                self.gradient_url(handle.0)
            }
        }
    }

    fn gradient_url(&mut self, id: GradientId) -> String {
        self.surface
            .gradients
            .paint_url(&mut self.surface.document, id)
            .unwrap_or_else(|| "none".to_owned())
    }

    /// Points the gradient reference counts at whatever `element` now paints
    /// with.
    fn track_paint(&mut self, element: ElementId) {
        let surface = &mut *self.surface;
        let refs: SmallVec<[GradientId; 2]> = ["fill", "stroke"]
            .iter()
            .filter_map(|name| surface.document.attribute(element, name))
            .filter_map(|value| surface.gradients.resolve_url(value))
            .collect();
        surface.gradients.track_element(&mut surface.document, element, refs);
    }
}

impl<D: HostDocument> Drop for DrawingContext<'_, D> {
    fn drop(&mut self) {
        self.finalize();
    }
}
