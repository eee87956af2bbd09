use std::collections::HashMap;
use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::core::color::Color;
use crate::error::{DrawError, DrawResult};
use crate::host::{ElementId, HostDocument};

/// Generational handle into a [`GradientPool`]. A handle whose gradient was
/// torn down never resolves again, even if its slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GradientId {
    index: u32,
    generation: u32,
}

impl GradientId {
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }
}

impl fmt::Display for GradientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GradientUnits {
    /// Coordinates in the user space of the referencing element.
    UserSpaceOnUse,
    /// Coordinates as fractions of the referencing element's bounding box.
    ObjectBoundingBox,
}

impl GradientUnits {
    const fn as_str(self) -> &'static str {
        match self {
            Self::UserSpaceOnUse => "userSpaceOnUse",
            Self::ObjectBoundingBox => "objectBoundingBox",
        }
    }
}

/// Bounding-box relative gradient shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GradientShape {
    /// Direction in degrees, `0` runs left to right.
    Linear {
        #[serde(default)]
        angle: f64,
    },
    /// Center, radius and focal point as bounding box fractions.
    Radial {
        #[serde(rename = "centerX", default = "half")]
        center_x: f64,
        #[serde(rename = "centerY", default = "half")]
        center_y: f64,
        #[serde(default = "half")]
        radius: f64,
        #[serde(rename = "focalX", default, skip_serializing_if = "Option::is_none")]
        focal_x: Option<f64>,
        #[serde(rename = "focalY", default, skip_serializing_if = "Option::is_none")]
        focal_y: Option<f64>,
    },
}

fn half() -> f64 {
    0.5
}

fn opaque() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    /// Percent, `0..=100`.
    pub offset: f64,
    pub color: String,
    #[serde(default = "opaque")]
    pub opacity: f64,
}

/// Sprite-level gradient: a shape relative to the painted element's bounding
/// box plus its stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientDefinition {
    #[serde(flatten)]
    pub shape: GradientShape,
    #[serde(default)]
    pub stops: Vec<GradientStop>,
}

impl GradientDefinition {
    #[must_use]
    pub fn linear(angle: f64) -> Self {
        Self {
            shape: GradientShape::Linear { angle },
            stops: Vec::new(),
        }
    }

    #[must_use]
    pub fn radial(center_x: f64, center_y: f64, radius: f64) -> Self {
        Self {
            shape: GradientShape::Radial {
                center_x,
                center_y,
                radius,
                focal_x: None,
                focal_y: None,
            },
            stops: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_stop(self, offset: f64, color: impl Into<String>) -> Self {
        self.with_stop_opacity(offset, color, 1.0)
    }

    #[must_use]
    pub fn with_stop_opacity(mut self, offset: f64, color: impl Into<String>, opacity: f64) -> Self {
        self.stops.push(GradientStop {
            offset,
            color: color.into(),
            opacity,
        });
        self
    }

    /// Stops sorted by offset with colors in `#rrggbb` form; unparsable
    /// colors become white.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut stops: Vec<GradientStop> = self
            .stops
            .iter()
            .map(|stop| GradientStop {
                offset: stop.offset,
                color: Color::parse(&stop.color).map_or_else(
                    || {
                        warn!(color = %stop.color, "unparsable gradient stop color, using white");
                        "#ffffff".to_owned()
                    },
                    Color::to_hex,
                ),
                opacity: stop.opacity,
            })
            .collect();
        stops.sort_by(|a, b| a.offset.total_cmp(&b.offset));
        Self {
            shape: self.shape,
            stops,
        }
    }

    /// `[x1, y1, x2, y2]` in bounding box units for a linear angle: the
    /// direction is stretched so its dominant axis spans the whole box, and
    /// negative components start from the far edge.
    #[must_use]
    pub fn linear_vector(angle: f64) -> [f64; 4] {
        let (sin, cos) = angle.to_radians().sin_cos();
        let longest = cos.abs().max(sin.abs());
        let max = if longest == 0.0 { 1.0 } else { 1.0 / longest };
        let mut vector = [0.0, 0.0, cos * max, sin * max];
        if vector[2] < 0.0 {
            vector[0] = -vector[2];
            vector[2] = 0.0;
        }
        if vector[3] < 0.0 {
            vector[1] = -vector[3];
            vector[3] = 0.0;
        }
        vector
    }
}

/// Absolute gradient geometry as created by a drawing context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GradientSpec {
    Linear {
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
    },
    /// Focal circle `(x0, y0, r0)` to end circle `(x1, y1, r1)`.
    Radial {
        x0: f64,
        y0: f64,
        r0: f64,
        x1: f64,
        y1: f64,
        r1: f64,
    },
}

impl GradientSpec {
    /// Fraction of the end radius covered by the focal circle. Stop offsets
    /// are squeezed into `compression..=1`.
    #[must_use]
    pub fn compression(&self) -> f64 {
        match *self {
            Self::Linear { .. } => 0.0,
            Self::Radial { r0, r1, .. } if r1 != 0.0 => r0 / r1,
            Self::Radial { .. } => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GradientKey {
    units: GradientUnits,
    values: SmallVec<[OrderedFloat<f64>; 8]>,
    colors: Vec<String>,
}

impl GradientKey {
    fn from_spec(spec: &GradientSpec) -> Self {
        let values = match *spec {
            GradientSpec::Linear { x0, y0, x1, y1 } => vec![0.0, x0, y0, x1, y1],
            GradientSpec::Radial {
                x0,
                y0,
                r0,
                x1,
                y1,
                r1,
            } => vec![1.0, x0, y0, r0, x1, y1, r1],
        };
        Self {
            units: GradientUnits::UserSpaceOnUse,
            values: values.into_iter().map(OrderedFloat).collect(),
            colors: Vec::new(),
        }
    }

    fn from_definition(definition: &GradientDefinition) -> Self {
        let mut values: SmallVec<[OrderedFloat<f64>; 8]> = match definition.shape {
            GradientShape::Linear { angle } => [0.0, angle].into_iter().map(OrderedFloat).collect(),
            GradientShape::Radial {
                center_x,
                center_y,
                radius,
                focal_x,
                focal_y,
            } => [
                1.0,
                center_x,
                center_y,
                radius,
                focal_x.unwrap_or(f64::NAN),
                focal_y.unwrap_or(f64::NAN),
            ]
            .into_iter()
            .map(OrderedFloat)
            .collect(),
        };
        let mut colors = Vec::with_capacity(definition.stops.len());
        for stop in &definition.stops {
            values.push(OrderedFloat(stop.offset));
            values.push(OrderedFloat(stop.opacity));
            colors.push(stop.color.clone());
        }
        Self {
            units: GradientUnits::ObjectBoundingBox,
            values,
            colors,
        }
    }
}

#[derive(Debug)]
struct GradientEntry {
    dom_id: String,
    element: ElementId,
    stops: Vec<ElementId>,
    key: GradientKey,
    compression: f64,
    /// Stops written since the last claim; later ones are surplus.
    staged: usize,
    refs: usize,
    /// Set once an element referenced it; only then does dropping to zero
    /// references tear it down.
    referenced: bool,
    owner: Option<ElementId>,
    claimed_frame: u64,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<GradientEntry>,
}

/// Arena of gradient definitions living in the surface's `defs` element.
///
/// Elements reference gradients only through `url(#id)` paint values; the
/// pool counts those references per element and tears a gradient down when
/// the last referencing element lets go of it or when its owner group is
/// destroyed.
#[derive(Debug)]
pub struct GradientPool {
    prefix: String,
    slots: Vec<Slot>,
    free: Vec<u32>,
    next_serial: u64,
    frame: u64,
    by_key: HashMap<GradientKey, SmallVec<[GradientId; 2]>>,
    by_dom_id: HashMap<String, GradientId>,
    element_refs: HashMap<ElementId, SmallVec<[GradientId; 2]>>,
}

impl GradientPool {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            slots: Vec::new(),
            free: Vec::new(),
            next_serial: 0,
            frame: 0,
            by_key: HashMap::new(),
            by_dom_id: HashMap::new(),
            element_refs: HashMap::new(),
        }
    }

    /// Starts a drawing pass. Gradients claimed during the current pass
    /// survive losing their references until the pass is swept.
    pub fn begin_frame(&mut self, frame: u64) {
        self.frame = frame;
    }

    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    fn entry(&self, id: GradientId) -> Option<&GradientEntry> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    fn entry_mut(&mut self, id: GradientId) -> Option<&mut GradientEntry> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.entry.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn contains(&self, id: GradientId) -> bool {
        self.entry(id).is_some()
    }

    #[must_use]
    pub fn dom_id(&self, id: GradientId) -> Option<&str> {
        self.entry(id).map(|entry| entry.dom_id.as_str())
    }

    #[must_use]
    pub fn element(&self, id: GradientId) -> Option<ElementId> {
        self.entry(id).map(|entry| entry.element)
    }

    /// `url(#id)` paint value without touching stops.
    #[must_use]
    pub fn url(&self, id: GradientId) -> Option<String> {
        self.dom_id(id).map(|dom_id| format!("url(#{dom_id})"))
    }

    #[must_use]
    pub fn ref_count(&self, id: GradientId) -> Option<usize> {
        self.entry(id).map(|entry| entry.refs)
    }

    #[must_use]
    pub fn stop_count(&self, id: GradientId) -> Option<usize> {
        self.entry(id).map(|entry| entry.stops.len())
    }

    /// Resolves a `url(#id)` paint value to a live gradient.
    #[must_use]
    pub fn resolve_url(&self, value: &str) -> Option<GradientId> {
        let dom_id = value.trim().strip_prefix("url(#")?.strip_suffix(')')?;
        self.by_dom_id.get(dom_id).copied()
    }

    fn allocate<D: HostDocument + ?Sized>(
        &mut self,
        doc: &mut D,
        defs: ElementId,
        tag: &str,
        key: GradientKey,
        compression: f64,
        owner: Option<ElementId>,
        frame: u64,
    ) -> (GradientId, ElementId) {
        let dom_id = format!("{}{}", self.prefix, self.next_serial);
        self.next_serial += 1;
        let element = doc.create_element(tag);
        doc.set_attribute(element, "id", &dom_id);
        doc.append_child(defs, element);

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        let id = GradientId {
            index,
            generation: slot.generation,
        };
        slot.entry = Some(GradientEntry {
            dom_id: dom_id.clone(),
            element,
            stops: Vec::new(),
            key: key.clone(),
            compression,
            staged: 0,
            refs: 0,
            referenced: false,
            owner,
            claimed_frame: frame,
        });
        self.by_key.entry(key).or_default().push(id);
        self.by_dom_id.insert(dom_id, id);
        debug!(gradient = %id, tag, "gradient created");
        (id, element)
    }

    /// Registers a bounding-box relative definition, reusing an existing
    /// gradient with the same shape and stops.
    pub fn add_definition<D: HostDocument + ?Sized>(
        &mut self,
        doc: &mut D,
        defs: ElementId,
        definition: &GradientDefinition,
    ) -> GradientId {
        let definition = definition.normalized();
        let key = GradientKey::from_definition(&definition);
        if let Some(existing) = self.by_key.get(&key).and_then(|ids| ids.first()) {
            trace!(gradient = %existing, "gradient definition deduplicated");
            return *existing;
        }

        let tag = match definition.shape {
            GradientShape::Linear { .. } => "linearGradient",
            GradientShape::Radial { .. } => "radialGradient",
        };
        let (id, element) = self.allocate(doc, defs, tag, key, 0.0, None, 0);
        match definition.shape {
            GradientShape::Linear { angle } => {
                let vector = GradientDefinition::linear_vector(angle);
                for (name, value) in ["x1", "y1", "x2", "y2"].into_iter().zip(vector) {
                    set_if_changed(doc, element, name, &format_number(value));
                }
            }
            GradientShape::Radial {
                center_x,
                center_y,
                radius,
                focal_x,
                focal_y,
            } => {
                set_if_changed(doc, element, "cx", &format_number(center_x));
                set_if_changed(doc, element, "cy", &format_number(center_y));
                set_if_changed(doc, element, "r", &format_number(radius));
                if let (Some(fx), Some(fy)) = (focal_x, focal_y) {
                    set_if_changed(doc, element, "fx", &format_number(fx));
                    set_if_changed(doc, element, "fy", &format_number(fy));
                }
            }
        }
        set_if_changed(doc, element, "gradientUnits", GradientUnits::ObjectBoundingBox.as_str());

        for (position, stop) in definition.stops.iter().enumerate() {
            let stop_el = self.stop_element(doc, id, element, position);
            set_if_changed(doc, stop_el, "offset", &format!("{}%", format_number(stop.offset)));
            set_if_changed(doc, stop_el, "stop-color", &stop.color);
            set_if_changed(doc, stop_el, "stop-opacity", &format_number(stop.opacity));
        }
        if let Some(entry) = self.entry_mut(id) {
            entry.staged = definition.stops.len();
        }
        id
    }

    /// Returns a gradient with `spec`'s geometry owned by `owner`.
    ///
    /// A gradient with the same geometry and owner that was not claimed during
    /// the current frame is recycled, so redrawing the same scene rewrites
    /// stops in place instead of growing `defs`.
    pub fn get_or_create<D: HostDocument + ?Sized>(
        &mut self,
        doc: &mut D,
        defs: ElementId,
        spec: &GradientSpec,
        owner: ElementId,
    ) -> GradientId {
        let frame = self.frame;
        let key = GradientKey::from_spec(spec);
        let recycled = self.by_key.get(&key).and_then(|ids| {
            ids.iter().copied().find(|id| {
                self.entry(*id)
                    .is_some_and(|entry| entry.owner == Some(owner) && entry.claimed_frame != frame)
            })
        });
        if let Some(id) = recycled {
            if let Some(entry) = self.entry_mut(id) {
                entry.claimed_frame = frame;
                entry.staged = 0;
            }
            trace!(gradient = %id, frame, "gradient recycled");
            return id;
        }

        let tag = match spec {
            GradientSpec::Linear { .. } => "linearGradient",
            GradientSpec::Radial { .. } => "radialGradient",
        };
        let (id, element) = self.allocate(doc, defs, tag, key, spec.compression(), Some(owner), frame);
        let attributes: SmallVec<[(&str, f64); 6]> = match *spec {
            GradientSpec::Linear { x0, y0, x1, y1 } => {
                [("x1", x0), ("y1", y0), ("x2", x1), ("y2", y1)].into_iter().collect()
            }
            GradientSpec::Radial {
                x0,
                y0,
                x1,
                y1,
                r1,
                ..
            } => [("fx", x0), ("fy", y0), ("cx", x1), ("cy", y1), ("r", r1)]
                .into_iter()
                .collect(),
        };
        for (name, value) in attributes {
            set_if_changed(doc, element, name, &format_number(value));
        }
        set_if_changed(doc, element, "gradientUnits", GradientUnits::UserSpaceOnUse.as_str());
        id
    }

    fn stop_element<D: HostDocument + ?Sized>(
        &mut self,
        doc: &mut D,
        id: GradientId,
        gradient_el: ElementId,
        position: usize,
    ) -> ElementId {
        if let Some(existing) = self.entry(id).and_then(|entry| entry.stops.get(position)) {
            return *existing;
        }
        let stop = doc.create_element("stop");
        doc.append_child(gradient_el, stop);
        if let Some(entry) = self.entry_mut(id) {
            entry.stops.push(stop);
        }
        stop
    }

    /// Writes the next color stop. `offset` is in `0..=1` and gets squeezed by
    /// the gradient's compression.
    pub fn add_color_stop<D: HostDocument + ?Sized>(
        &mut self,
        doc: &mut D,
        id: GradientId,
        offset: f64,
        color: &str,
    ) -> DrawResult<()> {
        let (element, position, compression) = self
            .entry(id)
            .map(|entry| (entry.element, entry.staged, entry.compression))
            .ok_or(DrawError::UnknownGradient(id.index))?;
        let stop = self.stop_element(doc, id, element, position);
        let parsed = Color::parse(color);
        let offset = ((1.0 - compression) * offset + compression) * 100.0;
        set_if_changed(doc, stop, "offset", &format!("{offset:.2}%"));
        set_if_changed(doc, stop, "stop-color", color);
        set_if_changed(
            doc,
            stop,
            "stop-opacity",
            &format_number(parsed.map_or(1.0, |c| c.alpha)),
        );
        if let Some(entry) = self.entry_mut(id) {
            entry.staged = position + 1;
        }
        Ok(())
    }

    /// Paint value for `id`, pruning stop elements left over from a previous
    /// use with more stops.
    pub fn paint_url<D: HostDocument + ?Sized>(&mut self, doc: &mut D, id: GradientId) -> Option<String> {
        self.prune_stops(doc, id);
        self.url(id)
    }

    fn prune_stops<D: HostDocument + ?Sized>(&mut self, doc: &mut D, id: GradientId) {
        let Some(entry) = self.entry_mut(id) else {
            return;
        };
        if entry.stops.len() > entry.staged {
            let surplus: Vec<ElementId> = entry.stops.drain(entry.staged..).collect();
            trace!(gradient = %id, pruned = surplus.len(), "surplus gradient stops pruned");
            for stop in surplus {
                doc.destroy(stop);
            }
        }
    }

    /// Replaces the set of gradients `element` references, adjusting counts.
    /// Gradients that lose their last reference are torn down.
    pub fn track_element<D: HostDocument + ?Sized>(
        &mut self,
        doc: &mut D,
        element: ElementId,
        refs: SmallVec<[GradientId; 2]>,
    ) {
        let previous = if refs.is_empty() {
            self.element_refs.remove(&element).unwrap_or_default()
        } else {
            self.element_refs.insert(element, refs.clone()).unwrap_or_default()
        };
        for id in refs.iter().filter(|id| !previous.contains(id)) {
            if let Some(entry) = self.entry_mut(*id) {
                entry.refs += 1;
                entry.referenced = true;
            }
        }
        for id in previous.iter().filter(|id| !refs.contains(id)) {
            self.release(doc, *id);
        }
    }

    fn release<D: HostDocument + ?Sized>(&mut self, doc: &mut D, id: GradientId) {
        let frame = self.frame;
        let Some(entry) = self.entry_mut(id) else {
            return;
        };
        entry.refs = entry.refs.saturating_sub(1);
        let claimed_now = entry.owner.is_some() && entry.claimed_frame == frame;
        if entry.refs == 0 && entry.referenced && !claimed_now {
            self.destroy_entry(doc, id);
        }
    }

    /// Drops every reference held by `element` and tears down the gradients
    /// it owns. Call for each element of a destroyed subtree.
    pub fn release_element<D: HostDocument + ?Sized>(&mut self, doc: &mut D, element: ElementId) {
        if let Some(previous) = self.element_refs.remove(&element) {
            for id in previous {
                self.release(doc, id);
            }
        }
        let owned: Vec<GradientId> = self
            .live_ids()
            .filter(|id| self.entry(*id).is_some_and(|entry| entry.owner == Some(element)))
            .collect();
        for id in owned {
            self.destroy_entry(doc, id);
        }
    }

    /// Tears down gradients owned by `owner` that were neither claimed during
    /// the current frame nor referenced by any element. Gradients claimed
    /// during the frame lose the stops it did not rewrite.
    pub fn sweep_unclaimed<D: HostDocument + ?Sized>(&mut self, doc: &mut D, owner: ElementId) {
        let frame = self.frame;
        let claimed: Vec<GradientId> = self
            .live_ids()
            .filter(|id| {
                self.entry(*id)
                    .is_some_and(|entry| entry.owner == Some(owner) && entry.claimed_frame == frame)
            })
            .collect();
        for id in claimed {
            self.prune_stops(doc, id);
        }

        let stale: Vec<GradientId> = self
            .live_ids()
            .filter(|id| {
                self.entry(*id).is_some_and(|entry| {
                    entry.owner == Some(owner) && entry.claimed_frame != frame && entry.refs == 0
                })
            })
            .collect();
        for id in stale {
            self.destroy_entry(doc, id);
        }
    }

    pub fn remove<D: HostDocument + ?Sized>(&mut self, doc: &mut D, id: GradientId) -> DrawResult<()> {
        if !self.contains(id) {
            return Err(DrawError::UnknownGradient(id.index));
        }
        self.destroy_entry(doc, id);
        Ok(())
    }

    pub fn clear<D: HostDocument + ?Sized>(&mut self, doc: &mut D) {
        let ids: Vec<GradientId> = self.live_ids().collect();
        for id in ids {
            self.destroy_entry(doc, id);
        }
        self.element_refs.clear();
    }

    fn live_ids(&self) -> impl Iterator<Item = GradientId> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.entry.as_ref().map(|_| GradientId {
                index: index as u32,
                generation: slot.generation,
            })
        })
    }

    fn destroy_entry<D: HostDocument + ?Sized>(&mut self, doc: &mut D, id: GradientId) {
        let Some(slot) = self.slots.get_mut(id.index as usize) else {
            return;
        };
        if slot.generation != id.generation {
            return;
        }
        let Some(entry) = slot.entry.take() else {
            return;
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);

        doc.destroy(entry.element);
        if let Some(ids) = self.by_key.get_mut(&entry.key) {
            ids.retain(|existing| *existing != id);
            if ids.is_empty() {
                self.by_key.remove(&entry.key);
            }
        }
        self.by_dom_id.remove(&entry.dom_id);
        for refs in self.element_refs.values_mut() {
            refs.retain(|existing| *existing != id);
        }
        debug!(gradient = %id, dom_id = %entry.dom_id, "gradient destroyed");
    }
}

/// Writes an attribute only when the host holds a different value.
pub(crate) fn set_if_changed<D: HostDocument + ?Sized>(doc: &mut D, element: ElementId, name: &str, value: &str) -> bool {
    if doc.attribute(element, name) == Some(value) {
        return false;
    }
    doc.set_attribute(element, name, value);
    true
}

pub(crate) fn format_number(value: f64) -> String {
    format!("{}", value + 0.0)
}

#[cfg(test)]
mod tests {
    use super::{GradientDefinition, GradientKey, GradientSpec};

    #[test]
    fn linear_vector_starts_from_far_edge_for_negative_directions() {
        let vector = GradientDefinition::linear_vector(180.0);
        assert!((vector[0] - 1.0).abs() <= 1e-12);
        assert!(vector[2].abs() <= 1e-12);

        let diagonal = GradientDefinition::linear_vector(45.0);
        assert!((diagonal[2] - 1.0).abs() <= 1e-12);
        assert!((diagonal[3] - 1.0).abs() <= 1e-12);
    }

    #[test]
    fn normalized_sorts_stops_and_hexes_colors() {
        let definition = GradientDefinition::linear(0.0)
            .with_stop(100.0, "blue")
            .with_stop(0.0, "#f00")
            .with_stop(50.0, "bogus");
        let normalized = definition.normalized();
        let colors: Vec<&str> = normalized.stops.iter().map(|s| s.color.as_str()).collect();
        assert_eq!(colors, ["#ff0000", "#ffffff", "#0000ff"]);
    }

    #[test]
    fn geometry_changes_the_key() {
        let a = GradientSpec::Linear {
            x0: 0.0,
            y0: 0.0,
            x1: 10.0,
            y1: 0.0,
        };
        let b = GradientSpec::Linear {
            x0: 0.0,
            y0: 0.0,
            x1: 10.0,
            y1: 1.0,
        };
        assert_eq!(GradientKey::from_spec(&a), GradientKey::from_spec(&a));
        assert_ne!(GradientKey::from_spec(&a), GradientKey::from_spec(&b));
    }

    #[test]
    fn radial_compression_guards_zero_radius() {
        let spec = GradientSpec::Radial {
            x0: 0.0,
            y0: 0.0,
            r0: 5.0,
            x1: 0.0,
            y1: 0.0,
            r1: 0.0,
        };
        assert_eq!(spec.compression(), 0.0);
    }
}
