use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::matrix::{AffineMatrix, ComposeMode};
use crate::error::DrawError;
use crate::host::ElementId;
use crate::surface::attrs::{AttrMap, AttrValue};

/// Closed set of drawable kinds; each maps to one host tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpriteKind {
    Circle,
    Ellipse,
    Rect,
    Path,
    Text,
    Image,
}

impl SpriteKind {
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Circle => "circle",
            Self::Ellipse => "ellipse",
            Self::Rect => "rect",
            Self::Path => "path",
            Self::Text => "text",
            Self::Image => "image",
        }
    }

    #[must_use]
    pub fn default_attributes(self) -> &'static [(&'static str, &'static str)] {
        crate::surface::attrs::default_attributes(self)
    }
}

impl fmt::Display for SpriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for SpriteKind {
    type Err = DrawError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "circle" => Ok(Self::Circle),
            "ellipse" => Ok(Self::Ellipse),
            "rect" => Ok(Self::Rect),
            "path" => Ok(Self::Path),
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            other => Err(DrawError::UnknownSpriteKind(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpriteId(u64);

impl SpriteId {
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SpriteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of a sprite's transform list. Angles are in degrees.
///
/// A missing pivot means the center of the sprite's untransformed bounding
/// box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransformOp {
    Translate {
        x: f64,
        y: f64,
    },
    Rotate {
        degrees: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        x: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        y: Option<f64>,
    },
    Scale {
        x: f64,
        y: f64,
        #[serde(default, rename = "centerX", skip_serializing_if = "Option::is_none")]
        center_x: Option<f64>,
        #[serde(default, rename = "centerY", skip_serializing_if = "Option::is_none")]
        center_y: Option<f64>,
    },
}

impl TransformOp {
    /// Whether the op pivots on the bounding box center, so geometry changes
    /// move it.
    #[must_use]
    pub fn uses_bbox_center(&self) -> bool {
        match self {
            Self::Translate { .. } => false,
            Self::Rotate { x, y, .. } => x.is_none() || y.is_none(),
            Self::Scale {
                center_x, center_y, ..
            } => center_x.is_none() || center_y.is_none(),
        }
    }

    /// Composes this op onto `matrix` in local space.
    pub fn apply(&self, matrix: &mut AffineMatrix, (cx, cy): (f64, f64)) {
        match *self {
            Self::Translate { x, y } => {
                matrix.translate(x, y, ComposeMode::Prepend);
            }
            Self::Rotate { degrees, x, y } => {
                matrix.rotate_about(
                    degrees.to_radians(),
                    x.unwrap_or(cx),
                    y.unwrap_or(cy),
                    ComposeMode::Prepend,
                );
            }
            Self::Scale {
                x,
                y,
                center_x,
                center_y,
            } => {
                matrix.scale_about(
                    x,
                    y,
                    center_x.unwrap_or(cx),
                    center_y.unwrap_or(cy),
                    ComposeMode::Prepend,
                );
            }
        }
    }
}

/// Creation payload for a sprite: `{type, attrs, transform[], group?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteDescriptor {
    #[serde(rename = "type")]
    pub kind: SpriteKind,
    #[serde(default)]
    pub attrs: AttrMap,
    #[serde(default)]
    pub transform: Vec<TransformOp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl SpriteDescriptor {
    #[must_use]
    pub fn new(kind: SpriteKind) -> Self {
        Self {
            kind,
            attrs: AttrMap::new(),
            transform: Vec::new(),
            group: None,
        }
    }

    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_transform(mut self, op: TransformOp) -> Self {
        self.transform.push(op);
        self
    }

    #[must_use]
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// Facet of a sprite that is out of sync with its host element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirtyFlag {
    Attributes,
    Transform,
    Hidden,
    ZIndex,
    /// Path data needs re-normalization.
    Path,
    /// Text runs or font style need rewriting.
    Font,
}

impl DirtyFlag {
    const fn bit(self) -> u8 {
        match self {
            Self::Attributes => 1 << 0,
            Self::Transform => 1 << 1,
            Self::Hidden => 1 << 2,
            Self::ZIndex => 1 << 3,
            Self::Path => 1 << 4,
            Self::Font => 1 << 5,
        }
    }
}

/// Bitmask of [`DirtyFlag`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DirtyFlags {
    bits: u8,
}

impl DirtyFlags {
    const ALL_BITS: u8 = DirtyFlag::Attributes.bit()
        | DirtyFlag::Transform.bit()
        | DirtyFlag::Hidden.bit()
        | DirtyFlag::ZIndex.bit()
        | DirtyFlag::Path.bit()
        | DirtyFlag::Font.bit();

    #[must_use]
    pub const fn none() -> Self {
        Self { bits: 0 }
    }

    #[must_use]
    pub const fn all() -> Self {
        Self {
            bits: Self::ALL_BITS,
        }
    }

    #[must_use]
    pub const fn from_flag(flag: DirtyFlag) -> Self {
        Self { bits: flag.bit() }
    }

    #[must_use]
    pub const fn with(self, flag: DirtyFlag) -> Self {
        Self {
            bits: self.bits | flag.bit(),
        }
    }

    #[must_use]
    pub const fn without(self, flag: DirtyFlag) -> Self {
        Self {
            bits: self.bits & !flag.bit(),
        }
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self {
            bits: self.bits & !other.bits,
        }
    }

    #[must_use]
    pub const fn contains(self, flag: DirtyFlag) -> bool {
        (self.bits & flag.bit()) != 0
    }

    #[must_use]
    pub const fn is_none(self) -> bool {
        self.bits == 0
    }
}

/// Dirty-flag bookkeeping shared by everything the surface reconciles.
pub trait Reconcilable {
    fn dirty_flags(&self) -> DirtyFlags;

    fn mark(&mut self, flags: DirtyFlags);

    fn clear(&mut self, flags: DirtyFlags);

    fn mark_dirty(&mut self, flag: DirtyFlag) {
        self.mark(DirtyFlags::from_flag(flag));
    }

    fn is_dirty(&self, flag: DirtyFlag) -> bool {
        self.dirty_flags().contains(flag)
    }

    fn is_clean(&self) -> bool {
        self.dirty_flags().is_none()
    }
}

/// Owner of a transform op list reducible to one matrix.
///
/// `set_translation`, `set_rotation` and `set_scaling` each manage a single
/// op of their variant: the first matching op is replaced in place, or a new
/// one is appended. Only real changes mark the transform dirty.
pub trait Transformable: Reconcilable {
    fn transform_ops(&self) -> &[TransformOp];

    fn transform_ops_mut(&mut self) -> &mut Vec<TransformOp>;

    fn set_transform_ops(&mut self, ops: Vec<TransformOp>) {
        if self.transform_ops() != ops.as_slice() {
            *self.transform_ops_mut() = ops;
            self.mark_dirty(DirtyFlag::Transform);
        }
    }

    fn set_translation(&mut self, x: f64, y: f64) {
        self.replace_op(TransformOp::Translate { x, y });
    }

    /// `degrees` clockwise around `center`, or the bounding box center.
    fn set_rotation(&mut self, degrees: f64, center: Option<(f64, f64)>) {
        self.replace_op(TransformOp::Rotate {
            degrees,
            x: center.map(|(x, _)| x),
            y: center.map(|(_, y)| y),
        });
    }

    fn set_scaling(&mut self, x: f64, y: f64, center: Option<(f64, f64)>) {
        self.replace_op(TransformOp::Scale {
            x,
            y,
            center_x: center.map(|(cx, _)| cx),
            center_y: center.map(|(_, cy)| cy),
        });
    }

    #[doc(hidden)]
    fn replace_op(&mut self, op: TransformOp) {
        let ops = self.transform_ops_mut();
        let slot = ops
            .iter_mut()
            .find(|existing| std::mem::discriminant(*existing) == std::mem::discriminant(&op));
        let changed = match slot {
            Some(existing) if *existing == op => false,
            Some(existing) => {
                *existing = op;
                true
            }
            None => {
                ops.push(op);
                true
            }
        };
        if changed {
            self.mark_dirty(DirtyFlag::Transform);
        }
    }

    /// Folds the op list into one matrix; `center` substitutes missing pivots.
    fn compose_transform(&self, center: (f64, f64)) -> AffineMatrix {
        let mut matrix = AffineMatrix::IDENTITY;
        for op in self.transform_ops() {
            op.apply(&mut matrix, center);
        }
        matrix
    }
}

const PATH_PROPERTIES: &[&str] = &[
    "x", "y", "d", "path", "width", "height", "radius", "r", "rx", "ry", "radiusX", "radiusY",
    "radius_x", "radius_y", "cx", "cy",
];

const FONT_PROPERTIES: &[&str] = &[
    "font",
    "font-size",
    "font-weight",
    "font-style",
    "font-family",
    "text-anchor",
    "text",
];

/// Persistent drawable with a lazily created host element.
#[derive(Debug, Clone)]
pub struct Sprite {
    pub(crate) id: SpriteId,
    pub(crate) kind: SpriteKind,
    pub(crate) attrs: AttrMap,
    pub(crate) transform: Vec<TransformOp>,
    pub(crate) z_index: i32,
    pub(crate) group: Option<String>,
    pub(crate) element: Option<ElementId>,
    pub(crate) flags: DirtyFlags,
    pub(crate) matrix: AffineMatrix,
    /// Text runs, one per non-empty line, with their line index.
    pub(crate) tspans: Vec<(usize, ElementId)>,
    pub(crate) rendered_text: Option<String>,
    /// Host attribute names written by the last attribute pass.
    pub(crate) written: Vec<String>,
    /// `clipPath` element in `defs` mirroring the `clip-rect` attribute.
    pub(crate) clip: Option<ElementId>,
}

impl Sprite {
    pub(crate) fn new(id: SpriteId, descriptor: SpriteDescriptor) -> Self {
        let mut sprite = Self {
            id,
            kind: descriptor.kind,
            attrs: AttrMap::new(),
            transform: descriptor.transform,
            z_index: 0,
            group: descriptor.group,
            element: None,
            flags: DirtyFlags::all(),
            matrix: AffineMatrix::IDENTITY,
            tspans: Vec::new(),
            rendered_text: None,
            written: Vec::new(),
            clip: None,
        };
        sprite.set_attributes(descriptor.attrs);
        sprite
    }

    #[must_use]
    pub fn id(&self) -> SpriteId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> SpriteKind {
        self.kind
    }

    #[must_use]
    pub fn attributes(&self) -> &AttrMap {
        &self.attrs
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    #[must_use]
    pub fn z_index(&self) -> i32 {
        self.z_index
    }

    #[must_use]
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Host element, once the first reconciliation created it.
    #[must_use]
    pub fn element(&self) -> Option<ElementId> {
        self.element
    }

    /// Matrix written by the last transform reconciliation.
    #[must_use]
    pub fn matrix(&self) -> AffineMatrix {
        self.matrix
    }

    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.attrs.get("hidden").is_some_and(AttrValue::is_truthy)
    }

    /// Merges `attrs` and marks the facets they touch.
    ///
    /// `zIndex` is consumed as the sort key rather than stored. Changing
    /// geometry re-dirties transforms that pivot on the bounding box center.
    pub fn set_attributes<I, K, V>(&mut self, attrs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<AttrValue>,
    {
        let mut flags = DirtyFlags::from_flag(DirtyFlag::Attributes);
        let mut bbox_dirty = false;
        for (name, value) in attrs {
            let name = name.into();
            let value = value.into();
            match name.as_str() {
                "zIndex" | "z_index" => {
                    if let Some(z_index) = value.as_f64() {
                        self.z_index = z_index as i32;
                        flags = flags.with(DirtyFlag::ZIndex);
                    }
                    continue;
                }
                "hidden" => {
                    if value.is_truthy() != self.is_hidden() {
                        flags = flags.with(DirtyFlag::Hidden);
                    }
                }
                "text" => {
                    flags = flags.with(DirtyFlag::Font);
                    bbox_dirty = true;
                }
                _ => {}
            }
            if self.attrs.get(&name) != Some(&value) {
                if PATH_PROPERTIES.contains(&name.as_str()) {
                    flags = flags.with(DirtyFlag::Path);
                    bbox_dirty = true;
                }
                if FONT_PROPERTIES.contains(&name.as_str()) {
                    flags = flags.with(DirtyFlag::Font);
                    bbox_dirty = true;
                }
            }
            self.attrs.insert(name, value);
        }
        if bbox_dirty && self.transform.iter().any(TransformOp::uses_bbox_center) {
            flags = flags.with(DirtyFlag::Transform);
        }
        self.mark(flags);
    }

    /// Drops a logical attribute; the host falls back to the kind default on
    /// the next pass.
    pub fn remove_attribute(&mut self, name: &str) -> Option<AttrValue> {
        let removed = self.attrs.shift_remove(name)?;
        let mut flags = DirtyFlags::from_flag(DirtyFlag::Attributes);
        if PATH_PROPERTIES.contains(&name) {
            flags = flags.with(DirtyFlag::Path);
        }
        if FONT_PROPERTIES.contains(&name) {
            flags = flags.with(DirtyFlag::Font);
        }
        if name == "hidden" && removed.is_truthy() {
            flags = flags.with(DirtyFlag::Hidden);
        }
        self.mark(flags);
        Some(removed)
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.set_attributes([("hidden", hidden)]);
    }
}

impl Reconcilable for Sprite {
    fn dirty_flags(&self) -> DirtyFlags {
        self.flags
    }

    fn mark(&mut self, flags: DirtyFlags) {
        self.flags = self.flags.union(flags);
    }

    fn clear(&mut self, flags: DirtyFlags) {
        self.flags = self.flags.difference(flags);
    }
}

impl Transformable for Sprite {
    fn transform_ops(&self) -> &[TransformOp] {
        &self.transform
    }

    fn transform_ops_mut(&mut self) -> &mut Vec<TransformOp> {
        &mut self.transform
    }
}

/// Hook run once a sprite's host element exists and its first
/// reconciliation finished.
///
/// Listeners only see the sprite, never the surface, so they cannot start a
/// nested pass. Dirty marks they leave behind are picked up by the next pass.
pub trait SpriteListener {
    fn on_render(&mut self, sprite: &mut Sprite);
}

impl<F> SpriteListener for F
where
    F: FnMut(&mut Sprite),
{
    fn on_render(&mut self, sprite: &mut Sprite) {
        self(sprite);
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DirtyFlag, DirtyFlags, Reconcilable, Sprite, SpriteDescriptor, SpriteId, SpriteKind,
        TransformOp, Transformable,
    };

    fn clean_sprite(descriptor: SpriteDescriptor) -> Sprite {
        let mut sprite = Sprite::new(SpriteId::from_raw(1), descriptor);
        sprite.clear(DirtyFlags::all());
        sprite
    }

    #[test]
    fn geometry_change_redirties_center_pivoted_transform() {
        let mut sprite = clean_sprite(
            SpriteDescriptor::new(SpriteKind::Rect)
                .with_attr("width", 10.0)
                .with_transform(TransformOp::Rotate {
                    degrees: 45.0,
                    x: None,
                    y: None,
                }),
        );

        sprite.set_attributes([("fill", "red")]);
        assert!(!sprite.is_dirty(DirtyFlag::Transform));

        sprite.set_attributes([("width", 20.0)]);
        assert!(sprite.is_dirty(DirtyFlag::Transform));
        assert!(sprite.is_dirty(DirtyFlag::Path));
    }

    #[test]
    fn z_index_attribute_is_consumed() {
        let mut sprite = clean_sprite(SpriteDescriptor::new(SpriteKind::Circle));
        sprite.set_attributes([("zIndex", 3)]);
        assert_eq!(sprite.z_index(), 3);
        assert!(sprite.attribute("zIndex").is_none());
        assert!(sprite.is_dirty(DirtyFlag::ZIndex));
    }

    #[test]
    fn unchanged_translation_does_not_mark_transform() {
        let mut sprite = clean_sprite(SpriteDescriptor::new(SpriteKind::Circle));
        sprite.set_translation(5.0, 6.0);
        assert!(sprite.is_dirty(DirtyFlag::Transform));

        sprite.clear(DirtyFlags::all());
        sprite.set_translation(5.0, 6.0);
        assert!(sprite.is_clean());
        assert_eq!(sprite.transform_ops().len(), 1);
    }

    #[test]
    fn hidden_flag_tracks_truthiness_changes_only() {
        let mut sprite = clean_sprite(SpriteDescriptor::new(SpriteKind::Rect));
        sprite.set_hidden(false);
        assert!(!sprite.is_dirty(DirtyFlag::Hidden));
        sprite.set_hidden(true);
        assert!(sprite.is_dirty(DirtyFlag::Hidden));
    }
}
