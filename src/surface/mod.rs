pub mod attrs;
pub mod config;
mod geometry;
mod groups;
mod reconcile;
pub mod resources;
pub mod sprite;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace};

use crate::context::DrawingContext;
use crate::error::{DrawError, DrawResult};
use crate::host::{ElementId, HostDocument};

pub use attrs::{AttrMap, AttrValue};
pub use config::SurfaceConfig;
pub use resources::{
    GradientDefinition, GradientId, GradientPool, GradientShape, GradientSpec, GradientStop,
};
pub use sprite::{
    DirtyFlag, DirtyFlags, Reconcilable, Sprite, SpriteDescriptor, SpriteId, SpriteKind,
    SpriteListener, TransformOp, Transformable,
};

/// Root children that precede sprite elements: `defs` and the background
/// `rect`.
pub const INFRASTRUCTURE_OFFSET: usize = 2;

/// Retained scene reconciled against a host element tree.
///
/// Root children are laid out as `[defs, background, sprite elements.., overlay]`.
/// Sprite elements follow the logical sprite order; the overlay group used by
/// [`Surface::context`] is created on demand and always stays last.
pub struct Surface<D: HostDocument> {
    pub(crate) document: D,
    config: SurfaceConfig,
    root: ElementId,
    defs: ElementId,
    background: ElementId,
    overlay: Option<ElementId>,
    pub(crate) sprites: IndexMap<SpriteId, Sprite>,
    pub(crate) groups: IndexMap<String, IndexSet<SpriteId>>,
    pub(crate) gradients: GradientPool,
    listeners: Vec<Box<dyn SpriteListener>>,
    next_sprite_id: u64,
    reconciling: bool,
    frame: u64,
}

impl<D: HostDocument> Surface<D> {
    /// Builds the root `svg` element with its infrastructure children inside
    /// `document`.
    pub fn new(mut document: D, config: SurfaceConfig) -> DrawResult<Self> {
        config.validate()?;

        let root = document.create_element("svg");
        document.set_attribute(root, "width", &attrs::AttrValue::from(config.width).to_string());
        document.set_attribute(root, "height", &attrs::AttrValue::from(config.height).to_string());
        if let Some(view_box) = config.view_box {
            document.set_attribute(root, "viewBox", &view_box_value(view_box));
        }
        let defs = document.create_element("defs");
        document.append_child(root, defs);
        let background = document.create_element("rect");
        document.set_attribute(background, "x", "0");
        document.set_attribute(background, "y", "0");
        document.set_attribute(background, "width", &attrs::AttrValue::from(config.width).to_string());
        document.set_attribute(background, "height", &attrs::AttrValue::from(config.height).to_string());
        document.set_attribute(background, "fill", &config.background_fill);
        document.append_child(root, background);

        debug!(width = config.width, height = config.height, "surface created");
        Ok(Self {
            document,
            gradients: GradientPool::new(config.gradient_id_prefix.clone()),
            config,
            root,
            defs,
            background,
            overlay: None,
            sprites: IndexMap::new(),
            groups: IndexMap::new(),
            listeners: Vec::new(),
            next_sprite_id: 1,
            reconciling: false,
            frame: 0,
        })
    }

    #[must_use]
    pub fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    #[must_use]
    pub fn document(&self) -> &D {
        &self.document
    }

    /// Direct host access. Elements owned by the surface must not be moved or
    /// destroyed through it.
    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    #[must_use]
    pub fn root(&self) -> ElementId {
        self.root
    }

    #[must_use]
    pub fn defs(&self) -> ElementId {
        self.defs
    }

    #[must_use]
    pub fn background(&self) -> ElementId {
        self.background
    }

    /// Resizes the root element and the background.
    pub fn set_size(&mut self, width: f64, height: f64) -> DrawResult<()> {
        let config = SurfaceConfig {
            width,
            height,
            ..self.config.clone()
        };
        config.validate()?;
        self.config = config;
        let width = attrs::AttrValue::from(width).to_string();
        let height = attrs::AttrValue::from(height).to_string();
        for element in [self.root, self.background] {
            resources::set_if_changed(&mut self.document, element, "width", &width);
            resources::set_if_changed(&mut self.document, element, "height", &height);
        }
        Ok(())
    }

    /// Sets the root `viewBox`. Non-finite values and negative sizes are
    /// refused and leave the current one in place.
    pub fn set_view_box(&mut self, x: f64, y: f64, width: f64, height: f64) -> DrawResult<()> {
        let config = self.config.clone().with_view_box(x, y, width, height);
        config.validate()?;
        self.config = config;
        resources::set_if_changed(
            &mut self.document,
            self.root,
            "viewBox",
            &view_box_value([x, y, width, height]),
        );
        Ok(())
    }

    /// Appends a sprite. Its element is created by the next reconciliation.
    pub fn add_sprite(&mut self, descriptor: SpriteDescriptor) -> DrawResult<SpriteId> {
        self.insert_sprite(self.sprites.len(), descriptor)
    }

    /// Inserts a sprite at `index` in the logical order, clamped to the end.
    pub fn insert_sprite(&mut self, index: usize, descriptor: SpriteDescriptor) -> DrawResult<SpriteId> {
        validate_descriptor(&descriptor)?;
        let id = SpriteId::from_raw(self.next_sprite_id);
        self.next_sprite_id += 1;
        let sprite = Sprite::new(id, descriptor);
        if let Some(group) = sprite.group.clone() {
            self.groups.entry(group).or_default().insert(id);
        }
        let index = index.min(self.sprites.len());
        self.sprites.shift_insert(index, id, sprite);
        trace!(sprite = %id, index, "sprite added");
        Ok(id)
    }

    /// Adds a sprite from a JSON descriptor `{type, attrs, transform, group}`.
    pub fn add_sprite_json(&mut self, input: &str) -> DrawResult<SpriteId> {
        let value: serde_json::Value = serde_json::from_str(input)
            .map_err(|e| DrawError::InvalidDescriptor(format!("failed to parse descriptor: {e}")))?;
        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| DrawError::InvalidDescriptor("descriptor has no `type`".to_owned()))?;
        kind.parse::<SpriteKind>()?;
        let descriptor: SpriteDescriptor = serde_json::from_value(value)
            .map_err(|e| DrawError::InvalidDescriptor(format!("failed to parse descriptor: {e}")))?;
        self.add_sprite(descriptor)
    }

    #[must_use]
    pub fn sprite(&self, id: SpriteId) -> Option<&Sprite> {
        self.sprites.get(&id)
    }

    /// Mutable sprite access. Changes made through it are tracked by the
    /// sprite's dirty flags; z-index changes take effect on `render_all`.
    pub fn sprite_mut(&mut self, id: SpriteId) -> Option<&mut Sprite> {
        self.sprites.get_mut(&id)
    }

    /// Sprite ids in logical order.
    pub fn sprite_ids(&self) -> impl Iterator<Item = SpriteId> + '_ {
        self.sprites.keys().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }

    #[must_use]
    pub fn index_of(&self, id: SpriteId) -> Option<usize> {
        self.sprites.get_index_of(&id)
    }

    fn sprite_entry(&mut self, id: SpriteId) -> DrawResult<&mut Sprite> {
        self.sprites.get_mut(&id).ok_or(DrawError::UnknownSprite(id.raw()))
    }

    pub fn set_attributes<I, K, V>(&mut self, id: SpriteId, attrs: I) -> DrawResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<AttrValue>,
    {
        self.sprite_entry(id)?.set_attributes(attrs);
        Ok(())
    }

    pub fn set_z_index(&mut self, id: SpriteId, z_index: i32) -> DrawResult<()> {
        self.set_attributes(id, [("zIndex", z_index)])
    }

    /// Moves a sprite to `index` in the logical order. A later `render_all`
    /// still orders sprites by z-index first.
    pub fn move_sprite(&mut self, id: SpriteId, index: usize) -> DrawResult<()> {
        let from = self.index_of(id).ok_or(DrawError::UnknownSprite(id.raw()))?;
        let to = index.min(self.sprites.len() - 1);
        if from != to {
            self.sprites.move_index(from, to);
            self.sprite_entry(id)?.mark_dirty(DirtyFlag::ZIndex);
        }
        Ok(())
    }

    pub fn hide(&mut self, id: SpriteId) -> DrawResult<()> {
        self.sprite_entry(id)?.set_hidden(true);
        Ok(())
    }

    pub fn show(&mut self, id: SpriteId) -> DrawResult<()> {
        self.sprite_entry(id)?.set_hidden(false);
        Ok(())
    }

    /// Marks every facet dirty and reconciles the sprite.
    pub fn redraw(&mut self, id: SpriteId) -> DrawResult<()> {
        self.sprite_entry(id)?.mark(DirtyFlags::all());
        self.reconcile(id)
    }

    /// Removes a sprite, destroying its element and releasing the gradients
    /// it referenced.
    pub fn remove_sprite(&mut self, id: SpriteId) -> DrawResult<Sprite> {
        let mut sprite = self
            .sprites
            .shift_remove(&id)
            .ok_or(DrawError::UnknownSprite(id.raw()))?;
        if let Some(group) = sprite.group.as_deref() {
            self.leave_group(group, id);
        }
        if let Some(element) = sprite.element.take() {
            self.destroy_element(element);
        }
        if let Some(clip) = sprite.clip.take() {
            self.destroy_element(clip);
        }
        sprite.tspans.clear();
        sprite.rendered_text = None;
        sprite.written.clear();
        sprite.mark(DirtyFlags::all());
        trace!(sprite = %id, "sprite removed");
        Ok(sprite)
    }

    /// Removes every sprite and the overlay group.
    pub fn clear(&mut self) {
        let elements: Vec<ElementId> = self
            .sprites
            .values()
            .flat_map(|sprite| sprite.element.into_iter().chain(sprite.clip))
            .collect();
        for element in elements {
            self.destroy_element(element);
        }
        if let Some(overlay) = self.overlay.take() {
            self.destroy_element(overlay);
        }
        self.sprites.clear();
        self.groups.clear();
        debug!("surface cleared");
    }

    /// Registers a hook run after each sprite's first reconciliation.
    pub fn add_listener(&mut self, listener: impl SpriteListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Registers a bounding-box relative gradient; equivalent definitions
    /// share one element.
    pub fn add_gradient(&mut self, definition: &GradientDefinition) -> GradientId {
        self.gradients.add_definition(&mut self.document, self.defs, definition)
    }

    #[must_use]
    pub fn gradient_url(&self, id: GradientId) -> Option<String> {
        self.gradients.url(id)
    }

    pub fn remove_gradient(&mut self, id: GradientId) -> DrawResult<()> {
        self.gradients.remove(&mut self.document, id)
    }

    #[must_use]
    pub fn gradient_count(&self) -> usize {
        self.gradients.len()
    }

    #[must_use]
    pub fn gradients(&self) -> &GradientPool {
        &self.gradients
    }

    /// Gradient with `spec`'s geometry owned by the group `owner`, recycling
    /// one left unclaimed by the current drawing pass.
    pub fn get_or_create_gradient(&mut self, spec: &GradientSpec, owner: ElementId) -> GradientId {
        self.gradients.get_or_create(&mut self.document, self.defs, spec, owner)
    }

    /// Immediate-mode context drawing into the overlay group above all
    /// sprites.
    pub fn context(&mut self) -> DrawingContext<'_, D> {
        let overlay = match self.overlay {
            Some(overlay) if self.document.contains(overlay) => overlay,
            _ => {
                let overlay = self.document.create_element("g");
                self.document.append_child(self.root, overlay);
                self.overlay = Some(overlay);
                overlay
            }
        };
        self.context_in(overlay)
    }

    /// Immediate-mode context drawing into `group`. Children of `group` are
    /// claimed from the first one on; whatever the pass does not claim is
    /// destroyed when the context finishes.
    pub fn context_in(&mut self, group: ElementId) -> DrawingContext<'_, D> {
        self.frame += 1;
        self.gradients.begin_frame(self.frame);
        trace!(frame = self.frame, "drawing pass started");
        DrawingContext::new(self, group)
    }

    /// Destroys `element` and its subtree, releasing every gradient reference
    /// and gradient ownership inside it.
    pub(crate) fn destroy_element(&mut self, element: ElementId) {
        let mut pending = vec![element];
        let mut subtree = Vec::new();
        while let Some(next) = pending.pop() {
            subtree.push(next);
            pending.extend_from_slice(self.document.children(next));
        }
        for doomed in subtree {
            self.gradients.release_element(&mut self.document, doomed);
        }
        self.document.destroy(element);
    }

    fn leave_group(&mut self, group: &str, id: SpriteId) {
        if let Some(members) = self.groups.get_mut(group) {
            members.shift_remove(&id);
            if members.is_empty() {
                self.groups.shift_remove(group);
            }
        }
    }
}

fn view_box_value(view_box: [f64; 4]) -> String {
    view_box
        .map(|value| attrs::AttrValue::from(value).to_string())
        .join(" ")
}

fn validate_descriptor(descriptor: &SpriteDescriptor) -> DrawResult<()> {
    for (name, value) in &descriptor.attrs {
        if let AttrValue::Number(number) = value {
            if !number.is_finite() {
                return Err(DrawError::InvalidDescriptor(format!(
                    "attribute `{name}` must be finite"
                )));
            }
        }
    }
    let finite = |values: &[f64]| values.iter().all(|value| value.is_finite());
    for op in &descriptor.transform {
        let ok = match *op {
            TransformOp::Translate { x, y } => finite(&[x, y]),
            TransformOp::Rotate { degrees, x, y } => {
                finite(&[degrees, x.unwrap_or(0.0), y.unwrap_or(0.0)])
            }
            TransformOp::Scale {
                x,
                y,
                center_x,
                center_y,
            } => finite(&[x, y, center_x.unwrap_or(0.0), center_y.unwrap_or(0.0)]),
        };
        if !ok {
            return Err(DrawError::InvalidDescriptor(
                "transform values must be finite".to_owned(),
            ));
        }
    }
    Ok(())
}
