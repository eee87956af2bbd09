use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::error::{DrawError, DrawResult};
use crate::host::{ElementId, HostDocument};
use crate::surface::attrs::{self, AttrValue, ClipRect};
use crate::surface::geometry;
use crate::surface::resources::{GradientId, format_number, set_if_changed};
use crate::surface::sprite::{DirtyFlag, DirtyFlags, Reconcilable, SpriteId, SpriteKind, Transformable};
use crate::surface::{INFRASTRUCTURE_OFFSET, Surface};

impl<D: HostDocument> Surface<D> {
    /// Brings one sprite's host element in line with its logical state:
    /// creates the element on first use, then writes z-order, attributes,
    /// visibility and transform for whichever facets are dirty.
    pub fn reconcile(&mut self, id: SpriteId) -> DrawResult<()> {
        if self.reconciling {
            return Err(DrawError::ReentrantReconcile);
        }
        let index = self.index_of(id).ok_or(DrawError::UnknownSprite(id.raw()))?;
        self.reconciling = true;
        let created = self.reconcile_at(index);
        self.reconciling = false;
        if created {
            self.notify_listeners(index);
        }
        Ok(())
    }

    /// Orders sprites by z-index (stable, so equal keys keep their relative
    /// order) and reconciles all of them.
    pub fn render_all(&mut self) -> DrawResult<()> {
        if self.reconciling {
            return Err(DrawError::ReentrantReconcile);
        }
        self.sort_by_z_index();
        let ids: Vec<SpriteId> = self.sprite_ids().collect();
        for id in ids {
            self.reconcile(id)?;
        }
        Ok(())
    }

    /// Stable sort by z-index whenever the logical order is unsorted,
    /// regardless of dirty flags.
    fn sort_by_z_index(&mut self) {
        if self.sprites.values().is_sorted_by_key(|sprite| sprite.z_index) {
            return;
        }
        self.sprites.sort_by(|_, a, _, b| a.z_index.cmp(&b.z_index));
        trace!(count = self.sprites.len(), "sprites reordered by z-index");
        for sprite in self.sprites.values_mut() {
            sprite.mark_dirty(DirtyFlag::ZIndex);
        }
    }

    fn reconcile_at(&mut self, index: usize) -> bool {
        let (element, created) = match self.sprites[index].element {
            Some(element) => (element, false),
            None => (self.create_sprite_element(index), true),
        };
        let flags = self.sprites[index].dirty_flags();
        if flags.is_none() {
            return created;
        }

        if flags.contains(DirtyFlag::ZIndex) {
            self.place_element(index, element);
        }
        if flags.contains(DirtyFlag::Attributes) {
            self.apply_attributes(index, element, flags);
            self.apply_clip(index, element);
        }
        if flags.contains(DirtyFlag::Attributes) || flags.contains(DirtyFlag::Hidden) {
            self.apply_class(index, element);
        }
        if flags.contains(DirtyFlag::Transform) {
            self.apply_transform(index, element);
        }
        self.sprites[index].clear(DirtyFlags::all());
        created
    }

    fn create_sprite_element(&mut self, index: usize) -> ElementId {
        let sprite = &mut self.sprites[index];
        let element = self.document.create_element(sprite.kind.tag());
        let dom_id = format!("{}{}", self.config.sprite_id_prefix, sprite.id);
        self.document.set_attribute(element, "id", &dom_id);
        sprite.element = Some(element);
        sprite.mark(DirtyFlags::all());
        debug!(sprite = %sprite.id, tag = sprite.kind.tag(), "sprite element created");
        element
    }

    /// Keeps root children after the infrastructure in logical sprite order.
    fn place_element(&mut self, index: usize, element: ElementId) {
        let preceding = self.sprites.values().take(index).filter(|sprite| sprite.element.is_some()).count();
        let children = self.document.children(self.root());
        if children.get(preceding + INFRASTRUCTURE_OFFSET) == Some(&element) {
            return;
        }
        let reference = self
            .sprites
            .values()
            .take(index)
            .rev()
            .find_map(|sprite| sprite.element)
            .unwrap_or(self.background());
        self.document.insert_after(reference, element);
        trace!(sprite = %self.sprites[index].id, position = preceding, "sprite element moved");
    }

    fn apply_attributes(&mut self, index: usize, element: ElementId, flags: DirtyFlags) {
        let sprite = &self.sprites[index];
        let kind = sprite.kind;
        let host = attrs::host_attributes(kind, &sprite.attrs, flags.contains(DirtyFlag::Path));
        let style = sprite.attrs.get("style").map(ToString::to_string);
        let font = sprite.attrs.get("font").map(ToString::to_string);
        let src = sprite.attrs.get("src").map(ToString::to_string);
        let stale: Vec<String> = sprite
            .written
            .iter()
            .filter(|name| !host.contains_key(name.as_str()))
            .filter(|name| !(kind == SpriteKind::Path && name.as_str() == "d"))
            .cloned()
            .collect();

        let mut writes = 0usize;
        for (name, value) in &host {
            if name == "class" {
                continue;
            }
            if set_if_changed(&mut self.document, element, name, value) {
                writes += 1;
            }
            if name.starts_with("font-") && self.document.style(element, name) != Some(value.as_str()) {
                self.document.set_style(element, name, value);
            }
        }
        for name in &stale {
            self.document.remove_attribute(element, name);
            if name.starts_with("font-") {
                self.document.set_style(element, name, "");
            }
        }
        if kind == SpriteKind::Image {
            match src.as_deref() {
                Some(src) => {
                    set_if_changed(&mut self.document, element, "href", src);
                }
                None => self.document.remove_attribute(element, "href"),
            }
        }
        if let Some(style) = style.as_deref() {
            for (name, value) in attrs::parse_style(style) {
                if self.document.style(element, &name) != Some(value.as_str()) {
                    self.document.set_style(element, &name, &value);
                }
            }
        }
        if flags.contains(DirtyFlag::Font) {
            self.document.set_style(element, "font", font.as_deref().unwrap_or(""));
        }
        if kind == SpriteKind::Text && (flags.contains(DirtyFlag::Font) || flags.contains(DirtyFlag::Path)) {
            self.tune_text(index, element);
        }

        let refs: SmallVec<[GradientId; 2]> = ["fill", "stroke"]
            .iter()
            .filter_map(|name| host.get(*name))
            .filter_map(|value| self.gradients.resolve_url(value))
            .collect();
        self.gradients.track_element(&mut self.document, element, refs);

        let sprite = &mut self.sprites[index];
        sprite.written = host.into_keys().filter(|name| name != "class").collect();
        trace!(sprite = %sprite.id, writes, "sprite attributes reconciled");
    }

    /// Mirrors `clip-rect` into a `clipPath` in `defs` referenced through
    /// `clip-path`. The clip element is updated in place and destroyed once
    /// the attribute is gone or unparsable.
    fn apply_clip(&mut self, index: usize, element: ElementId) {
        let sprite = &self.sprites[index];
        let id = sprite.id;
        let rect = sprite.attrs.get("clip-rect").and_then(ClipRect::from_attr);
        let existing = sprite.clip.filter(|clip| self.document.contains(*clip));

        let Some(rect) = rect else {
            if let Some(clip) = self.sprites[index].clip.take() {
                if self.document.contains(clip) {
                    self.destroy_element(clip);
                }
                self.document.remove_attribute(element, "clip-path");
                trace!(sprite = %id, "sprite clip removed");
            }
            return;
        };

        let dom_id = format!("{}{}-clip", self.config.sprite_id_prefix, id);
        let clip = match existing {
            Some(clip) => clip,
            None => {
                let clip = self.document.create_element("clipPath");
                self.document.set_attribute(clip, "id", &dom_id);
                let shape = self.document.create_element("rect");
                self.document.append_child(clip, shape);
                self.document.append_child(self.defs, clip);
                self.sprites[index].clip = Some(clip);
                debug!(sprite = %id, clip = %dom_id, "sprite clip created");
                clip
            }
        };
        if let Some(&shape) = self.document.children(clip).first() {
            for (name, value) in [
                ("x", rect.x),
                ("y", rect.y),
                ("width", rect.width),
                ("height", rect.height),
            ] {
                set_if_changed(&mut self.document, shape, name, &format_number(value));
            }
        }
        set_if_changed(&mut self.document, element, "clip-path", &format!("url(#{dom_id})"));
    }

    /// Writes the user class plus the hidden class when the sprite is hidden.
    fn apply_class(&mut self, index: usize, element: ElementId) {
        let sprite = &self.sprites[index];
        let hidden_class = self.config.hidden_class.as_str();
        let mut classes: Vec<&str> = sprite
            .attrs
            .get("class")
            .and_then(AttrValue::as_str)
            .map(|class| class.split_whitespace().filter(|name| *name != hidden_class).collect())
            .unwrap_or_default();
        if sprite.is_hidden() {
            classes.push(hidden_class);
        }
        let value = classes.join(" ");
        if value.is_empty() {
            if self.document.attribute(element, "class").is_some() {
                self.document.remove_attribute(element, "class");
            }
        } else {
            set_if_changed(&mut self.document, element, "class", &value);
        }
    }

    /// Splits text on newlines into one `tspan` per non-empty line. Runs are
    /// rebuilt only when the text changes; their offsets follow the font size.
    fn tune_text(&mut self, index: usize, element: ElementId) {
        let config = self.config.clone();
        let sprite = &self.sprites[index];
        let text = sprite.attrs.get("text").map(ToString::to_string).unwrap_or_default();
        let size = geometry::font_size(sprite, &config);
        let text_changed = sprite.rendered_text.as_deref() != Some(text.as_str());

        if text_changed {
            let old: Vec<ElementId> = self.sprites[index].tspans.drain(..).map(|(_, tspan)| tspan).collect();
            for tspan in old {
                self.destroy_element(tspan);
            }
            let mut tspans = Vec::new();
            for (line_index, line) in text.split('\n').enumerate() {
                if line.is_empty() {
                    continue;
                }
                let tspan = self.document.create_element("tspan");
                self.document.set_text(tspan, line);
                self.document.append_child(element, tspan);
                tspans.push((line_index, tspan));
            }
            trace!(sprite = %self.sprites[index].id, runs = tspans.len(), "text runs rebuilt");
            let sprite = &mut self.sprites[index];
            sprite.tspans = tspans;
            sprite.rendered_text = Some(text);
        }

        let x = self.document.attribute(element, "x").unwrap_or("0").to_owned();
        let line_height = size * config.text_line_height;
        let mut previous: Option<usize> = None;
        let tspans = self.sprites[index].tspans.clone();
        for (line_index, tspan) in tspans {
            let dy = match previous {
                None => size * config.text_baseline_factor + line_index as f64 * line_height,
                Some(previous) => (line_index - previous) as f64 * line_height,
            };
            set_if_changed(&mut self.document, tspan, "x", &x);
            set_if_changed(&mut self.document, tspan, "dy", &format_number(dy));
            previous = Some(line_index);
        }
    }

    fn apply_transform(&mut self, index: usize, element: ElementId) {
        let center = geometry::local_bbox(&self.sprites[index], &self.config).center();
        let sprite = &mut self.sprites[index];
        let matrix = sprite.compose_transform(center);
        sprite.matrix = matrix;
        if matrix.is_identity() {
            if self.document.attribute(element, "transform").is_some() {
                self.document.remove_attribute(element, "transform");
            }
        } else {
            set_if_changed(&mut self.document, element, "transform", &matrix.to_svg());
        }
    }

    fn notify_listeners(&mut self, index: usize) {
        if self.listeners.is_empty() {
            return;
        }
        let Some((_, sprite)) = self.sprites.get_index_mut(index) else {
            return;
        };
        for listener in &mut self.listeners {
            listener.on_render(sprite);
        }
        if !sprite.is_clean() {
            debug!(sprite = %sprite.id, "listener left sprite dirty; deferred to next pass");
        }
    }
}
