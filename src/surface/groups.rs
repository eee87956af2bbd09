use tracing::debug;

use crate::error::{DrawError, DrawResult};
use crate::host::HostDocument;
use crate::surface::attrs::AttrValue;
use crate::surface::sprite::SpriteId;
use crate::surface::Surface;

// Groups are named membership sets. They do not own an element and do not
// affect z-order.
impl<D: HostDocument> Surface<D> {
    /// Members of `name` in the order they joined.
    #[must_use]
    pub fn group_members(&self, name: &str) -> Vec<SpriteId> {
        self.groups
            .get(name)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.groups.keys().map(String::as_str)
    }

    /// Moves a sprite into `group`, or out of any group with `None`.
    pub fn set_sprite_group(&mut self, id: SpriteId, group: Option<&str>) -> DrawResult<()> {
        let sprite = self.sprites.get_mut(&id).ok_or(DrawError::UnknownSprite(id.raw()))?;
        let previous = std::mem::replace(&mut sprite.group, group.map(str::to_owned));
        if let Some(previous) = previous.as_deref() {
            if let Some(members) = self.groups.get_mut(previous) {
                members.shift_remove(&id);
                if members.is_empty() {
                    self.groups.shift_remove(previous);
                }
            }
        }
        if let Some(group) = group {
            self.groups.entry(group.to_owned()).or_default().insert(id);
        }
        Ok(())
    }

    /// Applies the same attributes to every member; returns how many sprites
    /// were updated.
    pub fn set_group_attributes<I, K, V>(&mut self, name: &str, attrs: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<AttrValue>,
    {
        let attrs: Vec<(String, AttrValue)> = attrs
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        let members = self.group_members(name);
        for id in &members {
            if let Some(sprite) = self.sprites.get_mut(id) {
                sprite.set_attributes(attrs.iter().cloned());
            }
        }
        members.len()
    }

    /// Removes every member sprite and forgets the group. Returns the number
    /// of sprites removed.
    pub fn remove_group(&mut self, name: &str) -> usize {
        let members = self.group_members(name);
        let mut removed = 0;
        for id in members {
            if self.remove_sprite(id).is_ok() {
                removed += 1;
            }
        }
        self.groups.shift_remove(name);
        debug!(group = name, removed, "group removed");
        removed
    }
}
