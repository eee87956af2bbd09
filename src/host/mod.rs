mod memory;

pub use memory::MemoryDocument;

/// Opaque handle to an element owned by a [`HostDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u32);

impl ElementId {
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Contract implemented by any element tree the surface renders into.
///
/// The surface only ever talks to the host through this trait, so drawing and
/// reconciliation logic stays independent of the real document (a browser DOM,
/// a retained SVG writer or the in-memory [`MemoryDocument`]). Operations on
/// destroyed or unknown elements are ignored; reads return `None` or empty.
pub trait HostDocument {
    fn create_element(&mut self, tag: &str) -> ElementId;

    fn tag(&self, element: ElementId) -> Option<&str>;

    fn set_attribute(&mut self, element: ElementId, name: &str, value: &str);

    fn remove_attribute(&mut self, element: ElementId, name: &str);

    fn attribute(&self, element: ElementId, name: &str) -> Option<&str>;

    fn set_style(&mut self, element: ElementId, name: &str, value: &str);

    fn style(&self, element: ElementId, name: &str) -> Option<&str>;

    fn set_text(&mut self, element: ElementId, text: &str);

    fn text(&self, element: ElementId) -> Option<&str>;

    /// Moves `child` to the end of `parent`'s children.
    fn append_child(&mut self, parent: ElementId, child: ElementId);

    /// Moves `child` directly after `reference` in `reference`'s parent.
    fn insert_after(&mut self, reference: ElementId, child: ElementId);

    fn parent(&self, element: ElementId) -> Option<ElementId>;

    fn children(&self, element: ElementId) -> &[ElementId];

    /// Detaches `element` and frees it together with its whole subtree.
    fn destroy(&mut self, element: ElementId);

    fn contains(&self, element: ElementId) -> bool;
}
