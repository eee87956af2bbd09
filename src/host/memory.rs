use std::collections::HashMap;
use std::fmt::Write as _;

use indexmap::IndexMap;

use crate::host::{ElementId, HostDocument};

#[derive(Debug, Clone, Default)]
struct Node {
    tag: String,
    attributes: IndexMap<String, String>,
    styles: IndexMap<String, String>,
    text: Option<String>,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
}

/// In-memory element tree used by tests and headless rendering.
///
/// Slots are never reused, so a destroyed handle stays dead. Every
/// `set_attribute` call is counted per element and attribute name, which lets
/// tests assert that reconciliation skips redundant writes.
#[derive(Debug, Default)]
pub struct MemoryDocument {
    nodes: Vec<Option<Node>>,
    attribute_writes: HashMap<(ElementId, String), usize>,
    total_attribute_writes: usize,
    created: usize,
    destroyed: usize,
}

impl MemoryDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&self, element: ElementId) -> Option<&Node> {
        self.nodes.get(element.raw() as usize)?.as_ref()
    }

    fn node_mut(&mut self, element: ElementId) -> Option<&mut Node> {
        self.nodes.get_mut(element.raw() as usize)?.as_mut()
    }

    /// Number of `set_attribute` calls made for `name` on `element`.
    #[must_use]
    pub fn attribute_writes(&self, element: ElementId, name: &str) -> usize {
        self.attribute_writes
            .get(&(element, name.to_owned()))
            .copied()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn total_attribute_writes(&self) -> usize {
        self.total_attribute_writes
    }

    pub fn reset_write_counters(&mut self) {
        self.attribute_writes.clear();
        self.total_attribute_writes = 0;
    }

    #[must_use]
    pub fn created_count(&self) -> usize {
        self.created
    }

    #[must_use]
    pub fn destroyed_count(&self) -> usize {
        self.destroyed
    }

    /// Live elements, detached ones included.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    /// Elements below `element` in document order, `element` excluded.
    #[must_use]
    pub fn descendants(&self, element: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut stack: Vec<ElementId> = self.children(element).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Serializes `element` and its subtree as XML markup.
    #[must_use]
    pub fn to_markup(&self, element: ElementId) -> String {
        let mut out = String::new();
        self.write_markup(element, &mut out);
        out
    }

    fn write_markup(&self, element: ElementId, out: &mut String) {
        let Some(node) = self.node(element) else {
            return;
        };
        out.push('<');
        out.push_str(&node.tag);
        for (name, value) in &node.attributes {
            let _ = write!(out, " {name}=\"{}\"", escape(value));
        }
        if !node.styles.is_empty() {
            let style = node
                .styles
                .iter()
                .map(|(name, value)| format!("{name}:{value}"))
                .collect::<Vec<_>>()
                .join(";");
            let _ = write!(out, " style=\"{}\"", escape(&style));
        }
        if node.text.is_none() && node.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        if let Some(text) = &node.text {
            out.push_str(&escape(text));
        }
        for child in &node.children {
            self.write_markup(*child, out);
        }
        let _ = write!(out, "</{}>", node.tag);
    }

    fn detach(&mut self, child: ElementId) {
        let Some(parent) = self.node(child).and_then(|node| node.parent) else {
            return;
        };
        if let Some(parent_node) = self.node_mut(parent) {
            parent_node.children.retain(|existing| *existing != child);
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = None;
        }
    }

    /// Rejects moves that would make an element its own ancestor.
    fn is_ancestor_or_self(&self, candidate: ElementId, element: ElementId) -> bool {
        let mut current = Some(element);
        while let Some(next) = current {
            if next == candidate {
                return true;
            }
            current = self.parent(next);
        }
        false
    }
}

impl HostDocument for MemoryDocument {
    fn create_element(&mut self, tag: &str) -> ElementId {
        let id = ElementId::from_raw(self.nodes.len() as u32);
        self.nodes.push(Some(Node {
            tag: tag.to_owned(),
            ..Node::default()
        }));
        self.created += 1;
        id
    }

    fn tag(&self, element: ElementId) -> Option<&str> {
        self.node(element).map(|node| node.tag.as_str())
    }

    fn set_attribute(&mut self, element: ElementId, name: &str, value: &str) {
        let Some(node) = self.node_mut(element) else {
            return;
        };
        node.attributes.insert(name.to_owned(), value.to_owned());
        *self
            .attribute_writes
            .entry((element, name.to_owned()))
            .or_default() += 1;
        self.total_attribute_writes += 1;
    }

    fn remove_attribute(&mut self, element: ElementId, name: &str) {
        if let Some(node) = self.node_mut(element) {
            node.attributes.shift_remove(name);
        }
    }

    fn attribute(&self, element: ElementId, name: &str) -> Option<&str> {
        self.node(element)?.attributes.get(name).map(String::as_str)
    }

    fn set_style(&mut self, element: ElementId, name: &str, value: &str) {
        if let Some(node) = self.node_mut(element) {
            if value.is_empty() {
                node.styles.shift_remove(name);
            } else {
                node.styles.insert(name.to_owned(), value.to_owned());
            }
        }
    }

    fn style(&self, element: ElementId, name: &str) -> Option<&str> {
        self.node(element)?.styles.get(name).map(String::as_str)
    }

    fn set_text(&mut self, element: ElementId, text: &str) {
        if let Some(node) = self.node_mut(element) {
            node.text = Some(text.to_owned());
        }
    }

    fn text(&self, element: ElementId) -> Option<&str> {
        self.node(element)?.text.as_deref()
    }

    fn append_child(&mut self, parent: ElementId, child: ElementId) {
        if !self.contains(parent) || !self.contains(child) || self.is_ancestor_or_self(child, parent) {
            return;
        }
        self.detach(child);
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
    }

    fn insert_after(&mut self, reference: ElementId, child: ElementId) {
        if reference == child || !self.contains(child) {
            return;
        }
        let Some(parent) = self.parent(reference) else {
            return;
        };
        if self.is_ancestor_or_self(child, parent) {
            return;
        }
        self.detach(child);
        if let Some(node) = self.node_mut(parent) {
            let position = node
                .children
                .iter()
                .position(|existing| *existing == reference)
                .map_or(node.children.len(), |index| index + 1);
            node.children.insert(position, child);
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
    }

    fn parent(&self, element: ElementId) -> Option<ElementId> {
        self.node(element)?.parent
    }

    fn children(&self, element: ElementId) -> &[ElementId] {
        match self.node(element) {
            Some(node) => &node.children,
            None => &[],
        }
    }

    fn destroy(&mut self, element: ElementId) {
        if !self.contains(element) {
            return;
        }
        self.detach(element);
        let mut doomed = self.descendants(element);
        doomed.push(element);
        for id in doomed {
            if let Some(slot) = self.nodes.get_mut(id.raw() as usize) {
                if slot.take().is_some() {
                    self.destroyed += 1;
                }
            }
        }
    }

    fn contains(&self, element: ElementId) -> bool {
        self.node(element).is_some()
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::MemoryDocument;
    use crate::host::HostDocument;

    #[test]
    fn insert_after_moves_existing_child() {
        let mut doc = MemoryDocument::new();
        let root = doc.create_element("g");
        let a = doc.create_element("rect");
        let b = doc.create_element("rect");
        let c = doc.create_element("rect");
        for child in [a, b, c] {
            doc.append_child(root, child);
        }

        doc.insert_after(a, c);
        assert_eq!(doc.children(root), &[a, c, b]);
        assert_eq!(doc.parent(c), Some(root));
    }

    #[test]
    fn destroy_frees_whole_subtree_once() {
        let mut doc = MemoryDocument::new();
        let root = doc.create_element("svg");
        let group = doc.create_element("g");
        let leaf = doc.create_element("path");
        doc.append_child(root, group);
        doc.append_child(group, leaf);

        doc.destroy(group);
        doc.destroy(group);
        assert!(!doc.contains(group));
        assert!(!doc.contains(leaf));
        assert!(doc.children(root).is_empty());
        assert_eq!(doc.destroyed_count(), 2);
    }

    #[test]
    fn counts_attribute_writes_and_exports_markup() {
        let mut doc = MemoryDocument::new();
        let text = doc.create_element("text");
        doc.set_attribute(text, "x", "1");
        doc.set_attribute(text, "x", "2");
        doc.set_style(text, "font", "10px \"Sans\"");
        doc.set_text(text, "a<b");

        assert_eq!(doc.attribute_writes(text, "x"), 2);
        assert_eq!(doc.total_attribute_writes(), 2);
        assert_eq!(
            doc.to_markup(text),
            "<text x=\"2\" style=\"font:10px &quot;Sans&quot;\">a&lt;b</text>"
        );

        doc.reset_write_counters();
        assert_eq!(doc.attribute_writes(text, "x"), 0);
    }

    #[test]
    fn append_refuses_cycles() {
        let mut doc = MemoryDocument::new();
        let outer = doc.create_element("g");
        let inner = doc.create_element("g");
        doc.append_child(outer, inner);
        doc.append_child(inner, outer);
        assert_eq!(doc.parent(outer), None);
        assert!(doc.children(inner).is_empty());
    }
}
