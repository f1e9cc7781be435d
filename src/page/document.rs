use crate::page::markup;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Single-line `<input>`.
    Input,
    /// Multi-line `<textarea>`.
    TextArea,
}

/// Temporary editing control drawn in place of an element's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSurface {
    pub kind: SurfaceKind,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub classes: Vec<String>,
    pub attributes: BTreeMap<String, String>,
    pub inner_html: String,
    pub surface: Option<EditSurface>,
    parent: Option<ElementId>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Element {
            tag: tag.to_ascii_lowercase(),
            classes: Vec::new(),
            attributes: BTreeMap::new(),
            inner_html: String::new(),
            surface: None,
            parent: None,
        }
    }

    pub fn with_id(self, id: &str) -> Self {
        self.with_attr("id", id)
    }

    pub fn with_class(mut self, class: &str) -> Self {
        if !self.has_class(class) {
            self.classes.push(class.to_string());
        }
        self
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_html(mut self, html: &str) -> Self {
        self.inner_html = html.to_string();
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn dom_id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn text_content(&self) -> String {
        markup::strip_tags(&self.inner_html)
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }
}

/// The rendered page, reduced to what the overlay reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    elements: Vec<Element>,
    order: Vec<ElementId>,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `element` as the last child of `parent` (or of the document root).
    pub fn append(&mut self, parent: Option<ElementId>, mut element: Element) -> ElementId {
        let id = ElementId(self.elements.len());
        element.parent = parent.filter(|p| p.0 < self.elements.len());

        let position = match element.parent {
            Some(parent) => {
                let start = self
                    .order
                    .iter()
                    .position(|e| *e == parent)
                    .map(|p| p + 1)
                    .unwrap_or(self.order.len());
                let mut end = start;
                while end < self.order.len() && self.is_descendant(self.order[end], parent) {
                    end += 1;
                }
                end
            }
            None => self.order.len(),
        };

        self.elements.push(element);
        self.order.insert(position, id);
        id
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id.0)
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(id.0)
    }

    /// Elements in document order.
    pub fn iter(&self) -> impl Iterator<Item = (ElementId, &Element)> + '_ {
        self.order.iter().map(move |id| (*id, &self.elements[id.0]))
    }

    pub fn by_dom_id(&self, dom_id: &str) -> Option<ElementId> {
        self.iter()
            .find(|(_, el)| el.dom_id() == Some(dom_id))
            .map(|(id, _)| id)
    }

    pub fn is_descendant(&self, id: ElementId, ancestor: ElementId) -> bool {
        let mut current = self.get(id).and_then(Element::parent);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.get(parent).and_then(Element::parent);
        }
        false
    }

    pub fn set_inner_html(&mut self, id: ElementId, html: &str) -> bool {
        match self.get_mut(id) {
            Some(el) => {
                el.inner_html = html.to_string();
                true
            }
            None => false,
        }
    }

    pub fn set_attr(&mut self, id: ElementId, name: &str, value: &str) -> bool {
        match self.get_mut(id) {
            Some(el) => {
                el.attributes.insert(name.to_string(), value.to_string());
                true
            }
            None => false,
        }
    }
}
