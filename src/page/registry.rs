use crate::models::field::FieldKind;
use crate::page::document::{Element, ElementId, Page};
use crate::page::markup;
use crate::storage::is_reserved_field;

pub const EDITABLE_CLASS: &str = "editable";
pub const FIELD_ATTR: &str = "data-field";
pub const ASSET_ATTR: &str = "data-asset";
pub const DEFAULT_LONG_TEXT_THRESHOLD: usize = 60;

const PARAGRAPH_TAGS: &[&str] = &["p", "blockquote"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBinding {
    pub element: ElementId,
    pub field_name: String,
    pub kind: FieldKind,
}

/// Editable elements found on the page, with their kind fixed at discovery.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    bindings: Vec<FieldBinding>,
    photo_slots: Vec<ElementId>,
}

pub fn infer_kind(element: &Element, long_text_threshold: usize) -> FieldKind {
    if element.tag == "img" {
        return FieldKind::ImageReference;
    }
    if markup::has_list_marker(&element.inner_html) {
        return FieldKind::StructuredList;
    }
    if markup::has_tag_group_marker(&element.inner_html) {
        return FieldKind::StructuredTags;
    }

    let paragraph_like = PARAGRAPH_TAGS.contains(&element.tag.as_str());
    if paragraph_like && element.text_content().chars().count() > long_text_threshold {
        FieldKind::LongText
    } else {
        FieldKind::ShortText
    }
}

impl FieldRegistry {
    pub fn discover(page: &Page, long_text_threshold: usize, photo_slot: &str) -> Self {
        let mut bindings = Vec::new();
        let mut photo_slots = Vec::new();

        for (id, element) in page.iter() {
            if element.attr(ASSET_ATTR) == Some(photo_slot) {
                photo_slots.push(id);
            }
            if !element.has_class(EDITABLE_CLASS) {
                continue;
            }
            let Some(field_name) = element.attr(FIELD_ATTR).filter(|name| !name.is_empty()) else {
                continue;
            };
            if is_reserved_field(field_name) {
                log::warn!("ignoring editable field with reserved name '{field_name}'");
                continue;
            }
            bindings.push(FieldBinding {
                element: id,
                field_name: field_name.to_string(),
                kind: infer_kind(element, long_text_threshold),
            });
        }

        log::debug!(
            "discovered {} editable fields and {} photo slots",
            bindings.len(),
            photo_slots.len()
        );

        FieldRegistry {
            bindings,
            photo_slots,
        }
    }

    pub fn bindings(&self) -> &[FieldBinding] {
        &self.bindings
    }

    pub fn binding(&self, element: ElementId) -> Option<&FieldBinding> {
        self.bindings.iter().find(|b| b.element == element)
    }

    /// Replaces the displayed content of every element bound to `field_name`.
    /// Returns how many elements were touched; an unknown field touches none.
    pub fn apply(&self, page: &mut Page, field_name: &str, content: &str) -> usize {
        let mut applied = 0;
        for binding in self.bindings.iter().filter(|b| b.field_name == field_name) {
            let done = if binding.kind == FieldKind::ImageReference {
                page.set_attr(binding.element, "src", content)
            } else {
                page.set_inner_html(binding.element, content)
            };
            if done {
                applied += 1;
            }
        }
        applied
    }

    /// Bindings under `container`, in document order.
    pub fn fields_in(&self, page: &Page, container: ElementId) -> Vec<&FieldBinding> {
        self.bindings
            .iter()
            .filter(|b| page.is_descendant(b.element, container))
            .collect()
    }

    pub fn photo_slots(&self) -> &[ElementId] {
        &self.photo_slots
    }

    pub fn apply_photo(&self, page: &mut Page, src: &str) -> usize {
        self.photo_slots
            .iter()
            .filter(|id| page.set_attr(**id, "src", src))
            .count()
    }
}
