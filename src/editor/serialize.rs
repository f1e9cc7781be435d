//! Conversions between stored field content and the plain text shown in an
//! editing surface.

use crate::models::field::FieldKind;
use crate::page::markup::{self, TagGroup};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagOptions {
    /// Keep a category header that has no tags before the next header.
    pub keep_empty_categories: bool,
    /// Category for tags typed before any header.
    pub default_category: String,
}

impl Default for TagOptions {
    fn default() -> Self {
        TagOptions {
            keep_empty_categories: true,
            default_category: "General".to_string(),
        }
    }
}

/// Text to prefill an editing surface with.
pub fn edit_text(kind: FieldKind, html: &str, options: &TagOptions) -> String {
    match kind {
        FieldKind::StructuredList => markup::list_items(html).join("\n"),
        FieldKind::StructuredTags => markup::tag_groups(html)
            .iter()
            .map(|group| {
                let name = if group.name.is_empty() {
                    options.default_category.as_str()
                } else {
                    group.name.as_str()
                };
                std::iter::once(format!("{name}:"))
                    .chain(group.tags.iter().cloned())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect::<Vec<_>>()
            .join("\n"),
        FieldKind::ShortText | FieldKind::LongText | FieldKind::ImageReference => {
            markup::strip_tags(html)
        }
    }
}

/// Non-blank lines, trimmed.
pub fn parse_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// `Category:` lines open a group; other lines are tags of the open group.
pub fn parse_tag_groups(text: &str, options: &TagOptions) -> Vec<TagGroup> {
    let mut groups: Vec<TagGroup> = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(name) = line.strip_suffix(':') {
            groups.push(TagGroup {
                name: name.trim().to_string(),
                tags: Vec::new(),
            });
            continue;
        }

        if groups.is_empty() {
            groups.push(TagGroup {
                name: options.default_category.clone(),
                tags: Vec::new(),
            });
        }
        if let Some(group) = groups.last_mut() {
            group.tags.push(line.to_string());
        }
    }

    if !options.keep_empty_categories {
        groups.retain(|group| !group.tags.is_empty());
    }
    groups
}

/// Content to persist for what the admin typed.
pub fn serialize(kind: FieldKind, text: &str, options: &TagOptions) -> String {
    match kind {
        FieldKind::StructuredList => markup::render_list(&parse_list(text)),
        FieldKind::StructuredTags => markup::render_tag_groups(&parse_tag_groups(text, options)),
        FieldKind::ShortText | FieldKind::LongText | FieldKind::ImageReference => text.to_string(),
    }
}
