use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field name -> persisted content. Ordered so batches and exports are stable.
pub type ContentMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    ShortText,
    LongText,
    StructuredList,
    StructuredTags,
    ImageReference,
}

impl FieldKind {
    /// Short text edits in a single-line input; everything else gets a text area.
    pub fn is_single_line(self) -> bool {
        matches!(self, FieldKind::ShortText)
    }
}
