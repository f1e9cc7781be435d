pub mod bulk;
pub mod inline;
pub mod serialize;

use crate::page::document::ElementId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    #[error("element {0:?} is not an editable field")]
    NotEditable(ElementId),
    #[error("'{0}' is an image; replace it through the photo upload")]
    ImageField(String),
    #[error("element {0:?} is not on the page")]
    MissingElement(ElementId),
    #[error("section {0:?} has no editable text fields")]
    EmptySection(ElementId),
    #[error("admin mode is off")]
    AdminDisabled,
    #[error("'{0}' is already being edited")]
    FieldBusy(String),
}
