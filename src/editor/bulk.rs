//! Modal editing of a whole section, or of the metrics record.
//!
//! The modal lists one row per field. Committing a section writes every row
//! in one batch. Committing metrics parses every row first; any bad number
//! or label/value count mismatch rejects the whole record, keeps the modal
//! open and leaves both the displayed and stored metrics untouched.
//!
//! A section whose fields are open in the inline editor cannot be opened.

use super::serialize::{edit_text, serialize, TagOptions};
use super::EditorError;
use crate::commands::settings::Settings;
use crate::models::field::{ContentMap, FieldKind};
use crate::models::metrics::{
    format_values, parse_labels, parse_number, parse_values, MetricKey, MetricsRecord,
    ValidationError,
};
use crate::page::document::{EditSurface, ElementId, SurfaceKind};
use crate::state::AppState;
use crate::storage::{Backend, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricPart {
    Current,
    Labels,
    Values,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowTarget {
    Field { field_name: String, kind: FieldKind },
    Metric { key: MetricKey, part: MetricPart },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModalRow {
    pub label: String,
    pub target: RowTarget,
    pub surface: EditSurface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalKind {
    Section(ElementId),
    Metrics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Modal {
    pub kind: ModalKind,
    pub rows: Vec<ModalRow>,
    /// Set after a rejected metrics commit.
    pub error: Option<ValidationError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissReason {
    CloseControl,
    Backdrop,
    Escape,
    Cancel,
}

#[derive(Debug)]
pub enum BulkCommit {
    Fields {
        written: usize,
        saved: Result<(), StorageError>,
    },
    Metrics {
        saved: Result<(), StorageError>,
    },
    NothingOpen,
    /// Admin mode ended while the modal was open; nothing was written.
    AdminDisabled,
}

#[derive(Debug)]
pub struct BulkEditor {
    modal: Option<Modal>,
    tag_options: TagOptions,
}

fn surface_for(kind: FieldKind, value: String) -> EditSurface {
    EditSurface {
        kind: if kind.is_single_line() {
            SurfaceKind::Input
        } else {
            SurfaceKind::TextArea
        },
        value,
    }
}

fn field_label(field_name: &str) -> String {
    let mut label = String::with_capacity(field_name.len() + 4);
    for (i, c) in field_name.chars().enumerate() {
        if i == 0 {
            label.extend(c.to_uppercase());
        } else if c.is_uppercase() {
            label.push(' ');
            label.extend(c.to_lowercase());
        } else {
            label.push(c);
        }
    }
    label
}

impl BulkEditor {
    pub fn new(settings: &Settings) -> Self {
        BulkEditor {
            modal: None,
            tag_options: TagOptions {
                keep_empty_categories: settings.keep_empty_categories,
                default_category: settings.default_tag_category.clone(),
            },
        }
    }

    pub fn modal(&self) -> Option<&Modal> {
        self.modal.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.modal.is_some()
    }

    /// One row per text field under `container`, prefilled from the page.
    /// A field bound to several elements gets a single row.
    pub fn open_section<B: Backend>(
        &mut self,
        state: &AppState<B>,
        container: ElementId,
    ) -> Result<&Modal, EditorError> {
        if !state.can_edit() {
            return Err(EditorError::AdminDisabled);
        }
        if state.page.get(container).is_none() {
            return Err(EditorError::MissingElement(container));
        }

        let mut rows: Vec<ModalRow> = Vec::new();
        for binding in state.registry.fields_in(&state.page, container) {
            if binding.kind == FieldKind::ImageReference
                || rows.iter().any(|row| {
                    matches!(&row.target, RowTarget::Field { field_name, .. } if *field_name == binding.field_name)
                })
            {
                continue;
            }
            if state.is_field_in_edit(&binding.field_name) {
                return Err(EditorError::FieldBusy(binding.field_name.clone()));
            }
            let html = state
                .page
                .get(binding.element)
                .map(|el| el.inner_html.as_str())
                .unwrap_or_default();
            rows.push(ModalRow {
                label: field_label(&binding.field_name),
                target: RowTarget::Field {
                    field_name: binding.field_name.clone(),
                    kind: binding.kind,
                },
                surface: surface_for(
                    binding.kind,
                    edit_text(binding.kind, html, &self.tag_options),
                ),
            });
        }

        if rows.is_empty() {
            return Err(EditorError::EmptySection(container));
        }

        log::debug!("opened section editor with {} rows", rows.len());
        Ok(&*self.modal.insert(Modal {
            kind: ModalKind::Section(container),
            rows,
            error: None,
        }))
    }

    /// Three rows per series: current value, labels, values.
    pub fn open_metrics<B: Backend>(&mut self, state: &AppState<B>) -> Result<&Modal, EditorError> {
        if !state.can_edit() {
            return Err(EditorError::AdminDisabled);
        }
        let mut rows = Vec::with_capacity(MetricKey::ALL.len() * 3);
        for key in MetricKey::ALL {
            let series = state.metrics.series(key);
            let parts = [
                (MetricPart::Current, "current", series.current.to_string()),
                (MetricPart::Labels, "labels", series.labels.join(", ")),
                (MetricPart::Values, "values", format_values(&series.data)),
            ];
            for (part, suffix, value) in parts {
                rows.push(ModalRow {
                    label: format!("{} ({suffix})", key.label()),
                    target: RowTarget::Metric { key, part },
                    surface: EditSurface {
                        kind: SurfaceKind::Input,
                        value,
                    },
                });
            }
        }

        Ok(&*self.modal.insert(Modal {
            kind: ModalKind::Metrics,
            rows,
            error: None,
        }))
    }

    pub fn set_value(&mut self, row: usize, text: &str) -> bool {
        match self.modal.as_mut().and_then(|m| m.rows.get_mut(row)) {
            Some(row) => {
                row.surface.value = text.to_string();
                true
            }
            None => false,
        }
    }

    /// Every dismissal discards the rows without writing anything.
    pub fn dismiss(&mut self, reason: DismissReason) -> bool {
        let was_open = self.modal.take().is_some();
        if was_open {
            log::debug!("bulk editor dismissed via {reason:?}");
        }
        was_open
    }

    pub async fn commit<B: Backend>(
        &mut self,
        state: &mut AppState<B>,
    ) -> Result<BulkCommit, ValidationError> {
        let Some(modal) = self.modal.as_ref() else {
            return Ok(BulkCommit::NothingOpen);
        };
        if !state.can_edit() {
            log::warn!("admin mode ended with the bulk editor open; discarding it");
            self.modal = None;
            return Ok(BulkCommit::AdminDisabled);
        }

        let kind = modal.kind;
        match kind {
            ModalKind::Section(_) => {
                let fields: ContentMap = modal
                    .rows
                    .iter()
                    .filter_map(|row| match &row.target {
                        RowTarget::Field { field_name, kind } => Some((
                            field_name.clone(),
                            serialize(*kind, &row.surface.value, &self.tag_options),
                        )),
                        RowTarget::Metric { .. } => None,
                    })
                    .collect();
                self.modal = None;

                for (field_name, content) in &fields {
                    state.registry.apply(&mut state.page, field_name, content);
                }
                let saved = state.backend.put_batch(&fields).await;
                match &saved {
                    Ok(()) => {
                        log::info!("saved {} fields via {}", fields.len(), state.backend.describe());
                        state.notices.success("Section updated.");
                    }
                    Err(err) => state.notices.storage_failure(err),
                }
                Ok(BulkCommit::Fields {
                    written: fields.len(),
                    saved,
                })
            }
            ModalKind::Metrics => {
                let metrics = match metrics_from_rows(&modal.rows, &state.metrics) {
                    Ok(metrics) => metrics,
                    Err(err) => {
                        log::warn!("metrics rejected: {err}");
                        if let Some(modal) = self.modal.as_mut() {
                            modal.error = Some(err.clone());
                        }
                        return Err(err);
                    }
                };
                self.modal = None;

                let saved = state.backend.save_metrics(&metrics).await;
                match &saved {
                    Ok(()) => state.notices.success("Metrics updated."),
                    Err(err) => state.notices.storage_failure(err),
                }
                state.metrics = metrics;
                Ok(BulkCommit::Metrics { saved })
            }
        }
    }
}

/// Builds the complete record from the modal rows, starting from `base`.
fn metrics_from_rows(rows: &[ModalRow], base: &MetricsRecord) -> Result<MetricsRecord, ValidationError> {
    let mut metrics = base.clone();
    for row in rows {
        let RowTarget::Metric { key, part } = row.target else {
            continue;
        };
        let series = metrics.series_mut(key);
        match part {
            MetricPart::Current => series.current = parse_number(key, &row.surface.value)?,
            MetricPart::Labels => series.labels = parse_labels(&row.surface.value),
            MetricPart::Values => series.data = parse_values(key, &row.surface.value)?,
        }
    }
    metrics.validate()?;
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::document::{Element, Page};
    use crate::storage::local::{LocalBackend, LocalStore};

    fn state() -> (AppState<LocalBackend>, ElementId) {
        let mut page = Page::new();
        let about = page.append(None, Element::new("section").with_id("about"));
        page.append(
            Some(about),
            Element::new("h2")
                .with_class("editable")
                .with_attr("data-field", "aboutTitle")
                .with_html("About me"),
        );
        page.append(
            Some(about),
            Element::new("div")
                .with_class("editable")
                .with_attr("data-field", "aboutTags")
                .with_html(r#"<div class="tag-group"><h4>Cloud</h4><div class="tags"><span class="tag">AWS</span></div></div>"#),
        );
        page.append(
            Some(about),
            Element::new("img")
                .with_class("editable")
                .with_attr("data-field", "aboutImage"),
        );
        let store = LocalStore::open_in_memory(1 << 20).expect("store");
        let mut state = AppState::new(Settings::default(), page, LocalBackend::new(store, "t"));
        state.admin = true;
        (state, about)
    }

    #[test]
    fn labels_come_from_field_names() {
        assert_eq!(field_label("heroTitle"), "Hero title");
        assert_eq!(field_label("bio"), "Bio");
    }

    #[tokio::test]
    async fn section_rows_skip_images_and_commit_in_one_batch() {
        let (mut state, about) = state();
        let mut bulk = BulkEditor::new(&state.settings);

        let modal = bulk.open_section(&state, about).expect("open");
        assert_eq!(modal.rows.len(), 2);
        assert_eq!(modal.rows[1].surface.value, "Cloud:\nAWS");
        assert_eq!(modal.rows[1].surface.kind, SurfaceKind::TextArea);

        bulk.set_value(0, "Who I am");
        bulk.set_value(1, "Cloud:\nAWS\nAzure");
        let outcome = bulk.commit(&mut state).await.expect("commit");
        assert!(matches!(outcome, BulkCommit::Fields { written: 2, saved: Ok(()) }));
        assert!(!bulk.is_open());

        let stored = state.backend.get_all().await.expect("get all");
        assert_eq!(stored["aboutTitle"], "Who I am");
        assert!(stored["aboutTags"].contains(r#"<span class="tag">Azure</span>"#));
    }

    #[tokio::test]
    async fn dismissing_writes_nothing() {
        let (mut state, about) = state();
        let mut bulk = BulkEditor::new(&state.settings);

        bulk.open_section(&state, about).expect("open");
        bulk.set_value(0, "Changed");
        assert!(bulk.dismiss(DismissReason::Backdrop));
        assert!(matches!(bulk.commit(&mut state).await, Ok(BulkCommit::NothingOpen)));
        assert!(state.backend.get_all().await.expect("get all").is_empty());
    }

    #[tokio::test]
    async fn bad_metrics_keep_the_modal_open() {
        let (mut state, _) = state();
        let mut bulk = BulkEditor::new(&state.settings);
        let before = state.metrics.clone();

        bulk.open_metrics(&state).expect("open");
        // Row 2 holds deployment frequency values.
        bulk.set_value(2, "1, 2, three");
        let err = bulk.commit(&mut state).await.unwrap_err();
        assert!(matches!(err, ValidationError::NotANumber { ref token, .. } if token == "three"));
        assert!(bulk.is_open());
        assert_eq!(bulk.modal().and_then(|m| m.error.clone()), Some(err));
        assert_eq!(state.metrics, before);
        assert_eq!(state.backend.load_metrics().await.expect("load"), None);

        bulk.set_value(2, "1, 2, 3, 4, 5, 6");
        bulk.set_value(0, "6");
        assert!(matches!(
            bulk.commit(&mut state).await,
            Ok(BulkCommit::Metrics { saved: Ok(()) })
        ));
        assert_eq!(state.metrics.deployment_frequency.current, 6.0);
        assert_eq!(
            state.backend.load_metrics().await.expect("load"),
            Some(state.metrics.clone())
        );
    }

    #[tokio::test]
    async fn section_with_a_field_in_inline_edit_stays_closed() {
        use crate::editor::inline::InlineEditor;

        let (mut state, about) = state();
        let title = state.registry.bindings()[0].element;
        let mut inline = InlineEditor::new(&state.settings);
        let mut bulk = BulkEditor::new(&state.settings);

        inline.begin(&mut state, title).expect("begin");
        assert_eq!(
            bulk.open_section(&state, about).map(|_| ()),
            Err(EditorError::FieldBusy("aboutTitle".to_string()))
        );
        assert!(!bulk.is_open());

        inline.cancel(&mut state, title);
        let modal = bulk.open_section(&state, about).expect("open");
        assert_eq!(modal.rows[0].surface.value, "About me");
        bulk.set_value(1, "Cloud:\nAWS\nGCP");
        bulk.commit(&mut state).await.expect("commit");
        let stored = state.backend.get_all().await.expect("get all");
        assert_eq!(stored["aboutTitle"], "About me");
    }

    #[tokio::test]
    async fn modals_need_admin_mode() {
        let (mut state, about) = state();
        let mut bulk = BulkEditor::new(&state.settings);
        state.admin = false;

        assert_eq!(bulk.open_section(&state, about).map(|_| ()), Err(EditorError::AdminDisabled));
        assert_eq!(bulk.open_metrics(&state).map(|_| ()), Err(EditorError::AdminDisabled));

        state.admin = true;
        bulk.open_section(&state, about).expect("open");
        bulk.set_value(0, "Changed");
        state.logout();
        assert!(matches!(bulk.commit(&mut state).await, Ok(BulkCommit::AdminDisabled)));
        assert!(!bulk.is_open());
        assert!(state.backend.get_all().await.expect("get all").is_empty());
    }
}
