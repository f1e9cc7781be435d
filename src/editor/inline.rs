//! Click-to-edit sessions on individual fields.
//!
//! A session moves an element from viewing to editing: an editing surface is
//! laid over the element while its markup stays as it was. The session ends
//! in a commit (content serialized, written to the page, persisted) or a
//! cancel (the surface is dropped and the markup is untouched). A field has
//! at most one open session, even when several elements show it.

use super::serialize::{edit_text, serialize, TagOptions};
use super::EditorError;
use crate::commands::settings::Settings;
use crate::models::field::FieldKind;
use crate::page::document::{EditSurface, ElementId, SurfaceKind};
use crate::state::AppState;
use crate::storage::{Backend, StorageError};
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    Viewing,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Escape,
}

/// Where focus went when an editing surface lost it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusTarget {
    SaveControl(ElementId),
    CancelControl(ElementId),
    Elsewhere,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    Started,
    AlreadyEditing,
}

#[derive(Debug)]
pub enum KeyOutcome {
    Committed(Committed),
    Cancelled,
    Newline,
    Ignored,
}

/// Result of ending a session with a commit. The page shows `content` even
/// when `saved` is an error.
#[derive(Debug)]
pub struct Committed {
    pub field_name: String,
    pub content: String,
    pub saved: Result<(), StorageError>,
}

#[derive(Debug)]
struct Session {
    field_name: String,
    kind: FieldKind,
    blur_deadline: Option<Instant>,
}

#[derive(Debug)]
pub struct InlineEditor {
    sessions: HashMap<ElementId, Session>,
    tag_options: TagOptions,
    blur_grace: Duration,
}

impl InlineEditor {
    pub fn new(settings: &Settings) -> Self {
        InlineEditor {
            sessions: HashMap::new(),
            tag_options: TagOptions {
                keep_empty_categories: settings.keep_empty_categories,
                default_category: settings.default_tag_category.clone(),
            },
            blur_grace: settings.blur_grace(),
        }
    }

    pub fn state(&self, element: ElementId) -> EditState {
        if self.sessions.contains_key(&element) {
            EditState::Editing
        } else {
            EditState::Viewing
        }
    }

    pub fn editing(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.sessions.keys().copied()
    }

    /// Opens a session. Clicking an element that is already being edited is a
    /// no-op; another element showing the same field is refused.
    pub fn begin<B: Backend>(
        &mut self,
        state: &mut AppState<B>,
        element: ElementId,
    ) -> Result<BeginOutcome, EditorError> {
        if self.sessions.contains_key(&element) {
            return Ok(BeginOutcome::AlreadyEditing);
        }
        if !state.can_edit() {
            return Err(EditorError::AdminDisabled);
        }

        let binding = state
            .registry
            .binding(element)
            .ok_or(EditorError::NotEditable(element))?;
        if binding.kind == FieldKind::ImageReference {
            return Err(EditorError::ImageField(binding.field_name.clone()));
        }
        let field_name = binding.field_name.clone();
        let kind = binding.kind;
        if state.is_field_in_edit(&field_name) {
            return Err(EditorError::FieldBusy(field_name));
        }

        let el = state
            .page
            .get_mut(element)
            .ok_or(EditorError::MissingElement(element))?;
        el.surface = Some(EditSurface {
            kind: if kind.is_single_line() {
                SurfaceKind::Input
            } else {
                SurfaceKind::TextArea
            },
            value: edit_text(kind, &el.inner_html, &self.tag_options),
        });

        log::debug!("editing {field_name} as {kind:?}");
        state.mark_in_edit(&field_name);
        self.sessions.insert(
            element,
            Session {
                field_name,
                kind,
                blur_deadline: None,
            },
        );
        Ok(BeginOutcome::Started)
    }

    /// Replaces the text in the editing surface.
    pub fn input<B: Backend>(&mut self, state: &mut AppState<B>, element: ElementId, text: &str) -> bool {
        if !self.sessions.contains_key(&element) {
            return false;
        }
        match state.page.get_mut(element).and_then(|el| el.surface.as_mut()) {
            Some(surface) => {
                surface.value = text.to_string();
                true
            }
            None => false,
        }
    }

    /// Enter commits a single-line surface and inserts a line break in a
    /// multi-line one. Escape cancels either.
    pub async fn key<B: Backend>(
        &mut self,
        state: &mut AppState<B>,
        element: ElementId,
        key: Key,
    ) -> KeyOutcome {
        if !self.sessions.contains_key(&element) {
            return KeyOutcome::Ignored;
        }
        match key {
            Key::Escape => {
                self.cancel(state, element);
                KeyOutcome::Cancelled
            }
            Key::Enter => {
                let surface = state.page.get_mut(element).and_then(|el| el.surface.as_mut());
                match surface {
                    Some(surface) if surface.kind == SurfaceKind::TextArea => {
                        surface.value.push('\n');
                        KeyOutcome::Newline
                    }
                    _ => match self.commit(state, element).await {
                        Some(committed) => KeyOutcome::Committed(committed),
                        None => KeyOutcome::Ignored,
                    },
                }
            }
        }
    }

    /// Focus left the surface. Moving to this element's own save or cancel
    /// control does not arm the blur; anything else commits once the grace
    /// period has passed without the surface regaining focus.
    pub fn blur(&mut self, element: ElementId, next_focus: FocusTarget, now: Instant) {
        let Some(session) = self.sessions.get_mut(&element) else {
            return;
        };
        match next_focus {
            FocusTarget::SaveControl(owner) | FocusTarget::CancelControl(owner) if owner == element => {}
            _ => session.blur_deadline = Some(now + self.blur_grace),
        }
    }

    pub fn focus(&mut self, element: ElementId) {
        if let Some(session) = self.sessions.get_mut(&element) {
            session.blur_deadline = None;
        }
    }

    /// Commits every session whose blur grace period ran out by `now`.
    pub async fn flush_blurs<B: Backend>(
        &mut self,
        state: &mut AppState<B>,
        now: Instant,
    ) -> Vec<Committed> {
        let mut due: Vec<ElementId> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.blur_deadline.map(|d| d <= now).unwrap_or(false))
            .map(|(id, _)| *id)
            .collect();
        due.sort();

        let mut committed = Vec::with_capacity(due.len());
        for element in due {
            if let Some(done) = self.commit(state, element).await {
                committed.push(done);
            }
        }
        committed
    }

    /// Serializes the surface, shows the result and persists it. A storage
    /// failure raises a notice but leaves the new content on the page. If
    /// admin mode ended meanwhile the session is cancelled instead.
    pub async fn commit<B: Backend>(
        &mut self,
        state: &mut AppState<B>,
        element: ElementId,
    ) -> Option<Committed> {
        if !self.sessions.contains_key(&element) {
            return None;
        }
        if !state.can_edit() {
            log::warn!("admin mode ended during an edit; discarding it");
            self.cancel(state, element);
            return None;
        }
        let session = self.sessions.remove(&element)?;
        state.clear_in_edit(&session.field_name);
        let text = state
            .page
            .get_mut(element)
            .and_then(|el| el.surface.take())
            .map(|surface| surface.value)
            .unwrap_or_default();

        let content = serialize(session.kind, &text, &self.tag_options);
        state.registry.apply(&mut state.page, &session.field_name, &content);

        let saved = state.backend.put(&session.field_name, &content).await;
        match &saved {
            Ok(()) => log::info!("saved {} via {}", session.field_name, state.backend.describe()),
            Err(err) => state.notices.storage_failure(err),
        }

        Some(Committed {
            field_name: session.field_name,
            content,
            saved,
        })
    }

    /// Drops the surface; the markup was never touched.
    pub fn cancel<B: Backend>(&mut self, state: &mut AppState<B>, element: ElementId) -> bool {
        let Some(session) = self.sessions.remove(&element) else {
            return false;
        };
        state.clear_in_edit(&session.field_name);
        if let Some(el) = state.page.get_mut(element) {
            el.surface = None;
        }
        log::debug!("cancelled edit of {}", session.field_name);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::document::{Element, Page};
    use crate::storage::local::{LocalBackend, LocalStore};

    fn fixture(quota: u64) -> (AppState<LocalBackend>, ElementId, ElementId) {
        let mut page = Page::new();
        let hero = page.append(None, Element::new("section").with_id("hero"));
        let title = page.append(
            Some(hero),
            Element::new("h1")
                .with_class("editable")
                .with_attr("data-field", "heroTitle")
                .with_html("Hello <em>there</em>"),
        );
        let skills = page.append(
            Some(hero),
            Element::new("ul")
                .with_class("editable")
                .with_attr("data-field", "skills")
                .with_html("<li>Rust</li><li>Go</li>"),
        );
        let store = LocalStore::open_in_memory(quota).expect("store");
        let mut state = AppState::new(Settings::default(), page, LocalBackend::new(store, "t"));
        state.admin = true;
        (state, title, skills)
    }

    #[tokio::test]
    async fn cancel_restores_markup_exactly() {
        let (mut state, title, _) = fixture(1 << 20);
        let mut editor = InlineEditor::new(&state.settings);

        assert_eq!(editor.begin(&mut state, title), Ok(BeginOutcome::Started));
        assert_eq!(editor.begin(&mut state, title), Ok(BeginOutcome::AlreadyEditing));
        let surface = state.page.get(title).and_then(|el| el.surface.clone()).expect("surface");
        assert_eq!(surface.kind, SurfaceKind::Input);
        assert_eq!(surface.value, "Hello there");

        editor.input(&mut state, title, "Something else");
        assert!(matches!(
            editor.key(&mut state, title, Key::Escape).await,
            KeyOutcome::Cancelled
        ));

        let el = state.page.get(title).expect("title");
        assert_eq!(el.inner_html, "Hello <em>there</em>");
        assert!(el.surface.is_none());
        assert_eq!(editor.state(title), EditState::Viewing);
    }

    #[tokio::test]
    async fn enter_in_a_list_adds_a_line() {
        let (mut state, _, skills) = fixture(1 << 20);
        let mut editor = InlineEditor::new(&state.settings);

        editor.begin(&mut state, skills).expect("begin");
        editor.input(&mut state, skills, "Rust\nGo");
        assert!(matches!(
            editor.key(&mut state, skills, Key::Enter).await,
            KeyOutcome::Newline
        ));
        editor.input(&mut state, skills, "Rust\nGo\nZig\n");

        let committed = editor.commit(&mut state, skills).await.expect("session");
        assert!(committed.saved.is_ok());
        assert_eq!(committed.content, "<li>Rust</li><li>Go</li><li>Zig</li>");
        assert_eq!(
            state.page.get(skills).map(|el| el.inner_html.as_str()),
            Some("<li>Rust</li><li>Go</li><li>Zig</li>")
        );
    }

    #[tokio::test]
    async fn blur_toward_own_controls_does_not_commit() {
        let (mut state, title, _) = fixture(1 << 20);
        let mut editor = InlineEditor::new(&state.settings);
        let start = Instant::now();

        editor.begin(&mut state, title).expect("begin");
        editor.blur(title, FocusTarget::CancelControl(title), start);
        let late = start + Duration::from_secs(5);
        assert!(editor.flush_blurs(&mut state, late).await.is_empty());
        assert_eq!(editor.state(title), EditState::Editing);

        editor.blur(title, FocusTarget::Elsewhere, start);
        editor.focus(title);
        assert!(editor.flush_blurs(&mut state, late).await.is_empty());

        editor.input(&mut state, title, "Hi");
        editor.blur(title, FocusTarget::Elsewhere, start);
        assert!(editor.flush_blurs(&mut state, start).await.is_empty());
        let done = editor.flush_blurs(&mut state, late).await;
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].content, "Hi");
    }

    #[tokio::test]
    async fn quota_failure_keeps_the_new_text_on_screen() {
        let (mut state, title, _) = fixture(16);
        let mut editor = InlineEditor::new(&state.settings);

        editor.begin(&mut state, title).expect("begin");
        editor.input(&mut state, title, "A title far longer than sixteen bytes");
        let committed = editor.commit(&mut state, title).await.expect("session");

        assert!(committed.saved.as_ref().is_err_and(StorageError::is_quota_exceeded));
        assert_eq!(
            state.page.get(title).map(|el| el.inner_html.as_str()),
            Some("A title far longer than sixteen bytes")
        );
        let notice = state.notices.latest().expect("notice");
        assert_eq!(notice.level, crate::notice::NoticeLevel::Warning);
    }

    #[test]
    fn images_are_not_inline_editable() {
        let mut page = Page::new();
        let img = page.append(
            None,
            Element::new("img")
                .with_class("editable")
                .with_attr("data-field", "logo"),
        );
        let store = LocalStore::open_in_memory(1024).expect("store");
        let mut state = AppState::new(Settings::default(), page, LocalBackend::new(store, "t"));
        state.admin = true;
        let mut editor = InlineEditor::new(&state.settings);

        assert_eq!(
            editor.begin(&mut state, img),
            Err(EditorError::ImageField("logo".to_string()))
        );
    }

    #[tokio::test]
    async fn markup_stays_in_place_while_editing() {
        let (mut state, title, _) = fixture(1 << 20);
        let mut editor = InlineEditor::new(&state.settings);

        editor.begin(&mut state, title).expect("begin");
        editor.input(&mut state, title, "Draft");
        assert_eq!(
            state.page.get(title).map(|el| el.inner_html.as_str()),
            Some("Hello <em>there</em>")
        );
        assert!(state.is_field_in_edit("heroTitle"));

        editor.cancel(&mut state, title);
        assert!(!state.is_field_in_edit("heroTitle"));
    }

    #[tokio::test]
    async fn one_session_per_field_across_elements() {
        let mut page = Page::new();
        let a = page.append(
            None,
            Element::new("span").with_class("editable").with_attr("data-field", "name").with_html("Jane"),
        );
        let b = page.append(
            None,
            Element::new("span").with_class("editable").with_attr("data-field", "name").with_html("Jane"),
        );
        let store = LocalStore::open_in_memory(1 << 20).expect("store");
        let mut state = AppState::new(Settings::default(), page, LocalBackend::new(store, "t"));
        state.admin = true;
        let mut editor = InlineEditor::new(&state.settings);

        assert_eq!(editor.begin(&mut state, a), Ok(BeginOutcome::Started));
        assert_eq!(
            editor.begin(&mut state, b),
            Err(EditorError::FieldBusy("name".to_string()))
        );
        assert_eq!(editor.state(b), EditState::Viewing);

        editor.input(&mut state, a, "John");
        editor.commit(&mut state, a).await.expect("session");
        assert_eq!(state.page.get(b).map(|el| el.inner_html.as_str()), Some("John"));
        assert_eq!(editor.begin(&mut state, b), Ok(BeginOutcome::Started));
        editor.cancel(&mut state, b);
        assert_eq!(state.page.get(b).map(|el| el.inner_html.as_str()), Some("John"));
        let stored = state.backend.get_all().await.expect("get all");
        assert_eq!(stored.get("name").map(String::as_str), Some("John"));
    }

    #[tokio::test]
    async fn editing_needs_admin_mode() {
        let (mut state, title, _) = fixture(1 << 20);
        state.admin = false;
        let mut editor = InlineEditor::new(&state.settings);

        assert_eq!(editor.begin(&mut state, title), Err(EditorError::AdminDisabled));
        assert!(state.page.get(title).and_then(|el| el.surface.as_ref()).is_none());

        state.admin = true;
        editor.begin(&mut state, title).expect("begin");
        editor.input(&mut state, title, "Changed");
        state.logout();
        assert!(editor.commit(&mut state, title).await.is_none());
        assert_eq!(editor.state(title), EditState::Viewing);
        assert_eq!(
            state.page.get(title).map(|el| el.inner_html.as_str()),
            Some("Hello <em>there</em>")
        );
        assert!(state.backend.get_all().await.expect("get all").is_empty());
    }
}
