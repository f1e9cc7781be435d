use crate::commands::admin::{self, admin_requested, AdminSession, AuthError, IdentityProvider};
use crate::commands::settings::Settings;
use crate::models::metrics::MetricsRecord;
use crate::notice::Notices;
use crate::page::document::Page;
use crate::page::registry::FieldRegistry;
use crate::storage::Backend;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

pub const SESSION_EXPIRED: &str = "Your admin session has expired. Please sign in again.";

/// Everything the loader and the editors share: the page, what is bound on
/// it, the active backend, the metrics shown in the charts and pending toasts.
pub struct AppState<B> {
    pub settings: Settings,
    pub page: Page,
    pub registry: FieldRegistry,
    pub backend: B,
    pub metrics: MetricsRecord,
    pub notices: Notices,
    pub admin: bool,
    pub session: Option<AdminSession>,
    requires_session: bool,
    fields_in_edit: BTreeSet<String>,
}

impl<B: Backend> AppState<B> {
    pub fn new(settings: Settings, page: Page, backend: B) -> Self {
        let registry = FieldRegistry::discover(
            &page,
            settings.long_text_threshold,
            &settings.photo_slot,
        );
        AppState {
            settings,
            page,
            registry,
            backend,
            metrics: MetricsRecord::default(),
            notices: Notices::default(),
            admin: false,
            session: None,
            requires_session: false,
            fields_in_edit: BTreeSet::new(),
        }
    }

    /// Re-reads the page so field kinds reflect loaded content.
    pub fn rediscover(&mut self) {
        self.registry = FieldRegistry::discover(
            &self.page,
            self.settings.long_text_threshold,
            &self.settings.photo_slot,
        );
    }

    /// Turns on edit affordances when the query string asks for them and,
    /// if `requires_session`, the held admin session is live. Call after loading.
    pub fn enable_admin(&mut self, query: &str, requires_session: bool) -> bool {
        self.requires_session = requires_session;
        self.admin = admin_requested(query, &self.settings.admin_query_param)
            && self.session_ok(Utc::now());
        if self.admin {
            self.rediscover();
            log::info!(
                "admin mode on: {} editable fields via {}",
                self.registry.bindings().len(),
                self.backend.describe()
            );
        }
        self.admin
    }

    fn session_ok(&self, now: DateTime<Utc>) -> bool {
        !self.requires_session
            || self
                .session
                .as_ref()
                .map(|s| !s.is_expired(now))
                .unwrap_or(false)
    }

    /// Whether editing and uploads are allowed right now.
    pub fn can_edit(&self) -> bool {
        self.admin && self.session_ok(Utc::now())
    }

    /// Drops admin mode once the held session has expired.
    pub fn expire_session(&mut self, now: DateTime<Utc>) -> bool {
        if !self.admin || self.session_ok(now) {
            return false;
        }
        log::info!("admin session expired");
        self.admin = false;
        self.notices.warning(SESSION_EXPIRED);
        true
    }

    /// Re-checks the stored session against the allow-list, refreshing its
    /// credentials if they ran out. Any failure signs the admin out.
    pub async fn restore_session<P: IdentityProvider>(
        &mut self,
        provider: &P,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let Some(stored) = self.session.take() else {
            return Err(AuthError::Expired);
        };
        match admin::restore(provider, &self.settings.admin_emails, stored, now).await {
            Ok(session) => {
                self.session = Some(session);
                Ok(())
            }
            Err(err) => {
                log::warn!("admin session not restored: {err}");
                self.admin = false;
                Err(err)
            }
        }
    }

    /// Forgets the admin session and turns edit affordances off.
    pub fn logout(&mut self) {
        if let Some(session) = self.session.take() {
            log::info!("admin session closed for {}", session.email);
        }
        self.admin = false;
    }

    pub fn is_field_in_edit(&self, field_name: &str) -> bool {
        self.fields_in_edit.contains(field_name)
    }

    pub(crate) fn mark_in_edit(&mut self, field_name: &str) {
        self.fields_in_edit.insert(field_name.to_string());
    }

    pub(crate) fn clear_in_edit(&mut self, field_name: &str) {
        self.fields_in_edit.remove(field_name);
    }
}
