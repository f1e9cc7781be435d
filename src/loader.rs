//! Startup pass that overlays persisted content on the static page.
//!
//! Fields, metrics and the photo load independently. A failure in one is
//! logged, raises a non-blocking notice and never stops the others; the page
//! keeps its static defaults for whatever failed.

use crate::models::metrics::MetricsRecord;
use crate::notice::{LOAD_FAILED, METRICS_LOAD_FAILED, PHOTO_LOAD_FAILED};
use crate::state::AppState;
use crate::storage::Backend;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Stored fields written to at least one element.
    pub applied: usize,
    /// Stored fields with no element on this page.
    pub unmatched: Vec<String>,
    pub metrics_loaded: bool,
    pub photo_slots: usize,
    pub errors: Vec<String>,
}

pub async fn load<B: Backend>(state: &mut AppState<B>) -> LoadReport {
    let mut report = LoadReport::default();
    let source = state.backend.describe();

    match state.backend.get_all().await {
        Ok(fields) => {
            for (field_name, content) in &fields {
                if state.registry.apply(&mut state.page, field_name, content) > 0 {
                    report.applied += 1;
                } else {
                    report.unmatched.push(field_name.clone());
                }
            }
            log::info!("applied {} stored fields from {source}", report.applied);
            if !report.unmatched.is_empty() {
                log::debug!("no element for stored fields: {:?}", report.unmatched);
            }
        }
        Err(err) => {
            log::error!("loading fields from {source}: {err}");
            state.notices.error(LOAD_FAILED);
            report.errors.push(err.to_string());
        }
    }

    match state.backend.load_metrics().await {
        Ok(Some(metrics)) => match metrics.validate() {
            Ok(()) => {
                state.metrics = metrics;
                report.metrics_loaded = true;
            }
            Err(err) => {
                log::warn!("stored metrics ignored: {err}");
                state.metrics = MetricsRecord::default();
                state.notices.warning(METRICS_LOAD_FAILED);
                report.errors.push(err.to_string());
            }
        },
        Ok(None) => state.metrics = MetricsRecord::default(),
        Err(err) => {
            log::warn!("loading metrics from {source}: {err}");
            state.metrics = MetricsRecord::default();
            state.notices.warning(METRICS_LOAD_FAILED);
            report.errors.push(err.to_string());
        }
    }

    match state.backend.asset_locator().await {
        Ok(Some(locator)) => {
            report.photo_slots = state.registry.apply_photo(&mut state.page, locator.src());
        }
        Ok(None) => {}
        Err(err) => {
            log::warn!("resolving profile photo from {source}: {err}");
            state.notices.warning(PHOTO_LOAD_FAILED);
            report.errors.push(err.to_string());
        }
    }

    report
}
