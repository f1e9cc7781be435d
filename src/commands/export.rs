use crate::commands::photo::decode_data_url;
use crate::models::export::ExportDocument;
use crate::models::field::ContentMap;
use crate::models::metrics::ValidationError;
use crate::state::AppState;
use crate::storage::{is_reserved_field, Backend, StorageError};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Invalid export file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid metrics in export file: {0}")]
    Metrics(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Snapshot of everything persisted through the active backend.
pub async fn export_content<B: Backend>(
    state: &AppState<B>,
    now: DateTime<Utc>,
) -> Result<ExportDocument, StorageError> {
    let fields = state.backend.get_all().await?;
    let metrics = state.backend.load_metrics().await?.unwrap_or_default();
    let profile_photo = state
        .backend
        .asset_locator()
        .await?
        .map(|locator| locator.src().to_string());

    Ok(ExportDocument {
        exported_at: now.to_rfc3339(),
        fields,
        metrics,
        profile_photo,
    })
}

/// File name and pretty JSON body for the download.
pub fn to_download(doc: &ExportDocument, now: DateTime<Utc>) -> Result<(String, String), serde_json::Error> {
    let name = format!("portfolio-content-{}.json", now.format("%Y-%m-%d"));
    Ok((name, serde_json::to_string_pretty(doc)?))
}

/// Restores an export into the active backend and the page. Metrics are
/// validated before anything is written. Only data-URL photos are restored;
/// a remote photo URL expires and is skipped.
pub async fn import_content<B: Backend>(
    state: &mut AppState<B>,
    raw: &str,
) -> Result<usize, ImportError> {
    let doc: ExportDocument = serde_json::from_str(raw)?;
    doc.metrics.validate()?;

    let fields: ContentMap = doc
        .fields
        .into_iter()
        .filter(|(name, _)| !is_reserved_field(name))
        .collect();

    state.backend.put_batch(&fields).await?;
    for (field_name, content) in &fields {
        state.registry.apply(&mut state.page, field_name, content);
    }

    state.backend.save_metrics(&doc.metrics).await?;
    state.metrics = doc.metrics;

    if let Some(url) = doc.profile_photo.filter(|u| u.starts_with("data:")) {
        let (content_type, bytes) = decode_data_url(&url)?;
        let locator = state.backend.put_asset(&bytes, &content_type).await?;
        state.registry.apply_photo(&mut state.page, locator.src());
    }

    log::info!("imported {} fields into {}", fields.len(), state.backend.describe());
    state.notices.success("Content imported.");
    Ok(fields.len())
}
