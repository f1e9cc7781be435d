use crate::models::asset::AssetLocator;
use crate::state::AppState;
use crate::storage::{check_image_type, Backend, StorageError};
use base64::Engine;

/// Stores a new profile photo and shows it in every photo slot. Only
/// available in admin mode.
pub async fn upload_photo<B: Backend>(
    state: &mut AppState<B>,
    bytes: &[u8],
    content_type: &str,
) -> Result<AssetLocator, StorageError> {
    if !state.can_edit() {
        return Err(StorageError::Auth("admin mode is off".to_string()));
    }
    if let Err(err) = check_image_type(content_type) {
        state.notices.error("Please choose an image file.");
        return Err(err);
    }

    match state.backend.put_asset(bytes, content_type).await {
        Ok(locator) => {
            let slots = state.registry.apply_photo(&mut state.page, locator.src());
            log::info!(
                "profile photo stored ({} bytes) and shown in {slots} slots",
                bytes.len()
            );
            state.notices.success("Profile photo updated.");
            Ok(locator)
        }
        Err(err) => {
            if err.is_quota_exceeded() {
                state.notices.storage_failure(&err);
            } else {
                log::error!("photo upload: {err}");
                state.notices.error(format!("Failed to upload profile photo: {err}"));
            }
            Err(err)
        }
    }
}

/// Splits a base64 `data:` URL into its content type and bytes.
pub fn decode_data_url(url: &str) -> Result<(String, Vec<u8>), StorageError> {
    let invalid = || StorageError::InvalidAsset("not a base64 data URL".to_string());
    let rest = url.strip_prefix("data:").ok_or_else(invalid)?;
    let (meta, payload) = rest.split_once(',').ok_or_else(invalid)?;
    let content_type = meta.strip_suffix(";base64").ok_or_else(invalid)?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| StorageError::InvalidAsset(e.to_string()))?;
    Ok((content_type.to_string(), bytes))
}
