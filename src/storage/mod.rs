//! Persistence behind the overlay.
//!
//! Two interchangeable implementations satisfy [`Backend`]:
//!
//! - [`local::LocalBackend`]: synchronous key-value store bounded by a byte
//!   quota, laid out like browser storage (`<namespace>_<field>` keys).
//! - [`remote::RemoteBackend`]: a key-value table plus an object store, reached
//!   asynchronously. Batch writes are chunked to the table's per-request
//!   ceiling and are **not atomic**: when a later chunk fails, earlier chunks
//!   stay written and the failure is reported as [`StorageError::PartialBatch`].
//!
//! Futures are boxed without a `Send` bound; everything runs on the UI thread.

use crate::models::asset::AssetLocator;
use crate::models::field::ContentMap;
use crate::models::metrics::MetricsRecord;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

pub mod local;
pub mod remote;

#[cfg(feature = "aws")]
pub mod aws;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Record name holding the serialized metrics.
pub const METRICS_FIELD: &str = "metricsData";
/// Record name holding the profile photo's object key (remote layout).
pub const PHOTO_KEY_FIELD: &str = "profilePhotoKey";
/// Item suffix holding the profile photo data URL (local layout).
pub const PHOTO_ITEM_FIELD: &str = "profileImage";

/// Names the backends use for their own records. No page field may take one.
pub fn is_reserved_field(field_name: &str) -> bool {
    matches!(field_name, METRICS_FIELD | PHOTO_KEY_FIELD | PHOTO_ITEM_FIELD)
}

/// Fails on the first reserved name, before anything is written.
pub(crate) fn reject_reserved<'a>(
    mut field_names: impl Iterator<Item = &'a String>,
) -> Result<(), StorageError> {
    match field_names.find(|name| is_reserved_field(name)) {
        Some(name) => Err(StorageError::ReservedField(name.clone())),
        None => Ok(()),
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage quota exceeded writing '{key}': {needed} bytes needed, {available} available")]
    QuotaExceeded {
        key: String,
        needed: u64,
        available: u64,
    },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Not authorized: {0}")]
    Auth(String),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Batch write stopped after {committed} of {total} fields: {source}")]
    PartialBatch {
        committed: usize,
        total: usize,
        #[source]
        source: Box<StorageError>,
    },
    #[error("Invalid asset: {0}")]
    InvalidAsset(String),
    #[error("'{0}' is a reserved record name")]
    ReservedField(String),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// True when the failure was the local quota, directly or inside a batch.
    pub fn is_quota_exceeded(&self) -> bool {
        match self {
            StorageError::QuotaExceeded { .. } => true,
            StorageError::PartialBatch { source, .. } => source.is_quota_exceeded(),
            _ => false,
        }
    }
}

/// Persistence contract shared by the local and remote stores.
pub trait Backend {
    /// Short label for log lines.
    fn describe(&self) -> String;

    /// Every persisted field. Reserved records are not included.
    fn get_all(&self) -> BoxFuture<'_, Result<ContentMap, StorageError>>;

    fn put<'a>(&'a self, field_name: &'a str, content: &'a str)
        -> BoxFuture<'a, Result<(), StorageError>>;

    fn put_batch<'a>(&'a self, fields: &'a ContentMap) -> BoxFuture<'a, Result<(), StorageError>>;

    fn put_asset<'a>(
        &'a self,
        bytes: &'a [u8],
        content_type: &'a str,
    ) -> BoxFuture<'a, Result<AssetLocator, StorageError>>;

    fn asset_locator(&self) -> BoxFuture<'_, Result<Option<AssetLocator>, StorageError>>;

    /// `None` when no record was ever saved.
    fn load_metrics(&self) -> BoxFuture<'_, Result<Option<MetricsRecord>, StorageError>>;

    fn save_metrics<'a>(&'a self, metrics: &'a MetricsRecord)
        -> BoxFuture<'a, Result<(), StorageError>>;
}

pub fn check_image_type(content_type: &str) -> Result<(), StorageError> {
    if content_type.starts_with("image/") {
        Ok(())
    } else {
        Err(StorageError::InvalidAsset(format!(
            "expected an image, got '{content_type}'"
        )))
    }
}
