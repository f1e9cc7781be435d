use crate::models::asset::AssetLocator;
use crate::models::field::ContentMap;
use crate::models::metrics::MetricsRecord;
use crate::storage::{
    check_image_type, is_reserved_field, reject_reserved, Backend, BoxFuture, StorageError,
    METRICS_FIELD, PHOTO_KEY_FIELD,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Per-request item ceiling of the content table's batch write.
pub const MAX_BATCH_ITEMS: usize = 25;

pub const DEFAULT_PHOTO_KEY: &str = "profile/profile.jpg";
pub const DEFAULT_PRESIGN_TTL: Duration = Duration::from_secs(60 * 60);

/// One row of the content table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    pub field_name: String,
    pub content: String,
    pub updated_at: String,
}

impl ContentRecord {
    pub fn now(field_name: &str, content: &str) -> Self {
        ContentRecord {
            field_name: field_name.to_string(),
            content: content.to_string(),
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Remote key/value table keyed by `fieldName`.
pub trait ContentTable {
    fn scan(&self) -> BoxFuture<'_, Result<Vec<ContentRecord>, StorageError>>;

    fn get_record<'a>(
        &'a self,
        field_name: &'a str,
    ) -> BoxFuture<'a, Result<Option<ContentRecord>, StorageError>>;

    fn put_record(&self, record: ContentRecord) -> BoxFuture<'_, Result<(), StorageError>>;

    /// One underlying request; callers never pass more than [`MAX_BATCH_ITEMS`].
    fn batch_put(&self, records: Vec<ContentRecord>) -> BoxFuture<'_, Result<(), StorageError>>;
}

/// Remote blob storage with time-limited retrieval URLs.
pub trait ObjectStore {
    fn put_object<'a>(
        &'a self,
        key: &'a str,
        bytes: &'a [u8],
        content_type: &'a str,
    ) -> BoxFuture<'a, Result<(), StorageError>>;

    fn presign_get<'a>(
        &'a self,
        key: &'a str,
        ttl: Duration,
    ) -> BoxFuture<'a, Result<String, StorageError>>;
}

pub struct RemoteBackend<T, O> {
    table: T,
    objects: O,
    photo_key: String,
    presign_ttl: Duration,
    request_timeout: Option<Duration>,
}

impl<T: ContentTable, O: ObjectStore> RemoteBackend<T, O> {
    pub fn new(table: T, objects: O) -> Self {
        RemoteBackend {
            table,
            objects,
            photo_key: DEFAULT_PHOTO_KEY.to_string(),
            presign_ttl: DEFAULT_PRESIGN_TTL,
            request_timeout: None,
        }
    }

    pub fn with_photo_key(mut self, key: &str) -> Self {
        self.photo_key = key.to_string();
        self
    }

    pub fn with_presign_ttl(mut self, ttl: Duration) -> Self {
        self.presign_ttl = ttl;
        self
    }

    /// `None` waits on requests indefinitely.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    pub fn objects(&self) -> &O {
        &self.objects
    }

    async fn bounded<R, F>(&self, request: F) -> Result<R, StorageError>
    where
        F: Future<Output = Result<R, StorageError>>,
    {
        match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .map_err(|_| StorageError::Timeout(limit))?,
            None => request.await,
        }
    }

    async fn get_all_inner(&self) -> Result<ContentMap, StorageError> {
        let records = self.bounded(self.table.scan()).await?;
        Ok(records
            .into_iter()
            .filter(|r| !is_reserved_field(&r.field_name))
            .map(|r| (r.field_name, r.content))
            .collect())
    }

    async fn put_inner(&self, field_name: &str, content: &str) -> Result<(), StorageError> {
        if is_reserved_field(field_name) {
            return Err(StorageError::ReservedField(field_name.to_string()));
        }
        self.bounded(self.table.put_record(ContentRecord::now(field_name, content)))
            .await
    }

    async fn put_batch_inner(&self, fields: &ContentMap) -> Result<(), StorageError> {
        reject_reserved(fields.keys())?;
        let records: Vec<ContentRecord> = fields
            .iter()
            .map(|(name, content)| ContentRecord::now(name, content))
            .collect();
        let total = records.len();
        let mut committed = 0;

        for chunk in records.chunks(MAX_BATCH_ITEMS) {
            if let Err(err) = self.bounded(self.table.batch_put(chunk.to_vec())).await {
                log::warn!("batch write failed after {committed}/{total} fields: {err}");
                return Err(StorageError::PartialBatch {
                    committed,
                    total,
                    source: Box::new(err),
                });
            }
            committed += chunk.len();
        }

        Ok(())
    }

    async fn put_asset_inner(
        &self,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<AssetLocator, StorageError> {
        check_image_type(content_type)?;
        self.bounded(self.objects.put_object(&self.photo_key, bytes, content_type))
            .await?;
        self.bounded(
            self.table
                .put_record(ContentRecord::now(PHOTO_KEY_FIELD, &self.photo_key)),
        )
        .await?;
        let url = self
            .bounded(self.objects.presign_get(&self.photo_key, self.presign_ttl))
            .await?;
        Ok(AssetLocator::ObjectKey {
            key: self.photo_key.clone(),
            url,
        })
    }

    async fn asset_locator_inner(&self) -> Result<Option<AssetLocator>, StorageError> {
        let Some(record) = self.bounded(self.table.get_record(PHOTO_KEY_FIELD)).await? else {
            return Ok(None);
        };
        let url = self
            .bounded(self.objects.presign_get(&record.content, self.presign_ttl))
            .await?;
        Ok(Some(AssetLocator::ObjectKey {
            key: record.content,
            url,
        }))
    }

    async fn load_metrics_inner(&self) -> Result<Option<MetricsRecord>, StorageError> {
        match self.bounded(self.table.get_record(METRICS_FIELD)).await? {
            Some(record) => Ok(Some(serde_json::from_str(&record.content)?)),
            None => Ok(None),
        }
    }

    async fn save_metrics_inner(&self, metrics: &MetricsRecord) -> Result<(), StorageError> {
        let raw = serde_json::to_string(metrics)?;
        self.bounded(self.table.put_record(ContentRecord::now(METRICS_FIELD, &raw)))
            .await
    }
}

impl<T: ContentTable, O: ObjectStore> Backend for RemoteBackend<T, O> {
    fn describe(&self) -> String {
        "remote content table".to_string()
    }

    fn get_all(&self) -> BoxFuture<'_, Result<ContentMap, StorageError>> {
        Box::pin(self.get_all_inner())
    }

    fn put<'a>(
        &'a self,
        field_name: &'a str,
        content: &'a str,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(self.put_inner(field_name, content))
    }

    fn put_batch<'a>(&'a self, fields: &'a ContentMap) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(self.put_batch_inner(fields))
    }

    fn put_asset<'a>(
        &'a self,
        bytes: &'a [u8],
        content_type: &'a str,
    ) -> BoxFuture<'a, Result<AssetLocator, StorageError>> {
        Box::pin(self.put_asset_inner(bytes, content_type))
    }

    fn asset_locator(&self) -> BoxFuture<'_, Result<Option<AssetLocator>, StorageError>> {
        Box::pin(self.asset_locator_inner())
    }

    fn load_metrics(&self) -> BoxFuture<'_, Result<Option<MetricsRecord>, StorageError>> {
        Box::pin(self.load_metrics_inner())
    }

    fn save_metrics<'a>(
        &'a self,
        metrics: &'a MetricsRecord,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(self.save_metrics_inner(metrics))
    }
}
