use crate::commands::settings::Settings;
use crate::models::asset::AssetLocator;
use crate::models::field::ContentMap;
use crate::models::metrics::MetricsRecord;
use crate::storage::{
    check_image_type, is_reserved_field, reject_reserved, Backend, BoxFuture, StorageError,
    METRICS_FIELD, PHOTO_ITEM_FIELD,
};
use base64::Engine;
use rusqlite::{params, Connection, OptionalExtension, Result};
use std::path::Path;

const DB_SCHEMA_VERSION: i64 = 1;

/// Browsers typically grant an origin about 5 MiB.
pub const DEFAULT_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;

    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        apply_migration_1(conn)?;
        conn.pragma_update(None, "user_version", DB_SCHEMA_VERSION)?;
    }

    Ok(())
}

fn apply_migration_1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS items (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL DEFAULT 0
        );
        ",
    )
}

/// Synchronous string key/value store with a byte quota, the shape of
/// browser `localStorage`.
pub struct LocalStore {
    conn: Connection,
    quota_bytes: u64,
}

impl LocalStore {
    pub fn open(path: &Path, quota_bytes: u64) -> Result<Self> {
        let conn = Connection::open(path)?;
        initialize_schema(&conn)?;
        Ok(LocalStore { conn, quota_bytes })
    }

    pub fn open_in_memory(quota_bytes: u64) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(LocalStore { conn, quota_bytes })
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM items WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
    }

    /// Bytes held by every item except `exclude`.
    fn used_bytes_excluding(&self, exclude: &str) -> Result<u64> {
        let used: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(length(CAST(key AS BLOB)) + length(CAST(value AS BLOB))), 0)
             FROM items WHERE key != ?1",
            params![exclude],
            |row| row.get(0),
        )?;
        Ok(used.max(0) as u64)
    }

    pub fn used_bytes(&self) -> Result<u64> {
        self.used_bytes_excluding("")
    }

    /// Upserts one item, refusing writes that would exceed the quota.
    pub fn set_item(&self, key: &str, value: &str) -> std::result::Result<(), StorageError> {
        let used = self.used_bytes_excluding(key)?;
        let needed = (key.len() + value.len()) as u64;
        if used + needed > self.quota_bytes {
            return Err(StorageError::QuotaExceeded {
                key: key.to_string(),
                needed,
                available: self.quota_bytes.saturating_sub(used),
            });
        }

        let now = chrono::Utc::now().timestamp();
        self.conn.execute(
            "INSERT INTO items (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    /// Items whose key starts with `prefix`, ordered by key.
    pub fn items_with_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, value FROM items WHERE substr(key, 1, ?2) = ?1 ORDER BY key ASC",
        )?;
        let items = stmt
            .query_map(params![prefix, prefix.chars().count() as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(items)
    }
}

/// [`Backend`] over a [`LocalStore`], keys namespaced as `<namespace>_<field>`.
pub struct LocalBackend {
    store: LocalStore,
    namespace: String,
}

impl LocalBackend {
    pub fn new(store: LocalStore, namespace: &str) -> Self {
        LocalBackend {
            store,
            namespace: namespace.to_string(),
        }
    }

    /// File-backed store with the quota and namespace from settings.
    pub fn open(path: &Path, settings: &Settings) -> std::result::Result<Self, StorageError> {
        let store = LocalStore::open(path, settings.quota_bytes)?;
        Ok(LocalBackend::new(store, &settings.namespace))
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn item_key(&self, field_name: &str) -> String {
        format!("{}_{field_name}", self.namespace)
    }

    fn get_all_sync(&self) -> std::result::Result<ContentMap, StorageError> {
        let prefix = format!("{}_", self.namespace);
        let fields = self
            .store
            .items_with_prefix(&prefix)?
            .into_iter()
            .filter_map(|(key, value)| {
                let field = key[prefix.len()..].to_string();
                (!is_reserved_field(&field)).then_some((field, value))
            })
            .collect();
        Ok(fields)
    }

    fn put_batch_sync(&self, fields: &ContentMap) -> std::result::Result<(), StorageError> {
        reject_reserved(fields.keys())?;
        let total = fields.len();
        for (committed, (field, content)) in fields.iter().enumerate() {
            if let Err(err) = self.store.set_item(&self.item_key(field), content) {
                return Err(StorageError::PartialBatch {
                    committed,
                    total,
                    source: Box::new(err),
                });
            }
        }
        Ok(())
    }

    fn put_asset_sync(
        &self,
        bytes: &[u8],
        content_type: &str,
    ) -> std::result::Result<AssetLocator, StorageError> {
        check_image_type(content_type)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        let data_url = format!("data:{content_type};base64,{encoded}");
        self.store.set_item(&self.item_key(PHOTO_ITEM_FIELD), &data_url)?;
        Ok(AssetLocator::DataUrl(data_url))
    }

    fn load_metrics_sync(&self) -> std::result::Result<Option<MetricsRecord>, StorageError> {
        match self.store.get_item(METRICS_FIELD)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

impl Backend for LocalBackend {
    fn describe(&self) -> String {
        format!("local store ({})", self.namespace)
    }

    fn get_all(&self) -> BoxFuture<'_, std::result::Result<ContentMap, StorageError>> {
        Box::pin(std::future::ready(self.get_all_sync()))
    }

    fn put<'a>(
        &'a self,
        field_name: &'a str,
        content: &'a str,
    ) -> BoxFuture<'a, std::result::Result<(), StorageError>> {
        let result = if is_reserved_field(field_name) {
            Err(StorageError::ReservedField(field_name.to_string()))
        } else {
            self.store.set_item(&self.item_key(field_name), content)
        };
        Box::pin(std::future::ready(result))
    }

    fn put_batch<'a>(
        &'a self,
        fields: &'a ContentMap,
    ) -> BoxFuture<'a, std::result::Result<(), StorageError>> {
        Box::pin(std::future::ready(self.put_batch_sync(fields)))
    }

    fn put_asset<'a>(
        &'a self,
        bytes: &'a [u8],
        content_type: &'a str,
    ) -> BoxFuture<'a, std::result::Result<AssetLocator, StorageError>> {
        Box::pin(async move { self.put_asset_sync(bytes, content_type) })
    }

    fn asset_locator(&self) -> BoxFuture<'_, std::result::Result<Option<AssetLocator>, StorageError>> {
        let result = self
            .store
            .get_item(&self.item_key(PHOTO_ITEM_FIELD))
            .map(|item| item.map(AssetLocator::DataUrl))
            .map_err(StorageError::from);
        Box::pin(std::future::ready(result))
    }

    fn load_metrics(&self) -> BoxFuture<'_, std::result::Result<Option<MetricsRecord>, StorageError>> {
        Box::pin(std::future::ready(self.load_metrics_sync()))
    }

    fn save_metrics<'a>(
        &'a self,
        metrics: &'a MetricsRecord,
    ) -> BoxFuture<'a, std::result::Result<(), StorageError>> {
        let result = serde_json::to_string(metrics)
            .map_err(StorageError::from)
            .and_then(|raw| self.store.set_item(METRICS_FIELD, &raw));
        Box::pin(std::future::ready(result))
    }
}
