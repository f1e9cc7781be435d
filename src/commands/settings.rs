use crate::page::registry::DEFAULT_LONG_TEXT_THRESHOLD;
use crate::storage::local::DEFAULT_QUOTA_BYTES;
use crate::storage::remote::DEFAULT_PHOTO_KEY;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SETTINGS_SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSettings {
    pub region: String,
    pub identity_pool_id: String,
    pub user_pool_id: String,
    pub client_id: String,
    pub bucket: String,
    pub table: String,
    pub photo_key: String,
    pub presign_ttl_secs: u64,
    /// 0 disables the ceiling.
    pub request_timeout_secs: u64,
}

impl RemoteSettings {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub schema_version: i64,
    pub namespace: String,
    pub admin_query_param: String,
    pub long_text_threshold: usize,
    pub blur_grace_ms: u64,
    pub quota_bytes: u64,
    pub keep_empty_categories: bool,
    pub default_tag_category: String,
    pub photo_slot: String,
    pub admin_emails: Vec<String>,
    pub remote: RemoteSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            schema_version: SETTINGS_SCHEMA_VERSION,
            namespace: "portfolio".to_string(),
            admin_query_param: "admin".to_string(),
            long_text_threshold: DEFAULT_LONG_TEXT_THRESHOLD,
            blur_grace_ms: 150,
            quota_bytes: DEFAULT_QUOTA_BYTES,
            keep_empty_categories: true,
            default_tag_category: "General".to_string(),
            photo_slot: "profile-photo".to_string(),
            admin_emails: Vec::new(),
            remote: RemoteSettings {
                region: "us-east-1".to_string(),
                identity_pool_id: String::new(),
                user_pool_id: String::new(),
                client_id: String::new(),
                bucket: String::new(),
                table: "PortfolioContent".to_string(),
                photo_key: DEFAULT_PHOTO_KEY.to_string(),
                presign_ttl_secs: 3600,
                request_timeout_secs: 30,
            },
        }
    }
}

impl Settings {
    pub fn blur_grace(&self) -> Duration {
        Duration::from_millis(self.blur_grace_ms)
    }
}

pub fn load_settings(dir: &str) -> Result<Settings, String> {
    let value = load_settings_from_disk(dir)?;
    serde_json::from_value(value).map_err(|e| format!("Invalid settings.json: {e}"))
}

pub fn save_settings(dir: &str, settings: Value) -> Result<Settings, String> {
    let value = save_settings_to_disk(dir, settings)?;
    serde_json::from_value(value).map_err(|e| format!("Invalid settings.json: {e}"))
}

pub fn load_settings_from_disk(dir: &str) -> Result<Value, String> {
    let path = settings_path(dir);
    ensure_settings_dir(dir)?;

    let original = if path.exists() {
        let raw = fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read settings.json: {e}"))?;
        serde_json::from_str::<Value>(&raw).unwrap_or_else(|_| {
            log::warn!("settings.json is not valid JSON, falling back to defaults");
            json!({})
        })
    } else {
        json!({})
    };

    let normalized = normalize_settings(original.clone());
    if normalized != original || !path.exists() {
        write_settings_file(&path, &normalized)?;
    }

    Ok(normalized)
}

pub fn save_settings_to_disk(dir: &str, settings: Value) -> Result<Value, String> {
    let path = settings_path(dir);
    ensure_settings_dir(dir)?;

    let mut merged = load_settings_from_disk(dir).unwrap_or_else(|_| default_settings());
    merge_settings(&mut merged, &settings);

    let normalized = normalize_settings(merged);
    write_settings_file(&path, &normalized)?;
    Ok(normalized)
}

fn settings_path(dir: &str) -> PathBuf {
    Path::new(dir).join(".portfolio").join("settings.json")
}

fn ensure_settings_dir(dir: &str) -> Result<(), String> {
    let dir = Path::new(dir).join(".portfolio");
    fs::create_dir_all(&dir).map_err(|e| format!("Failed to create .portfolio directory: {e}"))
}

fn write_settings_file(path: &Path, settings: &Value) -> Result<(), String> {
    let raw = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {e}"))?;
    fs::write(path, raw).map_err(|e| format!("Failed to write settings.json: {e}"))
}

fn normalize_settings(input: Value) -> Value {
    let defaults = default_settings();
    let mut out = match input {
        Value::Object(map) => Value::Object(map),
        _ => Value::Object(Map::new()),
    };

    deep_merge_defaults(&mut out, &defaults);
    sanitize_settings(&mut out);
    if let Some(obj) = out.as_object_mut() {
        obj.insert("schemaVersion".to_string(), json!(SETTINGS_SCHEMA_VERSION));
    }

    out
}

fn default_settings() -> Value {
    serde_json::to_value(Settings::default()).unwrap_or_else(|_| json!({}))
}

fn deep_merge_defaults(target: &mut Value, defaults: &Value) {
    let (Some(target_obj), Some(default_obj)) = (target.as_object_mut(), defaults.as_object()) else {
        return;
    };

    for (key, default_value) in default_obj {
        match target_obj.get_mut(key) {
            Some(existing) => {
                if existing.is_object() && default_value.is_object() {
                    deep_merge_defaults(existing, default_value);
                }
            }
            None => {
                target_obj.insert(key.clone(), default_value.clone());
            }
        }
    }
}

fn merge_settings(target: &mut Value, incoming: &Value) {
    match (target, incoming) {
        (Value::Object(target_obj), Value::Object(incoming_obj)) => {
            for (key, value) in incoming_obj {
                if let Some(existing) = target_obj.get_mut(key) {
                    merge_settings(existing, value);
                } else {
                    target_obj.insert(key.clone(), value.clone());
                }
            }
        }
        (target_slot, incoming_value) => {
            *target_slot = incoming_value.clone();
        }
    }
}

fn sanitize_settings(settings: &mut Value) {
    let Some(obj) = settings.as_object_mut() else {
        return;
    };

    clamp_u64(obj, "longTextThreshold", 20, 400, DEFAULT_LONG_TEXT_THRESHOLD as u64);
    clamp_u64(obj, "blurGraceMs", 0, 2000, 150);
    clamp_u64(obj, "quotaBytes", 1024, 512 * 1024 * 1024, DEFAULT_QUOTA_BYTES);

    ensure_bool(obj, "keepEmptyCategories", true);
    ensure_identifier(obj, "namespace", "portfolio");
    ensure_identifier(obj, "adminQueryParam", "admin");
    ensure_identifier(obj, "photoSlot", "profile-photo");
    ensure_non_empty(obj, "defaultTagCategory", "General");

    let emails: Vec<Value> = obj
        .get("adminEmails")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(|e| e.trim().to_ascii_lowercase())
                .filter(|e| e.contains('@'))
                .map(Value::String)
                .collect()
        })
        .unwrap_or_default();
    obj.insert("adminEmails".to_string(), Value::Array(emails));

    if let Some(remote) = obj.get_mut("remote").and_then(Value::as_object_mut) {
        clamp_u64(remote, "presignTtlSecs", 60, 7 * 24 * 3600, 3600);
        clamp_u64(remote, "requestTimeoutSecs", 0, 600, 30);
        for key in ["region", "identityPoolId", "userPoolId", "clientId", "bucket", "table", "photoKey"] {
            if !remote.get(key).map(Value::is_string).unwrap_or(false) {
                remote.insert(key.to_string(), json!(""));
            }
        }
        ensure_non_empty(remote, "photoKey", DEFAULT_PHOTO_KEY);
    }
}

fn clamp_u64(map: &mut Map<String, Value>, key: &str, min: u64, max: u64, default: u64) {
    let raw = map.get(key).and_then(Value::as_u64).unwrap_or(default);
    map.insert(key.to_string(), json!(raw.clamp(min, max)));
}

fn ensure_bool(map: &mut Map<String, Value>, key: &str, default: bool) {
    let value = map.get(key).and_then(Value::as_bool).unwrap_or(default);
    map.insert(key.to_string(), json!(value));
}

fn ensure_non_empty(map: &mut Map<String, Value>, key: &str, default: &str) {
    let value = map
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string();
    map.insert(key.to_string(), json!(value));
}

/// Keys end up in storage keys and query strings; keep them to `[A-Za-z0-9_-]`.
fn ensure_identifier(map: &mut Map<String, Value>, key: &str, default: &str) {
    let value = map
        .get(key)
        .and_then(Value::as_str)
        .filter(|v| {
            !v.is_empty()
                && v.chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        })
        .unwrap_or(default)
        .to_string();
    map.insert(key.to_string(), json!(value));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_missing_keys_and_stamps_the_version() {
        let normalized = normalize_settings(json!({
            "adminEmails": [" Admin@Example.com ", "not-an-email"],
            "remote": { "bucket": "my-portfolio" }
        }));

        assert_eq!(normalized["adminEmails"], json!(["admin@example.com"]));
        assert_eq!(normalized["remote"]["bucket"], json!("my-portfolio"));
        assert_eq!(normalized["remote"]["table"], json!("PortfolioContent"));
        assert_eq!(normalized["namespace"], json!("portfolio"));
        assert_eq!(normalized["schemaVersion"], json!(SETTINGS_SCHEMA_VERSION));
    }

    #[test]
    fn sanitizes_out_of_range_values() {
        let normalized = normalize_settings(json!({
            "schemaVersion": 1,
            "longTextThreshold": 5,
            "namespace": "bad key!",
            "remote": { "requestTimeoutSecs": 100000, "photoKey": "" }
        }));

        assert_eq!(normalized["longTextThreshold"], json!(20));
        assert_eq!(normalized["namespace"], json!("portfolio"));
        assert_eq!(normalized["remote"]["requestTimeoutSecs"], json!(600));
        assert_eq!(normalized["remote"]["photoKey"], json!(DEFAULT_PHOTO_KEY));
    }

    #[test]
    fn merges_partial_settings_without_losing_existing_values() {
        let mut existing = default_settings();
        merge_settings(&mut existing, &json!({ "remote": { "bucket": "b" } }));
        let settings: Settings = serde_json::from_value(normalize_settings(existing)).unwrap();

        assert_eq!(settings.remote.bucket, "b");
        assert_eq!(settings.remote.table, "PortfolioContent");
        assert_eq!(settings.long_text_threshold, 60);
    }

    #[test]
    fn defaults_deserialize() {
        let settings = Settings::default();
        assert_eq!(settings.namespace, "portfolio");
        assert_eq!(settings.remote.request_timeout(), Some(Duration::from_secs(30)));
    }
}
