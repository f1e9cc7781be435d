use serde::{Deserialize, Serialize};

/// Where the profile photo lives once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetLocator {
    /// Inline `data:` URL kept in the local store.
    DataUrl(String),
    /// Object-store key plus a time-limited retrieval URL.
    ObjectKey { key: String, url: String },
}

impl AssetLocator {
    /// Value to put in an `<img src>`.
    pub fn src(&self) -> &str {
        match self {
            AssetLocator::DataUrl(url) => url,
            AssetLocator::ObjectKey { url, .. } => url,
        }
    }
}
