use crate::models::field::ContentMap;
use crate::models::metrics::MetricsRecord;
use serde::{Deserialize, Serialize};

/// Manual backup of everything the overlay persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub exported_at: String,
    pub fields: ContentMap,
    pub metrics: MetricsRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_photo: Option<String>,
}
