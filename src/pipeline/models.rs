use serde::{Deserialize, Serialize};

/// One inbound call. Field names follow the JSON the add-in already sends.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct FetchRequest {
    #[serde(alias = "containerName")]
    pub namespace: String,
    #[serde(rename = "ewsUrl")]
    pub server_endpoint: String,
    #[serde(rename = "attachmentToken")]
    pub access_credential: String,
    #[serde(rename = "upload", default)]
    pub upload_enabled: bool,
    #[serde(rename = "attachments")]
    pub items: Vec<AttachmentRef>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    #[serde(rename = "id")]
    pub external_id: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoredAttachmentResult {
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(rename = "hash")]
    pub content_hash: String,
    pub storage_key: String,
    #[serde(rename = "url")]
    pub location_uri: String,
    #[serde(rename = "sasToken")]
    pub access_descriptor: String,
}

/// An attachment id whose fetch was voided without failing the batch.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub id: String,
    pub reason: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    #[serde(rename = "attachmentsProcessed")]
    pub processed_count: usize,
    #[serde(rename = "attachmentProcessingDetails")]
    pub results: Vec<StoredAttachmentResult>,
    #[serde(default)]
    pub skipped: Vec<SkippedItem>,
    #[serde(default)]
    pub error_flag: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}
