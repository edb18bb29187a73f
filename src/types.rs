//! Wire types exchanged with the upload endpoint.
//!
//! Covers only the fields the upload engine itself produces or consumes; the
//! full Drive object model (permissions, revisions, sharing metadata, and so
//! on) belongs to the multi-backend storage abstraction this crate does not
//! implement.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Object metadata submitted with the session-init request.
///
/// Serializes as the unwrapped JSON body of the session-init request: no
/// outer `{"data": ...}` envelope.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    /// Object name.
    pub name: String,

    /// Parent folder IDs, when creating a new object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parents: Option<Vec<String>>,

    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Custom properties.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, String>>,
}

/// Terminal-chunk response payload, decoded into [`crate::session::UploadSession::result`]
/// once the server returns 200/201.
///
/// Field selection matches [`crate::config::DEFAULT_FIELDS`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedObject {
    /// Object ID assigned by the server.
    pub id: String,

    /// Object name.
    pub name: String,

    /// MIME type as stored by the server.
    #[serde(default)]
    pub mime_type: String,

    /// Final size in bytes, as a decimal string (matches the wire format of
    /// the upstream API, which represents 64-bit sizes as JSON strings).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    /// Content hash, when the server computes and returns one. This crate
    /// never computes or verifies this itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5_checksum: Option<String>,

    /// Last-modified timestamp, RFC 3339.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,

    /// Parent folder IDs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parents: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_metadata_serializes_without_data_wrapper() {
        let metadata = ObjectMetadata {
            name: "large_file.bin".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert!(json.get("data").is_none());
        assert_eq!(json["name"], "large_file.bin");
    }

    #[test]
    fn uploaded_object_round_trips() {
        let raw = r#"{
            "id": "1abc",
            "name": "large_file.bin",
            "mimeType": "application/octet-stream",
            "size": "786432"
        }"#;
        let decoded: UploadedObject = serde_json::from_str(raw).unwrap();
        assert_eq!(decoded.id, "1abc");
        assert_eq!(decoded.size.as_deref(), Some("786432"));
    }
}
