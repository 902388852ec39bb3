//! Shared value types for list and document operations

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Base fields every list item carries. Callers normally deserialize into
/// their own richer types; this is the minimal shape for probes and tests.
#[derive(Debug, Clone, Deserialize)]
pub struct ListItem {
    #[serde(rename = "Id")]
    pub id: u32,
    #[serde(rename = "Title", default)]
    pub title: Option<String>,
    #[serde(rename = "Created", default)]
    pub created: Option<String>,
    #[serde(rename = "Modified", default)]
    pub modified: Option<String>,
}

/// Outcome of a multi-item operation where items succeed or fail
/// independently. `success` is true only when `errors` is empty.
#[derive(Debug, Clone)]
pub struct BatchResult<T> {
    pub success: bool,
    pub results: Vec<T>,
    pub errors: Vec<BatchError>,
}

/// A single failed item within a batch, keyed by its position in the input.
#[derive(Debug, Clone)]
pub struct BatchError {
    pub index: usize,
    pub error: String,
    pub status_code: Option<u16>,
}

/// One page of items plus a look-ahead flag.
#[derive(Debug, Clone)]
pub struct PaginationResult<T> {
    pub items: Vec<T>,
    pub has_more: bool,
    /// Skip value for the next page; only set when `has_more` is true.
    pub next_skip: Option<u32>,
}

/// A single update within a `batch_update` call.
#[derive(Debug, Clone)]
pub struct ItemUpdate {
    pub id: u32,
    /// Only the fields present here are sent (partial-update semantics).
    pub data: Value,
}

/// Options for file uploads.
#[derive(Debug, Clone)]
pub struct FileUploadOptions {
    /// Destination folder path within the library; created when missing.
    pub folder_path: Option<String>,
    pub overwrite: bool,
    /// Metadata fields to merge onto the uploaded file's list item.
    pub metadata: Option<Value>,
}

impl Default for FileUploadOptions {
    fn default() -> Self {
        Self {
            folder_path: None,
            overwrite: true,
            metadata: None,
        }
    }
}

/// One file in an `upload_multiple_files` call.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub data: Vec<u8>,
    pub file_name: String,
    /// Overrides the folder from the shared options when set.
    pub folder_path: Option<String>,
}

/// Per-file outcome of a multi-file upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub success: bool,
    pub file: String,
    pub result: Option<DocumentFile>,
    pub error: Option<String>,
}

/// A downloaded file with its raw content.
#[derive(Debug)]
pub struct FileDownload {
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
    pub content: Vec<u8>,
}

/// A file entry in a document library, using the verbose-OData field names.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentFile {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ServerRelativeUrl")]
    pub server_relative_url: String,
    #[serde(rename = "TimeCreated", default)]
    pub time_created: Option<String>,
    #[serde(rename = "TimeLastModified", default)]
    pub time_last_modified: Option<String>,
    /// Verbose mode reports `Length` as a string; newer endpoints as a number.
    #[serde(rename = "Length", default, deserialize_with = "string_or_u64")]
    pub length: Option<u64>,
    /// The backing list item, when expanded.
    #[serde(rename = "ListItemAllFields", default)]
    pub list_item: Option<Value>,
}

fn string_or_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s.parse().ok(),
        Some(Value::Number(n)) => n.as_u64(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_file_accepts_string_length() {
        let file: DocumentFile = serde_json::from_value(json!({
            "Name": "report.pdf",
            "ServerRelativeUrl": "/Documents/report.pdf",
            "Length": "2048"
        }))
        .unwrap();
        assert_eq!(file.length, Some(2048));
    }

    #[test]
    fn document_file_accepts_numeric_length() {
        let file: DocumentFile = serde_json::from_value(json!({
            "Name": "report.pdf",
            "ServerRelativeUrl": "/Documents/report.pdf",
            "Length": 2048
        }))
        .unwrap();
        assert_eq!(file.length, Some(2048));
    }

    #[test]
    fn list_item_decodes_platform_field_names() {
        let item: ListItem = serde_json::from_value(json!({
            "Id": 7,
            "Title": "JOB-2025-001",
            "Created": "2025-01-02T03:04:05Z",
            "Modified": "2025-01-03T03:04:05Z"
        }))
        .unwrap();
        assert_eq!(item.id, 7);
        assert_eq!(item.title.as_deref(), Some("JOB-2025-001"));
    }
}
