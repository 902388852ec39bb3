//! File and folder operations against a document library
//!
//! [`DocumentService`] addresses files and folders by server-relative URL
//! (`GetFolderByServerRelativeUrl` / `GetFileByServerRelativeUrl`) and keeps
//! the library's list-item metadata in sync after uploads.

use std::sync::Arc;

use log::{debug, warn};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use serde_json::{json, Value};

use crate::client::SharePointClient;
use crate::error::{ApiError, Result};
use crate::models::{DocumentFile, FileDownload, FileUpload, FileUploadOptions, UploadOutcome};
use crate::query::QueryOptions;

/// Service for one document library.
pub struct DocumentService {
    client: Arc<SharePointClient>,
    library_name: String,
}

impl DocumentService {
    pub fn new(client: Arc<SharePointClient>, library_name: impl Into<String>) -> Self {
        Self {
            client,
            library_name: library_name.into(),
        }
    }

    pub fn library_name(&self) -> &str {
        &self.library_name
    }

    /// Upload a file, creating the destination folder path when missing and
    /// merging metadata onto the backing list item when supplied.
    pub async fn upload_file(
        &self,
        data: &[u8],
        file_name: &str,
        options: &FileUploadOptions,
    ) -> Result<DocumentFile> {
        if let Some(folder) = options.folder_path.as_deref() {
            self.ensure_folder_path(folder).await?;
        }

        let endpoint = format!(
            "{}/Files/add(url='{}',overwrite={})",
            self.folder_endpoint(options.folder_path.as_deref()),
            escape_quotes(file_name),
            options.overwrite
        );
        let value = self
            .client
            .upload(&endpoint, data, file_name)
            .await
            .map_err(|e| e.with_context(&format!("Failed to upload file '{file_name}'")))?;
        let file: DocumentFile = decode(value)?;

        if let Some(metadata) = &options.metadata {
            self.update_file_metadata(file_name, metadata.clone(), options.folder_path.as_deref())
                .await?;
        }

        Ok(file)
    }

    /// Upload several files, reporting per-file outcomes instead of aborting
    /// on the first failure. Sequential to avoid tripping throttling.
    pub async fn upload_multiple_files(
        &self,
        files: Vec<FileUpload>,
        options: &FileUploadOptions,
    ) -> Vec<UploadOutcome> {
        let mut outcomes = Vec::with_capacity(files.len());

        for file in files {
            let mut file_options = options.clone();
            if file.folder_path.is_some() {
                file_options.folder_path = file.folder_path.clone();
            }

            let outcome = match self
                .upload_file(&file.data, &file.file_name, &file_options)
                .await
            {
                Ok(uploaded) => UploadOutcome {
                    success: true,
                    file: file.file_name,
                    result: Some(uploaded),
                    error: None,
                },
                Err(err) => {
                    warn!("upload of {} failed: {}", file.file_name, err.message);
                    UploadOutcome {
                        success: false,
                        file: file.file_name,
                        result: None,
                        error: Some(err.message),
                    }
                }
            };
            outcomes.push(outcome);
        }

        outcomes
    }

    /// Download a file's content.
    pub async fn download_file(
        &self,
        file_name: &str,
        folder_path: Option<&str>,
    ) -> Result<FileDownload> {
        let endpoint = format!("{}/$value", self.file_endpoint(file_name, folder_path));
        let response = self
            .client
            .download(&endpoint)
            .await
            .map_err(|e| e.with_context(&format!("Failed to download file '{file_name}'")))?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let declared_size = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let content = response.bytes().await?.to_vec();
        Ok(FileDownload {
            file_name: file_name.to_string(),
            content_type,
            size: declared_size.unwrap_or(content.len() as u64),
            content,
        })
    }

    /// Metadata of the list item backing a file.
    pub async fn get_file_metadata(
        &self,
        file_name: &str,
        folder_path: Option<&str>,
    ) -> Result<Value> {
        let endpoint = format!(
            "{}/ListItemAllFields",
            self.file_endpoint(file_name, folder_path)
        );
        self.client
            .get(&endpoint)
            .await
            .map_err(|e| e.with_context(&format!("Failed to get metadata for '{file_name}'")))
    }

    /// Merge metadata fields onto the list item backing a file.
    pub async fn update_file_metadata(
        &self,
        file_name: &str,
        metadata: Value,
        folder_path: Option<&str>,
    ) -> Result<()> {
        let Value::Object(mut fields) = metadata else {
            return Err(ApiError::new(
                "File metadata must be a JSON object",
                None,
                "INVALID_INPUT",
                false,
            ));
        };

        let item = self.get_file_metadata(file_name, folder_path).await?;
        let id = item
            .get("Id")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                ApiError::new(
                    format!("List item for '{file_name}' has no Id"),
                    None,
                    "INVALID_RESPONSE",
                    false,
                )
            })?;

        fields.insert(
            "__metadata".to_string(),
            json!({"type": format!("SP.Data.{}Item", self.library_name)}),
        );
        let endpoint = format!(
            "/_api/web/lists/getbytitle('{}')/items({id})",
            escape_quotes(&self.library_name)
        );
        self.client
            .merge(&endpoint, Value::Object(fields))
            .await
            .map_err(|e| e.with_context(&format!("Failed to update metadata for '{file_name}'")))
    }

    pub async fn delete_file(&self, file_name: &str, folder_path: Option<&str>) -> Result<()> {
        let endpoint = self.file_endpoint(file_name, folder_path);
        self.client
            .delete(&endpoint)
            .await
            .map_err(|e| e.with_context(&format!("Failed to delete file '{file_name}'")))
    }

    /// Whether a file exists. Only 404 maps to `false`.
    pub async fn file_exists(&self, file_name: &str, folder_path: Option<&str>) -> Result<bool> {
        let endpoint = self.file_endpoint(file_name, folder_path);
        match self.client.get(&endpoint).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// List files in a folder. Projects the common file fields and always
    /// expands the backing list item; `filter`, `order_by` and `top` from
    /// the options apply.
    pub async fn list_files(
        &self,
        folder_path: Option<&str>,
        options: Option<&QueryOptions>,
    ) -> Result<Vec<DocumentFile>> {
        let mut query = options.cloned().unwrap_or_default();
        if query.select.is_empty() {
            query.select = ["Name", "ServerRelativeUrl", "Length", "TimeLastModified", "TimeCreated"]
                .map(String::from)
                .to_vec();
        }
        if !query.expand.iter().any(|e| e == "ListItemAllFields") {
            query.expand.push("ListItemAllFields".to_string());
        }

        let endpoint = format!(
            "{}/Files{}",
            self.folder_endpoint(folder_path),
            query.to_query_string()
        );
        let value = self
            .client
            .get(&endpoint)
            .await
            .map_err(|e| e.with_context("Failed to list files"))?;
        parse_results(value)
    }

    /// Create a folder under the library root or a parent folder.
    pub async fn create_folder(&self, name: &str, parent_path: Option<&str>) -> Result<Value> {
        let server_relative = match parent_path {
            Some(parent) => format!("/{}/{}/{}", self.library_name, parent.trim_matches('/'), name),
            None => format!("/{}/{}", self.library_name, name),
        };
        let endpoint = format!("{}/Folders", self.folder_endpoint(parent_path));
        let body = json!({
            "__metadata": {"type": "SP.Folder"},
            "ServerRelativeUrl": server_relative,
        });
        self.client
            .post(&endpoint, Some(body))
            .await
            .map_err(|e| e.with_context(&format!("Failed to create folder '{name}'")))
    }

    /// Create every missing segment of a folder path. Idempotent: existing
    /// segments are skipped, and a 409 from a concurrent creator is ignored.
    pub async fn ensure_folder_path(&self, folder_path: &str) -> Result<()> {
        let mut current = String::new();

        for segment in folder_path.split('/').filter(|s| !s.is_empty()) {
            let parent = (!current.is_empty()).then(|| current.clone());
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(segment);

            if self.folder_exists(&current).await? {
                continue;
            }

            debug!("creating folder segment {current}");
            match self.create_folder(segment, parent.as_deref()).await {
                Ok(_) => {}
                // Another caller created it between the probe and the POST.
                Err(err) if err.status_code == Some(409) => {}
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }

    /// Whether a folder exists. Only 404 maps to `false`.
    pub async fn folder_exists(&self, folder_path: &str) -> Result<bool> {
        match self.client.get(&self.folder_endpoint(Some(folder_path))).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub async fn delete_folder(&self, folder_path: &str) -> Result<()> {
        self.client
            .delete(&self.folder_endpoint(Some(folder_path)))
            .await
            .map_err(|e| e.with_context(&format!("Failed to delete folder '{folder_path}'")))
    }

    /// Absolute URL of a file. Pure string composition, no request is made.
    pub fn get_file_url(&self, file_name: &str, folder_path: Option<&str>) -> String {
        match folder_path {
            Some(folder) => format!(
                "{}/{}/{}/{file_name}",
                self.client.base_url(),
                self.library_name,
                folder.trim_matches('/')
            ),
            None => format!(
                "{}/{}/{file_name}",
                self.client.base_url(),
                self.library_name
            ),
        }
    }

    fn folder_endpoint(&self, folder_path: Option<&str>) -> String {
        let relative = match folder_path {
            Some(folder) => format!("/{}/{}", self.library_name, folder.trim_matches('/')),
            None => format!("/{}", self.library_name),
        };
        format!(
            "/_api/web/GetFolderByServerRelativeUrl('{}')",
            escape_quotes(&relative)
        )
    }

    fn file_endpoint(&self, file_name: &str, folder_path: Option<&str>) -> String {
        let relative = match folder_path {
            Some(folder) => format!(
                "/{}/{}/{file_name}",
                self.library_name,
                folder.trim_matches('/')
            ),
            None => format!("/{}/{file_name}", self.library_name),
        };
        format!(
            "/_api/web/GetFileByServerRelativeUrl('{}')",
            escape_quotes(&relative)
        )
    }
}

fn escape_quotes(value: &str) -> String {
    value.replace('\'', "''")
}

fn parse_results(mut value: Value) -> Result<Vec<DocumentFile>> {
    let results = match value.get_mut("results") {
        Some(results) => results.take(),
        None => Value::Array(Vec::new()),
    };
    decode(results)
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|err| {
        ApiError::new(
            format!("Failed to decode response: {err}"),
            None,
            "DECODE_ERROR",
            false,
        )
    })
}
