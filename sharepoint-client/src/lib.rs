//! Resilient SharePoint Online REST Client
//!
//! This crate provides a production-ready client for SharePoint list and
//! document-library operations: typed CRUD with OData query building,
//! pagination, sequential batching with partial-failure accounting, and
//! file/folder lifecycle management. The low-level client transparently
//! absorbs throttling (429/503) with exponential backoff and unwraps the
//! verbose-OData response envelope before payloads reach callers.

pub mod auth;
pub mod client;
pub mod config;
pub mod documents;
pub mod error;
pub mod lists;
pub mod models;
pub mod query;

pub use auth::{AuthConfig, Credential, TokenManager};
pub use client::SharePointClient;
pub use config::{ClientConfig, RetryPolicy};
pub use documents::DocumentService;
pub use error::{ApiError, Result};
pub use lists::ListService;
pub use models::{
    BatchError, BatchResult, DocumentFile, FileDownload, FileUpload, FileUploadOptions,
    ItemUpdate, ListItem, PaginationResult, UploadOutcome,
};
pub use query::QueryOptions;
