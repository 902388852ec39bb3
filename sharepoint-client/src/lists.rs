//! Typed CRUD over SharePoint lists
//!
//! [`ListService`] is a thin, typed layer over [`SharePointClient`]: it
//! composes `getbytitle` endpoints, stamps write payloads with the
//! `__metadata` type the verbose dialect requires, and deserializes results
//! into caller-supplied types.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::client::SharePointClient;
use crate::error::{ApiError, Result};
use crate::models::{BatchError, BatchResult, ItemUpdate, PaginationResult};
use crate::query::QueryOptions;

const DEFAULT_PAGE_SIZE: u32 = 50;

/// Service for one named list.
pub struct ListService {
    client: Arc<SharePointClient>,
    list_name: String,
}

impl ListService {
    pub fn new(client: Arc<SharePointClient>, list_name: impl Into<String>) -> Self {
        Self {
            client,
            list_name: list_name.into(),
        }
    }

    pub fn list_name(&self) -> &str {
        &self.list_name
    }

    /// Query items, optionally shaped by [`QueryOptions`].
    pub async fn get_items<T: DeserializeOwned>(
        &self,
        options: Option<&QueryOptions>,
    ) -> Result<Vec<T>> {
        let query = options.map(QueryOptions::to_query_string).unwrap_or_default();
        let endpoint = format!("{}/items{query}", self.list_endpoint());
        let value = self
            .client
            .get(&endpoint)
            .await
            .map_err(|e| e.with_context("Failed to get list items"))?;
        parse_results(value)
    }

    /// Fetch one page, probing one item past the page size to learn whether
    /// more remain without a second round-trip.
    pub async fn get_items_paginated<T: DeserializeOwned>(
        &self,
        options: Option<&QueryOptions>,
    ) -> Result<PaginationResult<T>> {
        let mut probe = options.cloned().unwrap_or_default();
        let page_size = probe.top.unwrap_or(DEFAULT_PAGE_SIZE);
        let skip = probe.skip.unwrap_or(0);
        probe.top = Some(page_size + 1);

        let mut items: Vec<T> = self.get_items(Some(&probe)).await?;
        let has_more = items.len() as u32 > page_size;
        items.truncate(page_size as usize);

        Ok(PaginationResult {
            items,
            has_more,
            next_skip: has_more.then(|| skip + page_size),
        })
    }

    /// Fetch a single item by ID, optionally projecting fields.
    pub async fn get_item<T: DeserializeOwned>(
        &self,
        id: u32,
        select: Option<&[&str]>,
    ) -> Result<T> {
        let query = match select {
            Some(fields) if !fields.is_empty() => format!("?$select={}", fields.join(",")),
            _ => String::new(),
        };
        let endpoint = format!("{}/items({id}){query}", self.list_endpoint());
        let value = self
            .client
            .get(&endpoint)
            .await
            .map_err(|e| e.with_context(&format!("Failed to get item with ID {id}")))?;
        decode(value)
    }

    /// Create an item from a JSON object of field values.
    pub async fn create_item<T: DeserializeOwned>(&self, data: Value) -> Result<T> {
        let body = self.with_type_metadata(data)?;
        let endpoint = format!("{}/items", self.list_endpoint());
        let value = self
            .client
            .post(&endpoint, Some(body))
            .await
            .map_err(|e| e.with_context("Failed to create list item"))?;
        decode(value)
    }

    /// Partially update an item; only the supplied fields are sent.
    pub async fn update_item(&self, id: u32, data: Value) -> Result<()> {
        let body = self.with_type_metadata(data)?;
        let endpoint = format!("{}/items({id})", self.list_endpoint());
        self.client
            .merge(&endpoint, body)
            .await
            .map_err(|e| e.with_context(&format!("Failed to update item with ID {id}")))
    }

    pub async fn delete_item(&self, id: u32) -> Result<()> {
        let endpoint = format!("{}/items({id})", self.list_endpoint());
        self.client
            .delete(&endpoint)
            .await
            .map_err(|e| e.with_context(&format!("Failed to delete item with ID {id}")))
    }

    /// Count items, optionally under a filter. The `$count` endpoint returns
    /// the count as plain text.
    pub async fn get_item_count(&self, filter: Option<&str>) -> Result<u64> {
        let query = match filter {
            Some(f) => format!("?$filter={}", urlencoding::encode(f)),
            None => String::new(),
        };
        let endpoint = format!("{}/items/$count{query}", self.list_endpoint());
        let value = self
            .client
            .get(&endpoint)
            .await
            .map_err(|e| e.with_context("Failed to get item count"))?;

        match value {
            Value::Number(n) => n.as_u64().ok_or_else(|| invalid_count(&n.to_string())),
            Value::String(s) => s.trim().parse().map_err(|_| invalid_count(&s)),
            other => Err(invalid_count(&other.to_string())),
        }
    }

    /// Create items one at a time, collecting per-item failures instead of
    /// aborting. Sequential on purpose: parallel creates amplify throttling.
    pub async fn batch_create<T: DeserializeOwned>(&self, items: Vec<Value>) -> BatchResult<T> {
        let mut results = Vec::new();
        let mut errors = Vec::new();

        for (index, item) in items.into_iter().enumerate() {
            match self.create_item(item).await {
                Ok(created) => results.push(created),
                Err(err) => errors.push(BatchError {
                    index,
                    error: err.message.clone(),
                    status_code: err.status_code,
                }),
            }
        }

        BatchResult {
            success: errors.is_empty(),
            results,
            errors,
        }
    }

    /// Update items one at a time; results are the IDs that succeeded.
    pub async fn batch_update(&self, updates: Vec<ItemUpdate>) -> BatchResult<u32> {
        let mut results = Vec::new();
        let mut errors = Vec::new();

        for (index, update) in updates.into_iter().enumerate() {
            match self.update_item(update.id, update.data).await {
                Ok(()) => results.push(update.id),
                Err(err) => errors.push(BatchError {
                    index,
                    error: err.message.clone(),
                    status_code: err.status_code,
                }),
            }
        }

        BatchResult {
            success: errors.is_empty(),
            results,
            errors,
        }
    }

    /// Whether an item with this ID exists. Only 404 maps to `false`; other
    /// failures propagate so callers never mistake an outage for absence.
    pub async fn item_exists(&self, id: u32) -> Result<bool> {
        match self.get_item::<Value>(id, Some(&["Id"])).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn list_endpoint(&self) -> String {
        format!(
            "/_api/web/lists/getbytitle('{}')",
            escape_quotes(&self.list_name)
        )
    }

    /// Verbose-dialect type name for this list's items.
    fn item_type(&self) -> String {
        format!("SP.Data.{}ListItem", self.list_name)
    }

    /// Stamp a write payload with the `__metadata` type the dialect requires.
    fn with_type_metadata(&self, data: Value) -> Result<Value> {
        let Value::Object(mut map) = data else {
            return Err(ApiError::new(
                "List item payload must be a JSON object",
                None,
                "INVALID_INPUT",
                false,
            ));
        };
        map.insert("__metadata".to_string(), json!({"type": self.item_type()}));
        Ok(Value::Object(map))
    }
}

/// Single quotes in OData string literals are escaped by doubling.
fn escape_quotes(name: &str) -> String {
    name.replace('\'', "''")
}

fn parse_results<T: DeserializeOwned>(mut value: Value) -> Result<Vec<T>> {
    let results = match value.get_mut("results") {
        Some(results) => results.take(),
        None => Value::Array(Vec::new()),
    };
    decode(results)
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|err| {
        ApiError::new(
            format!("Failed to decode response: {err}"),
            None,
            "DECODE_ERROR",
            false,
        )
    })
}

fn invalid_count(raw: &str) -> ApiError {
    ApiError::new(
        format!("Item count response was not a number: {raw}"),
        None,
        "INVALID_RESPONSE",
        false,
    )
}
