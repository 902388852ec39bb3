//! OData query options and query-string rendering
//!
//! [`QueryOptions`] is a plain per-call value object; every field is
//! independently optional and composable. Rendering produces the `$select`,
//! `$filter`, `$orderby`, `$top`, `$skip` and `$expand` parameters the REST
//! dialect expects, with the filter expression URL-encoded.

/// Options for list and file queries.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Fields to project, e.g. `["Id", "Title", "Status"]`.
    pub select: Vec<String>,
    /// OData filter expression, e.g. `"Status eq 'Pending'"`.
    pub filter: Option<String>,
    /// Field to order by.
    pub order_by: Option<String>,
    pub order_by_descending: bool,
    /// Maximum number of items to return.
    pub top: Option<u32>,
    /// Number of items to skip (pagination).
    pub skip: Option<u32>,
    /// Related fields to expand.
    pub expand: Vec<String>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    pub fn descending(mut self) -> Self {
        self.order_by_descending = true;
        self
    }

    pub fn top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }

    pub fn skip(mut self, skip: u32) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn expand<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expand = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Render as a query string, including the leading `?`. Returns an empty
    /// string when no option is set.
    pub fn to_query_string(&self) -> String {
        let mut params: Vec<String> = Vec::new();

        if !self.select.is_empty() {
            params.push(format!("$select={}", self.select.join(",")));
        }
        if let Some(filter) = &self.filter {
            params.push(format!("$filter={}", urlencoding::encode(filter)));
        }
        if let Some(order_by) = &self.order_by {
            let direction = if self.order_by_descending { " desc" } else { "" };
            params.push(format!("$orderby={order_by}{direction}"));
        }
        if let Some(top) = self.top {
            params.push(format!("$top={top}"));
        }
        if let Some(skip) = self.skip {
            params.push(format!("$skip={skip}"));
        }
        if !self.expand.is_empty() {
            params.push(format!("$expand={}", self.expand.join(",")));
        }

        if params.is_empty() {
            String::new()
        } else {
            format!("?{}", params.join("&"))
        }
    }
}
