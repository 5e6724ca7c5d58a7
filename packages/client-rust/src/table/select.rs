use docorm_core::query::{compile_filter, compile_sorts};
use docorm_core::row::decode_envelope;
use docorm_core::{OrderBy, Predicate, QueryRequest, RemoteContext, Result, RowEnvelope};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use super::Table;
use crate::relation::{Populate, PopulateSpec};

/// Options of [`Table::select`].
///
/// A raw filter or raw sort list takes precedence over the typed one and is
/// sent verbatim.
#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    pub filter: Option<Predicate>,
    pub order_by: Option<OrderBy>,
    pub raw_filter: Option<JsonValue>,
    pub raw_sorts: Option<JsonValue>,
    /// Clamped to `[1, max_page_size]`.
    pub page_size: Option<u32>,
    pub start_cursor: Option<String>,
    pub populate: PopulateSpec,
}

impl SelectOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    #[must_use]
    pub fn order_by(mut self, order_by: impl Into<OrderBy>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    #[must_use]
    pub fn raw_filter(mut self, filter: JsonValue) -> Self {
        self.raw_filter = Some(filter);
        self
    }

    #[must_use]
    pub fn raw_sorts(mut self, sorts: JsonValue) -> Self {
        self.raw_sorts = Some(sorts);
        self
    }

    #[must_use]
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    #[must_use]
    pub fn start_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.start_cursor = Some(cursor.into());
        self
    }

    /// Populates relation column `column_key` after the page is fetched.
    #[must_use]
    pub fn populate(mut self, column_key: impl Into<String>, populate: Populate) -> Self {
        self.populate.insert(column_key.into(), populate);
        self
    }
}

/// One page of decoded rows.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Page {
    pub rows: Vec<RowEnvelope>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Compiles the filter and sorts shared by selects and target resolution.
pub(super) fn build_query(
    filter: Option<&Predicate>,
    order_by: Option<&OrderBy>,
    raw_filter: Option<&JsonValue>,
    raw_sorts: Option<&JsonValue>,
    page_size: u32,
    start_cursor: Option<String>,
) -> Result<QueryRequest> {
    let filter = match (raw_filter, filter) {
        (Some(raw), _) => Some(raw.clone()),
        (None, Some(predicate)) => Some(compile_filter(predicate)?),
        (None, None) => None,
    };
    let sorts = match (raw_sorts, order_by) {
        (Some(raw), _) => Some(raw.clone()),
        (None, Some(order_by)) if !order_by.is_empty() => Some(compile_sorts(order_by)),
        _ => None,
    };
    Ok(QueryRequest {
        filter,
        sorts,
        page_size: Some(page_size),
        start_cursor,
    })
}

impl Table {
    /// Queries one page of rows.
    ///
    /// # Errors
    ///
    /// Returns a compile error from the filter before any remote call,
    /// [`Error::Remote`](docorm_core::Error::Remote) when the query fails,
    /// and any populate error when `options.populate` is non-empty.
    pub async fn select(&self, options: &SelectOptions) -> Result<Page> {
        let page_size = self.inner.config.clamp_page_size(options.page_size);
        let request = build_query(
            options.filter.as_ref(),
            options.order_by.as_ref(),
            options.raw_filter.as_ref(),
            options.raw_sorts.as_ref(),
            page_size,
            options.start_cursor.clone(),
        )?;
        let page = self.query(&request).await?;
        if options.populate.is_empty() {
            return Ok(page);
        }
        let rows = self.populate(&page.rows, &options.populate).await?;
        Ok(Page { rows, ..page })
    }

    /// Follows cursors from `options.start_cursor` until the last page and
    /// returns every row.
    ///
    /// # Errors
    ///
    /// See [`Table::select`].
    pub async fn select_all(&self, options: &SelectOptions) -> Result<Vec<RowEnvelope>> {
        let mut options = options.clone();
        let mut rows = Vec::new();
        loop {
            let page = self.select(&options).await?;
            rows.extend(page.rows);
            match page.next_cursor {
                Some(cursor) if page.has_more => options.start_cursor = Some(cursor),
                _ => break,
            }
        }
        debug!(table = %self.inner.title, rows = rows.len(), "selected all rows");
        Ok(rows)
    }

    /// Runs a compiled query and decodes the results.
    pub(super) async fn query(&self, request: &QueryRequest) -> Result<Page> {
        let response = self
            .inner
            .store
            .query_records(&self.inner.ids.data_source_id, request)
            .await
            .remote_context(|| format!("failed to query `{}`", self.inner.title))?;
        let has_more = response
            .has_more
            .unwrap_or(response.next_cursor.is_some());
        let rows = response
            .results
            .into_iter()
            .map(|record| decode_envelope(&self.inner.columns, record))
            .collect::<Result<Vec<_>>>()?;
        debug!(table = %self.inner.title, rows = rows.len(), has_more, "queried page");
        Ok(Page {
            rows,
            next_cursor: response.next_cursor,
            has_more,
        })
    }
}
