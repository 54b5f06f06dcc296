//! Dataset items of finished runs.

use std::sync::Arc;

use reqwest::Method;
use serde_json::{Map, Value};

use crate::{
    client::ClientInner,
    errors::{Error, Result, ValidationError},
    pagination::paginate_all,
};

/// One record of a dataset.
pub type ResultItem = Map<String, Value>;

/// Shape of the records handed back to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Records as stored.
    #[default]
    Full,
    /// Each record reduced to one field, e.g. `markdown` when the node is used
    /// as an agent tool. Item count is unchanged.
    Reduced { field: String },
}

impl OutputMode {
    pub fn markdown() -> Self {
        OutputMode::Reduced {
            field: "markdown".to_string(),
        }
    }

    /// Applies the mode to a single record. A missing field yields an empty record.
    pub fn project(&self, item: ResultItem) -> ResultItem {
        match self {
            OutputMode::Full => item,
            OutputMode::Reduced { field } => {
                let mut reduced = Map::new();
                if let Some(value) = item.get(field) {
                    reduced.insert(field.clone(), value.clone());
                }
                reduced
            }
        }
    }

    pub fn project_all(&self, items: Vec<ResultItem>) -> Vec<ResultItem> {
        items.into_iter().map(|item| self.project(item)).collect()
    }
}

/// Query options for `GET /v2/datasets/{id}/items`.
#[derive(Debug, Clone, Default)]
pub struct ListItemsOptions {
    pub offset: Option<u64>,
    pub limit: Option<u32>,
    /// Skip empty items and hidden fields.
    pub clean: bool,
    /// Restrict returned fields.
    pub fields: Vec<String>,
}

#[derive(Clone)]
pub struct DatasetsClient {
    pub(crate) inner: Arc<ClientInner>,
}

impl DatasetsClient {
    /// Reads one batch of items.
    pub async fn list_items(
        &self,
        dataset_id: &str,
        options: &ListItemsOptions,
    ) -> Result<Vec<ResultItem>> {
        if dataset_id.trim().is_empty() {
            return Err(Error::Validation(
                ValidationError::new("dataset_id is required").with_field("dataset_id"),
            ));
        }
        let path = format!("/v2/datasets/{}/items", urlencoding::encode(dataset_id));
        let mut query: Vec<(&str, String)> = vec![("format", "json".to_string())];
        if let Some(offset) = options.offset {
            query.push(("offset", offset.to_string()));
        }
        if let Some(limit) = options.limit {
            query.push(("limit", limit.to_string()));
        }
        if options.clean {
            query.push(("clean", "true".to_string()));
        }
        if !options.fields.is_empty() {
            query.push(("fields", options.fields.join(",")));
        }

        let builder = self.inner.json_request(Method::GET, &path)?.query(&query);
        let ctx = self.inner.make_context(&Method::GET, &path, Some(dataset_id));
        self.inner
            .execute_json(builder, Method::GET, None, ctx)
            .await
    }

    /// Reads every item, `limit` (default 999) at a time.
    pub async fn list_all_items(
        &self,
        dataset_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<ResultItem>> {
        paginate_all(limit, |offset, limit| {
            let options = ListItemsOptions {
                offset: Some(offset),
                limit: Some(limit),
                ..Default::default()
            };
            async move { self.list_items(dataset_id, &options).await }
        })
        .await
    }
}
