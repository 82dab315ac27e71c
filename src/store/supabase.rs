//! Supabase backend: PostgREST for embedding rows, Storage for image objects.
//!
//! One [`SupabaseBackend`] holds a pooled `reqwest::Client` with a bounded
//! timeout and implements both [`EmbeddingStore`] and [`ObjectStorage`].

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{StatusCode, Url};
use serde_json::Value;

use super::decode::decode_embedding;
use super::types::{EmbeddingRecord, EmbeddingSpace, NewEmbeddingRecord, TenantScope};
use super::{EmbeddingStore, ObjectStorage, StoreError};
use crate::config::StoreConfig;

const SELECT_COLUMNS: &str =
    "id,image_url,event_id,business_id,face_embedding,image_embedding,created_at";

pub struct SupabaseBackend {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
    table: String,
    bucket: String,
    page_size: usize,
}

impl SupabaseBackend {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        anyhow::ensure!(!config.url.trim().is_empty(), "store.url is not set");

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
            table: config.table.clone(),
            bucket: config.bucket.clone(),
            page_size: config.page_size.max(1),
        })
    }

    fn table_url(&self) -> Result<Url, StoreError> {
        let raw = format!("{}/rest/v1/{}", self.base_url, self.table);
        Url::parse(&raw).map_err(|e| StoreError::InvalidUrl(format!("{raw}: {e}")))
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    /// Public URL of an object in the configured bucket.
    pub fn public_url(&self, name: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, name
        )
    }

    /// Cheap reachability check: select one id.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut url = self.table_url()?;
        url.query_pairs_mut()
            .append_pair("select", "id")
            .append_pair("limit", "1");
        let response = self.authorized(self.client.get(url)).send().await?;
        expect_status(response, &[StatusCode::OK]).await?;
        Ok(())
    }

    /// Fetch every row matching the scope and the optional non-null column,
    /// one page at a time until the server returns an empty page.
    async fn fetch_rows(
        &self,
        scope: &TenantScope,
        non_null: Option<EmbeddingSpace>,
    ) -> Result<Vec<Value>, StoreError> {
        let mut rows = Vec::new();
        let mut offset = 0usize;

        loop {
            let mut url = self.table_url()?;
            {
                let mut query = url.query_pairs_mut();
                query
                    .append_pair("select", SELECT_COLUMNS)
                    .append_pair("event_id", &format!("eq.{}", scope.event_id()))
                    .append_pair("business_id", &format!("eq.{}", scope.business_id()));
                if let Some(space) = non_null {
                    query.append_pair(space.column(), "not.is.null");
                }
                query
                    .append_pair("order", "id.asc")
                    .append_pair("limit", &self.page_size.to_string())
                    .append_pair("offset", &offset.to_string());
            }

            let response = self.authorized(self.client.get(url)).send().await?;
            let response = expect_status(response, &[StatusCode::OK]).await?;
            let page: Vec<Value> = response.json().await?;

            // The server may cap a page below `limit` (PostgREST max-rows), so a
            // short page is not the end; only an empty one is.
            if page.is_empty() {
                break;
            }
            offset += page.len();
            rows.extend(page);
        }

        tracing::debug!(scope = %scope, rows = rows.len(), "fetched rows");
        Ok(rows)
    }
}

#[async_trait]
impl EmbeddingStore for SupabaseBackend {
    async fn fetch_scoped(
        &self,
        scope: &TenantScope,
        space: EmbeddingSpace,
    ) -> Result<Vec<EmbeddingRecord>, StoreError> {
        let rows = self.fetch_rows(scope, Some(space)).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| decode_row(row, Some(space)))
            .collect())
    }

    async fn list_scoped(&self, scope: &TenantScope) -> Result<Vec<EmbeddingRecord>, StoreError> {
        let rows = self.fetch_rows(scope, None).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| decode_row(row, None))
            .collect())
    }

    async fn insert(&self, record: &NewEmbeddingRecord) -> bool {
        let url = match self.table_url() {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(error = %e, "cannot build insert URL");
                return false;
            }
        };

        let result = self
            .authorized(self.client.post(url))
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await;

        match result {
            Ok(response) if response.status() == StatusCode::CREATED => true,
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(status = %status, body = %body, image_url = %record.image_url, "insert rejected");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, image_url = %record.image_url, "insert request failed");
                false
            }
        }
    }
}

#[async_trait]
impl ObjectStorage for SupabaseBackend {
    async fn put_object(
        &self,
        name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StoreError> {
        let raw = format!(
            "{}/storage/v1/object/{}/{}?upsert=true",
            self.base_url, self.bucket, name
        );
        let url = Url::parse(&raw).map_err(|e| StoreError::InvalidUrl(format!("{raw}: {e}")))?;

        let response = self
            .authorized(self.client.post(url))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes.to_vec())
            .send()
            .await?;
        expect_status(response, &[StatusCode::OK, StatusCode::CREATED]).await?;

        let public = self.public_url(name);
        tracing::info!(url = %public, size = bytes.len(), "object uploaded");
        Ok(public)
    }
}

async fn expect_status(
    response: reqwest::Response,
    accepted: &[StatusCode],
) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if accepted.contains(&status) {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Decode one PostgREST row. When `required` is set, a missing or malformed
/// embedding in that space drops the row; malformed embeddings elsewhere are
/// cleared. Returns `None` for rows that cannot be used.
pub(crate) fn decode_row(row: Value, required: Option<EmbeddingSpace>) -> Option<EmbeddingRecord> {
    let id = match row.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };

    let Some(image_url) = row.get("image_url").and_then(Value::as_str) else {
        tracing::warn!(id = %id, "skipping row without image_url");
        return None;
    };

    let mut embeddings = [None, None];
    for (slot, space) in [EmbeddingSpace::Face, EmbeddingSpace::Image].into_iter().enumerate() {
        match decode_embedding(row.get(space.column())) {
            Ok(v) => embeddings[slot] = v,
            Err(e) if required == Some(space) => {
                tracing::warn!(id = %id, space = %space, error = %e, "skipping row");
                return None;
            }
            Err(e) => {
                tracing::warn!(id = %id, space = %space, error = %e, "ignoring undecodable embedding");
            }
        }
    }
    let [face_embedding, image_embedding] = embeddings;

    if let Some(space) = required {
        let present = match space {
            EmbeddingSpace::Face => face_embedding.is_some(),
            EmbeddingSpace::Image => image_embedding.is_some(),
        };
        if !present {
            return None;
        }
    }

    let text = |key: &str| {
        row.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let created_at = row
        .get("created_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Some(EmbeddingRecord {
        id,
        image_url: image_url.to_string(),
        event_id: text("event_id"),
        business_id: text("business_id"),
        face_embedding,
        image_embedding,
        created_at,
    })
}
