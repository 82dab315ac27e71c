//! Embedding store gateway and object storage.
//!
//! [`EmbeddingStore`] fetches and inserts tenant-scoped embedding records;
//! [`ObjectStorage`] uploads image bytes and returns a public URL. The
//! [`supabase`] module implements both over HTTP. Callers receive decoded
//! records and do their own similarity computation.

pub mod decode;
pub mod supabase;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

use types::{EmbeddingRecord, EmbeddingSpace, NewEmbeddingRecord, TenantScope};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Unavailable(#[from] reqwest::Error),

    #[error("store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid store URL: {0}")]
    InvalidUrl(String),
}

/// Tenant-scoped access to stored embedding records.
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// All records of `scope` holding a non-null embedding for `space`.
    ///
    /// Returns an empty vec for an empty scope. Rows whose embedding cannot be
    /// decoded are skipped with a warning.
    async fn fetch_scoped(
        &self,
        scope: &TenantScope,
        space: EmbeddingSpace,
    ) -> Result<Vec<EmbeddingRecord>, StoreError>;

    /// All records of `scope`, with or without embeddings.
    async fn list_scoped(&self, scope: &TenantScope) -> Result<Vec<EmbeddingRecord>, StoreError>;

    /// Persist one record. Returns `false` on any failure so callers can
    /// report it per item.
    async fn insert(&self, record: &NewEmbeddingRecord) -> bool;
}

/// Blob storage for uploaded images.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `name` and return the public URL.
    async fn put_object(
        &self,
        name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StoreError>;
}
