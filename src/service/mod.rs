//! Ingestion and query orchestration.
//!
//! [`Vectorizer`] is built once at process start from explicitly constructed
//! collaborators and shared across requests behind an `Arc`. It holds no
//! per-request state: each call fetches its own snapshot of the corpus.
//!
//! Entry points: [`Vectorizer::ingest`], [`Vectorizer::find_by_image`],
//! [`Vectorizer::find_by_text`] and [`Vectorizer::list_images`].

pub mod ingest;
pub mod query;

use std::sync::Arc;

use thiserror::Error;

use crate::embedding::preprocess::sniff_kind;
use crate::embedding::{FaceAnalyzer, JointEmbedder};
use crate::search::VectorError;
use crate::store::{EmbeddingStore, ObjectStorage, StoreError};

pub use ingest::{FaceOutcome, IngestOutcome};
pub use query::{group_images, FaceSearch, ImageEntry};

/// Similarity floor for query-image (face) searches when the caller gives none.
pub const DEFAULT_FACE_THRESHOLD: f32 = 0.6;

/// Similarity floor for text-prompt searches. Any comparable image qualifies;
/// the result is bounded by `top_k` alone.
pub const DEFAULT_TEXT_THRESHOLD: f32 = -1.0;

/// Number of text-search hits returned when the caller gives no `top_k`.
pub const DEFAULT_TEXT_TOP_K: usize = 5;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("No face detected")]
    NoFaceDetected,

    #[error("no embeddings found")]
    NoEmbeddings,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Vector(#[from] VectorError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("upstream collaborator failed: {0:#}")]
    Upstream(anyhow::Error),
}

/// The search engine's entry points, wired to their collaborators.
pub struct Vectorizer {
    store: Arc<dyn EmbeddingStore>,
    objects: Arc<dyn ObjectStorage>,
    faces: Arc<dyn FaceAnalyzer>,
    joint: Arc<dyn JointEmbedder>,
    archive_query_images: bool,
}

impl Vectorizer {
    pub fn new(
        store: Arc<dyn EmbeddingStore>,
        objects: Arc<dyn ObjectStorage>,
        faces: Arc<dyn FaceAnalyzer>,
        joint: Arc<dyn JointEmbedder>,
    ) -> Self {
        Self {
            store,
            objects,
            faces,
            joint,
            archive_query_images: true,
        }
    }

    /// Whether query images are uploaded during face searches (default on).
    pub fn with_query_archiving(mut self, enabled: bool) -> Self {
        self.archive_query_images = enabled;
        self
    }

    /// Upload under a fresh collision-resistant name and return the public URL.
    async fn upload(&self, image: &[u8]) -> Result<String, ServiceError> {
        let kind = sniff_kind(image);
        let name = format!("{}.{}", uuid::Uuid::now_v7(), kind.extension);
        let url = self
            .objects
            .put_object(&name, image, kind.content_type)
            .await?;
        Ok(url)
    }

    async fn detect_faces(
        &self,
        image: &[u8],
    ) -> Result<Vec<crate::embedding::DetectedFace>, ServiceError> {
        self.faces
            .detect_faces(image)
            .await
            .map_err(ServiceError::Upstream)
    }

    /// Whole-image joint embedding (CPU heavy → spawn_blocking).
    async fn embed_image(&self, image: &[u8]) -> Result<Vec<f32>, ServiceError> {
        let joint = Arc::clone(&self.joint);
        let bytes = image.to_vec();
        let embedding = tokio::task::spawn_blocking(move || joint.embed_image(&bytes))
            .await
            .map_err(|e| ServiceError::Upstream(anyhow::anyhow!("embedding task failed: {e}")))?
            .map_err(ServiceError::Upstream)?;
        self.check_joint_dims(embedding)
    }

    /// Prompt embedding (CPU heavy → spawn_blocking).
    async fn embed_text(&self, prompt: &str) -> Result<Vec<f32>, ServiceError> {
        let joint = Arc::clone(&self.joint);
        let prompt = prompt.to_string();
        let embedding = tokio::task::spawn_blocking(move || joint.embed_text(&prompt))
            .await
            .map_err(|e| ServiceError::Upstream(anyhow::anyhow!("embedding task failed: {e}")))?
            .map_err(ServiceError::Upstream)?;
        self.check_joint_dims(embedding)
    }

    /// Joint vectors must have the embedder's advertised dimension.
    fn check_joint_dims(&self, embedding: Vec<f32>) -> Result<Vec<f32>, ServiceError> {
        let expected = self.joint.dimensions();
        if embedding.len() != expected {
            return Err(ServiceError::Upstream(anyhow::anyhow!(
                "joint embedder returned {} dimensions, expected {expected}",
                embedding.len()
            )));
        }
        Ok(embedding)
    }
}

/// Thresholds must be finite cosine values.
fn check_threshold(threshold: f32) -> Result<(), ServiceError> {
    if !threshold.is_finite() || !(-1.0..=1.0).contains(&threshold) {
        return Err(ServiceError::InvalidInput(format!(
            "threshold must be within [-1, 1], got {threshold}"
        )));
    }
    Ok(())
}

fn check_image(image: &[u8]) -> Result<(), ServiceError> {
    if image.is_empty() {
        return Err(ServiceError::InvalidInput("image must not be empty".into()));
    }
    Ok(())
}
