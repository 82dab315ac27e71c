//! Write path: upload → face detection → image embedding → one record per face.

use serde::Serialize;

use super::{check_image, ServiceError, Vectorizer};
use crate::store::types::{NewEmbeddingRecord, TenantScope};

pub const NO_FACE_MESSAGE: &str = "No face detected.";

/// Persistence result for one detected face.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceOutcome {
    pub face_index: usize,
    pub embedding_saved: bool,
    pub image_url: String,
}

/// Result of an ingestion request.
///
/// `NoFace` serializes as `{"message": "No face detected."}`; it is a normal
/// outcome for photos without people, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IngestOutcome {
    NoFace {
        message: &'static str,
    },
    Completed {
        status: &'static str,
        total_faces: usize,
        image_url: String,
        results: Vec<FaceOutcome>,
    },
}

impl IngestOutcome {
    pub fn no_face() -> Self {
        Self::NoFace {
            message: NO_FACE_MESSAGE,
        }
    }

    /// Number of faces whose record was persisted.
    pub fn saved_count(&self) -> usize {
        match self {
            Self::NoFace { .. } => 0,
            Self::Completed { results, .. } => {
                results.iter().filter(|r| r.embedding_saved).count()
            }
        }
    }
}

impl Vectorizer {
    /// Embed and persist an uploaded image for `scope`.
    ///
    /// Upload, detection and embedding failures abort the request. A failed
    /// insert only marks its own face as unsaved.
    pub async fn ingest(
        &self,
        image: &[u8],
        scope: &TenantScope,
    ) -> Result<IngestOutcome, ServiceError> {
        check_image(image)?;

        let image_url = self.upload(image).await?;
        let faces = self.detect_faces(image).await?;

        if faces.is_empty() {
            tracing::info!(scope = %scope, image_url = %image_url, "no face detected");
            return Ok(IngestOutcome::no_face());
        }

        let image_embedding = self.embed_image(image).await?;

        let total_faces = faces.len();
        let mut results = Vec::with_capacity(total_faces);
        for (face_index, face) in faces.into_iter().enumerate() {
            let record =
                NewEmbeddingRecord::new(scope, &image_url, face.embedding, image_embedding.clone());
            let embedding_saved = self.store.insert(&record).await;
            if !embedding_saved {
                tracing::warn!(scope = %scope, face_index, "face embedding not saved");
            }
            results.push(FaceOutcome {
                face_index,
                embedding_saved,
                image_url: image_url.clone(),
            });
        }

        let outcome = IngestOutcome::Completed {
            status: "completed",
            total_faces,
            image_url,
            results,
        };

        tracing::info!(
            scope = %scope,
            total_faces,
            saved = outcome.saved_count(),
            "image ingested"
        );

        Ok(outcome)
    }
}
