//! Read path: query-image face search, text-prompt search, and image listing.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{check_image, check_threshold, ServiceError, Vectorizer};
use crate::search::{match_embeddings, normalize};
use crate::store::types::{EmbeddingRecord, EmbeddingSpace, MatchResult, TenantScope};

/// Face search response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceSearch {
    /// Where the query image was archived, when archiving is on.
    pub uploaded_image_url: Option<String>,
    pub matched_images: Vec<MatchResult>,
}

/// One distinct image in a tenant scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageEntry {
    pub image_url: String,
    pub face_count: usize,
    pub created_at: Option<DateTime<Utc>>,
}

impl Vectorizer {
    /// Find images in `scope` containing the first face of the query image.
    pub async fn find_by_image(
        &self,
        image: &[u8],
        scope: &TenantScope,
        threshold: f32,
    ) -> Result<FaceSearch, ServiceError> {
        check_image(image)?;
        check_threshold(threshold)?;

        let faces = self.detect_faces(image).await?;
        let Some(first) = faces.into_iter().next() else {
            return Err(ServiceError::NoFaceDetected);
        };
        let target = normalize(&first.embedding)?;

        let uploaded_image_url = if self.archive_query_images {
            Some(self.upload(image).await?)
        } else {
            None
        };

        let corpus = self.store.fetch_scoped(scope, EmbeddingSpace::Face).await?;
        let matched_images =
            match_embeddings(&target, &corpus, EmbeddingSpace::Face, threshold, None);

        tracing::info!(
            scope = %scope,
            corpus = corpus.len(),
            matched = matched_images.len(),
            threshold,
            "face search complete"
        );

        Ok(FaceSearch {
            uploaded_image_url,
            matched_images,
        })
    }

    /// Rank the images of `scope` against a free-text prompt in the joint space.
    ///
    /// Every face row of an image carries the same image embedding, so hits are
    /// reduced to distinct images before `top_k` applies. An empty image-space
    /// corpus is an error ([`ServiceError::NoEmbeddings`]), unlike an empty
    /// match list.
    pub async fn find_by_text(
        &self,
        prompt: &str,
        scope: &TenantScope,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<MatchResult>, ServiceError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ServiceError::InvalidInput("prompt must not be empty".into()));
        }
        if top_k == 0 {
            return Err(ServiceError::InvalidInput("top_k must be at least 1".into()));
        }
        check_threshold(threshold)?;

        let query = self.embed_text(prompt).await?;

        let corpus = self.store.fetch_scoped(scope, EmbeddingSpace::Image).await?;
        if corpus.is_empty() {
            tracing::info!(scope = %scope, "no image embeddings in scope");
            return Err(ServiceError::NoEmbeddings);
        }

        let matches = match_embeddings(&query, &corpus, EmbeddingSpace::Image, threshold, None);
        let mut results = distinct_images(matches);
        results.truncate(top_k);

        tracing::info!(
            scope = %scope,
            corpus = corpus.len(),
            returned = results.len(),
            top_k,
            "text search complete"
        );

        Ok(results)
    }

    /// Distinct images of `scope` in store order, with their face counts.
    pub async fn list_images(&self, scope: &TenantScope) -> Result<Vec<ImageEntry>, ServiceError> {
        let records = self.store.list_scoped(scope).await?;
        Ok(group_images(records))
    }
}

/// Keep the first (highest-ranked) hit per `image_url`, preserving order.
fn distinct_images(mut matches: Vec<MatchResult>) -> Vec<MatchResult> {
    let mut seen = HashSet::new();
    matches.retain(|m| seen.insert(m.image_url.clone()));
    matches
}

/// Group records by `image_url` in first-seen order, counting faces and
/// keeping the earliest `created_at`.
pub fn group_images(records: Vec<EmbeddingRecord>) -> Vec<ImageEntry> {
    let mut entries: Vec<ImageEntry> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        let has_face = record.face_embedding.is_some();
        match index.get(&record.image_url).copied() {
            Some(i) => {
                let entry = &mut entries[i];
                entry.face_count += usize::from(has_face);
                entry.created_at = earliest(entry.created_at, record.created_at);
            }
            None => {
                index.insert(record.image_url.clone(), entries.len());
                entries.push(ImageEntry {
                    image_url: record.image_url,
                    face_count: usize::from(has_face),
                    created_at: record.created_at,
                });
            }
        }
    }

    entries
}

fn earliest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
