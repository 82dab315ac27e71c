//! Ranked, thresholded matching of a query vector against a fetched corpus.

use crate::search::vector::cosine_similarity;
use crate::store::types::{EmbeddingRecord, EmbeddingSpace, MatchResult};

/// Compare `query` against every record holding an embedding in `space`.
///
/// Keeps scores strictly above `threshold`, sorted descending with a stable sort
/// (ties keep corpus order). One result per qualifying record: several faces of
/// one image each produce their own hit. `top_k` truncates the final list.
///
/// Records whose embedding has the wrong dimension or yields a non-finite score
/// are logged and skipped.
pub fn match_embeddings(
    query: &[f32],
    corpus: &[EmbeddingRecord],
    space: EmbeddingSpace,
    threshold: f32,
    top_k: Option<usize>,
) -> Vec<MatchResult> {
    let mut scored: Vec<MatchResult> = Vec::new();

    for record in corpus {
        let Some(embedding) = record.embedding(space) else {
            continue;
        };
        let similarity = match cosine_similarity(query, embedding) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(id = %record.id, space = %space, error = %e, "skipping record");
                continue;
            }
        };
        if !similarity.is_finite() {
            tracing::warn!(id = %record.id, space = %space, "skipping record with non-finite score");
            continue;
        }
        if similarity > threshold {
            scored.push(MatchResult {
                image_url: record.image_url.clone(),
                similarity,
            });
        }
    }

    scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

    if let Some(k) = top_k {
        scored.truncate(k);
    }

    tracing::debug!(
        space = %space,
        corpus = corpus.len(),
        matched = scored.len(),
        threshold,
        "match complete"
    );

    scored
}
