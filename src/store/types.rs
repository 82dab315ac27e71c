//! Embedding record and tenant scope definitions.
//!
//! Defines [`TenantScope`] (the event/business isolation key), [`EmbeddingSpace`]
//! (which vector column a comparison uses), [`EmbeddingRecord`] (a stored row),
//! [`NewEmbeddingRecord`] (the insert payload) and [`MatchResult`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected tenant scope keys.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("event_id must not be empty")]
    MissingEventId,

    #[error("business_id must not be empty")]
    MissingBusinessId,
}

/// The `(event_id, business_id)` pair isolating one customer's data.
///
/// Every read and write of embeddings is filtered by this pair; records from
/// different scopes are never compared against each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantScope {
    event_id: String,
    business_id: String,
}

impl TenantScope {
    /// Build a scope. Both keys must be non-blank.
    pub fn new(
        event_id: impl Into<String>,
        business_id: impl Into<String>,
    ) -> Result<Self, ScopeError> {
        let event_id = event_id.into().trim().to_string();
        let business_id = business_id.into().trim().to_string();
        if event_id.is_empty() {
            return Err(ScopeError::MissingEventId);
        }
        if business_id.is_empty() {
            return Err(ScopeError::MissingBusinessId);
        }
        Ok(Self {
            event_id,
            business_id,
        })
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn business_id(&self) -> &str {
        &self.business_id
    }
}

impl std::fmt::Display for TenantScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.event_id, self.business_id)
    }
}

/// Which embedding a comparison runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingSpace {
    /// Face identity vectors.
    Face,
    /// Joint image/text (CLIP) vectors.
    Image,
}

impl EmbeddingSpace {
    /// Datastore column holding this space's vectors.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Face => "face_embedding",
            Self::Image => "image_embedding",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Face => "face",
            Self::Image => "image",
        }
    }
}

impl std::fmt::Display for EmbeddingSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EmbeddingSpace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "face" => Ok(Self::Face),
            "image" => Ok(Self::Image),
            _ => Err(format!("unknown embedding space: {s}")),
        }
    }
}

/// A stored embedding row, decoded into canonical vectors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingRecord {
    /// Opaque identifier assigned by the store.
    pub id: String,
    /// Publicly resolvable URL of the source image.
    pub image_url: String,
    pub event_id: String,
    pub business_id: String,
    /// Face identity vector. `None` when the row holds no face embedding.
    pub face_embedding: Option<Vec<f32>>,
    /// Joint image/text vector, shared by every face of the same image.
    pub image_embedding: Option<Vec<f32>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl EmbeddingRecord {
    /// The embedding for `space`, if present.
    pub fn embedding(&self, space: EmbeddingSpace) -> Option<&[f32]> {
        match space {
            EmbeddingSpace::Face => self.face_embedding.as_deref(),
            EmbeddingSpace::Image => self.image_embedding.as_deref(),
        }
    }
}

/// Insert payload. The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEmbeddingRecord {
    pub image_url: String,
    pub event_id: String,
    pub business_id: String,
    pub face_embedding: Vec<f32>,
    pub image_embedding: Vec<f32>,
}

impl NewEmbeddingRecord {
    pub fn new(
        scope: &TenantScope,
        image_url: &str,
        face_embedding: Vec<f32>,
        image_embedding: Vec<f32>,
    ) -> Self {
        Self {
            image_url: image_url.to_string(),
            event_id: scope.event_id().to_string(),
            business_id: scope.business_id().to_string(),
            face_embedding,
            image_embedding,
        }
    }
}

/// One ranked hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub image_url: String,
    pub similarity: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_rejects_blank_keys() {
        assert_eq!(TenantScope::new("", "b"), Err(ScopeError::MissingEventId));
        assert_eq!(TenantScope::new("e", "  "), Err(ScopeError::MissingBusinessId));
        let scope = TenantScope::new(" e1 ", "b1").unwrap();
        assert_eq!(scope.event_id(), "e1");
        assert_eq!(scope.to_string(), "e1/b1");
    }

    #[test]
    fn space_columns() {
        assert_eq!(EmbeddingSpace::Face.column(), "face_embedding");
        assert_eq!(EmbeddingSpace::Image.column(), "image_embedding");
        assert_eq!("image".parse::<EmbeddingSpace>().unwrap(), EmbeddingSpace::Image);
        assert!("text".parse::<EmbeddingSpace>().is_err());
    }

    #[test]
    fn new_record_serializes_canonical_columns() {
        let scope = TenantScope::new("e1", "b1").unwrap();
        let record = NewEmbeddingRecord::new(&scope, "http://x/a.jpg", vec![1.0], vec![0.5]);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["event_id"], "e1");
        assert_eq!(json["business_id"], "b1");
        assert_eq!(json["face_embedding"][0], 1.0);
        assert_eq!(json["image_embedding"][0], 0.5);
    }
}
