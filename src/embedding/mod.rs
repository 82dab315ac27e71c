//! Embedding collaborators.
//!
//! Provides the [`JointEmbedder`] trait (images and text into one CLIP space)
//! with a local ONNX implementation, and the [`FaceAnalyzer`] trait (face
//! detection plus identity embeddings) backed by a remote inference service.
//! Both are built once at startup via [`create_joint_embedder`] and
//! [`create_face_analyzer`] and shared across requests.

pub mod clip;
pub mod face;
pub mod preprocess;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Output dimension of the joint image/text model (CLIP ViT-B/32).
pub const JOINT_EMBEDDING_DIM: usize = 512;

/// Output dimension of the face identity model (ArcFace).
pub const FACE_EMBEDDING_DIM: usize = 512;

/// Encodes images and text prompts into the same joint space.
///
/// Implementations produce L2-normalized vectors of [`JOINT_EMBEDDING_DIM`]
/// dimensions. Methods are synchronous and CPU bound; callers in async
/// contexts should use `tokio::task::spawn_blocking`.
pub trait JointEmbedder: Send + Sync {
    /// Embed encoded image bytes (JPEG, PNG, WebP, GIF).
    fn embed_image(&self, image: &[u8]) -> Result<Vec<f32>>;

    /// Embed a free-text prompt.
    fn embed_text(&self, prompt: &str) -> Result<Vec<f32>>;

    fn dimensions(&self) -> usize {
        JOINT_EMBEDDING_DIM
    }
}

/// One face found in an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    /// Identity embedding (not necessarily normalized).
    pub embedding: Vec<f32>,
    /// `[x1, y1, x2, y2]` in pixels.
    #[serde(default)]
    pub bbox: Option<[f32; 4]>,
    #[serde(default)]
    pub det_score: Option<f32>,
}

/// Detects faces and returns one identity embedding per face.
#[async_trait]
pub trait FaceAnalyzer: Send + Sync {
    /// Detect faces in encoded image bytes. An empty vec means no faces.
    async fn detect_faces(&self, image: &[u8]) -> Result<Vec<DetectedFace>>;
}

/// Create the joint embedder from config.
///
/// Currently only `"local"` is supported (ONNX Runtime + CLIP ViT-B/32).
/// Returns an error if model files are not found; run `vectorizer model download` first.
pub fn create_joint_embedder(
    config: &crate::config::EmbeddingConfig,
) -> Result<Box<dyn JointEmbedder>> {
    match config.provider.as_str() {
        "local" => {
            let embedder = clip::ClipEmbedder::new(config)?;
            Ok(Box::new(embedder))
        }
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: local"),
    }
}

/// Create the face analyzer from config.
pub fn create_face_analyzer(config: &crate::config::FaceConfig) -> Result<Box<dyn FaceAnalyzer>> {
    Ok(Box::new(face::HttpFaceAnalyzer::new(config)?))
}
