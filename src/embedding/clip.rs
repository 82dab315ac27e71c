//! Local ONNX Runtime CLIP embedder.
//!
//! Implements [`JointEmbedder`] using the CLIP ViT-B/32 text and vision
//! exports via `ort`. Handles tokenization, CLIP image preprocessing,
//! inference, and L2 normalization.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use super::preprocess::{clip_pixel_values, CLIP_IMAGE_SIZE};
use super::{JointEmbedder, JOINT_EMBEDDING_DIM};
use crate::config::EmbeddingConfig;
use crate::search::vector::normalize;

/// CLIP text context length.
const MAX_SEQ_LEN: usize = 77;

pub const TEXT_MODEL_FILE: &str = "text_model.onnx";
pub const VISION_MODEL_FILE: &str = "vision_model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Local CLIP embedder: one session per tower, each behind a Mutex.
pub struct ClipEmbedder {
    text_session: Mutex<Session>,
    vision_session: Mutex<Session>,
    tokenizer: Tokenizer,
}

impl ClipEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let cache_dir = crate::config::expand_tilde(&config.cache_dir);
        let text_path = cache_dir.join(TEXT_MODEL_FILE);
        let vision_path = cache_dir.join(VISION_MODEL_FILE);
        let tokenizer_path = cache_dir.join(TOKENIZER_FILE);

        for path in [&text_path, &vision_path, &tokenizer_path] {
            anyhow::ensure!(
                path.exists(),
                "{} not found. Run `vectorizer model download` first.",
                path.display()
            );
        }

        let text_session = load_session(&text_path)?;
        let vision_session = load_session(&vision_path)?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;

        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("failed to set truncation: {e}"))?;

        tracing::info!(tokenizer = %tokenizer_path.display(), "tokenizer loaded");

        Ok(Self {
            text_session: Mutex::new(text_session),
            vision_session: Mutex::new(vision_session),
            tokenizer,
        })
    }
}

fn load_session(path: &Path) -> Result<Session> {
    let session = Session::builder()?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
        .with_intra_threads(4)?
        .commit_from_file(path)
        .with_context(|| format!("failed to load ONNX model {}", path.display()))?;
    tracing::info!(model = %path.display(), "ONNX model loaded");
    Ok(session)
}

/// Check a `[1, dim]` projection output and return the normalized vector.
fn pooled_embedding(dims: &[i64], data: &[f32]) -> Result<Vec<f32>> {
    anyhow::ensure!(
        dims.len() == 2 && dims[0] == 1 && dims[1] == JOINT_EMBEDDING_DIM as i64,
        "unexpected embedding shape: {dims:?}, expected [1, {JOINT_EMBEDDING_DIM}]"
    );
    Ok(normalize(&data[..JOINT_EMBEDDING_DIM])?)
}

impl JointEmbedder for ClipEmbedder {
    fn embed_image(&self, image: &[u8]) -> Result<Vec<f32>> {
        let pixels = clip_pixel_values(image)?;
        let size = CLIP_IMAGE_SIZE as i64;
        let shape = vec![1i64, 3, size, size];
        let flat: Vec<f32> = pixels.iter().copied().collect();
        let pixel_tensor = Tensor::from_array((shape, flat.into_boxed_slice()))?;

        let mut session = self
            .vision_session
            .lock()
            .map_err(|e| anyhow::anyhow!("vision session lock poisoned: {e}"))?;

        let outputs = session.run(ort::inputs! {
            "pixel_values" => pixel_tensor,
        })?;

        let value = outputs
            .get("image_embeds")
            .unwrap_or_else(|| &outputs[0]);
        let (shape, data) = value
            .try_extract_tensor::<f32>()
            .context("failed to extract image_embeds tensor")?;

        let dims: &[i64] = &shape;
        pooled_embedding(dims, data)
    }

    fn embed_text(&self, prompt: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        anyhow::ensure!(!input_ids.is_empty(), "prompt produced no tokens");

        let shape = vec![1i64, input_ids.len() as i64];
        let input_ids_tensor = Tensor::from_array((shape.clone(), input_ids.into_boxed_slice()))?;
        let attention_mask_tensor =
            Tensor::from_array((shape, attention_mask.into_boxed_slice()))?;

        let mut session = self
            .text_session
            .lock()
            .map_err(|e| anyhow::anyhow!("text session lock poisoned: {e}"))?;

        let outputs = session.run(ort::inputs! {
            "input_ids" => input_ids_tensor,
            "attention_mask" => attention_mask_tensor,
        })?;

        let value = outputs
            .get("text_embeds")
            .unwrap_or_else(|| &outputs[0]);
        let (shape, data) = value
            .try_extract_tensor::<f32>()
            .context("failed to extract text_embeds tensor")?;

        let dims: &[i64] = &shape;
        pooled_embedding(dims, data)
    }
}
