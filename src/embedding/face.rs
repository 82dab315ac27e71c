//! Remote face analysis over HTTP.
//!
//! Posts raw image bytes to `{url}/analyze` on an inference service running a
//! detector plus ArcFace-style recognizer, and expects
//! `{"faces": [{"embedding": [...], "bbox": [...], "det_score": ...}]}`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::{DetectedFace, FaceAnalyzer, FACE_EMBEDDING_DIM};
use crate::config::FaceConfig;

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    #[serde(default)]
    faces: Vec<DetectedFace>,
}

pub struct HttpFaceAnalyzer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpFaceAnalyzer {
    pub fn new(config: &FaceConfig) -> Result<Self> {
        anyhow::ensure!(!config.url.trim().is_empty(), "face.url is not set");
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/analyze", config.url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl FaceAnalyzer for HttpFaceAnalyzer {
    async fn detect_faces(&self, image: &[u8]) -> Result<Vec<DetectedFace>> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .with_context(|| format!("face service request to {} failed", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("face service returned HTTP {status}: {body}");
        }

        let parsed: AnalyzeResponse = response
            .json()
            .await
            .context("face service returned an invalid body")?;

        validate_faces(&parsed.faces)?;
        tracing::debug!(faces = parsed.faces.len(), "face analysis complete");
        Ok(parsed.faces)
    }
}

fn validate_faces(faces: &[DetectedFace]) -> Result<()> {
    for (i, face) in faces.iter().enumerate() {
        anyhow::ensure!(
            face.embedding.len() == FACE_EMBEDDING_DIM,
            "face {i} has {} dimensions, expected {FACE_EMBEDDING_DIM}",
            face.embedding.len()
        );
    }
    Ok(())
}
