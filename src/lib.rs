//! Face and image similarity search over tenant-scoped embeddings.
//!
//! Vectorizer accepts uploaded photos, derives one face identity embedding per
//! detected face plus a whole-image CLIP embedding, and stores them in an
//! external PostgREST datastore keyed by event and business. Later it finds
//! the photos that contain a given face, or that match a free-text prompt.
//!
//! | Query | Embedding space | Default threshold | Bound |
//! |-------|-----------------|-------------------|-------|
//! | Query image | Face (ArcFace, 512-d) | 0.6 | none |
//! | Text prompt | Image (CLIP ViT-B/32, 512-d) | -1.0 | top-k (5) |
//!
//! Every read and write is filtered by a [`store::types::TenantScope`]; records
//! from different scopes are never compared.
//!
//! # Architecture
//!
//! - **Storage**: Supabase, with a PostgREST table for embedding rows, Storage bucket for images
//! - **Embeddings**: local ONNX Runtime CLIP for images and text; a remote face
//!   detection/recognition service for faces
//! - **Search**: brute-force cosine similarity over the scope's fetched rows
//! - **Transport**: HTTP (axum)
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`embedding`] — Joint (CLIP) and face embedding collaborators
//! - [`search`] — Vector math and the ranked, thresholded matcher
//! - [`store`] — Embedding store gateway, embedding decoding, object storage
//! - [`service`] — Ingestion and query orchestration
//! - [`server`] — HTTP routes and startup wiring

pub mod config;
pub mod embedding;
pub mod search;
pub mod server;
pub mod service;
pub mod store;
