#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use vectorizer::embedding::{DetectedFace, FaceAnalyzer, JointEmbedder};
use vectorizer::service::Vectorizer;
use vectorizer::store::types::{EmbeddingRecord, EmbeddingSpace, NewEmbeddingRecord, TenantScope};
use vectorizer::store::{EmbeddingStore, ObjectStorage, StoreError};

pub const TEST_DIM: usize = 8;

/// Deterministic unit vector with a spike at position `seed`.
pub fn test_embedding(seed: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; TEST_DIM];
    v[seed % TEST_DIM] = 1.0;
    v
}

/// Vector at `angle` radians from `test_embedding(0)` in the plane of seeds 0 and 1.
/// Its cosine similarity to `test_embedding(0)` is `angle.cos()`.
pub fn rotated_embedding(angle: f32) -> Vec<f32> {
    let mut v = vec![0.0f32; TEST_DIM];
    v[0] = angle.cos();
    v[1] = angle.sin();
    v
}

/// Vector whose cosine similarity to `test_embedding(0)` is exactly `similarity`.
pub fn embedding_with_similarity(similarity: f32) -> Vec<f32> {
    rotated_embedding(similarity.acos())
}

pub fn scope(event: &str, business: &str) -> TenantScope {
    TenantScope::new(event, business).unwrap()
}

pub fn record(
    id: &str,
    image_url: &str,
    scope: &TenantScope,
    face: Option<Vec<f32>>,
    image: Option<Vec<f32>>,
) -> EmbeddingRecord {
    EmbeddingRecord {
        id: id.to_string(),
        image_url: image_url.to_string(),
        event_id: scope.event_id().to_string(),
        business_id: scope.business_id().to_string(),
        face_embedding: face,
        image_embedding: image,
        created_at: None,
    }
}

/// Some bytes standing in for an encoded image. Fakes never decode them.
pub fn fake_image() -> Vec<u8> {
    vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3, 4]
}

// ── Fakes ────────────────────────────────────────────────────────────────────

/// In-memory embedding store. Inserts are recorded; the `fail_insert_at`-th
/// insert call (0-based) reports failure.
#[derive(Default)]
pub struct FakeStore {
    pub records: Mutex<Vec<EmbeddingRecord>>,
    pub inserted: Mutex<Vec<NewEmbeddingRecord>>,
    pub fail_insert_at: Option<usize>,
    pub unavailable: bool,
}

impl FakeStore {
    pub fn with_records(records: Vec<EmbeddingRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Default::default()
        }
    }

    pub fn inserted(&self) -> Vec<NewEmbeddingRecord> {
        self.inserted.lock().unwrap().clone()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Status {
                status: 503,
                body: "datastore offline".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingStore for FakeStore {
    async fn fetch_scoped(
        &self,
        scope: &TenantScope,
        space: EmbeddingSpace,
    ) -> Result<Vec<EmbeddingRecord>, StoreError> {
        self.check_available()?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.event_id == scope.event_id() && r.business_id == scope.business_id())
            .filter(|r| r.embedding(space).is_some())
            .cloned()
            .collect())
    }

    async fn list_scoped(&self, scope: &TenantScope) -> Result<Vec<EmbeddingRecord>, StoreError> {
        self.check_available()?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.event_id == scope.event_id() && r.business_id == scope.business_id())
            .cloned()
            .collect())
    }

    async fn insert(&self, record: &NewEmbeddingRecord) -> bool {
        let mut inserted = self.inserted.lock().unwrap();
        let call = inserted.len();
        inserted.push(record.clone());
        if self.fail_insert_at == Some(call) {
            return false;
        }
        let mut records = self.records.lock().unwrap();
        let id = records.len().to_string();
        records.push(EmbeddingRecord {
            id,
            image_url: record.image_url.clone(),
            event_id: record.event_id.clone(),
            business_id: record.business_id.clone(),
            face_embedding: Some(record.face_embedding.clone()),
            image_embedding: Some(record.image_embedding.clone()),
            created_at: None,
        });
        true
    }
}

/// Object storage that remembers uploaded names.
#[derive(Default)]
pub struct FakeObjects {
    pub uploads: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

impl FakeObjects {
    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStorage for FakeObjects {
    async fn put_object(
        &self,
        name: &str,
        _bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StoreError> {
        if self.fail {
            return Err(StoreError::Status {
                status: 500,
                body: "bucket unavailable".into(),
            });
        }
        self.uploads
            .lock()
            .unwrap()
            .push((name.to_string(), content_type.to_string()));
        Ok(format!("https://cdn.test/{name}"))
    }
}

/// Face analyzer returning a preset list, or failing.
#[derive(Default)]
pub struct FakeFaces {
    pub faces: Vec<Vec<f32>>,
    pub fail: bool,
}

impl FakeFaces {
    pub fn with_faces(faces: Vec<Vec<f32>>) -> Self {
        Self { faces, fail: false }
    }
}

#[async_trait]
impl FaceAnalyzer for FakeFaces {
    async fn detect_faces(&self, _image: &[u8]) -> Result<Vec<DetectedFace>> {
        anyhow::ensure!(!self.fail, "face service unreachable");
        Ok(self
            .faces
            .iter()
            .map(|embedding| DetectedFace {
                embedding: embedding.clone(),
                bbox: None,
                det_score: Some(0.99),
            })
            .collect())
    }
}

/// Joint embedder returning fixed vectors.
pub struct FakeJoint {
    pub image: Vec<f32>,
    pub text: Vec<f32>,
}

impl Default for FakeJoint {
    fn default() -> Self {
        Self {
            image: test_embedding(3),
            text: test_embedding(0),
        }
    }
}

impl JointEmbedder for FakeJoint {
    fn embed_image(&self, _image: &[u8]) -> Result<Vec<f32>> {
        Ok(self.image.clone())
    }

    fn embed_text(&self, _prompt: &str) -> Result<Vec<f32>> {
        Ok(self.text.clone())
    }

    fn dimensions(&self) -> usize {
        TEST_DIM
    }
}

/// Fakes wired into a [`Vectorizer`], with handles kept for assertions.
pub struct Harness {
    pub store: Arc<FakeStore>,
    pub objects: Arc<FakeObjects>,
    pub vectorizer: Arc<Vectorizer>,
}

pub fn harness(store: FakeStore, faces: FakeFaces, joint: FakeJoint) -> Harness {
    harness_with_objects(store, FakeObjects::default(), faces, joint)
}

pub fn harness_with_objects(
    store: FakeStore,
    objects: FakeObjects,
    faces: FakeFaces,
    joint: FakeJoint,
) -> Harness {
    let store = Arc::new(store);
    let objects = Arc::new(objects);
    let vectorizer = Vectorizer::new(
        store.clone(),
        objects.clone(),
        Arc::new(faces),
        Arc::new(joint),
    );
    Harness {
        store,
        objects,
        vectorizer: Arc::new(vectorizer),
    }
}
