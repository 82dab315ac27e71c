mod helpers;

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use helpers::{
    embedding_with_similarity, fake_image, harness, record, scope, test_embedding, FakeFaces,
    FakeJoint, FakeObjects, FakeStore,
};
use vectorizer::service::{ServiceError, Vectorizer, DEFAULT_FACE_THRESHOLD};

fn face_corpus() -> FakeStore {
    let s = scope("e1", "b1");
    FakeStore::with_records(vec![
        record("1", "A", &s, Some(embedding_with_similarity(0.92)), None),
        record("2", "B", &s, Some(embedding_with_similarity(0.55)), None),
        record("3", "C", &s, Some(embedding_with_similarity(0.75)), None),
        // Another tenant holding an identical face.
        record("4", "X", &scope("e2", "b1"), Some(test_embedding(0)), None),
    ])
}

#[tokio::test]
async fn face_search_ranks_above_threshold_within_scope() {
    let faces = FakeFaces::with_faces(vec![test_embedding(0)]);
    let h = harness(face_corpus(), faces, FakeJoint::default());

    let search = h
        .vectorizer
        .find_by_image(&fake_image(), &scope("e1", "b1"), DEFAULT_FACE_THRESHOLD)
        .await
        .unwrap();

    let urls: Vec<&str> = search.matched_images.iter().map(|m| m.image_url.as_str()).collect();
    assert_eq!(urls, vec!["A", "C"]);
    assert!((search.matched_images[0].similarity - 0.92).abs() < 1e-4);
    assert!((search.matched_images[1].similarity - 0.75).abs() < 1e-4);
    assert!(search.uploaded_image_url.is_some(), "query image archived by default");
    assert_eq!(h.objects.upload_count(), 1);
}

#[tokio::test]
async fn face_search_uses_only_the_first_detected_face() {
    // The second face matches the stored record exactly; only the first counts.
    let s = scope("e1", "b1");
    let store = FakeStore::with_records(vec![record("1", "only-second", &s, Some(test_embedding(5)), None)]);
    let faces = FakeFaces::with_faces(vec![test_embedding(0), test_embedding(5)]);
    let h = harness(store, faces, FakeJoint::default());

    let search = h.vectorizer.find_by_image(&fake_image(), &s, 0.6).await.unwrap();

    assert!(search.matched_images.is_empty());
}

#[tokio::test]
async fn query_image_without_face_is_an_error_and_not_archived() {
    let h = harness(face_corpus(), FakeFaces::default(), FakeJoint::default());

    let err = h
        .vectorizer
        .find_by_image(&fake_image(), &scope("e1", "b1"), 0.6)
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::NoFaceDetected));
    assert_eq!(err.to_string(), "No face detected");
    assert_eq!(h.objects.upload_count(), 0);
}

#[tokio::test]
async fn degenerate_query_embedding_is_rejected() {
    let faces = FakeFaces::with_faces(vec![vec![0.0; 8]]);
    let h = harness(face_corpus(), faces, FakeJoint::default());

    let err = h
        .vectorizer
        .find_by_image(&fake_image(), &scope("e1", "b1"), 0.6)
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Vector(_)), "got {err:?}");
}

#[tokio::test]
async fn out_of_range_threshold_is_invalid_input() {
    let faces = FakeFaces::with_faces(vec![test_embedding(0)]);
    let h = harness(face_corpus(), faces, FakeJoint::default());

    for threshold in [1.5, -2.0, f32::NAN] {
        let err = h
            .vectorizer
            .find_by_image(&fake_image(), &scope("e1", "b1"), threshold)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)), "threshold {threshold}");
    }
}

#[tokio::test]
async fn empty_face_corpus_yields_empty_matches() {
    let faces = FakeFaces::with_faces(vec![test_embedding(0)]);
    let h = harness(FakeStore::default(), faces, FakeJoint::default());

    let search = h
        .vectorizer
        .find_by_image(&fake_image(), &scope("e1", "b1"), 0.6)
        .await
        .unwrap();

    assert!(search.matched_images.is_empty());
}

#[tokio::test]
async fn query_archiving_can_be_disabled() {
    let store = Arc::new(face_corpus());
    let objects = Arc::new(FakeObjects::default());
    let vectorizer = Vectorizer::new(
        store,
        objects.clone(),
        Arc::new(FakeFaces::with_faces(vec![test_embedding(0)])),
        Arc::new(FakeJoint::default()),
    )
    .with_query_archiving(false);

    let search = vectorizer
        .find_by_image(&fake_image(), &scope("e1", "b1"), 0.6)
        .await
        .unwrap();

    assert_eq!(search.uploaded_image_url, None);
    assert_eq!(search.matched_images.len(), 2);
    assert_eq!(objects.upload_count(), 0);
}

#[tokio::test]
async fn store_outage_surfaces_as_store_error() {
    let store = FakeStore {
        unavailable: true,
        ..Default::default()
    };
    let faces = FakeFaces::with_faces(vec![test_embedding(0)]);
    let h = harness(store, faces, FakeJoint::default());

    let err = h
        .vectorizer
        .find_by_image(&fake_image(), &scope("e1", "b1"), 0.6)
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Store(_)), "got {err:?}");
}

// ── Text search ──────────────────────────────────────────────────────────────

fn image_corpus() -> FakeStore {
    let s = scope("e1", "b1");
    let face = Some(test_embedding(7));
    FakeStore::with_records(vec![
        record("1", "beach", &s, face.clone(), Some(embedding_with_similarity(0.31))),
        record("2", "office", &s, face.clone(), Some(embedding_with_similarity(0.12))),
        record("3", "party", &s, face.clone(), Some(embedding_with_similarity(0.27))),
        // Second face of the beach photo shares its image embedding.
        record("4", "beach", &s, face.clone(), Some(embedding_with_similarity(0.31))),
        record("5", "no-clip", &s, face, None),
        record("6", "elsewhere", &scope("e9", "b1"), None, Some(test_embedding(0))),
    ])
}

#[tokio::test]
async fn text_search_returns_top_k_distinct_images() {
    let h = harness(image_corpus(), FakeFaces::default(), FakeJoint::default());

    let results = h
        .vectorizer
        .find_by_text("people at the beach", &scope("e1", "b1"), 2, -1.0)
        .await
        .unwrap();

    let urls: Vec<&str> = results.iter().map(|m| m.image_url.as_str()).collect();
    assert_eq!(urls, vec!["beach", "party"]);
}

#[tokio::test]
async fn text_search_applies_threshold() {
    let h = harness(image_corpus(), FakeFaces::default(), FakeJoint::default());

    let results = h
        .vectorizer
        .find_by_text("beach", &scope("e1", "b1"), 10, 0.2)
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|m| m.similarity > 0.2));
}

#[tokio::test]
async fn text_search_on_empty_scope_is_no_embeddings() {
    let h = harness(image_corpus(), FakeFaces::default(), FakeJoint::default());

    let err = h
        .vectorizer
        .find_by_text("beach", &scope("nobody", "b1"), 5, -1.0)
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::NoEmbeddings));
}

#[tokio::test]
async fn text_search_rejects_blank_prompt_and_zero_top_k() {
    let h = harness(image_corpus(), FakeFaces::default(), FakeJoint::default());
    let s = scope("e1", "b1");

    let err = h.vectorizer.find_by_text("   ", &s, 5, -1.0).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));

    let err = h.vectorizer.find_by_text("beach", &s, 0, -1.0).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}

// ── Listing ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_images_groups_faces_per_image() {
    let s = scope("e1", "b1");
    let early = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
    let late = Utc.with_ymd_and_hms(2025, 3, 1, 11, 0, 0).unwrap();

    let mut first = record("1", "group.jpg", &s, Some(test_embedding(0)), None);
    first.created_at = Some(late);
    let mut second = record("2", "group.jpg", &s, Some(test_embedding(1)), None);
    second.created_at = Some(early);
    let solo = record("3", "solo.jpg", &s, Some(test_embedding(2)), None);
    let foreign = record("4", "foreign.jpg", &scope("e2", "b2"), Some(test_embedding(0)), None);

    let store = FakeStore::with_records(vec![first, second, solo, foreign]);
    let h = harness(store, FakeFaces::default(), FakeJoint::default());

    let images = h.vectorizer.list_images(&s).await.unwrap();

    assert_eq!(images.len(), 2);
    assert_eq!(images[0].image_url, "group.jpg");
    assert_eq!(images[0].face_count, 2);
    assert_eq!(images[0].created_at, Some(early));
    assert_eq!(images[1].image_url, "solo.jpg");
    assert_eq!(images[1].face_count, 1);
    assert_eq!(images[1].created_at, None);
}

#[tokio::test]
async fn face_search_returns_every_matching_face_row() {
    let s = scope("e1", "b1");
    let store = FakeStore::with_records(vec![
        record("1", "group.jpg", &s, Some(embedding_with_similarity(0.9)), None),
        record("2", "group.jpg", &s, Some(embedding_with_similarity(0.8)), None),
        record("3", "solo.jpg", &s, Some(embedding_with_similarity(0.7)), None),
    ]);
    let faces = FakeFaces::with_faces(vec![test_embedding(0)]);
    let h = harness(store, faces, FakeJoint::default());

    let search = h.vectorizer.find_by_image(&fake_image(), &s, 0.5).await.unwrap();

    let urls: Vec<&str> = search.matched_images.iter().map(|m| m.image_url.as_str()).collect();
    assert_eq!(urls, vec!["group.jpg", "group.jpg", "solo.jpg"]);
}

#[tokio::test]
async fn joint_vector_of_wrong_dimension_is_upstream_error() {
    let joint = FakeJoint {
        text: vec![1.0, 0.0, 0.0],
        ..Default::default()
    };
    let h = harness(image_corpus(), FakeFaces::default(), joint);

    let err = h
        .vectorizer
        .find_by_text("beach", &scope("e1", "b1"), 5, -1.0)
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Upstream(_)), "got {err:?}");
    assert!(err.to_string().contains("dimensions"));
}
