//! End-to-end submission tests against a temporary catalog

mod helpers;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use helpers::*;
use image::imageops::{self, FilterType};
use serde_json::json;
use sightid_engine::db::{individuals, sightings};
use sightid_engine::vision::DescriptorStrategy;
use sightid_engine::{EngineConfig, SightingSubmission, SubmissionError, SubmissionOutcome};

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_first_sighting_creates_individual() {
    let (_dir, pool) = create_test_db().await;
    let geocoder = StubGeocoder::ok("São Paulo", "São Paulo");
    let service = service(&pool, &EngineConfig::default(), geocoder.clone());

    let outcome = service.submit(submission(photo_p1(), None)).await.unwrap();

    let (individual_id, sighting_id) = match &outcome {
        SubmissionOutcome::Created { individual_id, sighting_id } => (*individual_id, *sighting_id),
        other => panic!("expected Created, got {:?}", other),
    };

    assert_eq!(count(&pool, "individuals").await, 1);
    assert_eq!(count(&pool, "sightings").await, 1);
    assert_eq!(geocoder.calls(), 1);

    let mut conn = pool.acquire().await.unwrap();
    let sighting = sightings::load_sighting(&mut conn, sighting_id).await.unwrap().unwrap();
    assert_eq!(sighting.individual_id, individual_id);
    assert_eq!(sighting.state, "São Paulo");
    assert!(!sighting.matched_existing);

    let individual = individuals::load_individual(&mut conn, individual_id).await.unwrap().unwrap();
    assert!(individual.name.starts_with("individual-20231005-"));
    assert_eq!(individual.descriptor_strategy, "shape");
    assert_eq!(individual.reference_photo, photo_p1());

    let response = outcome.into_response();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response_json(response).await,
        json!({"status": 200, "individual_id": individual_id, "sighting_id": sighting_id})
    );
}

#[tokio::test]
async fn test_known_individual_is_conflict_and_linked() {
    let (_dir, pool) = create_test_db().await;
    let service = service(&pool, &EngineConfig::default(), StubGeocoder::ok("SP", "Campinas"));

    let bob = service.submit(submission(photo_p1(), Some("Bob"))).await.unwrap();
    assert!(matches!(bob, SubmissionOutcome::Created { .. }));

    // Same animal, different lighting
    let relit = png(&disc(180, 60.0, 250, 90));
    let outcome = service.submit(submission(relit, Some("Not Bob"))).await.unwrap();

    match &outcome {
        SubmissionOutcome::Conflict { individual_id, matched_name, score, .. } => {
            assert_eq!(*individual_id, bob.individual_id());
            assert_eq!(matched_name, "Bob");
            assert!(*score <= 0.1);
        }
        other => panic!("expected Conflict, got {:?}", other),
    }

    // Dedup is advisory: the sighting is stored against Bob, no new individual
    assert_eq!(count(&pool, "individuals").await, 1);
    let mut conn = pool.acquire().await.unwrap();
    let linked = sightings::list_sightings_for(&mut conn, bob.individual_id()).await.unwrap();
    assert_eq!(linked.len(), 2);
    assert!(linked[1].matched_existing);
    drop(conn);

    let response = outcome.into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(response_json(response).await, json!({"detail": 102, "error": "Bob"}));
}

#[tokio::test]
async fn test_different_individual_is_created() {
    let (_dir, pool) = create_test_db().await;
    let service = service(&pool, &EngineConfig::default(), StubGeocoder::ok("SP", "Santos"));

    let first = service.submit(submission(photo_p1(), Some("Ana"))).await.unwrap();
    let second = service.submit(submission(photo_p2(), Some("Caio"))).await.unwrap();

    assert!(matches!(second, SubmissionOutcome::Created { .. }));
    assert_ne!(first.individual_id(), second.individual_id());
    assert_eq!(count(&pool, "individuals").await, 2);
}

#[tokio::test]
async fn test_geocoder_failure_stores_fallback() {
    let (_dir, pool) = create_test_db().await;
    let geocoder = StubGeocoder::failing();
    let service = service(&pool, &EngineConfig::default(), geocoder.clone());

    let outcome = service.submit(submission(photo_p1(), None)).await.unwrap();

    assert_eq!(geocoder.calls(), 1);
    let mut conn = pool.acquire().await.unwrap();
    let sighting = sightings::load_sighting(&mut conn, outcome.sighting_id()).await.unwrap().unwrap();
    assert_eq!(sighting.state, "indefinido");
    assert_eq!(sighting.city, "indefinido");
}

#[tokio::test]
async fn test_invalid_submissions_have_no_side_effects() {
    let (_dir, pool) = create_test_db().await;
    let geocoder = StubGeocoder::ok("SP", "SP");
    let service = service(&pool, &EngineConfig::default(), geocoder.clone());

    let cases = vec![
        submission(Vec::new(), None),
        submission(b"not a photo".to_vec(), None),
        // Flat photo: no edges, no shape
        submission(png(&disc(64, 0.0, 90, 90)), None),
        SightingSubmission { date: "2023-13-01".to_string(), ..submission(photo_p1(), None) },
        SightingSubmission { longitude: Some(200.0), ..submission(photo_p1(), None) },
    ];

    for case in cases {
        let err = service.submit(case).await.unwrap_err();
        assert!(matches!(err, SubmissionError::Validation(_)), "unexpected {:?}", err);
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    assert_eq!(geocoder.calls(), 0);
    assert_eq!(count(&pool, "individuals").await, 0);
    assert_eq!(count(&pool, "sightings").await, 0);
}

#[tokio::test]
async fn test_persistence_failure_rolls_back() {
    let (_dir, pool) = create_test_db().await;
    let service = service(&pool, &EngineConfig::default(), StubGeocoder::ok("SP", "SP"));

    // Individual insert succeeds, sighting insert fails
    sqlx::query("DROP TABLE sightings").execute(&pool).await.unwrap();

    let err = service.submit(submission(photo_p1(), Some("Ghost"))).await.unwrap_err();

    assert!(matches!(err, SubmissionError::Persistence(_)), "unexpected {:?}", err);
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(count(&pool, "individuals").await, 0);
}

fn keypoint_config() -> EngineConfig {
    EngineConfig {
        strategy: DescriptorStrategy::Keypoint,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_keypoint_strategy_end_to_end() {
    let (_dir, pool) = create_test_db().await;
    let service = service(&pool, &keypoint_config(), StubGeocoder::ok("MG", "Ouro Preto"));
    let texture = blurred_noise(320, 2.0, 42);

    let first = service.submit(submission(png(&texture), Some("Tex"))).await.unwrap();
    assert!(matches!(first, SubmissionOutcome::Created { .. }));

    // Same animal photographed from closer by
    let closer = imageops::resize(&texture, 480, 480, FilterType::Triangle);
    let second = service.submit(submission(png(&closer), None)).await.unwrap();
    match second {
        SubmissionOutcome::Conflict { individual_id, matched_name, score, .. } => {
            assert_eq!(individual_id, first.individual_id());
            assert_eq!(matched_name, "Tex");
            assert!(score > 60.0);
        }
        other => panic!("expected Conflict, got {:?}", other),
    }

    let mut conn = pool.acquire().await.unwrap();
    let individual = individuals::load_individual(&mut conn, first.individual_id()).await.unwrap().unwrap();
    assert_eq!(individual.descriptor_strategy, "keypoint");
}

#[tokio::test]
async fn test_keypoint_different_individual_is_created() {
    let (_dir, pool) = create_test_db().await;
    let service = service(&pool, &keypoint_config(), StubGeocoder::ok("MG", "Ouro Preto"));

    let first = service.submit(submission(png(&blurred_noise(320, 2.0, 42)), Some("Tex"))).await.unwrap();
    let second = service.submit(submission(png(&blurred_noise(320, 2.0, 1234)), Some("Rex"))).await.unwrap();

    assert!(matches!(second, SubmissionOutcome::Created { .. }), "unexpected {:?}", second);
    assert_ne!(first.individual_id(), second.individual_id());
    assert_eq!(count(&pool, "individuals").await, 2);
}

#[tokio::test]
async fn test_exif_position_is_stored() {
    let (_dir, pool) = create_test_db().await;
    let service = service(&pool, &EngineConfig::default(), StubGeocoder::ok("RJ", "Rio de Janeiro"));

    let body = jpeg_with_gps(&disc(64, 20.0, 200, 30), (22, 54, 0), b'S', (43, 12, 36), b'W');
    let outcome = service
        .submit(SightingSubmission {
            photo_body: body,
            latitude: None,
            longitude: None,
            ..submission(photo_p1(), None)
        })
        .await
        .unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let sighting = sightings::load_sighting(&mut conn, outcome.sighting_id()).await.unwrap().unwrap();
    assert!((sighting.latitude + 22.9).abs() < 1e-9);
    assert!((sighting.longitude + 43.21).abs() < 1e-9);
}

#[tokio::test]
async fn test_missing_position_is_rejected_with_detail_code() {
    let (_dir, pool) = create_test_db().await;
    let geocoder = StubGeocoder::ok("SP", "SP");
    let service = service(&pool, &EngineConfig::default(), geocoder.clone());

    let err = service
        .submit(SightingSubmission {
            latitude: None,
            longitude: None,
            ..submission(photo_p1(), None)
        })
        .await
        .unwrap_err();

    assert!(matches!(err, SubmissionError::MissingCoordinates));
    let response = err.into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response_json(response).await,
        json!({"detail": 101, "error": "Server could not extract coordinates from photo."})
    );

    assert_eq!(geocoder.calls(), 0);
    assert_eq!(count(&pool, "sightings").await, 0);
}
