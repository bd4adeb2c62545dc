// Integration tests for the rental ranker

use actix_web::{http::StatusCode, test, web, App};
use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rental_ranker::core::{
    BanditState, BanditStateStore, FeedbackError, FeedbackService, Ranker, StoreError,
};
use rental_ranker::models::{
    ComponentRewardVector, ErrorResponse, FeedbackKind, FeedbackRequest, ListingProfile,
    RewardCategory, WeightSource,
};
use rental_ranker::routes::auth::Claims;
use rental_ranker::routes::{self, AppState, JwtVerifier};
use rental_ranker::services::InMemoryStore;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use uuid::Uuid;

const SECRET: &str = "integration-secret";

fn create_test_listing(price: f64, bedrooms: u8, district: &str) -> ListingProfile {
    ListingProfile {
        id: Uuid::new_v4(),
        price,
        bedrooms,
        bathrooms: 1,
        district: district.to_string(),
        floor: Some(2),
        has_elevator: true,
        furnished: true,
        owner_verified: true,
        media_quality_score: 0.8,
        completeness_score: 0.9,
        amenities: Default::default(),
        lifestyle_tags: vec!["quiet".to_string()],
        dedicated_workspace: true,
        pet_policy: Some("pets allowed".to_string()),
        smoking_policy: Some("no smoking".to_string()),
        accessibility: Default::default(),
        commute_cache: HashMap::from([(
            "TU Berlin".to_string(),
            HashMap::from([("transit".to_string(), 25.0)]),
        )]),
        registration_possible: true,
        market_value_score: Some(0.7),
    }
}

fn feedback_request(listing_id: Uuid, user_id: Uuid, feedback: &str) -> FeedbackRequest {
    serde_json::from_value(json!({
        "apartmentId": listing_id,
        "userId": user_id,
        "feedback": feedback,
        "searchSessionId": "session-1",
        "searchFilters": { "priceMax": 1200, "bedrooms": 2, "amenities": ["wifi"] },
        "apartmentPosition": 1,
        "apartmentScore": 88.0
    }))
    .unwrap()
}

fn service(store: &Arc<InMemoryStore>) -> FeedbackService {
    FeedbackService::new(store.clone(), store.clone(), store.clone(), store.clone())
}

fn bearer(user_id: Uuid) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (chrono::Utc::now().timestamp() + 600) as usize,
        iss: None,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();
    format!("Bearer {}", token)
}

fn app_state(store: &Arc<InMemoryStore>) -> AppState {
    AppState {
        feedback: service(store),
        listings: store.clone(),
        ranker: Ranker::default(),
        verifier: Arc::new(JwtVerifier::new(SECRET, None)),
    }
}

#[tokio::test]
async fn test_feedback_records_event_then_learns() {
    let listing = create_test_listing(1000.0, 2, "Mitte");
    let store = Arc::new(InMemoryStore::with_listings([listing.clone()]));
    let user_id = Uuid::new_v4();

    let outcome = service(&store)
        .submit(Some(user_id), feedback_request(listing.id, user_id, "good"))
        .await
        .unwrap();

    for (_, reward) in outcome.component_scores.iter() {
        assert!((0.0..=1.0).contains(&reward));
    }
    // price within max, bedrooms met, wifi missing
    assert!((outcome.component_scores.constraint_fit - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(outcome.component_scores.engagement, 0.75);

    let events = store.feedback_events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].listing_id, listing.id);
    assert_eq!(events[0].feedback, FeedbackKind::Good);
    assert_eq!(events[0].component_scores, outcome.component_scores);

    let state = store.bandit_state().await.unwrap();
    assert!(state.is_consistent());
    assert!((state.weights.sum() - 1.0).abs() < 1e-3);
    assert_eq!(state.weights, outcome.weights);
    assert!(
        (state.trials[RewardCategory::Engagement] - 0.75).abs() < 1e-12,
        "good feedback trial increment equals the reward"
    );
    assert_eq!(store.invalidation_count(), 1);
}

#[tokio::test]
async fn test_validation_failure_has_no_side_effects() {
    let listing = create_test_listing(1000.0, 2, "Mitte");
    let store = Arc::new(InMemoryStore::with_listings([listing.clone()]));
    let user_id = Uuid::new_v4();

    let mut request = feedback_request(listing.id, user_id, "good");
    request.search_filters = Some(json!(["not", "an", "object"]));
    request.apartment_score = Some(140.0);

    let err = service(&store).submit(Some(user_id), request).await.unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert!(store.feedback_events().await.is_empty());
    assert!(store.bandit_state().await.is_none());
    assert_eq!(store.invalidation_count(), 0);
}

#[tokio::test]
async fn test_authorization_failures() {
    let listing = create_test_listing(1000.0, 2, "Mitte");
    let store = Arc::new(InMemoryStore::with_listings([listing.clone()]));
    let user_id = Uuid::new_v4();

    let err = service(&store)
        .submit(None, feedback_request(listing.id, user_id, "saved"))
        .await
        .unwrap_err();
    assert!(matches!(err, FeedbackError::Unauthenticated));
    assert_eq!(err.status_code(), 401);

    let err = service(&store)
        .submit(Some(Uuid::new_v4()), feedback_request(listing.id, user_id, "saved"))
        .await
        .unwrap_err();
    assert!(matches!(err, FeedbackError::Forbidden { .. }));
    assert_eq!(err.status_code(), 403);

    assert!(store.feedback_events().await.is_empty());
    assert!(store.bandit_state().await.is_none());
}

#[tokio::test]
async fn test_unknown_listing_is_not_found() {
    let store = Arc::new(InMemoryStore::new());
    let user_id = Uuid::new_v4();

    let err = service(&store)
        .submit(Some(user_id), feedback_request(Uuid::new_v4(), user_id, "bad"))
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), 404);
    assert!(store.feedback_events().await.is_empty());
}

#[tokio::test]
async fn test_failed_feedback_write_never_touches_bandit() {
    let listing = create_test_listing(1000.0, 2, "Mitte");
    let store = Arc::new(InMemoryStore::with_listings([listing.clone()]));
    let user_id = Uuid::new_v4();
    store.set_fail_feedback_writes(true);

    let err = service(&store)
        .submit(Some(user_id), feedback_request(listing.id, user_id, "contacted"))
        .await
        .unwrap_err();

    assert!(matches!(err, FeedbackError::FeedbackWrite(_)));
    assert_eq!(err.status_code(), 500);
    assert!(store.bandit_state().await.is_none());
    assert_eq!(store.invalidation_count(), 0);
}

#[tokio::test]
async fn test_bandit_failure_keeps_feedback_record() {
    let listing = create_test_listing(1000.0, 2, "Mitte");
    let store = Arc::new(InMemoryStore::with_listings([listing.clone()]));
    let user_id = Uuid::new_v4();
    store.set_fail_bandit_updates(true);

    let err = service(&store)
        .submit(Some(user_id), feedback_request(listing.id, user_id, "good"))
        .await
        .unwrap_err();

    assert!(matches!(err, FeedbackError::BanditUpdate(_)));
    assert_eq!(err.status_code(), 500);
    assert_eq!(store.feedback_events().await.len(), 1);
    assert!(store.bandit_state().await.is_none());
}

#[tokio::test]
async fn test_cache_failure_does_not_fail_feedback() {
    let listing = create_test_listing(1000.0, 2, "Mitte");
    let store = Arc::new(InMemoryStore::with_listings([listing.clone()]));
    let user_id = Uuid::new_v4();
    store.set_fail_cache(true);

    let outcome = service(&store)
        .submit(Some(user_id), feedback_request(listing.id, user_id, "neutral"))
        .await;

    assert!(outcome.is_ok());
    assert!(store.bandit_state().await.is_some());

    // Weight reads fall through to the store
    let snapshot = service(&store).current_weights().await.unwrap();
    assert_eq!(snapshot.source, WeightSource::Store);
}

#[tokio::test]
async fn test_weight_reads_go_default_then_store_then_cache() {
    let listing = create_test_listing(1000.0, 2, "Mitte");
    let store = Arc::new(InMemoryStore::with_listings([listing.clone()]));
    let service = service(&store);
    let user_id = Uuid::new_v4();

    let snapshot = service.current_weights().await.unwrap();
    assert_eq!(snapshot.source, WeightSource::Default);
    assert!(snapshot.last_updated.is_none());

    service
        .submit(Some(user_id), feedback_request(listing.id, user_id, "good"))
        .await
        .unwrap();

    let from_store = service.current_weights().await.unwrap();
    assert_eq!(from_store.source, WeightSource::Store);

    let from_cache = service.current_weights().await.unwrap();
    assert_eq!(from_cache.source, WeightSource::Cache);
    assert_eq!(from_cache.weights, from_store.weights);

    // Next feedback invalidates the snapshot
    service
        .submit(Some(user_id), feedback_request(listing.id, user_id, "bad"))
        .await
        .unwrap();
    assert_eq!(service.current_weights().await.unwrap().source, WeightSource::Store);
}

/// Bandit store whose first `load_state` pauses until released
struct PausedReadStore {
    inner: Arc<InMemoryStore>,
    gate: Mutex<Option<(oneshot::Sender<()>, oneshot::Receiver<()>)>>,
}

#[async_trait]
impl BanditStateStore for PausedReadStore {
    async fn load_state(&self) -> Result<Option<BanditState>, StoreError> {
        let state = self.inner.load_state().await;
        let gate = self.gate.lock().await.take();
        if let Some((reached, release)) = gate {
            let _ = reached.send(());
            let _ = release.await;
        }
        state
    }

    async fn apply_feedback(
        &self,
        rewards: &ComponentRewardVector,
        feedback: FeedbackKind,
    ) -> Result<BanditState, StoreError> {
        self.inner.apply_feedback(rewards, feedback).await
    }
}

#[tokio::test]
async fn test_backfill_racing_feedback_does_not_pin_stale_weights() {
    let listing = create_test_listing(1000.0, 2, "Mitte");
    let store = Arc::new(InMemoryStore::with_listings([listing.clone()]));
    let (reached_tx, reached_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel();
    let bandit = Arc::new(PausedReadStore {
        inner: store.clone(),
        gate: Mutex::new(Some((reached_tx, release_rx))),
    });
    let service = FeedbackService::new(store.clone(), store.clone(), bandit, store.clone());
    let user_id = Uuid::new_v4();

    service
        .submit(Some(user_id), feedback_request(listing.id, user_id, "good"))
        .await
        .unwrap();

    // Reader misses the cache and reads the store, then stalls
    let reader = tokio::spawn({
        let service = service.clone();
        async move { service.current_weights().await }
    });
    reached_rx.await.unwrap();

    for _ in 0..20 {
        service
            .submit(Some(user_id), feedback_request(listing.id, user_id, "bad"))
            .await
            .unwrap();
    }

    release_tx.send(()).unwrap();
    let stale = reader.await.unwrap().unwrap();

    let latest = store.bandit_state().await.unwrap();
    assert_ne!(stale.last_updated, Some(latest.last_updated));

    let served = service.current_weights().await.unwrap();
    assert_eq!(served.last_updated, Some(latest.last_updated));
    assert_eq!(served.weights, latest.weights);
}

#[tokio::test]
async fn test_concurrent_feedback_loses_no_updates() {
    let listing = create_test_listing(1000.0, 2, "Mitte");
    let store = Arc::new(InMemoryStore::with_listings([listing.clone()]));
    let service = service(&store);

    let handles: Vec<_> = (0..40)
        .map(|_| {
            let service = service.clone();
            let listing_id = listing.id;
            tokio::spawn(async move {
                let user_id = Uuid::new_v4();
                service
                    .submit(Some(user_id), feedback_request(listing_id, user_id, "good"))
                    .await
                    .map(|outcome| outcome.component_scores)
            })
        })
        .collect();

    let mut expected_engagement_trials = 0.0;
    for handle in handles {
        let rewards = handle.await.unwrap().unwrap();
        expected_engagement_trials += rewards.engagement;
    }

    let state = store.bandit_state().await.unwrap();
    assert_eq!(store.feedback_events().await.len(), 40);
    assert!((state.trials.engagement - expected_engagement_trials).abs() < 1e-9);
    assert!(state.is_consistent());
}

#[actix_web::test]
async fn test_http_feedback_round_trip() {
    let listing = create_test_listing(1000.0, 2, "Mitte");
    let store = Arc::new(InMemoryStore::with_listings([listing.clone()]));
    let user_id = Uuid::new_v4();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state(&store)))
            .app_data(routes::json_config())
            .configure(routes::configure_routes),
    )
    .await;

    let body = json!({
        "apartmentId": listing.id,
        "userId": user_id,
        "feedback": "contacted",
    });

    // Missing token
    let req = test::TestRequest::post()
        .uri("/ranking/feedback")
        .set_json(&body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Someone else's token
    let req = test::TestRequest::post()
        .uri("/ranking/feedback")
        .insert_header(("Authorization", bearer(Uuid::new_v4())))
        .set_json(&body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // Own token
    let req = test::TestRequest::post()
        .uri("/ranking/feedback")
        .insert_header(("Authorization", bearer(user_id)))
        .set_json(&body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let json: Value = test::read_body_json(resp).await;
    assert_eq!(json["success"], true);
    // no filters: constraintFit defaults to 0.5
    assert_eq!(json["componentScores"]["constraintFit"], 0.5);
    assert_eq!(json["componentScores"]["engagement"], 0.75);

    assert_eq!(store.feedback_events().await.len(), 1);
}

#[actix_web::test]
async fn test_http_validation_errors_carry_field_details() {
    let listing = create_test_listing(1000.0, 2, "Mitte");
    let store = Arc::new(InMemoryStore::with_listings([listing.clone()]));
    let user_id = Uuid::new_v4();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state(&store)))
            .app_data(routes::json_config())
            .configure(routes::configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/ranking/feedback")
        .insert_header(("Authorization", bearer(user_id)))
        .set_json(json!({
            "apartmentId": listing.id,
            "userId": user_id,
            "feedback": "good",
            "apartmentPosition": -1,
            "searchFilters": "cheap"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: ErrorResponse = test::read_body_json(resp).await;
    let details = body.details.unwrap();
    assert!(details.contains_key("apartmentPosition"));
    assert!(details.contains_key("searchFilters"));

    // Schema failures name the offending field too
    let cases = [
        (
            json!({ "apartmentId": listing.id, "userId": user_id, "feedback": "amazing" }),
            "feedback",
        ),
        (json!({ "apartmentId": listing.id, "feedback": "good" }), "userId"),
        (
            json!({ "apartmentId": "not-a-uuid", "userId": user_id, "feedback": "good" }),
            "apartmentId",
        ),
    ];

    for (body, field) in cases {
        let req = test::TestRequest::post()
            .uri("/ranking/feedback")
            .insert_header(("Authorization", bearer(user_id)))
            .set_json(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", field);

        let body: ErrorResponse = test::read_body_json(resp).await;
        let details = body.details.unwrap();
        assert!(details.contains_key(field), "{} missing from {:?}", field, details);
    }

    assert!(store.feedback_events().await.is_empty());
}

#[actix_web::test]
async fn test_http_rank_orders_and_caps_results() {
    let good = create_test_listing(900.0, 2, "Mitte");
    let pricey = create_test_listing(1800.0, 2, "Mitte");
    let far = create_test_listing(900.0, 1, "Spandau");
    let ids = vec![pricey.id, far.id, good.id, Uuid::new_v4()];
    let good_id = good.id;
    let store = Arc::new(InMemoryStore::with_listings([good, pricey, far]));

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state(&store)))
            .app_data(routes::json_config())
            .configure(routes::configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/ranking/rank")
        .set_json(json!({
            "apartmentIds": ids,
            "query": { "maxPrice": 1200, "bedrooms": 2, "districts": ["mitte"] },
            "limit": 2
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["totalResults"], 3);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["listingId"], json!(good_id));

    let req = test::TestRequest::post()
        .uri("/ranking/rank")
        .set_json(json!({ "apartmentIds": [] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_http_match_unknown_listing() {
    let store = Arc::new(InMemoryStore::new());
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state(&store)))
            .app_data(routes::json_config())
            .configure(routes::configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/ranking/match")
        .set_json(json!({ "apartmentId": Uuid::new_v4(), "query": {} }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
