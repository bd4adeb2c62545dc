use actix_web::{http::StatusCode, web, HttpResponse, Responder};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::core::feedback::validation_details;
use crate::core::{FeedbackError, FeedbackService, ListingRepository, Ranker};
use crate::models::{
    ErrorResponse, FeedbackRequest, FeedbackResponse, HealthResponse, MatchRequest, RankRequest,
    RankResponse, WeightsResponse,
};
use crate::routes::auth::{JwtVerifier, Requester};

/// Upper bound on ranked results per request
const MAX_RANK_LIMIT: u16 = 100;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub feedback: FeedbackService,
    pub listings: Arc<dyn ListingRepository>,
    pub ranker: Ranker,
    pub verifier: Arc<JwtVerifier>,
}

/// Configure all ranking routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check)).service(
        web::scope("/ranking")
            .route("/feedback", web::post().to(submit_feedback))
            .route("/feedback", web::get().to(feedback_usage))
            .route("/weights", web::get().to(current_weights))
            .route("/match", web::post().to(match_listing))
            .route("/rank", web::post().to(rank_listings)),
    );
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let status = if state.feedback.health_check().await {
        "healthy"
    } else {
        "degraded"
    };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Record feedback on a listing and update the learned weights
///
/// POST /ranking/feedback
///
/// Request body:
/// ```json
/// {
///   "apartmentId": "uuid",
///   "userId": "uuid",
///   "feedback": "good|bad|neutral|saved|contacted",
///   "searchSessionId": "string",
///   "searchQuery": "string",
///   "searchFilters": { "priceMax": 1200, "amenities": ["wifi"] },
///   "apartmentPosition": 3,
///   "apartmentScore": 87.5,
///   "responseTimeMs": 1200
/// }
/// ```
async fn submit_feedback(
    state: web::Data<AppState>,
    requester: Requester,
    body: web::Json<serde_json::Value>,
) -> impl Responder {
    let request = match FeedbackRequest::from_json(body.into_inner()) {
        Ok(request) => request,
        Err(issues) => {
            tracing::info!("Feedback body rejected: {:?}", issues);
            return HttpResponse::BadRequest().json(
                ErrorResponse::new(
                    "validation_failed",
                    "Request body does not match the feedback schema",
                    400,
                )
                .with_details(issues),
            );
        }
    };

    match state.feedback.submit(requester.0, request).await {
        Ok(outcome) => HttpResponse::Ok().json(FeedbackResponse {
            success: true,
            message: "Feedback recorded".to_string(),
            component_scores: outcome.component_scores,
        }),
        Err(e) => feedback_error_response(&e),
    }
}

fn feedback_error_response(err: &FeedbackError) -> HttpResponse {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if status.is_server_error() {
        tracing::error!("Feedback submission failed: {}", err);
    } else {
        tracing::info!("Feedback submission rejected ({}): {}", status.as_u16(), err);
    }

    let mut body = ErrorResponse::new(err.kind(), err.to_string(), status.as_u16());
    if let FeedbackError::Validation(errors) = err {
        body = body.with_details(validation_details(errors));
    }

    HttpResponse::build(status).json(body)
}

/// Static usage document for the feedback endpoint
///
/// GET /ranking/feedback
async fn feedback_usage() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "endpoint": "/ranking/feedback",
        "method": "POST",
        "authentication": "Bearer token whose subject matches userId",
        "body": {
            "apartmentId": "uuid (required)",
            "userId": "uuid (required)",
            "feedback": "good | bad | neutral | saved | contacted (required)",
            "searchSessionId": "string, 1-128 chars",
            "searchQuery": "string, up to 500 chars",
            "searchFilters": "object: priceMin, priceMax, bedrooms, furnished, university, maxCommute, amenities",
            "apartmentPosition": "integer >= 0",
            "apartmentScore": "number in [0, 100]",
            "responseTimeMs": "integer >= 0"
        },
        "responses": {
            "200": "{ success, message, componentScores }",
            "400": "validation failure with per-field details",
            "401": "missing or invalid credentials",
            "403": "userId does not match the authenticated user",
            "404": "apartment not found",
            "500": "storage failure"
        }
    }))
}

/// Current learned category weights
///
/// GET /ranking/weights
async fn current_weights(state: web::Data<AppState>) -> impl Responder {
    match state.feedback.current_weights().await {
        Ok(snapshot) => HttpResponse::Ok().json(WeightsResponse {
            weights: snapshot.weights,
            last_updated: snapshot.last_updated,
            source: snapshot.source,
        }),
        Err(e) => {
            tracing::error!("Failed to load ranking weights: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::new(
                "weights_unavailable",
                e.to_string(),
                500,
            ))
        }
    }
}

/// Score one listing against a query
///
/// POST /ranking/match
async fn match_listing(
    state: web::Data<AppState>,
    req: web::Json<MatchRequest>,
) -> impl Responder {
    let listing = match state.listings.get_listing(req.apartment_id).await {
        Ok(Some(listing)) => listing,
        Ok(None) => {
            return HttpResponse::NotFound().json(ErrorResponse::new(
                "apartment_not_found",
                format!("Apartment not found: {}", req.apartment_id),
                404,
            ))
        }
        Err(e) => {
            tracing::error!("Failed to fetch apartment {}: {}", req.apartment_id, e);
            return HttpResponse::InternalServerError().json(ErrorResponse::new(
                "listing_lookup_failed",
                e.to_string(),
                500,
            ));
        }
    };

    HttpResponse::Ok().json(state.ranker.scorer().score(&listing, &req.query))
}

/// Rank a batch of listings against a query
///
/// POST /ranking/rank
///
/// Request body:
/// ```json
/// {
///   "apartmentIds": ["uuid"],
///   "query": { "maxPrice": 1200, "bedrooms": 2, "districts": ["Mitte"] },
///   "limit": 20
/// }
/// ```
async fn rank_listings(
    state: web::Data<AppState>,
    req: web::Json<RankRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return HttpResponse::BadRequest().json(
            ErrorResponse::new("validation_failed", errors.to_string(), 400)
                .with_details(validation_details(&errors)),
        );
    }

    let req = req.into_inner();
    let limit = req.limit.clamp(1, MAX_RANK_LIMIT) as usize;

    let listings = match state.listings.get_listings(&req.apartment_ids).await {
        Ok(listings) => listings,
        Err(e) => {
            tracing::error!("Failed to fetch {} apartments: {}", req.apartment_ids.len(), e);
            return HttpResponse::InternalServerError().json(ErrorResponse::new(
                "listing_lookup_failed",
                e.to_string(),
                500,
            ));
        }
    };

    let ranked = state.ranker.rank_listings(listings, &req.query, limit);

    tracing::info!(
        "Ranked {} of {} requested apartments",
        ranked.results.len(),
        req.apartment_ids.len()
    );

    HttpResponse::Ok().json(RankResponse {
        total_results: ranked.total_candidates,
        results: ranked.results,
    })
}
