use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::core::bandit::BanditState;
use crate::core::ports::{BanditStateStore, FeedbackStore, ListingRepository, StoreError, WeightCache};
use crate::core::rewards::compute_rewards;
use crate::models::{
    ComponentRewardVector, FeedbackEvent, FeedbackRequest, SearchFilters, WeightSource,
    WeightVector,
};

/// Failures of a feedback submission, in pipeline order
#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("User {requester} cannot submit feedback on behalf of {subject}")]
    Forbidden { requester: Uuid, subject: Uuid },

    #[error("Apartment not found: {0}")]
    ListingNotFound(Uuid),

    #[error("Failed to look up apartment: {0}")]
    ListingLookup(#[source] StoreError),

    #[error("Failed to record feedback: {0}")]
    FeedbackWrite(#[source] StoreError),

    #[error("Feedback recorded but ranking weights were not updated: {0}")]
    BanditUpdate(#[source] StoreError),
}

impl FeedbackError {
    pub fn status_code(&self) -> u16 {
        match self {
            FeedbackError::Validation(_) => 400,
            FeedbackError::Unauthenticated => 401,
            FeedbackError::Forbidden { .. } => 403,
            FeedbackError::ListingNotFound(_) => 404,
            FeedbackError::ListingLookup(_)
            | FeedbackError::FeedbackWrite(_)
            | FeedbackError::BanditUpdate(_) => 500,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FeedbackError::Validation(_) => "validation_failed",
            FeedbackError::Unauthenticated => "unauthenticated",
            FeedbackError::Forbidden { .. } => "forbidden",
            FeedbackError::ListingNotFound(_) => "apartment_not_found",
            FeedbackError::ListingLookup(_) => "listing_lookup_failed",
            FeedbackError::FeedbackWrite(_) => "feedback_write_failed",
            FeedbackError::BanditUpdate(_) => "weight_update_failed",
        }
    }
}

/// Outcome of a recorded and learned feedback event
#[derive(Debug, Clone)]
pub struct FeedbackOutcome {
    pub event_id: Uuid,
    pub component_scores: ComponentRewardVector,
    pub weights: WeightVector,
}

/// Weight snapshot for ranking consumers
#[derive(Debug, Clone)]
pub struct WeightSnapshot {
    pub weights: WeightVector,
    pub last_updated: Option<chrono::DateTime<chrono::Utc>>,
    pub source: WeightSource,
}

/// Feedback ingestion and weight read-through
///
/// Stateless apart from its injected collaborators.
#[derive(Clone)]
pub struct FeedbackService {
    listings: Arc<dyn ListingRepository>,
    feedback: Arc<dyn FeedbackStore>,
    bandit: Arc<dyn BanditStateStore>,
    weight_cache: Arc<dyn WeightCache>,
}

impl FeedbackService {
    pub fn new(
        listings: Arc<dyn ListingRepository>,
        feedback: Arc<dyn FeedbackStore>,
        bandit: Arc<dyn BanditStateStore>,
        weight_cache: Arc<dyn WeightCache>,
    ) -> Self {
        Self {
            listings,
            feedback,
            bandit,
            weight_cache,
        }
    }

    /// Validate, authorize, compute rewards, persist, then learn
    ///
    /// The bandit is only touched after the feedback record is durably
    /// stored; a failed insert leaves the weights untouched.
    pub async fn submit(
        &self,
        requester: Option<Uuid>,
        request: FeedbackRequest,
    ) -> Result<FeedbackOutcome, FeedbackError> {
        request.validate().map_err(FeedbackError::Validation)?;

        let requester = requester.ok_or(FeedbackError::Unauthenticated)?;
        if requester != request.user_id {
            return Err(FeedbackError::Forbidden {
                requester,
                subject: request.user_id,
            });
        }

        let listing = self
            .listings
            .get_listing(request.apartment_id)
            .await
            .map_err(FeedbackError::ListingLookup)?
            .ok_or(FeedbackError::ListingNotFound(request.apartment_id))?;

        let filters = request
            .search_filters
            .as_ref()
            .map(SearchFilters::from_json)
            .unwrap_or_default();

        let rewards = compute_rewards(&listing, &filters, request.feedback);

        debug!(
            "Computed rewards for apartment {} ({}): {:?}",
            listing.id, request.feedback, rewards
        );

        let event = FeedbackEvent {
            id: Uuid::new_v4(),
            listing_id: listing.id,
            user_id: request.user_id,
            feedback: request.feedback,
            search_session_id: request.search_session_id,
            search_query: request.search_query,
            search_filters: request.search_filters,
            listing_position: request.apartment_position,
            listing_score: request.apartment_score,
            response_time_ms: request.response_time_ms,
            component_scores: rewards,
            created_at: chrono::Utc::now(),
        };

        self.feedback
            .insert_feedback(&event)
            .await
            .map_err(FeedbackError::FeedbackWrite)?;

        let state = self
            .bandit
            .apply_feedback(&rewards, request.feedback)
            .await
            .map_err(|e| {
                warn!("Feedback {} stored but bandit update failed: {}", event.id, e);
                FeedbackError::BanditUpdate(e)
            })?;

        if let Err(e) = self.weight_cache.invalidate_weight_cache().await {
            warn!("Failed to invalidate weight cache: {}", e);
        }

        info!(
            "Recorded {} feedback {} from user {} on apartment {}",
            event.feedback, event.id, event.user_id, event.listing_id
        );

        Ok(FeedbackOutcome {
            event_id: event.id,
            component_scores: rewards,
            weights: state.weights,
        })
    }

    /// Current weights: cache first, then the store, then the defaults
    pub async fn current_weights(&self) -> Result<WeightSnapshot, StoreError> {
        match self.weight_cache.get_weights().await {
            Ok(Some(state)) => return Ok(snapshot(state, WeightSource::Cache)),
            Ok(None) => {}
            Err(e) => warn!("Weight cache read failed, falling back to store: {}", e),
        }

        let Some(state) = self.bandit.load_state().await? else {
            return Ok(WeightSnapshot {
                weights: WeightVector::default_weights(),
                last_updated: None,
                source: WeightSource::Default,
            });
        };

        match self.weight_cache.put_weights(&state).await {
            Ok(()) => self.drop_stale_backfill(&state).await,
            Err(e) => warn!("Failed to populate weight cache: {}", e),
        }

        Ok(snapshot(state, WeightSource::Store))
    }

    /// Undo a back-fill that lost a race with a concurrent learning step
    ///
    /// A submit that lands between our store read and our cache write has
    /// already invalidated, so the snapshot we just cached may be older than
    /// the store. Re-read and invalidate unless the store still matches.
    async fn drop_stale_backfill(&self, cached: &BanditState) {
        let still_current = match self.bandit.load_state().await {
            Ok(Some(latest)) => latest.last_updated == cached.last_updated,
            Ok(None) => false,
            Err(e) => {
                warn!("Could not confirm cached weights are current: {}", e);
                false
            }
        };

        if still_current {
            return;
        }

        debug!("Weights changed during back-fill, invalidating cached snapshot");
        if let Err(e) = self.weight_cache.invalidate_weight_cache().await {
            warn!("Failed to invalidate stale weight snapshot: {}", e);
        }
    }

    pub async fn health_check(&self) -> bool {
        self.feedback.health_check().await.is_ok()
    }
}

fn snapshot(state: BanditState, source: WeightSource) -> WeightSnapshot {
    WeightSnapshot {
        weights: state.weights,
        last_updated: Some(state.last_updated),
        source,
    }
}

/// Field -> messages map for validation failures, keyed by wire names
pub fn validation_details(errors: &ValidationErrors) -> BTreeMap<String, Vec<String>> {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, issues)| {
            let messages = issues
                .iter()
                .map(|issue| match &issue.message {
                    Some(message) => message.to_string(),
                    None => format!("failed '{}' check", issue.code),
                })
                .collect();
            (to_camel_case(&field), messages)
        })
        .collect()
}

fn to_camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
