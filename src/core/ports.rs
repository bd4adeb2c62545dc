//! Persistence and cache ports used by the ranking engine.
//!
//! Adapters live in `crate::services`; the orchestration in
//! `crate::core::feedback` only sees these traits.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::core::bandit::BanditState;
use crate::models::{ComponentRewardVector, FeedbackEvent, FeedbackKind, ListingProfile};

/// Errors surfaced by any port implementation
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Invalid stored data: {0}")]
    Corrupt(String),
}

/// Read-only access to listings owned by the listing-management subsystem
#[async_trait]
pub trait ListingRepository: Send + Sync {
    async fn get_listing(&self, id: Uuid) -> Result<Option<ListingProfile>, StoreError>;

    /// Listings that exist among `ids`; unknown ids are skipped
    async fn get_listings(&self, ids: &[Uuid]) -> Result<Vec<ListingProfile>, StoreError>;
}

/// Durable audit log of feedback events
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn insert_feedback(&self, event: &FeedbackEvent) -> Result<(), StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// The singleton bandit state row
#[async_trait]
pub trait BanditStateStore: Send + Sync {
    /// Current state, `None` until the first feedback event
    async fn load_state(&self) -> Result<Option<BanditState>, StoreError>;

    /// Atomically record one reward vector and resample the weights
    ///
    /// Implementations must serialize concurrent callers so no increment is
    /// lost.
    async fn apply_feedback(
        &self,
        rewards: &ComponentRewardVector,
        feedback: FeedbackKind,
    ) -> Result<BanditState, StoreError>;
}

/// Weight snapshot cache read by ranking consumers
#[async_trait]
pub trait WeightCache: Send + Sync {
    async fn get_weights(&self) -> Result<Option<BanditState>, StoreError>;

    async fn put_weights(&self, state: &BanditState) -> Result<(), StoreError>;

    async fn invalidate_weight_cache(&self) -> Result<(), StoreError>;
}
