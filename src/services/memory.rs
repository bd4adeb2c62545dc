use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::core::bandit::BanditState;
use crate::core::ports::{BanditStateStore, FeedbackStore, ListingRepository, StoreError, WeightCache};
use crate::models::{ComponentRewardVector, FeedbackEvent, FeedbackKind, ListingProfile};

/// Process-local implementation of every port
///
/// Backs the test suite and single-node deployments without Postgres. The
/// bandit slot is guarded by an async mutex held across the whole
/// read-modify-write, so concurrent feedback never loses an increment.
#[derive(Default)]
pub struct InMemoryStore {
    listings: RwLock<HashMap<Uuid, ListingProfile>>,
    feedback: Mutex<Vec<FeedbackEvent>>,
    bandit: Mutex<Option<BanditState>>,
    cached_weights: Mutex<Option<BanditState>>,
    invalidations: AtomicUsize,
    fail_feedback_writes: AtomicBool,
    fail_bandit_updates: AtomicBool,
    fail_cache: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listings(listings: impl IntoIterator<Item = ListingProfile>) -> Self {
        Self {
            listings: RwLock::new(listings.into_iter().map(|l| (l.id, l)).collect()),
            ..Self::default()
        }
    }

    pub async fn upsert_listing(&self, listing: ListingProfile) {
        self.listings.write().await.insert(listing.id, listing);
    }

    pub async fn feedback_events(&self) -> Vec<FeedbackEvent> {
        self.feedback.lock().await.clone()
    }

    pub async fn bandit_state(&self) -> Option<BanditState> {
        self.bandit.lock().await.clone()
    }

    pub fn invalidation_count(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }

    /// Make subsequent feedback inserts fail
    pub fn set_fail_feedback_writes(&self, fail: bool) {
        self.fail_feedback_writes.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent bandit updates fail
    pub fn set_fail_bandit_updates(&self, fail: bool) {
        self.fail_bandit_updates.store(fail, Ordering::SeqCst);
    }

    /// Make every weight cache call fail
    pub fn set_fail_cache(&self, fail: bool) {
        self.fail_cache.store(fail, Ordering::SeqCst);
    }

    fn check_cache(&self) -> Result<(), StoreError> {
        if self.fail_cache.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("weight cache offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ListingRepository for InMemoryStore {
    async fn get_listing(&self, id: Uuid) -> Result<Option<ListingProfile>, StoreError> {
        Ok(self.listings.read().await.get(&id).cloned())
    }

    async fn get_listings(&self, ids: &[Uuid]) -> Result<Vec<ListingProfile>, StoreError> {
        let listings = self.listings.read().await;
        Ok(ids.iter().filter_map(|id| listings.get(id).cloned()).collect())
    }
}

#[async_trait]
impl FeedbackStore for InMemoryStore {
    async fn insert_feedback(&self, event: &FeedbackEvent) -> Result<(), StoreError> {
        if self.fail_feedback_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("feedback table offline".to_string()));
        }
        self.feedback.lock().await.push(event.clone());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl BanditStateStore for InMemoryStore {
    async fn load_state(&self) -> Result<Option<BanditState>, StoreError> {
        Ok(self.bandit.lock().await.clone())
    }

    async fn apply_feedback(
        &self,
        rewards: &ComponentRewardVector,
        feedback: FeedbackKind,
    ) -> Result<BanditState, StoreError> {
        let mut slot = self.bandit.lock().await;

        if self.fail_bandit_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("bandit state offline".to_string()));
        }

        let mut state = slot.clone().unwrap_or_default();
        state.learn(rewards, feedback, &mut rand::rng());
        *slot = Some(state.clone());

        Ok(state)
    }
}

#[async_trait]
impl WeightCache for InMemoryStore {
    async fn get_weights(&self) -> Result<Option<BanditState>, StoreError> {
        self.check_cache()?;
        Ok(self.cached_weights.lock().await.clone())
    }

    async fn put_weights(&self, state: &BanditState) -> Result<(), StoreError> {
        self.check_cache()?;
        *self.cached_weights.lock().await = Some(state.clone());
        Ok(())
    }

    async fn invalidate_weight_cache(&self) -> Result<(), StoreError> {
        self.check_cache()?;
        self.cached_weights.lock().await.take();
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
