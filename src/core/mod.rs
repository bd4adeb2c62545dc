// Core algorithm exports
pub mod bandit;
pub mod features;
pub mod feedback;
pub mod ports;
pub mod ranker;
pub mod rewards;
pub mod sampling;
pub mod scoring;

pub use bandit::{normalize_weights, sample_posteriors, BanditState, BANDIT_STATE_ID};
pub use feedback::{FeedbackError, FeedbackOutcome, FeedbackService, WeightSnapshot};
pub use ports::{BanditStateStore, FeedbackStore, ListingRepository, StoreError, WeightCache};
pub use ranker::{RankedListings, Ranker};
pub use rewards::compute_rewards;
pub use scoring::FeatureScorer;
