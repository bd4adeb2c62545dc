//! Rental Ranker - adaptive ranking engine for rental listings
//!
//! Scores listings against a renter's query with a deterministic multi-factor
//! scorer, and learns global category weights from explicit feedback with a
//! Thompson-sampling Beta bandit.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{BanditState, FeatureScorer, FeedbackService, Ranker};
pub use crate::models::{
    ComponentRewardVector, FeedbackKind, FeedbackRequest, ListingProfile, MatchResult,
    QueryContext, ScoringWeights, WeightVector,
};
