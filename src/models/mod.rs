// Model exports
pub mod domain;
pub mod feedback;
pub mod requests;
pub mod responses;

pub use domain::{
    AccessibilityFeatures, AccessibilityNeeds, Amenities, Amenity, AmenityPriorities, AmenityTier,
    CategoryBreakdown, CommuteTarget, FeatureCategory, FeatureScore, ListingProfile, MatchResult,
    QueryContext, ScoringWeights,
};
pub use feedback::{
    CategoryVector, ComponentRewardVector, FeedbackEvent, FeedbackKind, RewardCategory,
    SearchFilters, WeightVector,
};
pub use requests::{FeedbackRequest, FieldIssues, MatchRequest, RankRequest};
pub use responses::{
    ErrorResponse, FeedbackResponse, HealthResponse, RankResponse, WeightSource, WeightsResponse,
};
