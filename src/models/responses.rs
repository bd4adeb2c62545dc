use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::domain::MatchResult;
use crate::models::feedback::{ComponentRewardVector, WeightVector};

/// Response for a recorded feedback event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResponse {
    pub success: bool,
    pub message: String,
    pub component_scores: ComponentRewardVector,
}

/// Where a weight snapshot was served from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightSource {
    Cache,
    Store,
    Default,
}

/// Current learned category weights
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightsResponse {
    pub weights: WeightVector,
    pub last_updated: Option<chrono::DateTime<chrono::Utc>>,
    pub source: WeightSource,
}

/// Ranked listings for a query
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankResponse {
    pub results: Vec<MatchResult>,
    pub total_results: usize,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
    /// Per-field validation issues
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, Vec<String>>>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>, status_code: u16) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status_code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: BTreeMap<String, Vec<String>>) -> Self {
        self.details = Some(details);
        self
    }
}
