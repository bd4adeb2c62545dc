use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::ops::{Index, IndexMut};
use uuid::Uuid;

/// Discrete feedback signal submitted for a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Good,
    Bad,
    Neutral,
    Saved,
    Contacted,
}

impl FeedbackKind {
    pub const ALL: [FeedbackKind; 5] = [
        FeedbackKind::Good,
        FeedbackKind::Bad,
        FeedbackKind::Neutral,
        FeedbackKind::Saved,
        FeedbackKind::Contacted,
    ];

    /// Signed strength of the signal in [-1, 1]
    pub fn score(&self) -> f64 {
        match self {
            FeedbackKind::Good | FeedbackKind::Contacted => 1.0,
            FeedbackKind::Saved => 0.5,
            FeedbackKind::Neutral => 0.0,
            FeedbackKind::Bad => -1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackKind::Good => "good",
            FeedbackKind::Bad => "bad",
            FeedbackKind::Neutral => "neutral",
            FeedbackKind::Saved => "saved",
            FeedbackKind::Contacted => "contacted",
        }
    }
}

impl fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The six reward categories, one bandit arm each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RewardCategory {
    ConstraintFit,
    PersonalFit,
    Accessibility,
    TrustQuality,
    MarketValue,
    Engagement,
}

impl RewardCategory {
    pub const ALL: [RewardCategory; 6] = [
        RewardCategory::ConstraintFit,
        RewardCategory::PersonalFit,
        RewardCategory::Accessibility,
        RewardCategory::TrustQuality,
        RewardCategory::MarketValue,
        RewardCategory::Engagement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RewardCategory::ConstraintFit => "constraintFit",
            RewardCategory::PersonalFit => "personalFit",
            RewardCategory::Accessibility => "accessibility",
            RewardCategory::TrustQuality => "trustQuality",
            RewardCategory::MarketValue => "marketValue",
            RewardCategory::Engagement => "engagement",
        }
    }
}

impl fmt::Display for RewardCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per reward category
///
/// Serializes as a JSON object keyed by the camelCase category names, which is
/// also the persisted shape of the bandit weights, trials and successes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryVector {
    #[serde(default)]
    pub constraint_fit: f64,
    #[serde(default)]
    pub personal_fit: f64,
    #[serde(default)]
    pub accessibility: f64,
    #[serde(default)]
    pub trust_quality: f64,
    #[serde(default)]
    pub market_value: f64,
    #[serde(default)]
    pub engagement: f64,
}

/// Per-category rewards in [0, 1] derived from one feedback event
pub type ComponentRewardVector = CategoryVector;

/// Normalized category weights summing to 1
pub type WeightVector = CategoryVector;

impl CategoryVector {
    pub fn from_fn(mut f: impl FnMut(RewardCategory) -> f64) -> Self {
        let mut vector = Self::default();
        for category in RewardCategory::ALL {
            vector[category] = f(category);
        }
        vector
    }

    pub fn iter(&self) -> impl Iterator<Item = (RewardCategory, f64)> + '_ {
        RewardCategory::ALL.into_iter().map(move |c| (c, self[c]))
    }

    pub fn sum(&self) -> f64 {
        self.iter().map(|(_, v)| v).sum()
    }

    /// Default weights used before learning and for degenerate resamples
    pub fn default_weights() -> WeightVector {
        Self {
            constraint_fit: 0.30,
            personal_fit: 0.20,
            accessibility: 0.10,
            trust_quality: 0.15,
            market_value: 0.15,
            engagement: 0.10,
        }
    }
}

impl Index<RewardCategory> for CategoryVector {
    type Output = f64;

    fn index(&self, category: RewardCategory) -> &f64 {
        match category {
            RewardCategory::ConstraintFit => &self.constraint_fit,
            RewardCategory::PersonalFit => &self.personal_fit,
            RewardCategory::Accessibility => &self.accessibility,
            RewardCategory::TrustQuality => &self.trust_quality,
            RewardCategory::MarketValue => &self.market_value,
            RewardCategory::Engagement => &self.engagement,
        }
    }
}

impl IndexMut<RewardCategory> for CategoryVector {
    fn index_mut(&mut self, category: RewardCategory) -> &mut f64 {
        match category {
            RewardCategory::ConstraintFit => &mut self.constraint_fit,
            RewardCategory::PersonalFit => &mut self.personal_fit,
            RewardCategory::Accessibility => &mut self.accessibility,
            RewardCategory::TrustQuality => &mut self.trust_quality,
            RewardCategory::MarketValue => &mut self.market_value,
            RewardCategory::Engagement => &mut self.engagement,
        }
    }
}

/// Active search filters attached to a feedback submission
///
/// Parsed leniently from the free-form `searchFilters` object: unknown keys
/// are ignored and numeric values may arrive as strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub bedrooms: Option<f64>,
    pub furnished: Option<bool>,
    pub university: Option<String>,
    pub max_commute: Option<f64>,
    pub amenities: Vec<String>,
}

impl SearchFilters {
    pub fn from_json(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };

        let field = |camel: &str, snake: &str| object.get(camel).or_else(|| object.get(snake));

        let amenities = match field("amenities", "amenities") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect(),
            Some(Value::String(list)) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };

        Self {
            price_min: field("priceMin", "price_min").and_then(lenient_f64),
            price_max: field("priceMax", "price_max").and_then(lenient_f64),
            bedrooms: field("bedrooms", "bedrooms").and_then(lenient_f64),
            furnished: field("furnished", "furnished").and_then(lenient_bool),
            university: field("university", "university")
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            max_commute: field("maxCommute", "max_commute").and_then(lenient_f64),
            amenities,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.price_min.is_none()
            && self.price_max.is_none()
            && self.bedrooms.is_none()
            && self.furnished.is_none()
            && self.university.is_none()
            && self.max_commute.is_none()
            && self.amenities.is_empty()
    }
}

fn lenient_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn lenient_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Immutable audit record of one submitted feedback
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEvent {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub user_id: Uuid,
    pub feedback: FeedbackKind,
    pub search_session_id: Option<String>,
    pub search_query: Option<String>,
    pub search_filters: Option<Value>,
    pub listing_position: Option<i32>,
    pub listing_score: Option<f64>,
    pub response_time_ms: Option<i64>,
    /// Reward snapshot computed for this event
    pub component_scores: ComponentRewardVector,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_feedback_score_mapping() {
        assert_eq!(FeedbackKind::Good.score(), 1.0);
        assert_eq!(FeedbackKind::Contacted.score(), 1.0);
        assert_eq!(FeedbackKind::Saved.score(), 0.5);
        assert_eq!(FeedbackKind::Neutral.score(), 0.0);
        assert_eq!(FeedbackKind::Bad.score(), -1.0);
    }

    #[test]
    fn test_category_vector_serializes_camel_case_map() {
        let vector = CategoryVector::default_weights();
        let value = serde_json::to_value(vector).unwrap();

        for category in RewardCategory::ALL {
            assert!(value.get(category.as_str()).is_some(), "missing {}", category);
        }
        assert_eq!(value["trustQuality"], json!(0.15));
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        assert!((CategoryVector::default_weights().sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_index_by_category() {
        let mut vector = CategoryVector::default();
        vector[RewardCategory::MarketValue] = 0.7;
        assert_eq!(vector.market_value, 0.7);
        assert_eq!(vector[RewardCategory::MarketValue], 0.7);
    }

    #[test]
    fn test_search_filters_lenient_parse() {
        let filters = SearchFilters::from_json(&json!({
            "priceMin": "500",
            "price_max": 1200,
            "bedrooms": 2,
            "furnished": "yes",
            "university": "  TU Berlin ",
            "maxCommute": 30,
            "amenities": "wifi, washer",
            "sortBy": "price"
        }));

        assert_eq!(filters.price_min, Some(500.0));
        assert_eq!(filters.price_max, Some(1200.0));
        assert_eq!(filters.bedrooms, Some(2.0));
        assert_eq!(filters.furnished, Some(true));
        assert_eq!(filters.university.as_deref(), Some("TU Berlin"));
        assert_eq!(filters.max_commute, Some(30.0));
        assert_eq!(filters.amenities, vec!["wifi", "washer"]);
    }

    #[test]
    fn test_search_filters_non_object_is_empty() {
        assert!(SearchFilters::from_json(&json!([1, 2, 3])).is_empty());
        assert!(SearchFilters::from_json(&json!({})).is_empty());
    }
}
