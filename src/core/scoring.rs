use crate::core::features;
use crate::models::{
    CategoryBreakdown, FeatureCategory, FeatureScore, ListingProfile, MatchResult, QueryContext,
    ScoringWeights,
};

/// Maximum number of pros and cons reported per listing
const MAX_HIGHLIGHTS: usize = 5;

/// Entries at or above this score are reported as pros
const PRO_THRESHOLD: f64 = 90.0;

/// Entries at or below this score are reported as cons
const CON_THRESHOLD: f64 = 30.0;

/// Score reported for categories the query does not ask about
const NOT_APPLICABLE_SCORE: f64 = 100.0;

/// Deterministic multi-factor scorer for a listing against a query
///
/// Scoring formula:
/// total = (
///     basic * 0.30 +          # price, rooms, location
///     amenities * 0.25 +      # tiered amenity checklist
///     lifestyle * 0.20 +      # pets, smoking, lifestyle tags
///     accessibility * 0.10 +  # only if required
///     commute * 0.10 +        # only if destinations given
///     legal * 0.05            # only if registration required
/// )
/// Categories that do not apply count as 100.
#[derive(Debug, Clone)]
pub struct FeatureScorer {
    weights: ScoringWeights,
}

impl FeatureScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn with_default_weights() -> Self {
        Self {
            weights: ScoringWeights::default(),
        }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Score a listing, with per-feature explanations
    pub fn score(&self, listing: &ListingProfile, query: &QueryContext) -> MatchResult {
        let basic = features::basic(listing, query);
        let amenities = features::amenities(listing, query);
        let lifestyle = features::lifestyle(listing, query);
        let accessibility = features::accessibility(listing, query);
        let commute = features::commute(listing, query);
        let legal = features::legal(listing, query);

        let lifestyle_score = if features::is_lifestyle_dealbreaker(listing, query) {
            0.0
        } else {
            weighted_mean(&lifestyle)
        };

        let breakdown = CategoryBreakdown {
            basic: weighted_mean(&basic),
            amenities: weighted_mean(&amenities),
            lifestyle: lifestyle_score,
            accessibility: minimum(&accessibility),
            commute: weighted_mean(&commute),
            legal: weighted_mean(&legal),
        };

        let total_score = self.total(&breakdown);

        let feature_scores: Vec<FeatureScore> = [basic, amenities, lifestyle, accessibility, commute, legal]
            .into_iter()
            .flatten()
            .collect();

        let pros = highlights(&feature_scores, |score| score >= PRO_THRESHOLD);
        let cons = highlights(&feature_scores, |score| score <= CON_THRESHOLD);

        MatchResult {
            listing_id: listing.id,
            total_score,
            category_breakdown: breakdown,
            feature_scores,
            pros,
            cons,
            match_reason: match_reason(total_score).to_string(),
        }
    }

    fn total(&self, breakdown: &CategoryBreakdown) -> f64 {
        const CATEGORIES: [FeatureCategory; 6] = [
            FeatureCategory::Basic,
            FeatureCategory::Amenities,
            FeatureCategory::Lifestyle,
            FeatureCategory::Accessibility,
            FeatureCategory::Commute,
            FeatureCategory::Legal,
        ];

        let (weighted, weight_sum) = CATEGORIES.iter().fold((0.0, 0.0), |(sum, w), &c| {
            let weight = self.weights.get(c).max(0.0);
            (sum + weight * breakdown.get(c), w + weight)
        });

        if weight_sum > 0.0 {
            (weighted / weight_sum).clamp(0.0, 100.0)
        } else {
            0.0
        }
    }
}

impl Default for FeatureScorer {
    fn default() -> Self {
        Self::with_default_weights()
    }
}

/// Weighted mean of entry scores; an empty category is not applicable
fn weighted_mean(entries: &[FeatureScore]) -> f64 {
    let (sum, weights) = entries
        .iter()
        .fold((0.0, 0.0), |(s, w), e| (s + e.score * e.weight, w + e.weight));

    if weights > 0.0 {
        sum / weights
    } else {
        NOT_APPLICABLE_SCORE
    }
}

/// Lowest entry score, so any unmet hard requirement caps the category
fn minimum(entries: &[FeatureScore]) -> f64 {
    entries
        .iter()
        .map(|e| e.score)
        .fold(None, |min: Option<f64>, s| Some(min.map_or(s, |m| m.min(s))))
        .unwrap_or(NOT_APPLICABLE_SCORE)
}

fn highlights(entries: &[FeatureScore], keep: impl Fn(f64) -> bool) -> Vec<String> {
    entries
        .iter()
        .filter(|e| keep(e.score))
        .map(|e| e.reason.clone())
        .take(MAX_HIGHLIGHTS)
        .collect()
}

fn match_reason(total_score: f64) -> &'static str {
    if total_score >= 90.0 {
        "Excellent match for your requirements"
    } else if total_score >= 75.0 {
        "Good match with minor trade-offs"
    } else if total_score >= 60.0 {
        "Moderate match, review the trade-offs"
    } else {
        "Limited match for your requirements"
    }
}
