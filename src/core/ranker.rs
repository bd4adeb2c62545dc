use crate::core::scoring::FeatureScorer;
use crate::models::{ListingProfile, MatchResult, QueryContext, ScoringWeights};

/// Result of ranking a batch of listings
#[derive(Debug)]
pub struct RankedListings {
    pub results: Vec<MatchResult>,
    pub total_candidates: usize,
}

/// Reference ranking consumer: score every listing and order the results
///
/// Ranks on the fixed category weights in `ScoringWeights` only; the learned
/// weight vector is published through `GET /ranking/weights` for external
/// consumers and is not read here.
///
/// # Pipeline Stages
/// 1. Drop listings with an unusable price
/// 2. Feature scoring
/// 3. Sort by total score, then by price
/// 4. Truncate to the limit
#[derive(Debug, Clone, Default)]
pub struct Ranker {
    scorer: FeatureScorer,
}

impl Ranker {
    pub fn new(weights: ScoringWeights) -> Self {
        Self {
            scorer: FeatureScorer::new(weights),
        }
    }

    pub fn scorer(&self) -> &FeatureScorer {
        &self.scorer
    }

    pub fn rank_listings(
        &self,
        listings: Vec<ListingProfile>,
        query: &QueryContext,
        limit: usize,
    ) -> RankedListings {
        let total_candidates = listings.len();

        let mut scored: Vec<(f64, MatchResult)> = listings
            .into_iter()
            .filter(|listing| listing.price.is_finite() && listing.price >= 0.0)
            .map(|listing| (listing.price, self.scorer.score(&listing, query)))
            .collect();

        // Score descending, then cheaper first
        scored.sort_by(|(price_a, a), (price_b, b)| {
            b.total_score
                .partial_cmp(&a.total_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    price_a
                        .partial_cmp(price_b)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });

        scored.truncate(limit);

        RankedListings {
            results: scored.into_iter().map(|(_, result)| result).collect(),
            total_candidates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn create_listing(price: f64, bedrooms: u8, district: &str) -> ListingProfile {
        ListingProfile {
            id: Uuid::new_v4(),
            price,
            bedrooms,
            bathrooms: 1,
            district: district.to_string(),
            floor: None,
            has_elevator: false,
            furnished: false,
            owner_verified: false,
            media_quality_score: 0.5,
            completeness_score: 0.5,
            amenities: Default::default(),
            lifestyle_tags: vec![],
            dedicated_workspace: false,
            pet_policy: None,
            smoking_policy: None,
            accessibility: Default::default(),
            commute_cache: HashMap::new(),
            registration_possible: true,
            market_value_score: None,
        }
    }

    fn create_query() -> QueryContext {
        QueryContext {
            max_price: Some(1000.0),
            bedrooms: Some(2),
            districts: vec!["Mitte".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_rank_orders_by_score() {
        let ranker = Ranker::default();
        let good = create_listing(900.0, 2, "Mitte");
        let over_budget = create_listing(1500.0, 2, "Mitte");
        let wrong_district = create_listing(900.0, 1, "Spandau");
        let good_id = good.id;

        let ranked = ranker.rank_listings(vec![over_budget, wrong_district, good], &create_query(), 10);

        assert_eq!(ranked.total_candidates, 3);
        assert_eq!(ranked.results[0].listing_id, good_id);
        for pair in ranked.results.windows(2) {
            assert!(pair[0].total_score >= pair[1].total_score);
        }
    }

    #[test]
    fn test_ties_break_on_price() {
        let ranker = Ranker::default();
        let pricey = create_listing(750.0, 2, "Mitte");
        let cheap = create_listing(700.0, 2, "Mitte");
        let cheap_id = cheap.id;

        let ranked = ranker.rank_listings(vec![pricey, cheap], &create_query(), 10);
        assert_eq!(ranked.results[0].listing_id, cheap_id);
    }

    #[test]
    fn test_respects_limit_and_skips_bad_prices() {
        let ranker = Ranker::default();
        let mut listings: Vec<ListingProfile> = (0..20)
            .map(|i| create_listing(500.0 + i as f64 * 50.0, 2, "Mitte"))
            .collect();
        listings.push(create_listing(f64::NAN, 2, "Mitte"));

        let ranked = ranker.rank_listings(listings, &create_query(), 5);
        assert_eq!(ranked.results.len(), 5);
        assert_eq!(ranked.total_candidates, 21);
    }
}
