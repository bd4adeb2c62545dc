//! Per-category feature checks.
//!
//! Each function returns the explained [`FeatureScore`] entries for one
//! category. An empty vector means the category does not apply to the query.

use crate::models::{
    Amenity, AmenityTier, FeatureCategory, FeatureScore, ListingProfile, QueryContext,
};

/// Budget share under which a listing counts as excellent value
const VALUE_BUDGET_SHARE: f64 = 0.8;

/// Score for a commute destination without cached travel time
const APPROXIMATE_COMMUTE_SCORE: f64 = 75.0;

/// Price, rooms and location, equally weighted
pub fn basic(listing: &ListingProfile, query: &QueryContext) -> Vec<FeatureScore> {
    vec![price(listing, query), rooms(listing, query), location(listing, query)]
}

fn price(listing: &ListingProfile, query: &QueryContext) -> FeatureScore {
    let price = listing.price;
    let entry = |score: f64, reason: String| {
        FeatureScore::new(FeatureCategory::Basic, "price", score, 1.0, reason)
    };

    if let Some(max) = query.max_price.filter(|m| *m > 0.0) {
        if price > max {
            let overage = (price - max) / max * 100.0;
            return entry(
                (100.0 - overage).max(0.0),
                format!("{:.0}% over your maximum budget", overage),
            );
        }
    }

    if let Some(min) = query.min_price {
        if price < min {
            return entry(80.0, "Priced below your range, worth double-checking".to_string());
        }
    }

    match query.max_price.filter(|m| *m > 0.0) {
        Some(max) if price < max * VALUE_BUDGET_SHARE => {
            entry(100.0, "Excellent value, well under your budget".to_string())
        }
        Some(_) => entry(100.0, "Within your budget".to_string()),
        None => entry(100.0, "No budget limit set".to_string()),
    }
}

fn rooms(listing: &ListingProfile, query: &QueryContext) -> FeatureScore {
    let entry = |score: f64, reason: String| {
        FeatureScore::new(FeatureCategory::Basic, "bedrooms", score, 1.0, reason)
    };

    let Some(desired) = query.bedrooms else {
        return entry(100.0, "No bedroom preference".to_string());
    };

    let actual = listing.bedrooms;
    if actual == desired {
        entry(100.0, format!("Exactly {} bedroom(s) as requested", desired))
    } else if actual < desired {
        let missing = (desired - actual) as f64;
        entry(
            (100.0 - missing * 30.0).max(0.0),
            format!("{} bedroom(s) fewer than requested", desired - actual),
        )
    } else {
        entry(90.0, format!("{} more bedroom(s) than needed", actual - desired))
    }
}

fn location(listing: &ListingProfile, query: &QueryContext) -> FeatureScore {
    let district = listing.district.trim();
    let mut score: f64 = 70.0;
    let mut reason = format!("Located in {}", district);

    if !query.districts.is_empty() {
        let matched = query
            .districts
            .iter()
            .any(|d| d.trim().eq_ignore_ascii_case(district));
        if matched {
            score = 100.0;
            reason = format!("In your preferred district {}", district);
        } else {
            score = 50.0;
            reason = format!("{} is outside your preferred districts", district);
        }
    }

    if !query.commute.is_empty() {
        score = (score + 10.0).min(100.0);
    }

    FeatureScore::new(FeatureCategory::Basic, "location", score, 1.0, reason)
}

/// Amenity checklist weighted by the searcher's priority tiers
pub fn amenities(listing: &ListingProfile, query: &QueryContext) -> Vec<FeatureScore> {
    Amenity::ALL
        .iter()
        .filter_map(|&amenity| {
            let present = listing.has_amenity(amenity);
            let name = amenity.label();
            let (score, weight, reason) = match (query.amenities.tier(amenity), present) {
                (AmenityTier::Essential, true) => (100.0, 3.0, format!("Has essential {}", name)),
                (AmenityTier::Essential, false) => {
                    (0.0, 3.0, format!("Missing essential {}", name))
                }
                (AmenityTier::Important, true) => (100.0, 2.0, format!("Has {}", name)),
                (AmenityTier::Important, false) => (50.0, 2.0, format!("No {}", name)),
                (AmenityTier::Nice, true) => (100.0, 1.0, format!("Bonus: {}", name)),
                (AmenityTier::Nice, false) => return None,
            };
            Some(FeatureScore::new(
                FeatureCategory::Amenities,
                amenity.key(),
                score,
                weight,
                reason,
            ))
        })
        .collect()
}

/// True when a free-form house-rule string forbids the thing it governs
pub fn policy_disallows(policy: &str) -> bool {
    let normalized = policy.trim().to_lowercase().replace(['-', ' '], "_");
    matches!(
        normalized.as_str(),
        "no" | "false" | "not_allowed" | "disallowed" | "forbidden" | "prohibited" | "none"
            | "no_pets" | "no_smoking" | "non_smoking" | "smoke_free"
    )
}

/// True when a house-rule string explicitly allows the thing it governs
pub fn policy_allows(policy: &str) -> bool {
    let normalized = policy.trim().to_lowercase().replace(['-', ' '], "_");
    matches!(
        normalized.as_str(),
        "yes" | "true" | "allowed" | "permitted" | "ok" | "pets_allowed" | "smoking_allowed"
            | "negotiable" | "outside_only" | "balcony_only"
    )
}

/// Pet, smoking and lifestyle-tag fit
///
/// A disallowing pet policy for a pet owner is a dealbreaker handled by the
/// scorer; see [`is_lifestyle_dealbreaker`].
pub fn lifestyle(listing: &ListingProfile, query: &QueryContext) -> Vec<FeatureScore> {
    let mut entries = Vec::new();

    if query.has_pets {
        let disallowed = listing.pet_policy.as_deref().is_some_and(policy_disallows);
        entries.push(if disallowed {
            FeatureScore::new(FeatureCategory::Lifestyle, "pets", 0.0, 3.0, "Pets are not allowed")
        } else {
            FeatureScore::new(FeatureCategory::Lifestyle, "pets", 100.0, 3.0, "Pet friendly")
        });
    }

    let policy = listing.smoking_policy.as_deref();
    let allows = policy.is_some_and(policy_allows);
    let disallows = policy.is_some_and(policy_disallows);
    let (score, reason) = match (query.smoker, allows, disallows) {
        (true, true, _) => (100.0, "Smoking allowed"),
        (true, _, true) => (30.0, "Smoking not allowed"),
        (false, _, true) => (100.0, "Smoke-free home"),
        (false, true, _) => (70.0, "Smoking is allowed here"),
        _ => (70.0, "Smoking policy not specified"),
    };
    entries.push(FeatureScore::new(FeatureCategory::Lifestyle, "smoking", score, 2.0, reason));

    if !query.lifestyle.is_empty() || query.works_from_home {
        let mut fit: f64 = 70.0;
        let mut reasons = Vec::new();

        if !query.lifestyle.is_empty() {
            let shared = query
                .lifestyle
                .iter()
                .filter(|wanted| {
                    listing
                        .lifestyle_tags
                        .iter()
                        .any(|tag| tag.trim().eq_ignore_ascii_case(wanted.trim()))
                })
                .count();
            fit += 20.0 * shared as f64 / query.lifestyle.len() as f64;
            reasons.push(format!("{} of {} lifestyle preferences met", shared, query.lifestyle.len()));
        }

        if query.works_from_home {
            if listing.dedicated_workspace {
                fit += 10.0;
                reasons.push("dedicated workspace for remote work".to_string());
            } else {
                reasons.push("no dedicated workspace".to_string());
            }
        }

        entries.push(FeatureScore::new(
            FeatureCategory::Lifestyle,
            "lifestyle_fit",
            fit.min(100.0),
            1.0,
            capitalize(&reasons.join(", ")),
        ));
    }

    entries
}

pub fn is_lifestyle_dealbreaker(listing: &ListingProfile, query: &QueryContext) -> bool {
    query.has_pets && listing.pet_policy.as_deref().is_some_and(policy_disallows)
}

/// Accessibility checks, only when the searcher has requirements
///
/// The category score is the minimum entry, so an unmet wheelchair need
/// zeroes it and unmet elevator / step-free needs cap it at 20 / 50.
pub fn accessibility(listing: &ListingProfile, query: &QueryContext) -> Vec<FeatureScore> {
    let needs = &query.accessibility;
    let mut entries = Vec::new();
    let entry = |feature: &str, score: f64, reason: &str| {
        FeatureScore::new(FeatureCategory::Accessibility, feature, score, 1.0, reason)
    };

    if needs.wheelchair {
        entries.push(if listing.accessibility.wheelchair_accessible {
            entry("wheelchair", 100.0, "Wheelchair accessible")
        } else {
            entry("wheelchair", 0.0, "Not wheelchair accessible")
        });
    }

    if needs.elevator {
        entries.push(if listing.elevator() {
            entry("elevator", 100.0, "Building has an elevator")
        } else {
            entry("elevator", 20.0, "No elevator in the building")
        });
    }

    if needs.step_free_entrance {
        entries.push(if listing.accessibility.step_free_entrance {
            entry("step_free_entrance", 100.0, "Step-free entrance")
        } else {
            entry("step_free_entrance", 50.0, "Entrance has steps")
        });
    }

    entries
}

/// Commute checks for each requested destination
pub fn commute(listing: &ListingProfile, query: &QueryContext) -> Vec<FeatureScore> {
    query
        .commute
        .iter()
        .map(|target| {
            let minutes = listing.commute_minutes(&target.destination, target.mode.as_deref());
            let (score, reason) = match minutes {
                Some(minutes) if minutes <= target.max_minutes => (
                    100.0,
                    format!("{:.0} min to {}", minutes, target.destination),
                ),
                Some(minutes) if target.max_minutes > 0.0 => {
                    let overage = (minutes - target.max_minutes) / target.max_minutes * 100.0;
                    (
                        (100.0 - overage).max(0.0),
                        format!(
                            "{:.0} min to {}, over your {:.0} min limit",
                            minutes, target.destination, target.max_minutes
                        ),
                    )
                }
                Some(minutes) => (0.0, format!("{:.0} min to {}", minutes, target.destination)),
                None => (
                    APPROXIMATE_COMMUTE_SCORE,
                    format!("Commute to {} not yet measured", target.destination),
                ),
            };
            FeatureScore::new(
                FeatureCategory::Commute,
                format!("commute_{}", target.destination.trim().to_lowercase()),
                score,
                1.0,
                reason,
            )
        })
        .collect()
}

/// Address registration, only when the searcher needs it
pub fn legal(listing: &ListingProfile, query: &QueryContext) -> Vec<FeatureScore> {
    if !query.requires_registration {
        return Vec::new();
    }

    vec![if listing.registration_possible {
        FeatureScore::new(FeatureCategory::Legal, "registration", 100.0, 1.0, "Address registration possible")
    } else {
        FeatureScore::new(FeatureCategory::Legal, "registration", 0.0, 1.0, "Address registration not possible")
    }]
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
