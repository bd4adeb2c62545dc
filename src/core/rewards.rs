use crate::models::{
    Amenity, CategoryVector, ComponentRewardVector, FeedbackKind, ListingProfile, SearchFilters,
};

/// Clamp to [0, 1], mapping NaN to 0
#[inline]
pub fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Compute the six per-category rewards for one feedback event
///
/// Every component is independently clamped to [0, 1].
pub fn compute_rewards(
    listing: &ListingProfile,
    filters: &SearchFilters,
    feedback: FeedbackKind,
) -> ComponentRewardVector {
    let feedback_score = feedback.score();
    let normalized_feedback = clamp01((feedback_score + 1.0) / 2.0);

    let constraint_fit = constraint_fit(listing, filters);

    CategoryVector {
        constraint_fit,
        personal_fit: clamp01(0.4 * constraint_fit + 0.6 * normalized_feedback),
        accessibility: accessibility(listing, filters),
        trust_quality: trust_quality(listing),
        market_value: market_value(listing, filters, normalized_feedback),
        engagement: clamp01(0.5 + 0.25 * feedback_score),
    }
}

/// Fraction of active filters the listing satisfies, 0.5 without filters
fn constraint_fit(listing: &ListingProfile, filters: &SearchFilters) -> f64 {
    let mut checks = 0u32;
    let mut matches = 0.0;
    let price = listing.price;

    if let Some(min) = filters.price_min {
        checks += 1;
        matches += if price >= min {
            1.0
        } else if min > 0.0 {
            clamp01(price / min)
        } else {
            0.0
        };
    }

    if let Some(max) = filters.price_max {
        checks += 1;
        matches += if price <= max {
            1.0
        } else if price > 0.0 {
            clamp01(max / price)
        } else {
            0.0
        };
    }

    if let Some(bedrooms) = filters.bedrooms {
        checks += 1;
        let actual = listing.bedrooms as f64;
        matches += if actual >= bedrooms {
            1.0
        } else if bedrooms > 0.0 {
            clamp01(actual / bedrooms)
        } else {
            0.0
        };
    }

    if let Some(furnished) = filters.furnished {
        checks += 1;
        if listing.furnished == furnished {
            matches += 1.0;
        }
    }

    if let (Some(university), Some(max_commute)) = (&filters.university, filters.max_commute) {
        checks += 1;
        matches += match listing.commute_minutes(university, None) {
            Some(minutes) if minutes <= max_commute => 1.0,
            Some(minutes) if minutes > 0.0 => clamp01(max_commute / minutes),
            _ => 0.5,
        };
    }

    if !filters.amenities.is_empty() {
        checks += 1;
        let present = filters
            .amenities
            .iter()
            .filter(|name| {
                name.parse::<Amenity>()
                    .map(|amenity| listing.has_amenity(amenity))
                    .unwrap_or(false)
            })
            .count();
        matches += present as f64 / filters.amenities.len() as f64;
    }

    if checks == 0 {
        0.5
    } else {
        clamp01(matches / checks as f64)
    }
}

fn accessibility(listing: &ListingProfile, filters: &SearchFilters) -> f64 {
    let elevator_term = if listing.elevator() { 0.8 } else { 0.4 };
    let floor = listing.floor.unwrap_or(0).clamp(0, 10) as f64;
    let floor_term = 1.0 - floor / 10.0;
    let commute_term = commute_term(listing, filters);

    clamp01(elevator_term * 0.4 + floor_term * 0.3 + commute_term * 0.3)
}

/// Linear decay past the requested maximum commute, 0.5 when unknown
fn commute_term(listing: &ListingProfile, filters: &SearchFilters) -> f64 {
    let (Some(university), Some(max_commute)) = (&filters.university, filters.max_commute) else {
        return 0.5;
    };
    if max_commute <= 0.0 {
        return 0.5;
    }

    match listing.commute_minutes(university, None) {
        Some(minutes) if minutes <= max_commute => 1.0,
        Some(minutes) => clamp01(1.0 - (minutes - max_commute) / max_commute),
        None => 0.5,
    }
}

fn trust_quality(listing: &ListingProfile) -> f64 {
    let verified_term = if listing.owner_verified { 0.85 } else { 0.5 };
    clamp01(
        verified_term * 0.4
            + clamp01(listing.media_quality_score) * 0.3
            + clamp01(listing.completeness_score) * 0.3,
    )
}

fn market_value(listing: &ListingProfile, filters: &SearchFilters, normalized_feedback: f64) -> f64 {
    if let (Some(min), Some(max)) = (filters.price_min, filters.price_max) {
        let midpoint = (min + max) / 2.0;
        if midpoint > 0.0 {
            return clamp01(1.0 - (listing.price - midpoint).abs() / midpoint);
        }
    }

    if let Some(stored) = listing.market_value_score {
        return clamp01(stored);
    }

    clamp01(0.4 + 0.4 * normalized_feedback)
}
