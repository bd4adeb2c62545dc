use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Amenities tracked by the feature checklist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Amenity {
    AirConditioning,
    WashingMachine,
    Dishwasher,
    Wifi,
    Elevator,
    Balcony,
    Parking,
    SecuritySystem,
}

impl Amenity {
    /// Checklist order used when emitting feature scores
    pub const ALL: [Amenity; 8] = [
        Amenity::AirConditioning,
        Amenity::WashingMachine,
        Amenity::Dishwasher,
        Amenity::Wifi,
        Amenity::Elevator,
        Amenity::Balcony,
        Amenity::Parking,
        Amenity::SecuritySystem,
    ];

    /// Stable snake_case identifier
    pub fn key(&self) -> &'static str {
        match self {
            Amenity::AirConditioning => "air_conditioning",
            Amenity::WashingMachine => "washing_machine",
            Amenity::Dishwasher => "dishwasher",
            Amenity::Wifi => "wifi",
            Amenity::Elevator => "elevator",
            Amenity::Balcony => "balcony",
            Amenity::Parking => "parking",
            Amenity::SecuritySystem => "security_system",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Amenity::AirConditioning => "Air conditioning",
            Amenity::WashingMachine => "Washing machine",
            Amenity::Dishwasher => "Dishwasher",
            Amenity::Wifi => "Wi-Fi",
            Amenity::Elevator => "Elevator",
            Amenity::Balcony => "Balcony",
            Amenity::Parking => "Parking",
            Amenity::SecuritySystem => "Security system",
        }
    }
}

impl fmt::Display for Amenity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Amenity {
    type Err = String;

    /// Lenient parsing for free-form search filter values
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        match normalized.as_str() {
            "airconditioning" | "ac" | "aircon" | "aircondition" => Ok(Amenity::AirConditioning),
            "washingmachine" | "washer" | "laundry" => Ok(Amenity::WashingMachine),
            "dishwasher" => Ok(Amenity::Dishwasher),
            "wifi" | "internet" => Ok(Amenity::Wifi),
            "elevator" | "lift" => Ok(Amenity::Elevator),
            "balcony" | "terrace" => Ok(Amenity::Balcony),
            "parking" | "garage" => Ok(Amenity::Parking),
            "securitysystem" | "security" | "alarm" => Ok(Amenity::SecuritySystem),
            _ => Err(format!("unknown amenity: {}", s)),
        }
    }
}

/// Amenity flags on a listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Amenities {
    pub air_conditioning: bool,
    pub washing_machine: bool,
    pub dishwasher: bool,
    pub wifi: bool,
    pub elevator: bool,
    pub balcony: bool,
    pub parking: bool,
    pub security_system: bool,
}

impl Amenities {
    pub fn has(&self, amenity: Amenity) -> bool {
        match amenity {
            Amenity::AirConditioning => self.air_conditioning,
            Amenity::WashingMachine => self.washing_machine,
            Amenity::Dishwasher => self.dishwasher,
            Amenity::Wifi => self.wifi,
            Amenity::Elevator => self.elevator,
            Amenity::Balcony => self.balcony,
            Amenity::Parking => self.parking,
            Amenity::SecuritySystem => self.security_system,
        }
    }
}

/// Physical accessibility of a listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessibilityFeatures {
    pub wheelchair_accessible: bool,
    pub step_free_entrance: bool,
}

/// Listing as exposed by the listing-management subsystem
///
/// Read-only from the ranking engine's point of view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingProfile {
    pub id: Uuid,
    pub price: f64,
    #[serde(default)]
    pub bedrooms: u8,
    #[serde(default)]
    pub bathrooms: u8,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub floor: Option<i32>,
    #[serde(default)]
    pub has_elevator: bool,
    #[serde(default)]
    pub furnished: bool,
    #[serde(default)]
    pub owner_verified: bool,
    #[serde(default)]
    pub media_quality_score: f64,
    #[serde(default)]
    pub completeness_score: f64,
    #[serde(default)]
    pub amenities: Amenities,
    #[serde(default)]
    pub lifestyle_tags: Vec<String>,
    #[serde(default)]
    pub dedicated_workspace: bool,
    #[serde(default)]
    pub pet_policy: Option<String>,
    #[serde(default)]
    pub smoking_policy: Option<String>,
    #[serde(default)]
    pub accessibility: AccessibilityFeatures,
    /// destination -> travel mode -> minutes
    #[serde(default)]
    pub commute_cache: HashMap<String, HashMap<String, f64>>,
    #[serde(default)]
    pub registration_possible: bool,
    #[serde(default)]
    pub market_value_score: Option<f64>,
}

impl ListingProfile {
    /// Elevator presence from either the building flag or the amenity checklist
    pub fn elevator(&self) -> bool {
        self.has_elevator || self.amenities.elevator
    }

    pub fn has_amenity(&self, amenity: Amenity) -> bool {
        match amenity {
            Amenity::Elevator => self.elevator(),
            other => self.amenities.has(other),
        }
    }

    /// Cached travel time to a destination, optionally for one mode.
    ///
    /// Without a mode the fastest cached mode wins.
    pub fn commute_minutes(&self, destination: &str, mode: Option<&str>) -> Option<f64> {
        let destination = destination.trim().to_lowercase();
        let modes = self
            .commute_cache
            .iter()
            .find(|(key, _)| key.trim().to_lowercase() == destination)
            .map(|(_, modes)| modes)?;

        match mode {
            Some(mode) => modes
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(mode))
                .map(|(_, minutes)| *minutes),
            None => modes
                .values()
                .copied()
                .filter(|m| m.is_finite())
                .fold(None, |best: Option<f64>, m| Some(best.map_or(m, |b| b.min(m)))),
        }
    }
}

/// Priority tiers for amenities requested by the searcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmenityTier {
    Essential,
    Important,
    Nice,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AmenityPriorities {
    pub essential: Vec<Amenity>,
    pub important: Vec<Amenity>,
    pub nice: Vec<Amenity>,
}

impl AmenityPriorities {
    /// Tier for an amenity; anything not named is a nice-to-have
    pub fn tier(&self, amenity: Amenity) -> AmenityTier {
        if self.essential.contains(&amenity) {
            AmenityTier::Essential
        } else if self.important.contains(&amenity) {
            AmenityTier::Important
        } else {
            AmenityTier::Nice
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessibilityNeeds {
    pub wheelchair: bool,
    pub elevator: bool,
    pub step_free_entrance: bool,
}

impl AccessibilityNeeds {
    pub fn any(&self) -> bool {
        self.wheelchair || self.elevator || self.step_free_entrance
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommuteTarget {
    pub destination: String,
    pub max_minutes: f64,
    #[serde(default)]
    pub mode: Option<String>,
}

/// Search / profile context for a single scoring request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryContext {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub bedrooms: Option<u8>,
    pub bathrooms: Option<u8>,
    pub districts: Vec<String>,
    pub amenities: AmenityPriorities,
    pub lifestyle: Vec<String>,
    pub works_from_home: bool,
    pub has_pets: bool,
    pub smoker: bool,
    pub accessibility: AccessibilityNeeds,
    pub commute: Vec<CommuteTarget>,
    pub requires_registration: bool,
}

/// Scoring category of a single feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureCategory {
    Basic,
    Amenities,
    Lifestyle,
    Accessibility,
    Commute,
    Legal,
}

/// One explained feature score (0-100)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScore {
    pub category: FeatureCategory,
    pub feature: String,
    pub score: f64,
    /// Relative importance within the category
    pub weight: f64,
    pub reason: String,
}

impl FeatureScore {
    pub fn new(
        category: FeatureCategory,
        feature: impl Into<String>,
        score: f64,
        weight: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            category,
            feature: feature.into(),
            score,
            weight,
            reason: reason.into(),
        }
    }
}

/// Per-category sub-scores (0-100); non-applicable categories read 100
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub basic: f64,
    pub amenities: f64,
    pub lifestyle: f64,
    pub accessibility: f64,
    pub commute: f64,
    pub legal: f64,
}

impl CategoryBreakdown {
    pub fn get(&self, category: FeatureCategory) -> f64 {
        match category {
            FeatureCategory::Basic => self.basic,
            FeatureCategory::Amenities => self.amenities,
            FeatureCategory::Lifestyle => self.lifestyle,
            FeatureCategory::Accessibility => self.accessibility,
            FeatureCategory::Commute => self.commute,
            FeatureCategory::Legal => self.legal,
        }
    }
}

/// Scored listing returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub listing_id: Uuid,
    pub total_score: f64,
    pub category_breakdown: CategoryBreakdown,
    pub feature_scores: Vec<FeatureScore>,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub match_reason: String,
}

/// Fixed weights for combining category scores
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub basic: f64,
    pub amenities: f64,
    pub lifestyle: f64,
    pub accessibility: f64,
    pub commute: f64,
    pub legal: f64,
}

impl ScoringWeights {
    pub fn get(&self, category: FeatureCategory) -> f64 {
        match category {
            FeatureCategory::Basic => self.basic,
            FeatureCategory::Amenities => self.amenities,
            FeatureCategory::Lifestyle => self.lifestyle,
            FeatureCategory::Accessibility => self.accessibility,
            FeatureCategory::Commute => self.commute,
            FeatureCategory::Legal => self.legal,
        }
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            basic: 0.30,
            amenities: 0.25,
            lifestyle: 0.20,
            accessibility: 0.10,
            commute: 0.10,
            legal: 0.05,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amenity_lenient_parse() {
        assert_eq!("washer".parse::<Amenity>(), Ok(Amenity::WashingMachine));
        assert_eq!("Air Conditioning".parse::<Amenity>(), Ok(Amenity::AirConditioning));
        assert_eq!("security_system".parse::<Amenity>(), Ok(Amenity::SecuritySystem));
        assert!("jacuzzi".parse::<Amenity>().is_err());
    }

    #[test]
    fn test_unlisted_amenity_defaults_to_nice() {
        let priorities = AmenityPriorities {
            essential: vec![Amenity::Wifi],
            important: vec![Amenity::Balcony],
            nice: vec![],
        };
        assert_eq!(priorities.tier(Amenity::Wifi), AmenityTier::Essential);
        assert_eq!(priorities.tier(Amenity::Balcony), AmenityTier::Important);
        assert_eq!(priorities.tier(Amenity::Parking), AmenityTier::Nice);
    }

    #[test]
    fn test_commute_minutes_picks_fastest_mode() {
        let listing: ListingProfile = serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "price": 1000.0,
            "commuteCache": {
                "Campus": { "transit": 35.0, "bike": 20.0 }
            }
        }))
        .unwrap();

        assert_eq!(listing.commute_minutes("campus", None), Some(20.0));
        assert_eq!(listing.commute_minutes("Campus", Some("TRANSIT")), Some(35.0));
        assert_eq!(listing.commute_minutes("Campus", Some("car")), None);
        assert_eq!(listing.commute_minutes("Airport", None), None);
    }

    #[test]
    fn test_elevator_from_either_flag() {
        let mut listing: ListingProfile = serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "price": 1000.0
        }))
        .unwrap();
        assert!(!listing.has_amenity(Amenity::Elevator));
        listing.has_elevator = true;
        assert!(listing.has_amenity(Amenity::Elevator));
    }
}
