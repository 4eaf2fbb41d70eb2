//! Species-aware health scoring and monthly growth forecast.

use serde::{Deserialize, Serialize};

use crate::round_to;

/// Inclusive `[min, max]` bound, serialized as a two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimalRange(pub f64, pub f64);

impl OptimalRange {
    pub fn min(&self) -> f64 {
        self.0
    }

    pub fn max(&self) -> f64 {
        self.1
    }

    fn contains(&self, value: f64) -> bool {
        value >= self.0 && value <= self.1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimalRanges {
    pub temp: OptimalRange,
    pub oxygen: OptimalRange,
    pub ammonia: OptimalRange,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeciesProfile {
    pub name: &'static str,
    pub ranges: OptimalRanges,
    /// Expected growth in kg per month per 100 fish under ideal conditions.
    pub base_growth_kg: f64,
}

pub const TILAPIA: SpeciesProfile = SpeciesProfile {
    name: "Tilapia",
    ranges: OptimalRanges {
        temp: OptimalRange(26.0, 29.0),
        oxygen: OptimalRange(5.0, 8.0),
        ammonia: OptimalRange(0.0, 0.05),
    },
    base_growth_kg: 5.0,
};

pub const CATFISH: SpeciesProfile = SpeciesProfile {
    name: "Catfish",
    ranges: OptimalRanges {
        temp: OptimalRange(23.0, 27.0),
        oxygen: OptimalRange(4.0, 7.0),
        ammonia: OptimalRange(0.0, 0.08),
    },
    base_growth_kg: 6.0,
};

pub const TROUT: SpeciesProfile = SpeciesProfile {
    name: "Trout",
    ranges: OptimalRanges {
        temp: OptimalRange(10.0, 15.0),
        oxygen: OptimalRange(6.0, 9.0),
        ammonia: OptimalRange(0.0, 0.02),
    },
    base_growth_kg: 4.0,
};

pub const SPECIES: [SpeciesProfile; 3] = [TILAPIA, CATFISH, TROUT];

pub const DEFAULT_SPECIES: SpeciesProfile = TILAPIA;

/// How a species name was resolved against the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeciesLookup {
    /// The name matched a table entry exactly.
    #[default]
    Recognized,
    /// The name was not in the table; the default species' ranges were used.
    Unrecognized,
    /// No name was given; the default species was used and named.
    Defaulted,
}

/// Resolves a species name (exact, case-sensitive) to its profile.
pub fn lookup_species(name: Option<&str>) -> (SpeciesProfile, SpeciesLookup) {
    let Some(name) = name.filter(|n| !n.trim().is_empty()) else {
        return (DEFAULT_SPECIES, SpeciesLookup::Defaulted);
    };

    match SPECIES.iter().find(|profile| profile.name == name) {
        Some(profile) => (*profile, SpeciesLookup::Recognized),
        None => (DEFAULT_SPECIES, SpeciesLookup::Unrecognized),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTier {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl HealthTier {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            HealthTier::Excellent
        } else if score >= 60.0 {
            HealthTier::Good
        } else if score >= 40.0 {
            HealthTier::Fair
        } else {
            HealthTier::Poor
        }
    }

    pub fn recommendation(self) -> &'static str {
        match self {
            HealthTier::Excellent => {
                "Excellent conditions. Continue current maintenance schedule."
            }
            HealthTier::Good => "Good conditions. Monitor parameters closely.",
            HealthTier::Fair => "Fair conditions. Increase aeration and perform water change.",
            HealthTier::Poor => "Poor conditions. Immediate water quality improvement needed.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrentParameters {
    pub temperature: f64,
    pub oxygen: f64,
    pub ammonia: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthPrediction {
    pub fish_type: String,
    /// 0-100, one decimal place.
    pub health_score: f64,
    /// kg per month per 100 fish, two decimal places.
    pub predicted_monthly_growth_kg: f64,
    pub recommendation: String,
    pub current_parameters: CurrentParameters,
    pub optimal_ranges: OptimalRanges,
    #[serde(skip)]
    pub lookup: SpeciesLookup,
}

const MAX_TEMPERATURE_PENALTY: f64 = 20.0;

fn temperature_penalty(temperature: f64, range: OptimalRange) -> f64 {
    if range.contains(temperature) || temperature.is_nan() {
        return 0.0;
    }
    let deviation = (temperature - range.min())
        .abs()
        .min((temperature - range.max()).abs());
    (deviation * 2.0).min(MAX_TEMPERATURE_PENALTY)
}

fn oxygen_penalty(oxygen: f64, range: OptimalRange) -> f64 {
    if oxygen < range.min() {
        (range.min() - oxygen) * 10.0
    } else if oxygen > range.max() {
        (oxygen - range.max()) * 5.0
    } else {
        0.0
    }
}

fn ammonia_penalty(ammonia: f64, range: OptimalRange) -> f64 {
    if ammonia > range.max() {
        (ammonia - range.max()) * 100.0
    } else {
        0.0
    }
}

/// Scores current conditions against the species' optimal ranges and
/// forecasts monthly growth.
///
/// An unrecognized species is scored with the default species' ranges but
/// keeps its own name in the result; only a missing or blank name is
/// reported as the default species.
pub fn predict(
    species: Option<&str>,
    temperature: f64,
    oxygen: f64,
    ammonia: f64,
) -> HealthPrediction {
    let (profile, lookup) = lookup_species(species);
    let ranges = profile.ranges;

    let mut score = 100.0;
    score -= temperature_penalty(temperature, ranges.temp);
    score -= oxygen_penalty(oxygen, ranges.oxygen);
    score -= ammonia_penalty(ammonia, ranges.ammonia);
    let score = score.clamp(0.0, 100.0);

    let growth = profile.base_growth_kg * (score / 100.0);

    let fish_type = match species {
        Some(name) if lookup != SpeciesLookup::Defaulted => name.to_string(),
        _ => profile.name.to_string(),
    };

    HealthPrediction {
        fish_type,
        health_score: round_to(score, 1),
        predicted_monthly_growth_kg: round_to(growth, 2),
        recommendation: HealthTier::from_score(score).recommendation().to_string(),
        current_parameters: CurrentParameters {
            temperature,
            oxygen,
            ammonia,
        },
        optimal_ranges: ranges,
        lookup,
    }
}
