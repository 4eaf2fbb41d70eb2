use serde::{Deserialize, Serialize};
use ulid::Ulid;

pub mod growth;
pub mod risk;

pub use growth::{HealthPrediction, SpeciesLookup, SpeciesProfile, lookup_species, predict};
pub use risk::{RiskAssessment, RiskLevel, classify};

type BoxStr = Box<str>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FarmId(pub Ulid);

impl FarmId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for FarmId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReadingId(pub Ulid);

impl ReadingId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ReadingId {
    fn default() -> Self {
        Self::new()
    }
}

/// One water-quality sample, normalized across sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Water temperature in degrees Celsius.
    pub temperature: f64,
    /// Dissolved oxygen in mg/L.
    pub oxygen: f64,
    pub ph: f64,
    /// Ammonia concentration in mg/L.
    pub ammonia: f64,
    /// Turbidity in NTU.
    pub turbidity: f64,
    pub timestamp: jiff::Timestamp,
    /// Set when the source itself was unavailable and the values are defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BoxStr>,
}

impl Reading {
    pub const DEFAULT_PH: f64 = 7.0;

    /// A degraded reading carrying safe defaults and the reason the source
    /// could not be read.
    pub fn unavailable(reason: impl Into<BoxStr>) -> Self {
        Self {
            temperature: 0.0,
            oxygen: 0.0,
            ph: Self::DEFAULT_PH,
            ammonia: 0.0,
            turbidity: 0.0,
            timestamp: jiff::Timestamp::now(),
            error: Some(reason.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// Per-farm alert bounds. Presented next to an assessment; classification
/// itself uses the fixed bounds in [`risk`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    pub temp_min: f64,
    pub temp_max: f64,
    pub oxygen_min: f64,
    pub ammonia_max: f64,
    pub turbidity_max: f64,
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            temp_min: 15.0,
            temp_max: 32.0,
            oxygen_min: 5.0,
            ammonia_max: 0.1,
            turbidity_max: 1200.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Farm {
    pub id: FarmId,
    pub name: BoxStr,
    pub owner_phone: Option<BoxStr>,
    pub species: Option<BoxStr>,
    pub location: Option<BoxStr>,
    pub pond_size_m3: Option<f64>,
    pub thresholds: ThresholdSet,
    pub created_at: jiff::Timestamp,
}

impl Farm {
    /// The owner's phone number, if one is on file and non-empty.
    pub fn contact_phone(&self) -> Option<&str> {
        self.owner_phone
            .as_deref()
            .map(str::trim)
            .filter(|phone| !phone.is_empty())
    }
}

/// A reading persisted against a farm together with its risk tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalReading {
    pub id: ReadingId,
    pub farm_id: FarmId,
    pub reading: Reading,
    pub risk: RiskLevel,
}

/// Rounds half away from zero to `places` decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
