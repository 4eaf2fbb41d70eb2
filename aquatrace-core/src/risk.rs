//! Rule-based water-quality risk tiers.
//!
//! Classification looks only at temperature and turbidity and always uses
//! the fixed bounds below, never a farm's own [`ThresholdSet`](crate::ThresholdSet).

use serde::{Deserialize, Serialize};

/// Temperature (°C) strictly above which a reading is high risk.
pub const HIGH_TEMPERATURE_C: f64 = 32.0;
/// Temperature (°C) strictly above which a reading is moderate risk.
pub const MODERATE_TEMPERATURE_C: f64 = 30.0;
/// Turbidity (NTU) strictly above which a reading is high risk.
pub const HIGH_TURBIDITY_NTU: f64 = 1200.0;
/// Turbidity (NTU) strictly above which a reading is moderate risk.
pub const MODERATE_TURBIDITY_NTU: f64 = 900.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Safe,
    Moderate,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Safe => "SAFE",
            RiskLevel::Moderate => "MODERATE",
            RiskLevel::High => "HIGH",
        }
    }

    /// Human-readable label shown next to a reading.
    pub fn label(self) -> &'static str {
        match self {
            RiskLevel::Safe => "SAFE ✅",
            RiskLevel::Moderate => "MODERATE RISK ⚠️",
            RiskLevel::High => "HIGH RISK ⚠️",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SAFE" => Some(RiskLevel::Safe),
            "MODERATE" => Some(RiskLevel::Moderate),
            "HIGH" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiskAssessment {
    #[serde(rename = "risk_level")]
    pub level: RiskLevel,
    #[serde(rename = "risk")]
    pub label: &'static str,
    /// True iff the level is [`RiskLevel::High`].
    pub alert: bool,
}

impl From<RiskLevel> for RiskAssessment {
    fn from(level: RiskLevel) -> Self {
        Self {
            level,
            label: level.label(),
            alert: level == RiskLevel::High,
        }
    }
}

/// Classifies a reading by temperature (°C) and turbidity (NTU).
///
/// First match wins: high, then moderate, then safe. Comparisons are strict
/// and exact, so `32.0` alone is not high risk while `32.01` is. NaN inputs
/// never satisfy a comparison and therefore classify as safe.
pub fn classify(temperature: f64, turbidity: f64) -> RiskAssessment {
    let level = if temperature > HIGH_TEMPERATURE_C || turbidity > HIGH_TURBIDITY_NTU {
        RiskLevel::High
    } else if temperature > MODERATE_TEMPERATURE_C || turbidity > MODERATE_TURBIDITY_NTU {
        RiskLevel::Moderate
    } else {
        RiskLevel::Safe
    };

    level.into()
}
