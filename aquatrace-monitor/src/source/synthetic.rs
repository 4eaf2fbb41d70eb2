use std::ops::RangeInclusive;

use aquatrace_core::{Reading, round_to};
use async_trait::async_trait;
use rand::Rng;

use super::ReadingSource;

pub const TEMPERATURE_RANGE: RangeInclusive<f64> = 22.0..=30.0;
pub const OXYGEN_RANGE: RangeInclusive<f64> = 4.5..=7.5;
pub const PH_RANGE: RangeInclusive<f64> = 6.8..=7.6;
pub const AMMONIA_RANGE: RangeInclusive<f64> = 0.01..=0.12;
pub const TURBIDITY_RANGE: RangeInclusive<f64> = 0.0..=1500.0;

/// Reading source that generates fake but plausible pond data.
///
/// Every field is drawn independently and uniformly from its range on each
/// call, so this source never returns `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticReadingSource;

impl SyntheticReadingSource {
    pub fn new() -> Self {
        Self
    }

    pub fn sample(&self) -> Reading {
        let mut rng = rand::rng();

        Reading {
            temperature: round_to(rng.random_range(TEMPERATURE_RANGE), 2),
            oxygen: round_to(rng.random_range(OXYGEN_RANGE), 2),
            ph: round_to(rng.random_range(PH_RANGE), 2),
            ammonia: round_to(rng.random_range(AMMONIA_RANGE), 3),
            turbidity: round_to(rng.random_range(TURBIDITY_RANGE), 2),
            timestamp: jiff::Timestamp::now(),
            error: None,
        }
    }
}

#[async_trait]
impl ReadingSource for SyntheticReadingSource {
    async fn acquire(&self) -> Option<Reading> {
        Some(self.sample())
    }
}
