use serde::{Deserialize, Serialize};

use crate::model::{FuelAmounts, FuelType};

/// Fields derived from the per-fuel columns of one transaction row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub dominant_fuel: FuelType,
    pub total_volume: f64,
    pub total_cost: f64,
}

/// Derives the dominant fuel and both totals.
///
/// The dominant fuel is the type with the largest volume; ties go to the
/// type listed first in [`FuelType::ALL`], so a row with no volume at all is
/// classified as gasoline.
pub fn classify(volumes: &FuelAmounts, costs: &FuelAmounts) -> Classification {
    let mut dominant_fuel = FuelType::ALL[0];
    let mut dominant_volume = volumes.get(dominant_fuel);
    for (fuel, volume) in volumes.iter().skip(1) {
        if volume > dominant_volume {
            dominant_fuel = fuel;
            dominant_volume = volume;
        }
    }

    Classification {
        dominant_fuel,
        total_volume: volumes.total(),
        total_cost: costs.total(),
    }
}
