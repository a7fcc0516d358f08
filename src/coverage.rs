use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::KeyPolicy;
use crate::model::{CityCoverageEntry, FuelRecord};
use crate::normalize::normalize_key;

/// Unique vehicles of a unit against the number of cities it serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitCoverage {
    pub unit: String,
    pub unique_vehicles: usize,
    pub city_count: Option<u32>,
    /// `None` when the unit is missing from the coverage table or serves
    /// zero cities.
    pub vehicles_per_city: Option<f64>,
}

/// Joins per-unit vehicle counts with the coverage table. Unit names are
/// matched through the key normalizer, so `1º BPM` and `1BPM` meet.
pub fn coverage_by_unit(
    records: &[FuelRecord],
    entries: &[CityCoverageEntry],
    policy: KeyPolicy,
) -> Vec<UnitCoverage> {
    let cities: BTreeMap<&str, u32> = entries
        .iter()
        .map(|entry| (entry.unit_key.as_str(), entry.city_count))
        .collect();

    let mut vehicles: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for record in records {
        vehicles
            .entry(record.unit.as_str())
            .or_default()
            .insert(record.identifier.as_str());
    }

    vehicles
        .into_iter()
        .map(|(unit, plates)| {
            let city_count = cities.get(normalize_key(unit, policy).as_str()).copied();
            let vehicles_per_city = city_count
                .filter(|count| *count > 0)
                .map(|count| plates.len() as f64 / f64::from(count));
            UnitCoverage {
                unit: unit.to_string(),
                unique_vehicles: plates.len(),
                city_count,
                vehicles_per_city,
            }
        })
        .collect()
}
