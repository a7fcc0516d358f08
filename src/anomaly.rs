//! Plates whose fuel purchases are attributed to more than one unit.
//!
//! A cross-unit plate may be a duplicated submission, a typo, or a vehicle
//! reassigned during the period. The detector only flags; deciding which
//! unit is right is left to whoever reads the report.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::AnomalyPolicy;
use crate::model::{FuelRecord, Identifier};

/// Every record of every plate seen under two or more distinct units.
pub fn find_cross_unit_duplicates(records: &[FuelRecord]) -> Vec<FuelRecord> {
    find_cross_unit_duplicates_with(records, &AnomalyPolicy::default())
}

/// Like [`find_cross_unit_duplicates`] with an explicit distinct-unit
/// threshold.
///
/// Records are returned whole (not deduplicated), ordered by identifier then
/// unit; records sharing both keep their consolidated order.
pub fn find_cross_unit_duplicates_with(
    records: &[FuelRecord],
    policy: &AnomalyPolicy,
) -> Vec<FuelRecord> {
    let flagged: BTreeSet<&str> = units_by_identifier(records)
        .into_iter()
        .filter(|(_, units)| units.len() >= policy.min_distinct_units)
        .map(|(identifier, _)| identifier)
        .collect();

    let mut anomalies: Vec<FuelRecord> = records
        .iter()
        .filter(|record| flagged.contains(record.identifier.as_str()))
        .cloned()
        .collect();
    anomalies.sort_by(|lhs, rhs| {
        lhs.identifier
            .cmp(&rhs.identifier)
            .then_with(|| lhs.unit.cmp(&rhs.unit))
    });
    anomalies
}

/// Per-plate summary of a cross-unit anomaly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossUnitGroup {
    pub identifier: Identifier,
    pub units: BTreeSet<String>,
    pub record_count: usize,
    pub total_volume: f64,
    pub total_cost: f64,
}

/// Collapses flagged records into one summary per plate, ordered by plate.
pub fn cross_unit_groups(records: &[FuelRecord], policy: &AnomalyPolicy) -> Vec<CrossUnitGroup> {
    let mut groups: BTreeMap<Identifier, CrossUnitGroup> = BTreeMap::new();
    for record in find_cross_unit_duplicates_with(records, policy) {
        let group = groups
            .entry(record.identifier.clone())
            .or_insert_with(|| CrossUnitGroup {
                identifier: record.identifier.clone(),
                units: BTreeSet::new(),
                record_count: 0,
                total_volume: 0.0,
                total_cost: 0.0,
            });
        group.units.insert(record.unit);
        group.record_count += 1;
        group.total_volume += record.total_volume;
        group.total_cost += record.total_cost;
    }
    groups.into_values().collect()
}

fn units_by_identifier(records: &[FuelRecord]) -> BTreeMap<&str, BTreeSet<&str>> {
    let mut units: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for record in records {
        units
            .entry(record.identifier.as_str())
            .or_default()
            .insert(record.unit.as_str());
    }
    units
}
