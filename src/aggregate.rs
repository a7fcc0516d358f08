//! Grouping operations over reconciled records.
//!
//! All operations are pure and order-independent apart from the documented
//! tie-breaks; none of them mutate their input.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::{FleetCategory, FuelRecord, FuelType};

/// Conjunction of set-membership predicates. `None` means "any value".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub units: Option<BTreeSet<String>>,
    pub fuels: Option<BTreeSet<FuelType>>,
    pub fleets: Option<BTreeSet<FleetCategory>>,
}

impl Filter {
    /// Filter that accepts every record.
    pub fn all() -> Self {
        Self::default()
    }

    /// Keeps only records from the given units.
    pub fn with_units<I, S>(mut self, units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.units = Some(units.into_iter().map(Into::into).collect());
        self
    }

    /// Keeps only records whose dominant fuel is listed.
    pub fn with_fuels(mut self, fuels: impl IntoIterator<Item = FuelType>) -> Self {
        self.fuels = Some(fuels.into_iter().collect());
        self
    }

    /// Keeps only records in the listed fleet categories.
    pub fn with_fleets(mut self, fleets: impl IntoIterator<Item = FleetCategory>) -> Self {
        self.fleets = Some(fleets.into_iter().collect());
        self
    }

    /// True when the record passes every dimension that is set.
    pub fn matches(&self, record: &FuelRecord) -> bool {
        self.units
            .as_ref()
            .is_none_or(|units| units.contains(&record.unit))
            && self
                .fuels
                .as_ref()
                .is_none_or(|fuels| fuels.contains(&record.dominant_fuel))
            && self
                .fleets
                .as_ref()
                .is_none_or(|fleets| fleets.contains(&record.fleet_category))
    }

    /// Borrows the matching records, keeping input order.
    pub fn apply<'a>(&self, records: &'a [FuelRecord]) -> Vec<&'a FuelRecord> {
        records.iter().filter(|record| self.matches(record)).collect()
    }
}

/// Sums `value_fn` per group.
pub fn sum_by<'a, I, K, KF, VF>(records: I, key_fn: KF, value_fn: VF) -> BTreeMap<K, f64>
where
    I: IntoIterator<Item = &'a FuelRecord>,
    K: Ord,
    KF: Fn(&FuelRecord) -> K,
    VF: Fn(&FuelRecord) -> f64,
{
    let mut sums = BTreeMap::new();
    for record in records {
        *sums.entry(key_fn(record)).or_insert(0.0) += value_fn(record);
    }
    sums
}

/// Direction of a ranking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    #[default]
    Descending,
    Ascending,
}

/// The `n` groups with the largest (or smallest) sums.
///
/// Equal sums are ordered by group key ascending whatever the direction, so
/// the output is fully determined by the input set.
pub fn top_n<'a, I, K, KF, VF>(
    records: I,
    key_fn: KF,
    value_fn: VF,
    n: usize,
    order: Order,
) -> Vec<(K, f64)>
where
    I: IntoIterator<Item = &'a FuelRecord>,
    K: Ord,
    KF: Fn(&FuelRecord) -> K,
    VF: Fn(&FuelRecord) -> f64,
{
    let mut ranked: Vec<(K, f64)> = sum_by(records, key_fn, value_fn).into_iter().collect();
    ranked.sort_by(|(lhs_key, lhs), (rhs_key, rhs)| {
        let by_value = match order {
            Order::Descending => rhs.total_cmp(lhs),
            Order::Ascending => lhs.total_cmp(rhs),
        };
        by_value.then_with(|| lhs_key.cmp(rhs_key))
    });
    ranked.truncate(n);
    ranked
}

/// Number of records per group.
pub fn distribution<'a, I, K, KF>(records: I, key_fn: KF) -> BTreeMap<K, usize>
where
    I: IntoIterator<Item = &'a FuelRecord>,
    K: Ord,
    KF: Fn(&FuelRecord) -> K,
{
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(key_fn(record)).or_insert(0) += 1;
    }
    counts
}

/// Named grouping keys, for callers that pick the grouping at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    Identifier,
    Unit,
    SourceFile,
    Fuel,
    Fleet,
}

impl GroupKey {
    pub fn key(self, record: &FuelRecord) -> String {
        match self {
            GroupKey::Identifier => record.identifier.clone(),
            GroupKey::Unit => record.unit.clone(),
            GroupKey::SourceFile => record.source_file.clone(),
            GroupKey::Fuel => record.dominant_fuel.label().to_string(),
            GroupKey::Fleet => record.fleet_category.label().to_string(),
        }
    }
}

/// Numeric column summed by the aggregations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Volume,
    Cost,
}

impl Metric {
    pub fn value(self, record: &FuelRecord) -> f64 {
        match self {
            Metric::Volume => record.total_volume,
            Metric::Cost => record.total_cost,
        }
    }
}

/// Headline figures over a (usually filtered) record set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub record_count: usize,
    pub unique_vehicles: usize,
    pub total_volume: f64,
    pub total_cost: f64,
    /// Percentage (0–100) of records whose plate matched no fleet table.
    pub unmatched_share: f64,
}

impl Summary {
    pub fn compute<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a FuelRecord>,
    {
        let mut summary = Summary::default();
        let mut vehicles = BTreeSet::new();
        let mut unmatched = 0usize;

        for record in records {
            summary.record_count += 1;
            summary.total_volume += record.total_volume;
            summary.total_cost += record.total_cost;
            vehicles.insert(record.identifier.as_str());
            if record.fleet_category == FleetCategory::Unmatched {
                unmatched += 1;
            }
        }

        summary.unique_vehicles = vehicles.len();
        if summary.record_count > 0 {
            summary.unmatched_share = unmatched as f64 * 100.0 / summary.record_count as f64;
        }
        summary
    }
}
