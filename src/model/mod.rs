use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Normalized vehicle plate. Always the output of
/// [`normalize_key`](crate::normalize::normalize_key).
pub type Identifier = String;

/// The fixed set of fuel types reported by the exports, in enumeration order.
///
/// The order matters: it is the tie-break order for the dominant fuel and the
/// summation order for totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FuelType {
    #[serde(rename = "Gasolina")]
    Gasoline,
    #[serde(rename = "Álcool")]
    Ethanol,
    #[serde(rename = "Diesel")]
    Diesel,
    #[serde(rename = "Diesel S10")]
    DieselS10,
}

impl FuelType {
    pub const ALL: [FuelType; 4] = [
        FuelType::Gasoline,
        FuelType::Ethanol,
        FuelType::Diesel,
        FuelType::DieselS10,
    ];

    /// Label used in reports and in the export headers.
    pub fn label(self) -> &'static str {
        match self {
            FuelType::Gasoline => "Gasolina",
            FuelType::Ethanol => "Álcool",
            FuelType::Diesel => "Diesel",
            FuelType::DieselS10 => "Diesel S10",
        }
    }

    /// Header of the volume column, e.g. `Gasolina (Lts)`.
    pub fn volume_column(self) -> String {
        format!("{} (Lts)", self.label())
    }

    /// Header of the cost column, e.g. `Gasolina (R$)`.
    pub fn cost_column(self) -> String {
        format!("{} (R$)", self.label())
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for FuelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FuelType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_lowercase();
        match wanted.as_str() {
            "gasolina" | "gasoline" => Ok(FuelType::Gasoline),
            "álcool" | "alcool" | "etanol" | "ethanol" => Ok(FuelType::Ethanol),
            "diesel" => Ok(FuelType::Diesel),
            "diesel s10" | "diesel-s10" | "diesel_s10" | "s10" => Ok(FuelType::DieselS10),
            _ => Err(format!("unknown fuel type '{value}'")),
        }
    }
}

/// One value per [`FuelType`]. Absent fuel columns are simply zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FuelAmounts([f64; 4]);

impl FuelAmounts {
    /// Value recorded for `fuel`, zero when the column was absent.
    pub fn get(&self, fuel: FuelType) -> f64 {
        self.0[fuel.index()]
    }

    /// Overwrites the value for `fuel`.
    pub fn set(&mut self, fuel: FuelType, value: f64) {
        self.0[fuel.index()] = value;
    }

    /// Pairs in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (FuelType, f64)> + '_ {
        FuelType::ALL.iter().map(move |fuel| (*fuel, self.get(*fuel)))
    }

    /// Sum over the whole fuel set, in enumeration order.
    pub fn total(&self) -> f64 {
        self.iter().map(|(_, value)| value).sum()
    }
}

impl FromIterator<(FuelType, f64)> for FuelAmounts {
    fn from_iter<I: IntoIterator<Item = (FuelType, f64)>>(iter: I) -> Self {
        let mut amounts = FuelAmounts::default();
        for (fuel, value) in iter {
            amounts.set(fuel, value);
        }
        amounts
    }
}

/// Ownership status of a vehicle according to the fleet registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FleetCategory {
    #[serde(rename = "PRÓPRIO")]
    Owned,
    #[serde(rename = "LOCADO")]
    Leased,
    /// The plate is absent from every registry supplied to the run.
    #[serde(rename = "NÃO ENCONTRADO")]
    Unmatched,
}

impl FleetCategory {
    /// Label used in the registries and in reports.
    pub fn label(self) -> &'static str {
        match self {
            FleetCategory::Owned => "PRÓPRIO",
            FleetCategory::Leased => "LOCADO",
            FleetCategory::Unmatched => "NÃO ENCONTRADO",
        }
    }
}

impl fmt::Display for FleetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FleetCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_lowercase();
        match wanted.as_str() {
            "owned" | "proprio" | "próprio" => Ok(FleetCategory::Owned),
            "leased" | "locado" => Ok(FleetCategory::Leased),
            "unmatched" | "nao encontrado" | "não encontrado" => Ok(FleetCategory::Unmatched),
            _ => Err(format!("unknown fleet category '{value}'")),
        }
    }
}

/// One fueling transaction after loading, classification and reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelRecord {
    pub identifier: Identifier,
    /// Organizational unit, derived from the source name.
    pub unit: String,
    pub source_file: String,
    pub fuel_volumes: FuelAmounts,
    pub fuel_costs: FuelAmounts,
    pub total_volume: f64,
    pub total_cost: f64,
    pub dominant_fuel: FuelType,
    pub fleet_category: FleetCategory,
    /// Enrichment columns copied from the matching registry row.
    pub attributes: BTreeMap<String, String>,
}

/// One row of a fleet registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetReferenceEntry {
    pub identifier: Identifier,
    pub fleet_category: FleetCategory,
    /// Header → value for every non-identifier column (manufacture year,
    /// rental cost class and so on).
    pub attributes: BTreeMap<String, String>,
}

/// A fleet registry, pre-labeled with the category it represents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTable {
    pub label: String,
    pub category: FleetCategory,
    pub entries: Vec<FleetReferenceEntry>,
}

/// Number of cities served by a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityCoverageEntry {
    /// Unit name passed through the key normalizer.
    pub unit_key: String,
    pub city_count: u32,
}
