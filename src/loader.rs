//! Turns decoded grids into typed rows.
//!
//! Transaction exports follow a fixed layout: a few title rows, a header row,
//! then one row per vehicle. The plate is always the first column whatever
//! its header says; the fuel columns are found by name and synthesised as
//! zero when absent.

use std::collections::BTreeMap;

use regex::Regex;
use tracing::{debug, instrument, warn};

use crate::classify::classify;
use crate::config::{KeyPolicy, PipelineConfig, UnitNaming};
use crate::error::{Result, ToolError};
use crate::io::{Cell, RawTable};
use crate::model::{
    CityCoverageEntry, FleetCategory, FleetReferenceEntry, FuelAmounts, FuelRecord, FuelType,
    ReferenceTable,
};
use crate::normalize::normalize_key;

/// The `<UNIT> <MONTH-ABBR>.xlsx` file naming convention.
///
/// The trailing month token (optionally followed by a year and an
/// extension) is cut off and ordinal markers such as `º` are removed, so
/// `1º BPM ABR.xlsx` names the unit `1 BPM`. A name without a month token
/// falls back to the whole trimmed name, ordinals removed.
#[derive(Debug, Clone)]
pub struct UnitNameConvention {
    month_suffix: Regex,
    ordinal_markers: Vec<String>,
}

impl UnitNameConvention {
    pub fn new(naming: &UnitNaming) -> Result<Self> {
        let tokens: Vec<String> = naming
            .month_tokens
            .iter()
            .map(|token| regex::escape(token.trim()))
            .collect();
        let pattern = format!(
            r"(?i)\s+(?:{})(?:[\s._/-]*\d{{2,4}})?\s*(?:\.[a-z0-9]+)?\s*$",
            tokens.join("|")
        );
        let month_suffix = Regex::new(&pattern)
            .map_err(|err| ToolError::InvalidConfig(format!("unit naming convention: {err}")))?;
        Ok(Self {
            month_suffix,
            ordinal_markers: naming.ordinal_markers.clone(),
        })
    }

    /// Unit name for a transaction export.
    pub fn unit_from_source(&self, source_name: &str) -> String {
        let name = source_name.trim();
        let stem = match self.month_suffix.find(name) {
            Some(found) => &name[..found.start()],
            None => name,
        };
        self.strip_ordinals(stem)
    }

    /// Removes ordinal markers and trims.
    pub fn strip_ordinals(&self, value: &str) -> String {
        let mut cleaned = value.to_string();
        for marker in &self.ordinal_markers {
            cleaned = cleaned.replace(marker.as_str(), "");
        }
        cleaned.trim().to_string()
    }
}

/// Rows of one transaction export plus the data-quality counters gathered
/// while reading them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedSource {
    pub source_name: String,
    pub unit: String,
    pub records: Vec<FuelRecord>,
    /// Expected fuel columns that were absent and zero-filled.
    pub missing_columns: Vec<String>,
    pub malformed_values: usize,
    pub footer_rows: usize,
    pub blank_identifier_rows: usize,
}

/// Loader for transaction exports configured from a [`PipelineConfig`].
#[derive(Debug, Clone)]
pub struct TransactionLoader {
    header_skip: usize,
    key_policy: KeyPolicy,
    footer_markers: Vec<String>,
    convention: UnitNameConvention,
}

impl TransactionLoader {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            header_skip: config.header_skip,
            key_policy: config.key_policy,
            footer_markers: config
                .footer_markers
                .iter()
                .map(|marker| marker.trim().to_uppercase())
                .collect(),
            convention: UnitNameConvention::new(&config.unit_naming)?,
        })
    }

    pub fn convention(&self) -> &UnitNameConvention {
        &self.convention
    }

    /// Reads one decoded export. Fails only when the grid has no header row
    /// at the configured offset.
    #[instrument(level = "debug", skip_all, fields(source = source_name))]
    pub fn load(&self, source_name: &str, table: &RawTable) -> Result<LoadedSource> {
        let (header, rows) = table.split_header(self.header_skip).ok_or_else(|| {
            ToolError::malformed(
                source_name,
                format!("no header row after skipping {} rows", self.header_skip),
            )
        })?;

        let headers: Vec<String> = header
            .iter()
            .map(|cell| cell.as_text().trim().to_lowercase())
            .collect();
        let find = |name: &str| {
            let wanted = name.to_lowercase();
            headers.iter().skip(1).position(|h| *h == wanted).map(|idx| idx + 1)
        };

        let mut loaded = LoadedSource {
            source_name: source_name.to_string(),
            unit: self.convention.unit_from_source(source_name),
            ..LoadedSource::default()
        };

        let mut volume_columns: Vec<(FuelType, Option<usize>)> = Vec::with_capacity(4);
        let mut cost_columns: Vec<(FuelType, Option<usize>)> = Vec::with_capacity(4);
        for fuel in FuelType::ALL {
            for (name, columns) in [
                (fuel.volume_column(), &mut volume_columns),
                (fuel.cost_column(), &mut cost_columns),
            ] {
                let index = find(name.as_str());
                if index.is_none() {
                    warn!(source = source_name, column = %name, "expected column missing, zero-filled");
                    loaded.missing_columns.push(name);
                }
                columns.push((fuel, index));
            }
        }

        for row in rows {
            let raw_identifier = row.first().map(Cell::as_text).unwrap_or_default();
            let marker = raw_identifier.trim().to_uppercase();
            if self.footer_markers.contains(&marker) {
                loaded.footer_rows += 1;
                continue;
            }
            let identifier = normalize_key(&raw_identifier, self.key_policy);
            if identifier.is_empty() {
                loaded.blank_identifier_rows += 1;
                continue;
            }

            let fuel_volumes = read_amounts(row, &volume_columns, &mut loaded.malformed_values);
            let fuel_costs = read_amounts(row, &cost_columns, &mut loaded.malformed_values);
            let classification = classify(&fuel_volumes, &fuel_costs);

            loaded.records.push(FuelRecord {
                identifier,
                unit: loaded.unit.clone(),
                source_file: source_name.to_string(),
                fuel_volumes,
                fuel_costs,
                total_volume: classification.total_volume,
                total_cost: classification.total_cost,
                dominant_fuel: classification.dominant_fuel,
                fleet_category: FleetCategory::Unmatched,
                attributes: BTreeMap::new(),
            });
        }

        debug!(
            unit = %loaded.unit,
            records = loaded.records.len(),
            footer_rows = loaded.footer_rows,
            blank_rows = loaded.blank_identifier_rows,
            malformed_values = loaded.malformed_values,
            "loaded transaction export"
        );
        Ok(loaded)
    }
}

fn read_amounts(
    row: &[Cell],
    columns: &[(FuelType, Option<usize>)],
    malformed: &mut usize,
) -> FuelAmounts {
    columns
        .iter()
        .map(|(fuel, index)| {
            let value = match index.and_then(|idx| row.get(idx)) {
                Some(cell) => cell.to_amount().unwrap_or_else(|| {
                    *malformed += 1;
                    0.0
                }),
                None => 0.0,
            };
            (*fuel, value)
        })
        .collect()
}

/// Reads a fleet registry. The first column is the plate; every other
/// named column is kept as an enrichment attribute.
pub fn load_reference_table(
    label: &str,
    category: FleetCategory,
    table: &RawTable,
    header_skip: usize,
    policy: KeyPolicy,
) -> Result<ReferenceTable> {
    let (header, rows) = table.split_header(header_skip).ok_or_else(|| {
        ToolError::malformed(label, format!("no header row after skipping {header_skip} rows"))
    })?;
    let headers: Vec<String> = header
        .iter()
        .map(|cell| cell.as_text().trim().to_string())
        .collect();

    let mut entries = Vec::new();
    for row in rows {
        let identifier = normalize_key(&row.first().map(Cell::as_text).unwrap_or_default(), policy);
        if identifier.is_empty() {
            continue;
        }

        let attributes = row
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(idx, cell)| {
                let name = headers.get(idx).filter(|name| !name.is_empty())?;
                let value = cell.as_text().trim().to_string();
                (!value.is_empty()).then(|| (name.clone(), value))
            })
            .collect();

        entries.push(FleetReferenceEntry {
            identifier,
            fleet_category: category,
            attributes,
        });
    }

    debug!(table = label, %category, rows = entries.len(), "loaded fleet table");
    Ok(ReferenceTable {
        label: label.to_string(),
        category,
        entries,
    })
}

/// Reads the unit → served-city-count table (unit name in the first column,
/// count in the second). Rows with a blank unit or an unreadable count are
/// skipped.
pub fn load_city_coverage(
    label: &str,
    table: &RawTable,
    header_skip: usize,
    policy: KeyPolicy,
    convention: &UnitNameConvention,
) -> Result<Vec<CityCoverageEntry>> {
    let (_, rows) = table.split_header(header_skip).ok_or_else(|| {
        ToolError::malformed(label, format!("no header row after skipping {header_skip} rows"))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let unit = row.first().map(Cell::as_text).unwrap_or_default();
        let unit_key = normalize_key(&convention.strip_ordinals(&unit), policy);
        if unit_key.is_empty() {
            continue;
        }
        let Some(count) = row.get(1).filter(|cell| !cell.is_blank()).and_then(Cell::to_amount) else {
            warn!(table = label, unit = %unit, "unreadable city count, row skipped");
            continue;
        };
        entries.push(CityCoverageEntry {
            unit_key,
            city_count: count.round() as u32,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convention() -> UnitNameConvention {
        UnitNameConvention::new(&UnitNaming::default()).expect("default convention compiles")
    }

    #[test]
    fn month_suffix_is_removed() {
        let convention = convention();
        assert_eq!(convention.unit_from_source("1º BPM ABR.xlsx"), "1 BPM");
        assert_eq!(convention.unit_from_source("2BPM abr.xlsx"), "2BPM");
        assert_eq!(convention.unit_from_source("CPRv MAR 2024.xlsx"), "CPRv");
        assert_eq!(convention.unit_from_source("BPTran MAR ABR.xlsx"), "BPTran MAR");
    }

    #[test]
    fn names_outside_the_convention_fall_back_to_the_full_name() {
        let convention = convention();
        assert_eq!(convention.unit_from_source("  3ºBPM.xlsx "), "3BPM.xlsx");
        assert_eq!(convention.unit_from_source("ABRIGO.xlsx"), "ABRIGO.xlsx");
    }
}
