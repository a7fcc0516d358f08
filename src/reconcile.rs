//! Joins fuel records against the fleet registries.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use tracing::{debug, info};

use crate::config::MergePrecedence;
use crate::model::{FleetCategory, FleetReferenceEntry, FuelRecord, Identifier, ReferenceTable};

/// Union of every registry supplied to a run, keyed by normalized plate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FleetRegistry {
    entries: BTreeMap<Identifier, FleetReferenceEntry>,
}

impl FleetRegistry {
    /// Merges the tables in the given order. Collisions (across tables or
    /// within one) are settled by `precedence`.
    pub fn merge(tables: &[ReferenceTable], precedence: MergePrecedence) -> Self {
        let mut entries: BTreeMap<Identifier, FleetReferenceEntry> = BTreeMap::new();
        let mut collisions = 0usize;

        for table in tables {
            for entry in &table.entries {
                match entries.entry(entry.identifier.clone()) {
                    Entry::Vacant(slot) => {
                        slot.insert(entry.clone());
                    }
                    Entry::Occupied(mut slot) => {
                        collisions += 1;
                        if precedence == MergePrecedence::LastWins {
                            slot.insert(entry.clone());
                        }
                    }
                }
            }
            debug!(table = %table.label, category = %table.category, rows = table.entries.len(), "merged fleet table");
        }

        if collisions > 0 {
            info!(collisions, ?precedence, "plates listed more than once across fleet tables");
        }
        Self { entries }
    }

    pub fn lookup(&self, identifier: &str) -> Option<&FleetReferenceEntry> {
        self.entries.get(identifier)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Assigns a fleet category (and enrichment attributes) to every record.
///
/// Plates missing from all tables get [`FleetCategory::Unmatched`]; no record
/// is ever dropped, and an empty table list is valid.
pub fn reconcile(
    records: Vec<FuelRecord>,
    tables: &[ReferenceTable],
    precedence: MergePrecedence,
) -> Vec<FuelRecord> {
    let registry = FleetRegistry::merge(tables, precedence);
    apply_registry(records, &registry)
}

/// [`reconcile`] against an already merged registry.
pub fn apply_registry(records: Vec<FuelRecord>, registry: &FleetRegistry) -> Vec<FuelRecord> {
    records
        .into_iter()
        .map(|mut record| {
            match registry.lookup(&record.identifier) {
                Some(entry) => {
                    record.fleet_category = entry.fleet_category;
                    record.attributes = entry.attributes.clone();
                }
                None => {
                    record.fleet_category = FleetCategory::Unmatched;
                    record.attributes.clear();
                }
            }
            record
        })
        .collect()
}
