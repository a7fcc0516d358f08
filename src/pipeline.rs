//! Pipeline entry point: load → classify → consolidate → reconcile →
//! detect anomalies, as one pure function of the input bytes and the
//! configuration.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, info_span, instrument, warn};
use uuid::Uuid;

use crate::anomaly::find_cross_unit_duplicates_with;
use crate::cache::{Fingerprint, RunCache};
use crate::config::{PipelineConfig, SourcePolicy};
use crate::consolidate::consolidate;
use crate::coverage::{UnitCoverage, coverage_by_unit};
use crate::error::{Result, ToolError};
use crate::io::decode_source;
use crate::loader::{TransactionLoader, load_city_coverage, load_reference_table};
use crate::model::{FleetCategory, FuelRecord, ReferenceTable};
use crate::reconcile::{FleetRegistry, apply_registry};

/// A complete byte buffer with the label it was fetched under. For
/// transaction exports the label carries the unit (see
/// [`UnitNameConvention`](crate::loader::UnitNameConvention)).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBytes {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceBytes {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads a file, labelling it with its file name.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ToolError::MissingInput(path.to_path_buf()));
        }
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, std::fs::read(path)?))
    }
}

/// A fleet registry source, labelled with the category it lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSource {
    pub category: FleetCategory,
    pub source: SourceBytes,
}

/// Everything one run consumes. Reference sources are merged in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineInput {
    pub transactions: Vec<SourceBytes>,
    pub references: Vec<ReferenceSource>,
    pub city_coverage: Option<SourceBytes>,
}

/// An expected column missing from a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDrift {
    pub source_name: String,
    pub column: String,
}

/// A source dropped under [`SourcePolicy::Skip`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedSource {
    pub source_name: String,
    pub reason: String,
}

/// Data-quality signals recovered by defaulting during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub schema_drift: Vec<SchemaDrift>,
    /// Amount or volume cells that could not be read and were zeroed.
    pub malformed_values: usize,
    pub footer_rows: usize,
    pub blank_identifier_rows: usize,
    pub unmatched_records: usize,
    pub skipped_sources: Vec<SkippedSource>,
}

/// Result of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub run_id: Uuid,
    /// Consolidated, reconciled records in source order.
    pub records: Vec<FuelRecord>,
    /// Records of plates seen under more than one unit.
    pub anomalies: Vec<FuelRecord>,
    /// Empty when no coverage table was supplied.
    pub coverage: Vec<UnitCoverage>,
    pub diagnostics: Diagnostics,
}

/// Runs the whole pipeline over `input`.
#[instrument(
    level = "info",
    skip_all,
    fields(run_id = tracing::field::Empty, transactions = input.transactions.len(), references = input.references.len())
)]
pub fn run(input: &PipelineInput, config: &PipelineConfig) -> Result<RunOutput> {
    config.validate()?;
    let run_id = Uuid::new_v4();
    tracing::Span::current().record("run_id", tracing::field::display(run_id));

    let loader = TransactionLoader::new(config)?;
    let mut diagnostics = Diagnostics::default();

    let mut record_sets = Vec::with_capacity(input.transactions.len());
    for source in &input.transactions {
        let _span = info_span!("transaction_source", source = %source.name).entered();
        let loaded = match decode_source(&source.name, &source.bytes, config.header_skip)
            .and_then(|table| loader.load(&source.name, &table))
        {
            Ok(loaded) => loaded,
            Err(err) => {
                skip_or_abort(config.source_policy, &source.name, err, &mut diagnostics)?;
                continue;
            }
        };

        diagnostics.malformed_values += loaded.malformed_values;
        diagnostics.footer_rows += loaded.footer_rows;
        diagnostics.blank_identifier_rows += loaded.blank_identifier_rows;
        diagnostics
            .schema_drift
            .extend(loaded.missing_columns.into_iter().map(|column| SchemaDrift {
                source_name: source.name.clone(),
                column,
            }));
        record_sets.push(loaded.records);
    }

    let records = consolidate(record_sets);
    info!(records = records.len(), "consolidated transaction exports");

    let tables = load_reference_tables(input, config, &mut diagnostics)?;
    let registry = FleetRegistry::merge(&tables, config.merge_precedence);
    let records = apply_registry(records, &registry);
    diagnostics.unmatched_records = records
        .iter()
        .filter(|record| record.fleet_category == FleetCategory::Unmatched)
        .count();
    if diagnostics.unmatched_records > 0 {
        warn!(
            unmatched = diagnostics.unmatched_records,
            registry_size = registry.len(),
            "records without a fleet registry match"
        );
    }

    let anomalies = find_cross_unit_duplicates_with(&records, &config.anomaly);
    if !anomalies.is_empty() {
        warn!(records = anomalies.len(), "plates fueled under more than one unit");
    }

    let coverage = match &input.city_coverage {
        Some(source) => {
            let entries = decode_source(
                &source.name,
                &source.bytes,
                config.reference_header_skip,
            )
            .and_then(|table| {
                load_city_coverage(
                    &source.name,
                    &table,
                    config.reference_header_skip,
                    config.key_policy,
                    loader.convention(),
                )
            });
            match entries {
                Ok(entries) => coverage_by_unit(&records, &entries, config.key_policy),
                Err(err) => {
                    skip_or_abort(config.source_policy, &source.name, err, &mut diagnostics)?;
                    Vec::new()
                }
            }
        }
        None => Vec::new(),
    };

    info!(
        records = records.len(),
        anomalies = anomalies.len(),
        malformed_values = diagnostics.malformed_values,
        schema_drift = diagnostics.schema_drift.len(),
        "pipeline run finished"
    );

    Ok(RunOutput {
        run_id,
        records,
        anomalies,
        coverage,
        diagnostics,
    })
}

/// [`run`] behind a content-addressed cache. Identical input bytes and
/// configuration return the cached output; anything else runs afresh.
pub fn run_cached(
    input: &PipelineInput,
    config: &PipelineConfig,
    cache: &mut dyn RunCache,
) -> Result<Arc<RunOutput>> {
    let fingerprint = Fingerprint::of(input, config)?;
    if let Some(output) = cache.get(&fingerprint) {
        info!(%fingerprint, "serving cached pipeline run");
        return Ok(output);
    }
    let output = Arc::new(run(input, config)?);
    cache.put(fingerprint, Arc::clone(&output));
    Ok(output)
}

fn load_reference_tables(
    input: &PipelineInput,
    config: &PipelineConfig,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<ReferenceTable>> {
    let mut tables = Vec::with_capacity(input.references.len());
    for reference in &input.references {
        let name = &reference.source.name;
        let table = decode_source(name, &reference.source.bytes, config.reference_header_skip)
            .and_then(|table| {
                load_reference_table(
                    name,
                    reference.category,
                    &table,
                    config.reference_header_skip,
                    config.key_policy,
                )
            });
        match table {
            Ok(table) => tables.push(table),
            Err(err) => skip_or_abort(config.source_policy, name, err, diagnostics)?,
        }
    }
    Ok(tables)
}

fn skip_or_abort(
    policy: SourcePolicy,
    source_name: &str,
    err: ToolError,
    diagnostics: &mut Diagnostics,
) -> Result<()> {
    match (policy, err) {
        (SourcePolicy::Skip, ToolError::MalformedSource { reason, .. }) => {
            warn!(source = source_name, %reason, "skipping malformed source");
            diagnostics.skipped_sources.push(SkippedSource {
                source_name: source_name.to_string(),
                reason,
            });
            Ok(())
        }
        (_, err) => Err(err),
    }
}
