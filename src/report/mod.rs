//! Flattens a run into the tables of the standard fuel report.

use serde::{Deserialize, Serialize};

use crate::aggregate::{Filter, GroupKey, Metric, Order, Summary, distribution, sum_by, top_n};
use crate::anomaly::{CrossUnitGroup, cross_unit_groups};
use crate::config::AnomalyPolicy;
use crate::coverage::UnitCoverage;
use crate::model::{FuelRecord, FuelType};
use crate::pipeline::{Diagnostics, RunOutput};

/// Number of vehicles in the standard rankings.
pub const DEFAULT_TOP: usize = 20;

pub const SUMMARY_SHEET: &str = "Resumo";
pub const DETAIL_SHEET: &str = "Abastecimentos";
pub const UNIT_SHEET: &str = "Por Unidade";
pub const TOP_VOLUME_SHEET: &str = "Top Litros";
pub const TOP_COST_SHEET: &str = "Top Valor";
pub const FUEL_SHEET: &str = "Combustíveis";
pub const ANOMALY_SHEET: &str = "Múltiplas OMs";
pub const COVERAGE_SHEET: &str = "Cobertura";
pub const DIAGNOSTICS_SHEET: &str = "Diagnóstico";

/// Aggregates shown by the standard report, computed over the filtered
/// records. Anomalies always cover the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub filter: Filter,
    pub summary: Summary,
    pub volume_by_unit: Vec<(String, f64)>,
    pub cost_by_unit: Vec<(String, f64)>,
    pub top_by_volume: Vec<(String, f64)>,
    pub top_by_cost: Vec<(String, f64)>,
    pub fuel_distribution: Vec<(String, usize)>,
    pub fleet_distribution: Vec<(String, usize)>,
    pub cross_unit_groups: Vec<CrossUnitGroup>,
    pub coverage: Vec<UnitCoverage>,
    pub diagnostics: Diagnostics,
}

impl Report {
    pub fn build(output: &RunOutput, filter: &Filter, top: usize, anomaly: &AnomalyPolicy) -> Self {
        let filtered = filter.apply(&output.records);
        let records = || filtered.iter().copied();

        let unit_sums = |metric: Metric| -> Vec<(String, f64)> {
            sum_by(records(), |r| GroupKey::Unit.key(r), |r| metric.value(r))
                .into_iter()
                .collect()
        };
        let ranking = |metric: Metric| {
            top_n(
                records(),
                |r| GroupKey::Identifier.key(r),
                |r| metric.value(r),
                top,
                Order::Descending,
            )
        };

        Self {
            filter: filter.clone(),
            summary: Summary::compute(records()),
            volume_by_unit: unit_sums(Metric::Volume),
            cost_by_unit: unit_sums(Metric::Cost),
            top_by_volume: ranking(Metric::Volume),
            top_by_cost: ranking(Metric::Cost),
            fuel_distribution: distribution(records(), |r| GroupKey::Fuel.key(r))
                .into_iter()
                .collect(),
            fleet_distribution: distribution(records(), |r| GroupKey::Fleet.key(r))
                .into_iter()
                .collect(),
            cross_unit_groups: cross_unit_groups(&output.records, anomaly),
            coverage: output.coverage.clone(),
            diagnostics: output.diagnostics.clone(),
        }
    }
}

/// Value written into one worksheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<usize> for CellValue {
    fn from(value: usize) -> Self {
        CellValue::Number(value as f64)
    }
}

/// A table that will be materialised as an Excel sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    pub sheet_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl SheetTable {
    fn new(sheet_name: &str, columns: &[&str]) -> Self {
        Self {
            sheet_name: sheet_name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }
}

/// Represents all tables required to materialise the report workbook.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkbookData {
    pub tables: Vec<SheetTable>,
}

/// Lays the report out as worksheets. The detail sheet lists the filtered
/// records; the anomaly sheet lists every flagged record of the run.
pub fn build_workbook(output: &RunOutput, report: &Report) -> WorkbookData {
    let mut tables = vec![summary_table(report)];

    let mut detail = record_table(DETAIL_SHEET);
    detail.rows = report
        .filter
        .apply(&output.records)
        .into_iter()
        .map(record_row)
        .collect();
    tables.push(detail);

    let mut units = SheetTable::new(UNIT_SHEET, &["UNIDADE", "TOTAL_LITROS", "VALOR_TOTAL"]);
    units.rows = report
        .volume_by_unit
        .iter()
        .zip(&report.cost_by_unit)
        .map(|((unit, volume), (_, cost))| vec![unit.as_str().into(), (*volume).into(), (*cost).into()])
        .collect();
    tables.push(units);

    tables.push(ranking_table(TOP_VOLUME_SHEET, "TOTAL_LITROS", &report.top_by_volume));
    tables.push(ranking_table(TOP_COST_SHEET, "VALOR_TOTAL", &report.top_by_cost));

    let mut fuels = SheetTable::new(FUEL_SHEET, &["COMBUSTÍVEL", "REGISTROS"]);
    fuels.rows = report
        .fuel_distribution
        .iter()
        .map(|(fuel, count)| vec![fuel.as_str().into(), (*count).into()])
        .collect();
    tables.push(fuels);

    let mut anomalies = record_table(ANOMALY_SHEET);
    anomalies.rows = output.anomalies.iter().map(record_row).collect();
    tables.push(anomalies);

    if !report.coverage.is_empty() {
        let mut coverage = SheetTable::new(
            COVERAGE_SHEET,
            &["UNIDADE", "VIATURAS", "CIDADES", "VIATURAS_POR_CIDADE"],
        );
        coverage.rows = report
            .coverage
            .iter()
            .map(|entry| {
                vec![
                    entry.unit.as_str().into(),
                    entry.unique_vehicles.into(),
                    entry
                        .city_count
                        .map(|count| CellValue::Number(f64::from(count)))
                        .unwrap_or_else(|| "".into()),
                    entry
                        .vehicles_per_city
                        .map(CellValue::Number)
                        .unwrap_or_else(|| "".into()),
                ]
            })
            .collect();
        tables.push(coverage);
    }

    tables.push(diagnostics_table(&report.diagnostics));
    WorkbookData { tables }
}

fn summary_table(report: &Report) -> SheetTable {
    let summary = &report.summary;
    let mut table = SheetTable::new(SUMMARY_SHEET, &["MÉTRICA", "VALOR"]);
    table.rows = vec![
        vec!["Total de Registros".into(), summary.record_count.into()],
        vec!["Viaturas Únicas".into(), summary.unique_vehicles.into()],
        vec!["Total de Litros".into(), summary.total_volume.into()],
        vec!["Total Gasto (R$)".into(), summary.total_cost.into()],
        vec!["% Não Encontrados".into(), summary.unmatched_share.into()],
    ];
    table
}

fn record_table(sheet_name: &str) -> SheetTable {
    let mut columns = vec!["PLACA", "UNIDADE", "ARQUIVO", "COMBUSTÍVEL"];
    let volume_columns: Vec<String> = FuelType::ALL.iter().map(|f| f.volume_column()).collect();
    let cost_columns: Vec<String> = FuelType::ALL.iter().map(|f| f.cost_column()).collect();
    columns.extend(volume_columns.iter().map(String::as_str));
    columns.extend(cost_columns.iter().map(String::as_str));
    columns.extend(["TOTAL_LITROS", "VALOR_TOTAL", "FROTA"]);
    SheetTable::new(sheet_name, &columns)
}

fn record_row(record: &FuelRecord) -> Vec<CellValue> {
    let mut row: Vec<CellValue> = vec![
        record.identifier.as_str().into(),
        record.unit.as_str().into(),
        record.source_file.as_str().into(),
        record.dominant_fuel.label().into(),
    ];
    row.extend(record.fuel_volumes.iter().map(|(_, value)| CellValue::Number(value)));
    row.extend(record.fuel_costs.iter().map(|(_, value)| CellValue::Number(value)));
    row.push(record.total_volume.into());
    row.push(record.total_cost.into());
    row.push(record.fleet_category.label().into());
    row
}

fn ranking_table(sheet_name: &str, value_column: &str, ranking: &[(String, f64)]) -> SheetTable {
    let mut table = SheetTable::new(sheet_name, &["PLACA", value_column]);
    table.rows = ranking
        .iter()
        .map(|(plate, value)| vec![plate.as_str().into(), (*value).into()])
        .collect();
    table
}

fn diagnostics_table(diagnostics: &Diagnostics) -> SheetTable {
    let mut table = SheetTable::new(DIAGNOSTICS_SHEET, &["TIPO", "ORIGEM", "DETALHE"]);
    for drift in &diagnostics.schema_drift {
        table.rows.push(vec![
            "coluna ausente".into(),
            drift.source_name.as_str().into(),
            drift.column.as_str().into(),
        ]);
    }
    for skipped in &diagnostics.skipped_sources {
        table.rows.push(vec![
            "arquivo ignorado".into(),
            skipped.source_name.as_str().into(),
            skipped.reason.as_str().into(),
        ]);
    }
    for (kind, count) in [
        ("valores inválidos", diagnostics.malformed_values),
        ("linhas sem placa", diagnostics.blank_identifier_rows),
        ("linhas de total", diagnostics.footer_rows),
        ("registros não encontrados", diagnostics.unmatched_records),
    ] {
        table.rows.push(vec![kind.into(), "".into(), count.into()]);
    }
    table
}
