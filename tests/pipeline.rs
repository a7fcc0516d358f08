use std::collections::BTreeMap;

use calamine::{DataType, Reader, Xlsx, open_workbook};
use fleet_fuel_tools::aggregate::{Filter, GroupKey, Metric, sum_by};
use fleet_fuel_tools::cache::{Fingerprint, MemoryCache, RunCache};
use fleet_fuel_tools::config::{AnomalyPolicy, PipelineConfig, SourcePolicy};
use fleet_fuel_tools::io::excel_write;
use fleet_fuel_tools::model::{FleetCategory, FuelType};
use fleet_fuel_tools::pipeline::{self, PipelineInput, ReferenceSource, SourceBytes};
use fleet_fuel_tools::report::{self, Report, SUMMARY_SHEET};
use fleet_fuel_tools::{Result, ToolError};
use rust_xlsxwriter::Workbook;
use tempfile::tempdir;

enum Fx {
    S(&'static str),
    N(f64),
    Blank,
}

/// Builds an export laid out like the monthly spreadsheets: a title, three
/// spacer rows, the header, then the data rows.
fn export_xlsx(headers: &[&str], rows: &[Vec<Fx>]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet
        .write_string(0, 0, "RELATÓRIO DE ABASTECIMENTO POR VIATURA")
        .expect("title written");
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(4, col as u16, *header).expect("header written");
    }
    for (idx, row) in rows.iter().enumerate() {
        let excel_row = 5 + idx as u32;
        for (col, cell) in row.iter().enumerate() {
            match cell {
                Fx::S(value) => {
                    sheet.write_string(excel_row, col as u16, *value).expect("cell written");
                }
                Fx::N(value) => {
                    sheet.write_number(excel_row, col as u16, *value).expect("cell written");
                }
                Fx::Blank => {}
            }
        }
    }
    workbook.save_to_buffer().expect("workbook serialised")
}

fn registry_xlsx(headers: &[&str], rows: &[&[&'static str]]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(0, col as u16, *header).expect("header written");
    }
    for (idx, row) in rows.iter().enumerate() {
        for (col, value) in row.iter().enumerate() {
            sheet
                .write_string(1 + idx as u32, col as u16, *value)
                .expect("cell written");
        }
    }
    workbook.save_to_buffer().expect("workbook serialised")
}

fn gasoline_export(plate: &'static str) -> Vec<u8> {
    export_xlsx(
        &["Placa da Viatura", "Gasolina (Lts)", "Gasolina (R$)"],
        &[
            vec![Fx::S(plate), Fx::N(10.0), Fx::S("R$ 50,00")],
            vec![Fx::S("TOTAL"), Fx::N(10.0), Fx::S("R$ 50,00")],
        ],
    )
}

fn run(input: &PipelineInput) -> Result<pipeline::RunOutput> {
    pipeline::run(input, &PipelineConfig::default())
}

#[test]
fn two_units_same_plate_end_to_end() {
    let input = PipelineInput {
        transactions: vec![
            SourceBytes::new("1BPM ABR.xlsx", gasoline_export("ABC-1234")),
            SourceBytes::new("2BPM ABR.xlsx", gasoline_export("abc 1234")),
        ],
        ..PipelineInput::default()
    };

    let output = run(&input).expect("pipeline run");

    assert_eq!(output.records.len(), 2);
    for record in &output.records {
        assert_eq!(record.identifier, "ABC1234");
        assert_eq!(record.fleet_category, FleetCategory::Unmatched);
        assert_eq!(record.dominant_fuel, FuelType::Gasoline);
        assert_eq!(record.total_volume, 10.0);
        assert_eq!(record.total_cost, 50.0);
    }
    assert_eq!(output.records[0].unit, "1BPM");
    assert_eq!(output.records[1].unit, "2BPM");
    assert_eq!(output.records[1].source_file, "2BPM ABR.xlsx");

    assert_eq!(output.anomalies.len(), 2);

    let by_unit = sum_by(&output.records, |r| r.unit.clone(), |r| r.total_volume);
    let expected: BTreeMap<String, f64> =
        [("1BPM".to_string(), 10.0), ("2BPM".to_string(), 10.0)].into_iter().collect();
    assert_eq!(by_unit, expected);

    let diagnostics = &output.diagnostics;
    assert_eq!(diagnostics.footer_rows, 2);
    assert_eq!(diagnostics.unmatched_records, 2);
    // Six of the eight fuel columns are absent from each export.
    assert_eq!(diagnostics.schema_drift.len(), 12);
}

#[test]
fn registries_classify_and_enrich_records() {
    let export = export_xlsx(
        &["PLACA", "Gasolina (Lts)", "Diesel (Lts)", "Diesel (R$)", "Álcool (Lts)"],
        &[
            vec![Fx::S("PRO-0001"), Fx::N(5.0), Fx::N(30.0), Fx::S("R$ 1.234,56"), Fx::Blank],
            vec![Fx::S("LOC 0002"), Fx::N(12.0), Fx::Blank, Fx::S("-"), Fx::S("xx")],
            vec![Fx::S("NEW0003"), Fx::Blank, Fx::Blank, Fx::Blank, Fx::N(3.0)],
            vec![Fx::Blank, Fx::N(1.0), Fx::Blank, Fx::Blank, Fx::Blank],
            vec![Fx::S(" total "), Fx::N(47.0), Fx::N(30.0), Fx::Blank, Fx::N(3.0)],
        ],
    );
    let owned = registry_xlsx(&["PLACA", "ANO"], &[&["pro-0001", "2018"], &["LOC0002", "2015"]]);
    let leased = registry_xlsx(&["Placa", "FAIXA"], &[&["loc-0002", "B"]]);

    let input = PipelineInput {
        transactions: vec![SourceBytes::new("3º BPM MAI.xlsx", export)],
        references: vec![
            ReferenceSource {
                category: FleetCategory::Owned,
                source: SourceBytes::new("PRÓPRIOS_JUSTIÇA.xlsx", owned),
            },
            ReferenceSource {
                category: FleetCategory::Leased,
                source: SourceBytes::new("LOCADOS.xlsx", leased),
            },
        ],
        city_coverage: None,
    };

    let output = run(&input).expect("pipeline run");
    let records = &output.records;

    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.unit == "3 BPM"));

    assert_eq!(records[0].identifier, "PRO0001");
    assert_eq!(records[0].fleet_category, FleetCategory::Owned);
    assert_eq!(records[0].dominant_fuel, FuelType::Diesel);
    assert_eq!(records[0].total_cost, 1234.56);
    assert_eq!(records[0].attributes.get("ANO").map(String::as_str), Some("2018"));

    assert_eq!(records[1].identifier, "LOC0002");
    assert_eq!(records[1].fleet_category, FleetCategory::Leased);
    assert_eq!(records[1].attributes.get("FAIXA").map(String::as_str), Some("B"));
    assert!(!records[1].attributes.contains_key("ANO"));

    assert_eq!(records[2].fleet_category, FleetCategory::Unmatched);
    assert_eq!(records[2].dominant_fuel, FuelType::Ethanol);

    assert_eq!(output.diagnostics.malformed_values, 1);
    assert_eq!(output.diagnostics.blank_identifier_rows, 1);
    assert_eq!(output.diagnostics.footer_rows, 1);
    assert!(output.anomalies.is_empty());
}

#[test]
fn csv_exports_and_coverage_table() {
    let export = "Relatório;;\n;;\n;;\n;;\nPlaca;Diesel S10 (Lts);Diesel S10 (R$)\nAAA-1111;40,5;R$ 250,10\nBBB-2222;10;60\n";
    let cities = "OPM,CIDADES\n1º BPM,3\n";

    let input = PipelineInput {
        transactions: vec![SourceBytes::new("1º BPM JUN.csv", export.as_bytes())],
        references: Vec::new(),
        city_coverage: Some(SourceBytes::new("cidades.csv", cities.as_bytes())),
    };

    let output = run(&input).expect("pipeline run");

    assert_eq!(output.records.len(), 2);
    assert_eq!(output.records[0].total_volume, 40.5);
    assert_eq!(output.records[0].total_cost, 250.1);
    assert_eq!(output.records[0].dominant_fuel, FuelType::DieselS10);

    assert_eq!(output.coverage.len(), 1);
    assert_eq!(output.coverage[0].unit, "1 BPM");
    assert_eq!(output.coverage[0].city_count, Some(3));
    assert_eq!(output.coverage[0].vehicles_per_city, Some(2.0 / 3.0));
}

#[test]
fn comma_csv_with_semicolon_in_title_keeps_its_columns() {
    let export = "Relatório; maio 2025,,\n,,\n,,\n,,\nPlaca,Gasolina (Lts),Gasolina (R$)\nAAA-1111,10,50\n";
    let input = PipelineInput {
        transactions: vec![SourceBytes::new("3BPM MAI.csv", export.as_bytes())],
        ..PipelineInput::default()
    };

    let output = run(&input).expect("pipeline run");

    assert_eq!(output.records.len(), 1);
    assert_eq!(output.records[0].identifier, "AAA1111");
    assert_eq!(output.records[0].fuel_volumes.get(FuelType::Gasoline), 10.0);
    assert_eq!(output.records[0].fuel_costs.get(FuelType::Gasoline), 50.0);
    // Only the six non-gasoline fuel columns are absent.
    assert_eq!(output.diagnostics.schema_drift.len(), 6);
    assert!(
        output
            .diagnostics
            .schema_drift
            .iter()
            .all(|drift| !drift.column.starts_with("Gasolina"))
    );
}

#[test]
fn empty_month_token_list_is_rejected() {
    let mut config = PipelineConfig::default();
    config.unit_naming.month_tokens.clear();

    assert!(matches!(config.validate(), Err(ToolError::InvalidConfig(_))));

    let input = PipelineInput {
        transactions: vec![SourceBytes::new("1BPM ABR.xlsx", gasoline_export("ABC1234"))],
        ..PipelineInput::default()
    };
    let error = pipeline::run(&input, &config).expect_err("config is invalid");
    assert!(matches!(error, ToolError::InvalidConfig(_)));
}

#[test]
fn blank_leading_rows_still_count_toward_the_header_offset() {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(4, 1, "PLACA").expect("header written");
    sheet.write_string(4, 2, "Diesel (Lts)").expect("header written");
    sheet.write_string(5, 1, "ZZZ-0001").expect("cell written");
    sheet.write_number(5, 2, 25.0).expect("cell written");
    let bytes = workbook.save_to_buffer().expect("workbook serialised");

    let config = PipelineConfig::default();
    let input = PipelineInput {
        transactions: vec![SourceBytes::new("4BPM OUT.xlsx", bytes)],
        ..PipelineInput::default()
    };

    // Column A is empty, so the plate column is blank and the row is dropped.
    let output = pipeline::run(&input, &config).expect("pipeline run");
    assert!(output.records.is_empty());
    assert_eq!(output.diagnostics.blank_identifier_rows, 1);
    assert!(
        !output
            .diagnostics
            .schema_drift
            .iter()
            .any(|drift| drift.column == "Diesel (Lts)")
    );
}

#[test]
fn malformed_sources_abort_or_are_skipped() {
    let input = PipelineInput {
        transactions: vec![
            SourceBytes::new("1BPM ABR.xlsx", gasoline_export("ABC1234")),
            SourceBytes::new("2BPM ABR.xlsx", b"definitely not a workbook".to_vec()),
        ],
        ..PipelineInput::default()
    };

    match run(&input) {
        Err(ToolError::MalformedSource { source_name, .. }) => {
            assert_eq!(source_name, "2BPM ABR.xlsx");
        }
        other => panic!("expected a malformed source error, got {other:?}"),
    }

    let config = PipelineConfig {
        source_policy: SourcePolicy::Skip,
        ..PipelineConfig::default()
    };
    let output = pipeline::run(&input, &config).expect("pipeline run");

    assert_eq!(output.records.len(), 1);
    assert_eq!(output.diagnostics.skipped_sources.len(), 1);
    assert_eq!(output.diagnostics.skipped_sources[0].source_name, "2BPM ABR.xlsx");
}

#[test]
fn exports_without_a_header_row_are_malformed() {
    let input = PipelineInput {
        transactions: vec![SourceBytes::new("1BPM ABR.csv", b"so;short\n".to_vec())],
        ..PipelineInput::default()
    };

    let error = run(&input).expect_err("header row is missing");
    assert!(matches!(error, ToolError::MalformedSource { .. }));
}

#[test]
fn cache_is_keyed_by_content() {
    let config = PipelineConfig::default();
    let input = PipelineInput {
        transactions: vec![SourceBytes::new("1BPM ABR.xlsx", gasoline_export("ABC1234"))],
        ..PipelineInput::default()
    };
    let mut cache = MemoryCache::new();

    let first = pipeline::run_cached(&input, &config, &mut cache).expect("first run");
    let second = pipeline::run_cached(&input, &config, &mut cache).expect("second run");
    assert_eq!(first.run_id, second.run_id);
    assert_eq!(cache.len(), 1);

    let changed = PipelineInput {
        transactions: vec![SourceBytes::new("1BPM ABR.xlsx", gasoline_export("XYZ9876"))],
        ..PipelineInput::default()
    };
    assert_ne!(
        Fingerprint::of(&input, &config).expect("fingerprint"),
        Fingerprint::of(&changed, &config).expect("fingerprint")
    );
    let third = pipeline::run_cached(&changed, &config, &mut cache).expect("third run");
    assert_eq!(third.records[0].identifier, "XYZ9876");
    assert_eq!(cache.len(), 2);

    cache.invalidate();
    assert!(cache.is_empty());
    let fourth = pipeline::run_cached(&input, &config, &mut cache).expect("fourth run");
    assert_ne!(first.run_id, fourth.run_id);
}

#[test]
fn report_workbook_roundtrip() {
    let input = PipelineInput {
        transactions: vec![
            SourceBytes::new("1BPM ABR.xlsx", gasoline_export("ABC1234")),
            SourceBytes::new("2BPM ABR.xlsx", gasoline_export("ABC1234")),
        ],
        ..PipelineInput::default()
    };
    let output = run(&input).expect("pipeline run");
    let filter = Filter::all().with_units(["1BPM"]);
    let report = Report::build(&output, &filter, 20, &AnomalyPolicy::default());

    assert_eq!(report.summary.record_count, 1);
    assert_eq!(report.top_by_volume, [("ABC1234".to_string(), 10.0)]);
    assert_eq!(report.cross_unit_groups.len(), 1);
    assert_eq!(
        report.volume_by_unit,
        [(GroupKey::Unit.key(&output.records[0]), Metric::Volume.value(&output.records[0]))]
    );

    let workbook = report::build_workbook(&output, &report);
    let temp_dir = tempdir().expect("temporary directory");
    let xlsx_path = temp_dir.path().join("relatorio.xlsx");
    excel_write::write_workbook(&xlsx_path, &workbook).expect("Excel written");

    let mut written: Xlsx<_> = open_workbook(&xlsx_path).expect("Excel read");
    let sheet_names = written.sheet_names().to_vec();
    assert_eq!(sheet_names.len(), workbook.tables.len());

    let summary = written
        .worksheet_range(SUMMARY_SHEET)
        .expect("summary sheet present")
        .expect("summary sheet readable");
    assert_eq!(
        summary.get_value((1, 0)),
        Some(&DataType::String("Total de Registros".to_string()))
    );
    assert_eq!(summary.get_value((1, 1)), Some(&DataType::Float(1.0)));

    let json = serde_json::to_value(&report).expect("report serialised");
    assert_eq!(json["summary"]["record_count"], 1);
}
