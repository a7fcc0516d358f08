use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use fleet_fuel_tools::aggregate::Filter;
use fleet_fuel_tools::config::{KeyPolicy, PipelineConfig, SourcePolicy};
use fleet_fuel_tools::io::excel_write;
use fleet_fuel_tools::model::{FleetCategory, FuelType};
use fleet_fuel_tools::money::format_brl;
use fleet_fuel_tools::pipeline::{self, PipelineInput, ReferenceSource, SourceBytes};
use fleet_fuel_tools::report::{self, DEFAULT_TOP, Report};
use fleet_fuel_tools::{Result, ToolError};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_tracing().and_then(|()| run(cli)) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| ToolError::Logging(err.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Report(args) => execute_report(args),
    }
}

fn execute_report(args: ReportArgs) -> Result<()> {
    let config = args.resolve_config()?;

    let mut input = PipelineInput::default();
    for path in &args.transactions {
        input.transactions.extend(collect_sources(path)?);
    }
    for FleetSource { category, path } in &args.fleet {
        input.references.push(ReferenceSource {
            category: *category,
            source: SourceBytes::from_path(path)?,
        });
    }
    if let Some(path) = &args.cities {
        input.city_coverage = Some(SourceBytes::from_path(path)?);
    }

    let output = pipeline::run(&input, &config)?;
    let filter = args.filter();
    let report = Report::build(&output, &filter, args.top, &config.anomaly);

    print_summary(&report);

    if let Some(path) = &args.output {
        let workbook = report::build_workbook(&output, &report);
        excel_write::write_workbook(path, &workbook)?;
        info!(output = %path.display(), sheets = workbook.tables.len(), "report workbook written");
    }
    if let Some(path) = &args.json {
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        info!(output = %path.display(), "report JSON written");
    }
    Ok(())
}

/// A file, or every `.xlsx`/`.csv` file of a directory in name order.
fn collect_sources(path: &Path) -> Result<Vec<SourceBytes>> {
    if !path.exists() {
        return Err(ToolError::MissingInput(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Ok(vec![SourceBytes::from_path(path)?]);
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<std::io::Result<_>>()?;
    files.retain(|file| {
        let extension = file
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        file.is_file() && (extension == "xlsx" || extension == "csv")
    });
    files.sort();
    files.iter().map(|file| SourceBytes::from_path(file)).collect()
}

fn print_summary(report: &Report) {
    let summary = &report.summary;
    println!("Total de Registros: {}", summary.record_count);
    println!("Viaturas Únicas:    {}", summary.unique_vehicles);
    println!("Total de Litros:    {:.2} L", summary.total_volume);
    println!("Total Gasto:        R$ {}", format_brl(summary.total_cost));
    println!("% Não Encontrados:  {:.1}%", summary.unmatched_share);

    if !report.cross_unit_groups.is_empty() {
        println!();
        println!("Viaturas abastecidas em mais de uma OM:");
        for group in &report.cross_unit_groups {
            let units: Vec<&str> = group.units.iter().map(String::as_str).collect();
            println!("  {:<10} {}", group.identifier, units.join(", "));
        }
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Reconcile fleet fuel exports against fleet registries and report on them."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load fuel exports, reconcile them and print or write the report.
    Report(ReportArgs),
}

#[derive(clap::Args)]
struct ReportArgs {
    /// Fuel export files, or directories holding them.
    #[arg(long, required = true, num_args = 1..)]
    transactions: Vec<PathBuf>,

    /// Fleet registry as CATEGORY=PATH (owned/proprio, leased/locado).
    /// Repeatable; later registries win on conflicting plates.
    #[arg(long, value_parser = parse_fleet_source)]
    fleet: Vec<FleetSource>,

    /// Table of served cities per unit.
    #[arg(long)]
    cities: Option<PathBuf>,

    /// JSON pipeline configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rows above the header row of the fuel exports.
    #[arg(long)]
    header_skip: Option<usize>,

    /// Keep only A-Z and 0-9 in plates.
    #[arg(long)]
    strict_keys: bool,

    /// Skip unreadable sources instead of aborting.
    #[arg(long)]
    skip_malformed: bool,

    /// Only these units.
    #[arg(long)]
    unit: Vec<String>,

    /// Only these dominant fuels.
    #[arg(long, value_parser = parse_fuel)]
    fuel: Vec<FuelType>,

    /// Only these fleet categories.
    #[arg(long, value_parser = parse_fleet_category)]
    fleet_filter: Vec<FleetCategory>,

    /// Length of the vehicle rankings.
    #[arg(long, default_value_t = DEFAULT_TOP)]
    top: usize,

    /// Write the report workbook here.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write the report as JSON here.
    #[arg(long)]
    json: Option<PathBuf>,
}

impl ReportArgs {
    fn resolve_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(skip) = self.header_skip {
            config.header_skip = skip;
        }
        if self.strict_keys {
            config.key_policy = KeyPolicy::Strict;
        }
        if self.skip_malformed {
            config.source_policy = SourcePolicy::Skip;
        }
        Ok(config)
    }

    fn filter(&self) -> Filter {
        let mut filter = Filter::all();
        if !self.unit.is_empty() {
            filter = filter.with_units(self.unit.iter().cloned());
        }
        if !self.fuel.is_empty() {
            filter = filter.with_fuels(self.fuel.iter().copied());
        }
        if !self.fleet_filter.is_empty() {
            filter = filter.with_fleets(self.fleet_filter.iter().copied());
        }
        filter
    }
}

#[derive(Clone, Debug)]
struct FleetSource {
    category: FleetCategory,
    path: PathBuf,
}

fn parse_fleet_source(value: &str) -> std::result::Result<FleetSource, String> {
    let (category, path) = value
        .split_once('=')
        .ok_or_else(|| format!("expected CATEGORY=PATH, got '{value}'"))?;
    let category = parse_fleet_category(category)?;
    if category == FleetCategory::Unmatched {
        return Err("a fleet registry cannot be labelled as unmatched".into());
    }
    Ok(FleetSource {
        category,
        path: PathBuf::from(path),
    })
}

fn parse_fleet_category(value: &str) -> std::result::Result<FleetCategory, String> {
    value.parse()
}

fn parse_fuel(value: &str) -> std::result::Result<FuelType, String> {
    value.parse()
}
