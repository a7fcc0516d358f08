use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolError};

/// Rows above the header row in the monthly fuel exports.
pub const DEFAULT_HEADER_SKIP: usize = 4;

/// Explicit configuration for one pipeline run.
///
/// Every field has a default so a partial JSON document is enough to
/// override a single knob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Rows skipped before the header row of transaction exports.
    pub header_skip: usize,
    /// Rows skipped before the header row of fleet and coverage tables.
    pub reference_header_skip: usize,
    pub key_policy: KeyPolicy,
    /// Identifier values (compared trimmed and uppercased) that mark footer rows.
    pub footer_markers: Vec<String>,
    pub unit_naming: UnitNaming,
    pub merge_precedence: MergePrecedence,
    pub anomaly: AnomalyPolicy,
    pub source_policy: SourcePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            header_skip: DEFAULT_HEADER_SKIP,
            reference_header_skip: 0,
            key_policy: KeyPolicy::default(),
            footer_markers: vec!["TOTAL".to_string()],
            unit_naming: UnitNaming::default(),
            merge_precedence: MergePrecedence::default(),
            anomaly: AnomalyPolicy::default(),
            source_policy: SourcePolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads a configuration from a JSON document on disk.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ToolError::MissingInput(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that would make every run meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.anomaly.min_distinct_units < 2 {
            return Err(ToolError::InvalidConfig(format!(
                "anomaly.min_distinct_units must be at least 2, got {}",
                self.anomaly.min_distinct_units
            )));
        }
        if self.unit_naming.month_tokens.is_empty() {
            return Err(ToolError::InvalidConfig(
                "unit_naming.month_tokens must list at least one token".into(),
            ));
        }
        if self.unit_naming.month_tokens.iter().any(|token| token.trim().is_empty()) {
            return Err(ToolError::InvalidConfig(
                "unit_naming.month_tokens must not contain blank tokens".into(),
            ));
        }
        Ok(())
    }
}

/// How vehicle identifiers are canonicalised before any join or grouping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPolicy {
    /// Uppercase, drop hyphens and whitespace.
    #[default]
    Lenient,
    /// Uppercase, keep only `[A-Z0-9]`.
    Strict,
}

/// Naming convention `<UNIT> <MONTH-ABBR>.xlsx` used to derive the unit of a
/// transaction export from its file name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitNaming {
    pub month_tokens: Vec<String>,
    pub ordinal_markers: Vec<String>,
}

impl Default for UnitNaming {
    fn default() -> Self {
        let months = [
            "JAN", "FEV", "MAR", "ABR", "MAI", "JUN", "JUL", "AGO", "SET", "OUT", "NOV", "DEZ",
        ];
        Self {
            month_tokens: months.iter().map(|m| m.to_string()).collect(),
            ordinal_markers: vec!["º".into(), "ª".into(), "°".into()],
        }
    }
}

/// Which reference table wins when a plate is listed more than once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePrecedence {
    /// The table merged later overwrites earlier ones.
    #[default]
    LastWins,
    /// The first table listing a plate keeps it.
    FirstWins,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyPolicy {
    /// Number of distinct units at which a plate is flagged.
    pub min_distinct_units: usize,
}

impl Default for AnomalyPolicy {
    fn default() -> Self {
        Self {
            min_distinct_units: 2,
        }
    }
}

/// What happens when a byte source cannot be decoded at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourcePolicy {
    /// Fail the whole run with the offending source label.
    #[default]
    Abort,
    /// Drop the source, log it and list it in the run diagnostics.
    Skip,
}
