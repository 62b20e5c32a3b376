use serde::{Deserialize, Serialize};
use std::fmt;
use tabled::Tabled;

pub type VehicleId = String;

/// The spreadsheet as loaded: named columns and string cells.
///
/// Rows are always exactly as wide as the header. The table is never mutated
/// after construction; filtering works on row-index views.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> RawTable {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width, None);
                r
            })
            .collect();
        RawTable { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn all_rows(&self) -> Vec<usize> {
        (0..self.rows.len()).collect()
    }

    /// Raw cell contents, `None` when missing or out of range.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col)?.as_deref()
    }

    /// Trimmed cell contents, `None` when missing or blank.
    pub fn value(&self, row: usize, col: usize) -> Option<&str> {
        let s = self.cell(row, col)?.trim();
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    }

    /// Builds a table from string literals; empty strings become missing cells.
    #[cfg(test)]
    pub fn from_literal(columns: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| {
                    r.iter()
                        .map(|c| {
                            if c.is_empty() {
                                None
                            } else {
                                Some(c.to_string())
                            }
                        })
                        .collect()
                })
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NormStatus {
    #[serde(rename = "Installed")]
    Installed,
    #[serde(rename = "Not Applicable")]
    NotApplicable,
    #[serde(rename = "Pending")]
    Pending,
    #[serde(rename = "Unavailable")]
    Unavailable,
}

impl NormStatus {
    pub fn label(&self) -> &'static str {
        match self {
            NormStatus::Installed => "Installed",
            NormStatus::NotApplicable => "Not Applicable",
            NormStatus::Pending => "Pending",
            NormStatus::Unavailable => "Unavailable",
        }
    }
}

impl fmt::Display for NormStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of the two independent substring tests run on one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellMatch {
    pub installed: bool,
    pub not_applicable: bool,
}

/// How a cell matching both "instalad" and "no aplica" is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum AmbiguityPolicy {
    /// Installed wins; every cell lands in exactly one bucket.
    #[default]
    InstalledPriority,
    /// Each test feeds its own bucket, so bucket sums can exceed the cell count.
    IndependentAccumulation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    InternalNumber,
    AlternateInternalNumber,
    Plate,
    Terminal,
    Subclass,
    Metadata,
    Norm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentitySource {
    Canonical(usize),
    Fuzzy { col: usize, original_name: String },
    /// No column found; values are `"{name}_{row}"` placeholders.
    Synthesized,
}

impl IdentitySource {
    pub fn column(&self) -> Option<usize> {
        match self {
            IdentitySource::Canonical(c) => Some(*c),
            IdentitySource::Fuzzy { col, .. } => Some(*col),
            IdentitySource::Synthesized => None,
        }
    }

    pub fn is_synthesized(&self) -> bool {
        matches!(self, IdentitySource::Synthesized)
    }

    /// Where the values of the identity column `name` come from, for logs.
    pub fn describe(&self, name: &str) -> String {
        match self {
            IdentitySource::Canonical(_) => format!("'{}'", name),
            IdentitySource::Fuzzy { original_name, .. } => format!("'{}'", original_name),
            IdentitySource::Synthesized => format!("synthesized '{}_<row>'", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormColumn {
    pub name: String,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Info,
    Warning,
}

/// A user-visible message produced while interpreting the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn info(message: impl Into<String>) -> Diagnostic {
        Diagnostic {
            severity: Severity::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Diagnostic {
        Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSchema {
    pub roles: Vec<ColumnRole>,
    pub internal_number_name: String,
    pub internal_number: IdentitySource,
    pub alternate_internal: Option<usize>,
    pub plate_name: String,
    pub plate: IdentitySource,
    pub terminal: Option<usize>,
    pub subclass: Option<usize>,
    pub renewal_date: Option<usize>,
    pub installed_counter: Option<usize>,
    pub norm_columns: Vec<NormColumn>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ResolvedSchema {
    pub fn norm_names(&self) -> Vec<String> {
        self.norm_columns.iter().map(|n| n.name.clone()).collect()
    }

    pub fn has_synthetic_identity(&self) -> bool {
        self.internal_number.is_synthesized() || self.plate.is_synthesized()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleMetrics {
    pub vehicle_id: VehicleId,
    pub row: usize,
    pub plate: String,
    pub terminal: String,
    pub subclass: String,
    pub renewal_date: String,
    pub installed_counter: String,
    pub total_norms: usize,
    pub installed: usize,
    pub not_applicable: usize,
    pub applicable: usize,
    pub completed: usize,
    /// Installed or not applicable, over all norms.
    pub completion_progress: f64,
    /// Installed over applicable norms only.
    pub applicable_progress: f64,
    pub missing: Vec<String>,
    pub complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormProgress {
    pub norm: String,
    pub completed: usize,
    pub progress: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingNormCount {
    pub norm: String,
    pub vehicles: usize,
    pub fleet_share: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatusBreakdown {
    pub installed: usize,
    pub not_applicable: usize,
    pub pending: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressBucket {
    pub label: String,
    pub vehicles: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ProgressStats {
    pub mean: f64,
    pub median: f64,
    pub max: f64,
    pub min: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetMetrics {
    pub vehicle_count: usize,
    pub norm_count: usize,
    pub total_cells: usize,
    pub completed_cells: usize,
    pub pending_cells: usize,
    pub efficiency: f64,
    pub complete_vehicles: usize,
    pub incomplete_vehicles: usize,
    pub complete_list: Vec<VehicleId>,
    pub incomplete_list: Vec<VehicleId>,
    pub norm_progress: Vec<NormProgress>,
    pub status_breakdown: StatusBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupProgress {
    pub group: String,
    pub vehicles: usize,
    pub installed: usize,
    pub not_applicable: usize,
    pub total_cells: usize,
    pub completion_progress: f64,
    pub applicable_progress: f64,
}

// ******** Export rows *********

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct FleetExportRow {
    #[serde(rename = "VehicleId")]
    #[tabled(rename = "VehicleId")]
    pub vehicle_id: String,
    #[serde(rename = "Plate")]
    #[tabled(rename = "Plate")]
    pub plate: String,
    #[serde(rename = "Terminal")]
    #[tabled(rename = "Terminal")]
    pub terminal: String,
    #[serde(rename = "Subclass")]
    #[tabled(rename = "Subclass")]
    pub subclass: String,
    #[serde(rename = "ProgressPercent")]
    #[tabled(rename = "ProgressPercent")]
    pub progress_percent: String,
    #[serde(rename = "Status")]
    #[tabled(rename = "Status")]
    pub status: String,
    #[serde(rename = "MissingNormCount")]
    #[tabled(rename = "MissingNormCount")]
    pub missing_norm_count: usize,
    #[serde(rename = "MissingNormSample")]
    #[tabled(rename = "MissingNormSample")]
    pub missing_norm_sample: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct NormProgressRow {
    #[serde(rename = "Norm")]
    #[tabled(rename = "Norm")]
    pub norm: String,
    #[serde(rename = "Completed")]
    #[tabled(rename = "Completed")]
    pub completed: usize,
    #[serde(rename = "Vehicles")]
    #[tabled(rename = "Vehicles")]
    pub vehicles: usize,
    #[serde(rename = "ProgressPercent")]
    #[tabled(rename = "ProgressPercent")]
    pub progress_percent: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct MissingNormRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Norm")]
    #[tabled(rename = "Norm")]
    pub norm: String,
    #[serde(rename = "Vehicles")]
    #[tabled(rename = "Vehicles")]
    pub vehicles: usize,
    #[serde(rename = "FleetShare")]
    #[tabled(rename = "FleetShare")]
    pub fleet_share: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct GroupProgressRow {
    #[serde(rename = "Group")]
    #[tabled(rename = "Group")]
    pub group: String,
    #[serde(rename = "Vehicles")]
    #[tabled(rename = "Vehicles")]
    pub vehicles: usize,
    #[serde(rename = "CompletionProgress")]
    #[tabled(rename = "CompletionProgress")]
    pub completion_progress: String,
    #[serde(rename = "ApplicableProgress")]
    #[tabled(rename = "ApplicableProgress")]
    pub applicable_progress: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub total_vehicles: usize,
    pub total_norms: usize,
    pub efficiency: f64,
    pub complete_vehicles: usize,
    pub incomplete_vehicles: usize,
    pub installed_cells: usize,
    pub not_applicable_cells: usize,
    pub pending_cells: usize,
    pub progress: ProgressStats,
    pub synthetic_identity: bool,
}
