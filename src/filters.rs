use crate::types::*;

use log::{debug, warn};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::str::FromStr;

/// Selection over table rows. An empty set puts no constraint on its column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RowFilter {
    pub terminals: BTreeSet<String>,
    pub subclasses: BTreeSet<String>,
}

impl RowFilter {
    pub fn is_empty(&self) -> bool {
        self.terminals.is_empty() && self.subclasses.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Complete,
    Incomplete,
    /// Below the critical completion threshold.
    Critical,
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "complete" => Ok(StatusFilter::Complete),
            "incomplete" => Ok(StatusFilter::Incomplete),
            "critical" => Ok(StatusFilter::Critical),
            other => Err(format!(
                "unknown status '{}', expected all, complete, incomplete or critical",
                other
            )),
        }
    }
}

/// Filters applied to computed vehicle metrics for listings and exports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleFilter {
    pub min_progress: f64,
    pub max_progress: f64,
    pub min_missing: usize,
    pub status: StatusFilter,
    pub critical_threshold: f64,
}

impl Default for VehicleFilter {
    fn default() -> Self {
        VehicleFilter {
            min_progress: 0.0,
            max_progress: 100.0,
            min_missing: 0,
            status: StatusFilter::All,
            critical_threshold: 50.0,
        }
    }
}

impl VehicleFilter {
    pub fn matches(&self, vm: &VehicleMetrics) -> bool {
        let p = vm.completion_progress;
        if p < self.min_progress || p > self.max_progress {
            return false;
        }
        if vm.missing.len() < self.min_missing {
            return false;
        }
        match self.status {
            StatusFilter::All => true,
            StatusFilter::Complete => vm.complete,
            StatusFilter::Incomplete => !vm.complete,
            StatusFilter::Critical => p < self.critical_threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    VehicleId,
    ProgressDesc,
    ProgressAsc,
    MissingDesc,
    MissingAsc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "id" | "vehicle" => Ok(SortOrder::VehicleId),
            "progress-desc" => Ok(SortOrder::ProgressDesc),
            "progress-asc" => Ok(SortOrder::ProgressAsc),
            "missing-desc" => Ok(SortOrder::MissingDesc),
            "missing-asc" => Ok(SortOrder::MissingAsc),
            other => Err(format!("unknown sort order '{}'", other)),
        }
    }
}

/// Row indices matching `filter`.
///
/// When the filter excludes every row the full table is returned instead,
/// together with a warning.
pub fn apply_row_filter(
    table: &RawTable,
    schema: &ResolvedSchema,
    filter: &RowFilter,
) -> (Vec<usize>, Option<Diagnostic>) {
    let all = table.all_rows();
    if filter.is_empty() {
        return (all, None);
    }
    let keep = |set: &BTreeSet<String>, col: Option<usize>, row: usize| -> bool {
        match col {
            Some(c) if !set.is_empty() => table
                .value(row, c)
                .map(|v| set.contains(v))
                .unwrap_or(false),
            _ => true,
        }
    };
    let rows: Vec<usize> = all
        .iter()
        .copied()
        .filter(|&r| {
            keep(&filter.terminals, schema.terminal, r)
                && keep(&filter.subclasses, schema.subclass, r)
        })
        .collect();
    debug!("apply_row_filter: {} of {} rows", rows.len(), all.len());
    if rows.is_empty() {
        let d = Diagnostic::warning("No rows match the selected filters; showing all data");
        warn!("{}", d.message);
        return (all, Some(d));
    }
    (rows, None)
}

/// Distinct non-blank values of `column` in first-appearance order.
pub fn distinct_values(table: &RawTable, column: Option<usize>) -> Vec<String> {
    let Some(col) = column else {
        return Vec::new();
    };
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::new();
    for row in 0..table.row_count() {
        if let Some(v) = table.value(row, col) {
            if seen.insert(v) {
                out.push(v.to_string());
            }
        }
    }
    out
}

pub fn filter_vehicles<'a>(
    vehicles: &'a BTreeMap<VehicleId, VehicleMetrics>,
    filter: &VehicleFilter,
) -> Vec<&'a VehicleMetrics> {
    vehicles.values().filter(|vm| filter.matches(vm)).collect()
}

/// Stable sort; ties keep their current order.
pub fn sort_vehicles(vehicles: &mut [&VehicleMetrics], order: SortOrder) {
    let by_progress = |a: &&VehicleMetrics, b: &&VehicleMetrics| {
        a.completion_progress
            .partial_cmp(&b.completion_progress)
            .unwrap_or(Ordering::Equal)
    };
    match order {
        SortOrder::VehicleId => vehicles.sort_by(|a, b| a.vehicle_id.cmp(&b.vehicle_id)),
        SortOrder::ProgressDesc => vehicles.sort_by(|a, b| by_progress(b, a)),
        SortOrder::ProgressAsc => vehicles.sort_by(by_progress),
        SortOrder::MissingDesc => vehicles.sort_by(|a, b| b.missing.len().cmp(&a.missing.len())),
        SortOrder::MissingAsc => vehicles.sort_by_key(|v| v.missing.len()),
    }
}
