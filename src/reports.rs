use crate::metrics::Analysis;
use crate::types::{
    FleetExportRow, GroupProgress, GroupProgressRow, MissingNormCount, MissingNormRow,
    NormProgressRow, ResolvedSchema, SummaryStats, VehicleMetrics,
};
use crate::util::format_number;
use std::cmp::Ordering;

/// First `n` missing norms joined by ", ", with "..." when truncated.
pub fn missing_sample(missing: &[String], n: usize) -> String {
    let mut s = missing
        .iter()
        .take(n)
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    if missing.len() > n {
        s.push_str("...");
    }
    s
}

/// One export row per vehicle, highest progress first.
pub fn fleet_export_rows(vehicles: &[&VehicleMetrics], sample_size: usize) -> Vec<FleetExportRow> {
    let mut sorted: Vec<&VehicleMetrics> = vehicles.to_vec();
    sorted.sort_by(|a, b| {
        b.completion_progress
            .partial_cmp(&a.completion_progress)
            .unwrap_or(Ordering::Equal)
    });
    vehicle_rows(&sorted, sample_size)
}

/// Export rows in the given order.
pub fn vehicle_rows(vehicles: &[&VehicleMetrics], sample_size: usize) -> Vec<FleetExportRow> {
    vehicles
        .iter()
        .map(|vm| FleetExportRow {
            vehicle_id: vm.vehicle_id.clone(),
            plate: vm.plate.clone(),
            terminal: vm.terminal.clone(),
            subclass: vm.subclass.clone(),
            progress_percent: format_number(vm.completion_progress, 1),
            status: if vm.complete {
                "Complete".to_string()
            } else {
                "Incomplete".to_string()
            },
            missing_norm_count: vm.missing.len(),
            missing_norm_sample: missing_sample(&vm.missing, sample_size),
        })
        .collect()
}

/// Vehicles still missing at least `min_missing` norms, most missing first.
pub fn pending_rows(
    vehicles: &[&VehicleMetrics],
    min_missing: usize,
    sample_size: usize,
) -> Vec<FleetExportRow> {
    let pending: Vec<&VehicleMetrics> = vehicles
        .iter()
        .copied()
        .filter(|vm| !vm.complete && vm.missing.len() >= min_missing.max(1))
        .collect();
    let mut rows = fleet_export_rows(&pending, sample_size);
    rows.sort_by(|a, b| b.missing_norm_count.cmp(&a.missing_norm_count));
    rows
}

/// Per-norm progress, least advanced first.
pub fn norm_progress_rows(analysis: &Analysis) -> Vec<NormProgressRow> {
    let mut progress = analysis.fleet.norm_progress.clone();
    progress.sort_by(|a, b| a.progress.partial_cmp(&b.progress).unwrap_or(Ordering::Equal));
    progress
        .into_iter()
        .map(|n| NormProgressRow {
            norm: n.norm,
            completed: n.completed,
            vehicles: analysis.fleet.vehicle_count,
            progress_percent: format_number(n.progress, 2),
        })
        .collect()
}

pub fn missing_norm_rows(ranking: &[MissingNormCount], top: usize) -> Vec<MissingNormRow> {
    ranking
        .iter()
        .take(top)
        .enumerate()
        .map(|(idx, m)| MissingNormRow {
            rank: idx + 1,
            norm: m.norm.clone(),
            vehicles: m.vehicles,
            fleet_share: format_number(m.fleet_share, 2),
        })
        .collect()
}

pub fn group_rows(groups: &[GroupProgress]) -> Vec<GroupProgressRow> {
    groups
        .iter()
        .map(|g| GroupProgressRow {
            group: g.group.clone(),
            vehicles: g.vehicles,
            completion_progress: format_number(g.completion_progress, 2),
            applicable_progress: format_number(g.applicable_progress, 2),
        })
        .collect()
}

pub fn generate_summary(analysis: &Analysis, schema: &ResolvedSchema) -> SummaryStats {
    let f = &analysis.fleet;
    SummaryStats {
        total_vehicles: f.vehicle_count,
        total_norms: f.norm_count,
        efficiency: f.efficiency,
        complete_vehicles: f.complete_vehicles,
        incomplete_vehicles: f.incomplete_vehicles,
        installed_cells: f.status_breakdown.installed,
        not_applicable_cells: f.status_breakdown.not_applicable,
        pending_cells: f.status_breakdown.pending,
        progress: analysis.progress_stats,
        synthetic_identity: schema.has_synthetic_identity(),
    }
}
