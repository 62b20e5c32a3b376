// The metrics engine.
//
// A norm that does not apply to a vehicle counts as progress: completed
// means installed OR not applicable, and the denominators (all norms, all
// vehicles) are never reduced by not-applicable cells. Only the
// "applicable" figures exclude them.
use crate::classifier::{bucket_counts, is_completed, match_cell, status_of};
use crate::schema::{field_or_na, vehicle_id};
use crate::types::*;
use crate::util::{average, median, percent, round2};

use log::debug;
use std::collections::{BTreeMap, HashMap};

/// Everything computed for one (table, row selection) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub rows: Vec<usize>,
    pub fleet: FleetMetrics,
    pub vehicles: BTreeMap<VehicleId, VehicleMetrics>,
    pub missing_ranking: Vec<MissingNormCount>,
    pub terminal_progress: Vec<GroupProgress>,
    pub subclass_progress: Vec<GroupProgress>,
    pub distribution: Vec<ProgressBucket>,
    pub progress_stats: ProgressStats,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn analyze(
    table: &RawTable,
    schema: &ResolvedSchema,
    rows: &[usize],
    policy: AmbiguityPolicy,
) -> Analysis {
    let fleet = compute_fleet_metrics(table, schema, rows, policy);
    let vehicles = compute_vehicle_metrics(table, schema, rows);
    let missing_ranking =
        missing_norm_ranking(&vehicles, &schema.norm_columns, fleet.vehicle_count);
    let values: Vec<&VehicleMetrics> = vehicles.values().collect();
    let distribution = progress_distribution(&values);
    let progress_stats = progress_stats(&values);
    debug!(
        "analyze: {} rows, {} distinct vehicles, efficiency {}",
        rows.len(),
        vehicles.len(),
        fleet.efficiency
    );
    Analysis {
        rows: rows.to_vec(),
        terminal_progress: group_progress(table, schema, rows, schema.terminal, policy),
        subclass_progress: group_progress(table, schema, rows, schema.subclass, policy),
        fleet,
        vehicles,
        missing_ranking,
        distribution,
        progress_stats,
        diagnostics: Vec::new(),
    }
}

/// Metrics of the vehicle on `row`.
pub fn vehicle_metrics(table: &RawTable, schema: &ResolvedSchema, row: usize) -> VehicleMetrics {
    let total_norms = schema.norm_columns.len();
    let mut installed = 0usize;
    let mut not_applicable = 0usize;
    let mut completed = 0usize;
    let mut missing: Vec<String> = Vec::new();
    for n in schema.norm_columns.iter() {
        let m = match_cell(table.cell(row, n.index));
        match status_of(m) {
            NormStatus::Installed => installed += 1,
            NormStatus::NotApplicable => not_applicable += 1,
            _ => {}
        }
        if is_completed(m) {
            completed += 1;
        } else {
            missing.push(n.name.clone());
        }
    }
    let applicable = total_norms - not_applicable;
    let applicable_progress = if applicable == 0 {
        100.0
    } else {
        round2(percent(installed, applicable))
    };
    let installed_counter = match schema.installed_counter.and_then(|c| table.value(row, c)) {
        Some(v) => v.to_string(),
        None => installed.to_string(),
    };
    VehicleMetrics {
        vehicle_id: vehicle_id(table, schema, row),
        row,
        plate: field_or_na(table, schema.plate.column(), row),
        terminal: field_or_na(table, schema.terminal, row),
        subclass: field_or_na(table, schema.subclass, row),
        renewal_date: field_or_na(table, schema.renewal_date, row),
        installed_counter,
        total_norms,
        installed,
        not_applicable,
        applicable,
        completed,
        completion_progress: round2(percent(completed, total_norms)),
        applicable_progress,
        complete: missing.is_empty(),
        missing,
    }
}

/// Per-vehicle metrics keyed by vehicle id. Rows sharing an id collapse,
/// the later row wins.
pub fn compute_vehicle_metrics(
    table: &RawTable,
    schema: &ResolvedSchema,
    rows: &[usize],
) -> BTreeMap<VehicleId, VehicleMetrics> {
    rows.iter()
        .map(|&r| {
            let vm = vehicle_metrics(table, schema, r);
            (vm.vehicle_id.clone(), vm)
        })
        .collect()
}

pub fn compute_fleet_metrics(
    table: &RawTable,
    schema: &ResolvedSchema,
    rows: &[usize],
    policy: AmbiguityPolicy,
) -> FleetMetrics {
    let vehicle_count = rows.len();
    let norm_count = schema.norm_columns.len();
    let total_cells = vehicle_count * norm_count;

    let mut breakdown = StatusBreakdown::default();
    let mut completed_cells = 0usize;
    let mut per_norm: Vec<usize> = vec![0; norm_count];
    let mut complete_list: Vec<VehicleId> = Vec::new();
    let mut incomplete_list: Vec<VehicleId> = Vec::new();

    for &row in rows {
        let mut row_complete = true;
        for (k, n) in schema.norm_columns.iter().enumerate() {
            let m = match_cell(table.cell(row, n.index));
            let (i, na) = bucket_counts(m, policy);
            breakdown.installed += i;
            breakdown.not_applicable += na;
            if is_completed(m) {
                completed_cells += 1;
                per_norm[k] += 1;
            } else {
                breakdown.pending += 1;
                row_complete = false;
            }
        }
        let id = vehicle_id(table, schema, row);
        if row_complete {
            complete_list.push(id);
        } else {
            incomplete_list.push(id);
        }
    }

    let norm_progress = schema
        .norm_columns
        .iter()
        .zip(per_norm)
        .map(|(n, completed)| NormProgress {
            norm: n.name.clone(),
            completed,
            progress: round2(percent(completed, vehicle_count)),
        })
        .collect();

    FleetMetrics {
        vehicle_count,
        norm_count,
        total_cells,
        completed_cells,
        pending_cells: total_cells - completed_cells,
        efficiency: round2(percent(completed_cells, total_cells)),
        complete_vehicles: complete_list.len(),
        incomplete_vehicles: incomplete_list.len(),
        complete_list,
        incomplete_list,
        norm_progress,
        status_breakdown: breakdown,
    }
}

/// Norms ranked by how many vehicles are missing them. Ties keep the
/// column order.
pub fn missing_norm_ranking(
    vehicles: &BTreeMap<VehicleId, VehicleMetrics>,
    norm_columns: &[NormColumn],
    fleet_size: usize,
) -> Vec<MissingNormCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for vm in vehicles.values() {
        for norm in vm.missing.iter() {
            *counts.entry(norm.as_str()).or_default() += 1;
        }
    }
    let mut ranking: Vec<MissingNormCount> = norm_columns
        .iter()
        .filter_map(|n| {
            let c = *counts.get(n.name.as_str())?;
            Some(MissingNormCount {
                norm: n.name.clone(),
                vehicles: c,
                fleet_share: round2(percent(c, fleet_size)),
            })
        })
        .collect();
    // `sort_by` is stable.
    ranking.sort_by(|a, b| b.vehicles.cmp(&a.vehicles));
    ranking
}

/// Progress per distinct value of `column` (terminal, subclass).
///
/// Groups appear in first-seen order; rows with a blank value are skipped.
pub fn group_progress(
    table: &RawTable,
    schema: &ResolvedSchema,
    rows: &[usize],
    column: Option<usize>,
    policy: AmbiguityPolicy,
) -> Vec<GroupProgress> {
    #[derive(Default)]
    struct Acc {
        vehicles: usize,
        installed: usize,
        not_applicable: usize,
        completed: usize,
        total: usize,
    }

    let Some(col) = column else {
        return Vec::new();
    };
    let mut order: Vec<String> = Vec::new();
    let mut map: HashMap<String, Acc> = HashMap::new();
    for &row in rows {
        let Some(key) = table.value(row, col) else {
            continue;
        };
        if !map.contains_key(key) {
            order.push(key.to_string());
        }
        let e = map.entry(key.to_string()).or_default();
        e.vehicles += 1;
        for n in schema.norm_columns.iter() {
            let m = match_cell(table.cell(row, n.index));
            let (i, na) = bucket_counts(m, policy);
            e.installed += i;
            e.not_applicable += na;
            e.completed += is_completed(m) as usize;
            e.total += 1;
        }
    }

    order
        .into_iter()
        .filter_map(|group| {
            let acc = map.remove(&group)?;
            let applicable = acc.total.saturating_sub(acc.not_applicable);
            let applicable_progress = if applicable == 0 {
                100.0
            } else {
                round2(percent(acc.installed, applicable))
            };
            Some(GroupProgress {
                group,
                vehicles: acc.vehicles,
                installed: acc.installed,
                not_applicable: acc.not_applicable,
                total_cells: acc.total,
                completion_progress: round2(percent(acc.completed, acc.total)),
                applicable_progress,
            })
        })
        .collect()
}

const BUCKETS: &[(&str, f64)] = &[
    ("90-100%", 90.0),
    ("70-89%", 70.0),
    ("50-69%", 50.0),
    ("25-49%", 25.0),
    ("0-24%", f64::NEG_INFINITY),
];

pub fn progress_distribution(vehicles: &[&VehicleMetrics]) -> Vec<ProgressBucket> {
    let mut counts = vec![0usize; BUCKETS.len()];
    for vm in vehicles {
        if let Some(k) = BUCKETS
            .iter()
            .position(|(_, lower)| vm.completion_progress >= *lower)
        {
            counts[k] += 1;
        }
    }
    BUCKETS
        .iter()
        .zip(counts)
        .map(|((label, _), vehicles)| ProgressBucket {
            label: label.to_string(),
            vehicles,
        })
        .collect()
}

pub fn progress_stats(vehicles: &[&VehicleMetrics]) -> ProgressStats {
    if vehicles.is_empty() {
        return ProgressStats::default();
    }
    let values: Vec<f64> = vehicles.iter().map(|v| v.completion_progress).collect();
    let max = values.iter().copied().fold(f64::MIN, f64::max);
    let min = values.iter().copied().fold(f64::MAX, f64::min);
    ProgressStats {
        mean: round2(average(&values)),
        median: round2(median(values)),
        max,
        min,
    }
}
