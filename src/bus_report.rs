// Detailed report for a single vehicle.
use crate::classifier::classify;
use crate::error::*;
use crate::schema::{identity_value, normalize};
use crate::types::*;
use crate::util::{percent, round2};

use chrono::{DateTime, Local};
use log::{debug, warn};
use serde::Serialize;
use std::fmt::Write;

/// Report fields and the column names accepted for each, in lookup order.
const INFO_FIELDS: &[(&str, &[&str])] = &[
    ("PPU", &["PPU", "Patente", "Placa"]),
    ("Unidad", &["Unidad", "Unid"]),
    ("Marca chasis", &["Marca chasis", "Marca", "Marca Bus"]),
    ("Modelo chasis", &["Modelo chasis", "Modelo", "Tipo"]),
    ("Subclase", &["Subclase", "Clase", "Tipo Bus"]),
    ("N° plazas", &["N° plazas", "Plazas", "Capacidad"]),
    ("Terminal", &["Terminal", "Base", "Ubicacion"]),
    ("Taller", &["Taller", "Servicio"]),
    ("FECHA DE RENOVACION", &["FECHA DE RENOVACION", "Fecha"]),
    (
        "NORMA INSTALADA",
        &["NORMA INSTALADA", "Normas Instaladas", "Total Instaladas"],
    ),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusReport {
    pub vehicle_id: VehicleId,
    pub info: Vec<(String, String)>,
    pub norm_statuses: Vec<(String, NormStatus)>,
    /// Installed over norms that are neither not applicable nor unavailable.
    pub applicable_progress: f64,
    /// Installed or not applicable, over all norms.
    pub completion_progress: f64,
    pub error: Option<String>,
}

impl BusReport {
    pub fn norms_with(&self, status: NormStatus) -> Vec<String> {
        self.norm_statuses
            .iter()
            .filter(|(_, s)| *s == status)
            .map(|(n, _)| n.clone())
            .collect()
    }
}

/// Row holding `vehicle_id`, using the same fallbacks that produced the id.
pub fn find_vehicle_row(
    table: &RawTable,
    schema: &ResolvedSchema,
    vehicle_id: &str,
) -> NormsResult<usize> {
    let rows = 0..table.row_count();
    let by_internal = rows.clone().find(|&r| {
        identity_value(table, &schema.internal_number, &schema.internal_number_name, r)
            .as_deref()
            == Some(vehicle_id)
    });
    let by_alternate = || {
        let c = schema.alternate_internal?;
        rows.clone().find(|&r| table.value(r, c) == Some(vehicle_id))
    };
    let by_plate = || {
        let plate = vehicle_id.strip_prefix("PPU_")?;
        let c = schema.plate.column()?;
        rows.clone().find(|&r| table.value(r, c) == Some(plate))
    };
    let by_index = || {
        let idx: usize = vehicle_id.strip_prefix("Bus_")?.parse().ok()?;
        (idx < table.row_count()).then_some(idx)
    };
    match by_internal
        .or_else(by_alternate)
        .or_else(by_plate)
        .or_else(by_index)
    {
        Some(row) => Ok(row),
        None => VehicleNotFoundSnafu { vehicle_id }.fail(),
    }
}

fn info_value(table: &RawTable, row: usize, aliases: &[&str]) -> String {
    aliases
        .iter()
        .find_map(|alias| {
            let target = normalize(alias);
            let col = table.columns().iter().position(|c| normalize(c) == target)?;
            table.value(row, col)
        })
        .unwrap_or("N/A")
        .to_string()
}

fn progress_of(statuses: &[(String, NormStatus)]) -> (f64, f64) {
    let count = |s: NormStatus| statuses.iter().filter(|(_, x)| *x == s).count();
    let installed = count(NormStatus::Installed);
    let not_applicable = count(NormStatus::NotApplicable);
    let unavailable = count(NormStatus::Unavailable);
    let applicable = statuses.len() - not_applicable - unavailable;
    let applicable_progress = if applicable == 0 {
        100.0
    } else {
        round2(percent(installed, applicable))
    };
    let completion_progress = round2(percent(installed + not_applicable, statuses.len()));
    (applicable_progress, completion_progress)
}

/// Builds the report for `vehicle_id` over the given norm names.
///
/// Norms absent from the table are reported as unavailable. An unknown
/// vehicle yields a placeholder report carrying the error message.
pub fn build_report_for(
    table: &RawTable,
    schema: &ResolvedSchema,
    vehicle_id: &str,
    norms: &[String],
) -> BusReport {
    let row = match find_vehicle_row(table, schema, vehicle_id) {
        Ok(row) => row,
        Err(e) => {
            warn!("build_report: {}", e);
            return BusReport {
                vehicle_id: vehicle_id.to_string(),
                info: INFO_FIELDS
                    .iter()
                    .map(|(field, _)| (field.to_string(), "N/A".to_string()))
                    .collect(),
                norm_statuses: norms
                    .iter()
                    .map(|n| (n.clone(), NormStatus::Unavailable))
                    .collect(),
                applicable_progress: 0.0,
                completion_progress: 0.0,
                error: Some(e.to_string()),
            };
        }
    };

    let info = INFO_FIELDS
        .iter()
        .map(|(field, aliases)| (field.to_string(), info_value(table, row, aliases)))
        .collect();
    let norm_statuses: Vec<(String, NormStatus)> = norms
        .iter()
        .map(|n| {
            let status = match table.columns().iter().position(|c| c == n) {
                Some(col) => classify(table.cell(row, col)),
                None => NormStatus::Unavailable,
            };
            (n.clone(), status)
        })
        .collect();
    let (applicable_progress, completion_progress) = progress_of(&norm_statuses);
    debug!(
        "build_report: {} on row {}, {}% complete",
        vehicle_id, row, completion_progress
    );
    BusReport {
        vehicle_id: vehicle_id.to_string(),
        info,
        norm_statuses,
        applicable_progress,
        completion_progress,
        error: None,
    }
}

/// Report over the schema's norm columns.
pub fn build_report(table: &RawTable, schema: &ResolvedSchema, vehicle_id: &str) -> BusReport {
    build_report_for(table, schema, vehicle_id, &schema.norm_names())
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusList {
    pub count: usize,
    pub norms: Vec<String>,
}

/// A report ready for export.
#[derive(Debug, Clone, Serialize)]
pub struct ReportDocument {
    pub vehicle_id: VehicleId,
    pub generated_at: DateTime<Local>,
    pub info: Vec<(String, String)>,
    pub applicable_progress: f64,
    pub completion_progress: f64,
    pub pending: StatusList,
    pub installed: StatusList,
    pub not_applicable: StatusList,
    pub statuses: Vec<(String, NormStatus)>,
    pub error: Option<String>,
}

impl ReportDocument {
    pub fn new(report: BusReport, generated_at: DateTime<Local>) -> ReportDocument {
        let list = |s: NormStatus| {
            let norms = report.norms_with(s);
            StatusList {
                count: norms.len(),
                norms,
            }
        };
        let pending = list(NormStatus::Pending);
        let installed = list(NormStatus::Installed);
        let not_applicable = list(NormStatus::NotApplicable);
        ReportDocument {
            vehicle_id: report.vehicle_id,
            generated_at,
            info: report.info,
            applicable_progress: report.applicable_progress,
            completion_progress: report.completion_progress,
            pending,
            installed,
            not_applicable,
            statuses: report.norm_statuses,
            error: report.error,
        }
    }

    /// Plain-text rendering for the terminal and `.txt` exports.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = writeln!(out, "Graphic norm report: bus {}", self.vehicle_id);
        let _ = writeln!(
            out,
            "Generated: {}",
            self.generated_at.format("%d/%m/%Y %H:%M")
        );
        if let Some(e) = &self.error {
            let _ = writeln!(out, "\n{}", e);
            return out;
        }
        let _ = writeln!(out, "\nBus information");
        for (field, value) in self.info.iter() {
            let _ = writeln!(out, "  {:<20} {}", field, value);
        }
        let _ = writeln!(
            out,
            "\nApplicable-norm progress: {:.1}%",
            self.applicable_progress
        );
        let _ = writeln!(out, "Completion progress:      {:.1}%", self.completion_progress);
        for (title, list) in [
            ("Pending norms", &self.pending),
            ("Installed norms", &self.installed),
            ("Not applicable norms", &self.not_applicable),
        ] {
            let _ = writeln!(out, "\n{} ({})", title, list.count);
            for n in list.norms.iter() {
                let _ = writeln!(out, "  - {}", n);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::schema::{resolve, vehicle_id};

    fn table() -> RawTable {
        RawTable::from_literal(
            &["N° Interno", "numero interno", "Patente", "Marca chasis", "A", "B", "C"],
            &[
                &["10", "", "AA11", "Volvo", "1", "no aplica", ""],
                &["", "X7", "BB22", "", "1", "1", "1"],
                &["", "", "CC33", "", "", "", ""],
                &["", "", "", "", "no aplica", "no aplica", "no aplica"],
            ],
        )
    }

    #[test]
    fn every_resolved_id_finds_its_row() {
        let t = table();
        let s = resolve(&t, &AnalysisConfig::default()).unwrap();
        for row in t.all_rows() {
            let id = vehicle_id(&t, &s, row);
            assert_eq!(find_vehicle_row(&t, &s, &id).unwrap(), row, "{}", id);
        }
        assert_eq!(vehicle_id(&t, &s, 3), "Bus_3");
    }

    #[test]
    fn report_contents() {
        let t = table();
        let s = resolve(&t, &AnalysisConfig::default()).unwrap();
        let r = build_report(&t, &s, "10");
        assert!(r.error.is_none());
        assert_eq!(r.info[0], ("PPU".to_string(), "AA11".to_string()));
        assert_eq!(r.info[2], ("Marca chasis".to_string(), "Volvo".to_string()));
        assert_eq!(r.info[1].1, "N/A");
        assert_eq!(r.norms_with(NormStatus::Pending).len(), 1);
        assert_eq!(r.completion_progress, 66.67);
        assert_eq!(r.applicable_progress, 50.0);
    }

    #[test]
    fn all_not_applicable_is_vacuously_complete() {
        let t = table();
        let s = resolve(&t, &AnalysisConfig::default()).unwrap();
        let r = build_report(&t, &s, "Bus_3");
        assert_eq!(r.applicable_progress, 100.0);
        assert_eq!(r.completion_progress, 100.0);
    }

    #[test]
    fn absent_norm_is_unavailable() {
        let t = table();
        let s = resolve(&t, &AnalysisConfig::default()).unwrap();
        let norms = vec!["A".to_string(), "Z".to_string()];
        let r = build_report_for(&t, &s, "X7", &norms);
        assert_eq!(r.norm_statuses[1], ("Z".to_string(), NormStatus::Unavailable));
        // Z is excluded from the applicable denominator only.
        assert_eq!(r.applicable_progress, 100.0);
        assert_eq!(r.completion_progress, 50.0);
    }

    #[test]
    fn unknown_vehicle_gives_placeholder() {
        let t = table();
        let s = resolve(&t, &AnalysisConfig::default()).unwrap();
        let r = build_report(&t, &s, "999");
        assert_eq!(
            r.error.as_deref(),
            Some("No information found for bus 999")
        );
        assert_eq!(r.completion_progress, 0.0);
        assert_eq!(r.applicable_progress, 0.0);
        assert!(r
            .norm_statuses
            .iter()
            .all(|(_, st)| *st == NormStatus::Unavailable));
        assert!(matches!(
            find_vehicle_row(&t, &s, "Bus_99"),
            Err(NormsError::VehicleNotFound { .. })
        ));
    }

    #[test]
    fn document_partitions_statuses() {
        let t = table();
        let s = resolve(&t, &AnalysisConfig::default()).unwrap();
        let doc = ReportDocument::new(build_report(&t, &s, "10"), Local::now());
        assert_eq!(doc.pending.norms, vec!["C"]);
        assert_eq!(doc.installed.count, 1);
        assert_eq!(doc.not_applicable.norms, vec!["B"]);
        let text = doc.render_text();
        assert!(text.contains("bus 10"));
        assert!(text.contains("Pending norms (1)"));
        assert!(text.contains("  - C"));
    }
}
