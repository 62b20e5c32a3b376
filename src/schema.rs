// Column interpretation.
//
// Headers are resolved once per loaded table into a `ResolvedSchema`; all
// later lookups go through column indexes, never through names.
use crate::config::AnalysisConfig;
use crate::error::*;
use crate::types::{
    ColumnRole, Diagnostic, IdentitySource, NormColumn, RawTable, ResolvedSchema, Severity,
    VehicleId,
};

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use snafu::ensure;
use std::collections::HashSet;

/// Known vehicle metadata columns. Matched after trimming and lowercasing.
static METADATA_COLUMNS: Lazy<HashSet<String>> = Lazy::new(|| {
    [
        "N° Interno",
        "PPU",
        "Unidad",
        "Marca chasis",
        "Modelo chasis",
        "Subclase",
        "N° plazas",
        "Terminal",
        "Taller",
        "TERMINADOS",
        "NORMA INSTALADA",
        "FECHA DE RENOVACION",
    ]
    .iter()
    .map(|s| normalize(s))
    .collect()
});

pub(crate) const INTERNAL_PATTERNS: &[&str] = &["intern", "numer"];
pub(crate) const PLATE_PATTERNS: &[&str] = &["ppu", "paten", "placa"];
const TERMINAL_PATTERNS: &[&str] = &["term"];
const SUBCLASS_PATTERNS: &[&str] = &["sub", "clas", "model"];
const INSTALLED_COUNTER: &str = "norma instalada";

pub fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

struct Resolver<'a> {
    names: Vec<String>,
    headers: &'a [String],
    extra_metadata: HashSet<String>,
    roles: Vec<ColumnRole>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Resolver<'a> {
    fn is_metadata(&self, idx: usize) -> bool {
        let n = &self.names[idx];
        METADATA_COLUMNS.contains(n) || self.extra_metadata.contains(n)
    }

    fn unclaimed(&self, idx: usize) -> bool {
        self.roles[idx] == ColumnRole::Norm
    }

    fn canonical(&self, name: &str) -> Option<usize> {
        let target = normalize(name);
        (0..self.names.len()).find(|&i| self.unclaimed(i) && self.names[i] == target)
    }

    fn fuzzy(&self, patterns: &[&str]) -> Option<usize> {
        (0..self.names.len()).find(|&i| {
            self.unclaimed(i)
                && !self.is_metadata(i)
                && patterns.iter().any(|p| self.names[i].contains(p))
        })
    }

    /// Finds an identity column, falling back to a placeholder.
    fn identity(&mut self, canonical: &str, patterns: &[&str], role: ColumnRole) -> IdentitySource {
        if let Some(i) = self.canonical(canonical) {
            self.roles[i] = role;
            return IdentitySource::Canonical(i);
        }
        if let Some(i) = self.fuzzy(patterns) {
            self.roles[i] = role;
            let original_name = self.headers[i].clone();
            self.diagnostics.push(Diagnostic::info(format!(
                "Column '{}' used as '{}'",
                original_name, canonical
            )));
            return IdentitySource::Fuzzy {
                col: i,
                original_name,
            };
        }
        self.diagnostics.push(Diagnostic::warning(format!(
            "Column '{}' not found. Synthetic identifiers '{}_<row>' were generated; they do not identify real vehicles.",
            canonical, canonical
        )));
        IdentitySource::Synthesized
    }

    /// Finds a grouping column. Only a canonical match takes the role; a
    /// fuzzy match is read for grouping but stays a norm column.
    fn grouping(&mut self, canonical: &str, patterns: &[&str], role: ColumnRole) -> Option<usize> {
        if let Some(i) = self.canonical(canonical) {
            self.roles[i] = role;
            return Some(i);
        }
        let i = self.fuzzy(patterns)?;
        self.diagnostics.push(Diagnostic::info(format!(
            "Column '{}' used as '{}'",
            self.headers[i], canonical
        )));
        Some(i)
    }
}

/// Resolve the role of every column of `table`.
///
/// Missing identity columns are replaced by synthesized placeholders and
/// reported as diagnostics. An empty norm set is an error.
pub fn resolve(table: &RawTable, config: &AnalysisConfig) -> NormsResult<ResolvedSchema> {
    let headers = table.columns();
    let mut r = Resolver {
        names: headers.iter().map(|h| normalize(h)).collect(),
        headers,
        extra_metadata: config
            .extra_metadata_columns
            .iter()
            .map(|c| normalize(c))
            .collect(),
        roles: vec![ColumnRole::Norm; headers.len()],
        diagnostics: Vec::new(),
    };

    let internal_number = r.identity(
        &config.internal_number_column,
        INTERNAL_PATTERNS,
        ColumnRole::InternalNumber,
    );
    let plate = r.identity(&config.plate_column, PLATE_PATTERNS, ColumnRole::Plate);

    let alternate_internal =
        (0..r.names.len()).find(|&i| r.unclaimed(i) && r.names[i].contains("intern"));
    if let Some(i) = alternate_internal {
        r.roles[i] = ColumnRole::AlternateInternalNumber;
    }

    let terminal = r.grouping(&config.terminal_column, TERMINAL_PATTERNS, ColumnRole::Terminal);
    let subclass = r.grouping(&config.subclass_column, SUBCLASS_PATTERNS, ColumnRole::Subclass);

    for i in 0..r.names.len() {
        if !r.unclaimed(i) {
            continue;
        }
        let n = &r.names[i];
        if r.is_metadata(i) || n.contains("fecha") || n == INSTALLED_COUNTER {
            r.roles[i] = ColumnRole::Metadata;
        }
    }

    let renewal_date = (0..r.names.len()).find(|&i| {
        r.roles[i] == ColumnRole::Metadata && r.names[i].contains("fecha")
    });
    let installed_counter = (0..r.names.len()).find(|&i| r.names[i] == INSTALLED_COUNTER);

    let norm_columns: Vec<NormColumn> = r
        .roles
        .iter()
        .enumerate()
        .filter(|(_, role)| **role == ColumnRole::Norm)
        .map(|(index, _)| NormColumn {
            name: headers[index].clone(),
            index,
        })
        .collect();

    ensure!(
        !norm_columns.is_empty(),
        EmptyNormSetSnafu {
            columns: headers.to_vec()
        }
    );

    for d in r.diagnostics.iter() {
        match d.severity {
            Severity::Info => info!("resolve: {}", d.message),
            Severity::Warning => warn!("resolve: {}", d.message),
        }
    }
    info!(
        "resolve: {} columns, {} norm columns",
        headers.len(),
        norm_columns.len()
    );
    debug!("resolve: roles {:?}", r.roles);

    Ok(ResolvedSchema {
        roles: r.roles,
        internal_number_name: config.internal_number_column.clone(),
        internal_number,
        alternate_internal,
        plate_name: config.plate_column.clone(),
        plate,
        terminal,
        subclass,
        renewal_date,
        installed_counter,
        norm_columns,
        diagnostics: r.diagnostics,
    })
}

/// Value of an identity column for `row`; placeholders for synthesized columns.
pub fn identity_value(
    table: &RawTable,
    source: &IdentitySource,
    name: &str,
    row: usize,
) -> Option<String> {
    match source.column() {
        Some(col) => table.value(row, col).map(|s| s.to_string()),
        None => Some(format!("{}_{}", name, row)),
    }
}

/// The stable identifier of the vehicle on `row`.
///
/// Internal number, then an alternate internal-number column, then
/// `PPU_<plate>`, then `Bus_<row>`.
pub fn vehicle_id(table: &RawTable, schema: &ResolvedSchema, row: usize) -> VehicleId {
    if let Some(v) = identity_value(
        table,
        &schema.internal_number,
        &schema.internal_number_name,
        row,
    ) {
        return v;
    }
    if let Some(v) = schema.alternate_internal.and_then(|c| table.value(row, c)) {
        return v.to_string();
    }
    if let Some(v) = schema.plate.column().and_then(|c| table.value(row, c)) {
        return format!("PPU_{}", v);
    }
    format!("Bus_{}", row)
}

/// Trimmed value of an optional column, or "N/A".
pub fn field_or_na(table: &RawTable, col: Option<usize>, row: usize) -> String {
    col.and_then(|c| table.value(row, c))
        .unwrap_or("N/A")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> RawTable {
        RawTable::from_literal(
            &["Internal Number", "PPU", "Terminal", "NormA", "NormB"],
            &[
                &["1", "AA11", "T1", "1", ""],
                &["2", "BB22", "T1", "no aplica", "1"],
            ],
        )
    }

    #[test]
    fn scenario_columns() {
        let s = resolve(&scenario(), &AnalysisConfig::default()).unwrap();
        assert_eq!(s.norm_names(), vec!["NormA", "NormB"]);
        assert!(matches!(s.internal_number, IdentitySource::Fuzzy { col: 0, .. }));
        assert_eq!(s.plate, IdentitySource::Canonical(1));
        assert_eq!(s.terminal, Some(2));
        assert!(!s.has_synthetic_identity());
        assert_eq!(vehicle_id(&scenario(), &s, 0), "1");
        assert_eq!(vehicle_id(&scenario(), &s, 1), "2");
    }

    #[test]
    fn metadata_and_dates_are_not_norms() {
        let t = RawTable::from_literal(
            &[
                "N° Interno",
                "PPU",
                "Unidad",
                "Marca chasis",
                "Subclase",
                " taller ",
                "TERMINADOS",
                "NORMA INSTALADA",
                "FECHA DE RENOVACION",
                "Fecha inspección",
                "Logo lateral",
                "CALL CENTER",
            ],
            &[],
        );
        let s = resolve(&t, &AnalysisConfig::default()).unwrap();
        assert_eq!(s.norm_names(), vec!["Logo lateral", "CALL CENTER"]);
        assert_eq!(s.renewal_date, Some(8));
        assert_eq!(s.installed_counter, Some(7));
        assert_eq!(s.subclass, Some(4));
    }

    #[test]
    fn extra_metadata_columns_are_excluded() {
        let t = RawTable::from_literal(&["N° Interno", "PPU", "Observaciones", "Logo"], &[]);
        let config = AnalysisConfig {
            extra_metadata_columns: vec!["observaciones".to_string()],
            ..AnalysisConfig::default()
        };
        let s = resolve(&t, &config).unwrap();
        assert_eq!(s.norm_names(), vec!["Logo"]);
    }

    #[test]
    fn empty_norm_set_is_an_error() {
        let t = RawTable::from_literal(&["N° Interno", "PPU", "Terminal"], &[&["1", "A", "T"]]);
        let res = resolve(&t, &AnalysisConfig::default());
        assert!(matches!(res, Err(NormsError::EmptyNormSet { .. })));
    }

    #[test]
    fn missing_identity_columns_are_synthesized() {
        let t = RawTable::from_literal(
            &["Logo", "Franja"],
            &[&["1", ""], &["", ""], &["1", "1"]],
        );
        let s = resolve(&t, &AnalysisConfig::default()).unwrap();
        assert!(s.internal_number.is_synthesized());
        assert!(s.plate.is_synthesized());
        assert!(s.has_synthetic_identity());
        assert_eq!(
            s.diagnostics
                .iter()
                .filter(|d| d.severity == Severity::Warning)
                .count(),
            2
        );
        let ids: HashSet<String> = (0..3).map(|r| vehicle_id(&t, &s, r)).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains("N° Interno_0"));
        assert_eq!(s.plate.describe("PPU"), "synthesized 'PPU_<row>'");
        assert_eq!(s.norm_names(), vec!["Logo", "Franja"]);
    }

    #[test]
    fn vehicle_id_fallback_order() {
        let t = RawTable::from_literal(
            &["N° Interno", "Numero Interno", "PPU", "Logo"],
            &[
                &["101", "X1", "AA11", "1"],
                &["", "X2", "BB22", "1"],
                &["", "", "CC33", "1"],
                &["", "", "", "1"],
            ],
        );
        let s = resolve(&t, &AnalysisConfig::default()).unwrap();
        assert_eq!(s.alternate_internal, Some(1));
        assert_eq!(s.norm_names(), vec!["Logo"]);
        assert_eq!(vehicle_id(&t, &s, 0), "101");
        assert_eq!(vehicle_id(&t, &s, 1), "X2");
        assert_eq!(vehicle_id(&t, &s, 2), "PPU_CC33");
        assert_eq!(vehicle_id(&t, &s, 3), "Bus_3");
    }

    #[test]
    fn fuzzy_plate_column() {
        let t = RawTable::from_literal(&["N° Interno", "Patente", "Logo"], &[&["", "ZZ99", ""]]);
        let s = resolve(&t, &AnalysisConfig::default()).unwrap();
        assert!(matches!(s.plate, IdentitySource::Fuzzy { col: 1, .. }));
        assert_eq!(vehicle_id(&t, &s, 0), "PPU_ZZ99");
        assert_eq!(s.plate.describe(&s.plate_name), "'Patente'");
        assert_eq!(s.internal_number.describe(&s.internal_number_name), "'N° Interno'");
        assert_eq!(
            s.diagnostics[0],
            Diagnostic::info("Column 'Patente' used as 'PPU'")
        );
    }
}
