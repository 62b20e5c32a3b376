// One loaded table plus the analyses computed over it.
//
// Analyses are cached per row filter and shared through `Rc`. Loading a new
// table bumps the generation and drops every cached analysis.
use crate::config::AnalysisConfig;
use crate::error::*;
use crate::filters::{apply_row_filter, RowFilter};
use crate::metrics::{analyze, Analysis};
use crate::schema::resolve;
use crate::types::{RawTable, ResolvedSchema};

use log::{debug, info};
use snafu::OptionExt;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug)]
pub struct LoadedTable {
    pub table: RawTable,
    pub schema: ResolvedSchema,
    pub generation: u64,
}

/// The configuration is fixed for the life of a session, so cached analyses
/// never go stale on a policy change.
#[derive(Debug, Default)]
pub struct Session {
    config: AnalysisConfig,
    loaded: Option<LoadedTable>,
    generation: u64,
    cache: HashMap<RowFilter, Rc<Analysis>>,
}

impl Session {
    pub fn new(config: AnalysisConfig) -> Session {
        Session {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Resolves the schema of `table` and makes it the current table.
    ///
    /// On error the previously loaded table, if any, stays current.
    pub fn load(&mut self, table: RawTable) -> NormsResult<&LoadedTable> {
        let schema = resolve(&table, &self.config)?;
        self.generation += 1;
        self.cache.clear();
        info!(
            "session: loaded generation {} ({} rows, {} norms, vehicles keyed by {})",
            self.generation,
            table.row_count(),
            schema.norm_columns.len(),
            schema.internal_number.describe(&schema.internal_number_name)
        );
        Ok(self.loaded.insert(LoadedTable {
            table,
            schema,
            generation: self.generation,
        }))
    }

    pub fn loaded(&self) -> NormsResult<&LoadedTable> {
        self.loaded.as_ref().context(NoTableLoadedSnafu)
    }

    /// The analysis of the current table under `filter`, computed on first use.
    pub fn analyze(&mut self, filter: &RowFilter) -> NormsResult<Rc<Analysis>> {
        let loaded = self.loaded.as_ref().context(NoTableLoadedSnafu)?;
        if let Some(hit) = self.cache.get(filter) {
            debug!("session: cache hit for {:?}", filter);
            return Ok(Rc::clone(hit));
        }
        let (rows, fallback) = apply_row_filter(&loaded.table, &loaded.schema, filter);
        let mut analysis = analyze(
            &loaded.table,
            &loaded.schema,
            &rows,
            self.config.ambiguity_policy,
        );
        analysis.diagnostics = loaded.schema.diagnostics.clone();
        analysis.diagnostics.extend(fallback);
        let analysis = Rc::new(analysis);
        self.cache.insert(filter.clone(), Rc::clone(&analysis));
        Ok(analysis)
    }

    pub fn cached_analyses(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AmbiguityPolicy;
    use std::collections::BTreeSet;

    fn table(norm_value: &str) -> RawTable {
        RawTable::from_literal(
            &["N° Interno", "Terminal", "A"],
            &[&["1", "Norte", norm_value], &["2", "Sur", ""]],
        )
    }

    #[test]
    fn analyze_without_table_fails() {
        let mut s = Session::default();
        assert!(matches!(
            s.analyze(&RowFilter::default()),
            Err(NormsError::NoTableLoaded {})
        ));
        assert!(s.loaded().is_err());
    }

    #[test]
    fn equal_filters_share_the_cached_analysis() {
        let mut s = Session::default();
        s.load(table("1")).unwrap();
        let a = s.analyze(&RowFilter::default()).unwrap();
        let b = s.analyze(&RowFilter::default()).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(a.fleet.efficiency, 50.0);

        let norte = RowFilter {
            terminals: ["Norte".to_string()].into_iter().collect::<BTreeSet<_>>(),
            ..Default::default()
        };
        let c = s.analyze(&norte).unwrap();
        assert!(!Rc::ptr_eq(&a, &c));
        assert_eq!(c.fleet.efficiency, 100.0);
        assert_eq!(s.cached_analyses(), 2);
    }

    #[test]
    fn loading_invalidates_the_cache() {
        let mut s = Session::default();
        s.load(table("1")).unwrap();
        let a = s.analyze(&RowFilter::default()).unwrap();
        let generation = s.load(table("")).unwrap().generation;
        assert_eq!(generation, 2);
        assert_eq!(s.cached_analyses(), 0);
        let b = s.analyze(&RowFilter::default()).unwrap();
        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(b.fleet.efficiency, 0.0);
    }

    #[test]
    fn failed_load_keeps_previous_table() {
        let mut s = Session::default();
        s.load(table("1")).unwrap();
        let bad = RawTable::from_literal(&["N° Interno", "PPU"], &[&["1", "AA11"]]);
        assert!(matches!(s.load(bad), Err(NormsError::EmptyNormSet { .. })));
        assert_eq!(s.loaded().unwrap().generation, 1);
    }

    #[test]
    fn configured_policy_drives_the_breakdown() {
        let ambiguous = || {
            RawTable::from_literal(
                &["N° Interno", "A", "B"],
                &[&["1", "instalada, no aplica", ""]],
            )
        };
        let mut s = Session::new(AnalysisConfig {
            ambiguity_policy: AmbiguityPolicy::IndependentAccumulation,
            ..Default::default()
        });
        s.load(ambiguous()).unwrap();
        let b = s.analyze(&RowFilter::default()).unwrap().fleet.status_breakdown;
        assert_eq!((b.installed, b.not_applicable, b.pending), (1, 1, 1));
        assert_eq!(
            s.config().ambiguity_policy,
            AmbiguityPolicy::IndependentAccumulation
        );

        let mut d = Session::default();
        d.load(ambiguous()).unwrap();
        let b = d.analyze(&RowFilter::default()).unwrap().fleet.status_breakdown;
        assert_eq!((b.installed, b.not_applicable, b.pending), (1, 0, 1));
    }

    #[test]
    fn fallback_diagnostic_is_reported() {
        let mut s = Session::default();
        s.load(table("1")).unwrap();
        let f = RowFilter {
            terminals: ["Oriente".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let a = s.analyze(&f).unwrap();
        assert_eq!(a.rows, vec![0, 1]);
        assert!(a
            .diagnostics
            .iter()
            .any(|d| d.message.contains("No rows match")));
    }
}
