// Data series behind each dashboard chart. Drawing is left to the consumer.
use crate::metrics::Analysis;
use crate::types::GroupProgress;

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

const TOP_MISSING: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub title: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl ChartSeries {
    fn new(title: &str) -> ChartSeries {
        ChartSeries {
            title: title.to_string(),
            labels: Vec::new(),
            values: Vec::new(),
        }
    }

    fn push(&mut self, label: impl Into<String>, value: f64) {
        self.labels.push(label.into());
        self.values.push(value);
    }
}

fn group_series(title: &str, groups: &[GroupProgress]) -> ChartSeries {
    let mut s = ChartSeries::new(title);
    for g in groups {
        s.push(g.group.clone(), g.applicable_progress);
    }
    s
}

pub fn chart_series(analysis: &Analysis) -> BTreeMap<String, ChartSeries> {
    let fleet = &analysis.fleet;
    let mut charts = BTreeMap::new();

    let mut status = ChartSeries::new("Global installation status");
    status.push("Installed", fleet.status_breakdown.installed as f64);
    status.push("Not Applicable", fleet.status_breakdown.not_applicable as f64);
    status.push("Pending", fleet.status_breakdown.pending as f64);
    charts.insert("global_status".to_string(), status);

    charts.insert(
        "terminal_progress".to_string(),
        group_series("Progress by terminal", &analysis.terminal_progress),
    );
    charts.insert(
        "subclass_progress".to_string(),
        group_series("Progress by subclass", &analysis.subclass_progress),
    );

    let mut norms = fleet.norm_progress.clone();
    norms.sort_by(|a, b| a.progress.partial_cmp(&b.progress).unwrap_or(Ordering::Equal));
    let mut norm_progress = ChartSeries::new("Progress by norm");
    for n in norms {
        norm_progress.push(n.norm, n.progress);
    }
    charts.insert("norm_progress".to_string(), norm_progress);

    let mut split = ChartSeries::new("Complete vs incomplete vehicles");
    split.push("Complete", fleet.complete_vehicles as f64);
    split.push("Incomplete", fleet.incomplete_vehicles as f64);
    charts.insert("completion_split".to_string(), split);

    let mut ranges = ChartSeries::new("Vehicles by progress range");
    for b in analysis.distribution.iter() {
        ranges.push(b.label.clone(), b.vehicles as f64);
    }
    charts.insert("progress_ranges".to_string(), ranges);

    let mut missing = ChartSeries::new("Most frequently missing norms");
    for m in analysis.missing_ranking.iter().take(TOP_MISSING) {
        missing.push(m.norm.clone(), m.vehicles as f64);
    }
    charts.insert("top_missing_norms".to_string(), missing);

    charts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::metrics::analyze;
    use crate::schema::resolve;
    use crate::types::{AmbiguityPolicy, RawTable};

    #[test]
    fn every_chart_is_present_and_consistent() {
        let t = RawTable::from_literal(
            &["N° Interno", "Terminal", "A", "B"],
            &[&["1", "Norte", "1", ""], &["2", "Sur", "no aplica", "1"]],
        );
        let s = resolve(&t, &AnalysisConfig::default()).unwrap();
        let a = analyze(&t, &s, &t.all_rows(), AmbiguityPolicy::default());
        let charts = chart_series(&a);
        let ids: Vec<&str> = charts.keys().map(|k| k.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "completion_split",
                "global_status",
                "norm_progress",
                "progress_ranges",
                "subclass_progress",
                "terminal_progress",
                "top_missing_norms",
            ]
        );
        for c in charts.values() {
            assert_eq!(c.labels.len(), c.values.len());
        }
        assert_eq!(charts["global_status"].values, vec![2.0, 1.0, 1.0]);
        assert_eq!(charts["norm_progress"].labels, vec!["B", "A"]);
        assert_eq!(charts["completion_split"].values, vec![1.0, 1.0]);
        assert_eq!(charts["terminal_progress"].labels, vec!["Norte", "Sur"]);
        assert!(charts["subclass_progress"].labels.is_empty());
        let buckets: f64 = charts["progress_ranges"].values.iter().sum();
        assert_eq!(buckets, 2.0);
    }
}
