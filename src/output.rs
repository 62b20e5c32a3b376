use crate::error::*;

use log::debug;
use serde::Serialize;
use snafu::ResultExt;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize>(path: &str, rows: &[T]) -> NormsResult<()> {
    let mut wtr = csv::Writer::from_path(path).context(WritingCsvSnafu { path })?;
    for r in rows {
        wtr.serialize(r).context(WritingCsvSnafu { path })?;
    }
    wtr.flush().context(WritingFileSnafu { path })?;
    debug!("write_csv: {} rows to {}", rows.len(), path);
    Ok(())
}

pub fn write_json<T: Serialize>(path: &str, value: &T) -> NormsResult<()> {
    let s = serde_json::to_string_pretty(value).context(WritingJsonSnafu { path })?;
    std::fs::write(path, s).context(WritingFileSnafu { path })?;
    debug!("write_json: {}", path);
    Ok(())
}

pub fn write_text(path: &str, text: &str) -> NormsResult<()> {
    std::fs::write(path, text).context(WritingFileSnafu { path })
}

/// `dir/name` as a string, creating `dir` when needed.
pub fn output_path(dir: &str, name: &str) -> NormsResult<String> {
    std::fs::create_dir_all(dir).context(WritingFileSnafu { path: dir })?;
    Ok(Path::new(dir).join(name).to_string_lossy().into_owned())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{}\n", render_table(rows, max_rows));
}

pub fn render_table<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MissingNormRow;

    fn rows() -> Vec<MissingNormRow> {
        vec![
            MissingNormRow {
                rank: 1,
                norm: "Logo lateral".to_string(),
                vehicles: 3,
                fleet_share: "60.00".to_string(),
            },
            MissingNormRow {
                rank: 2,
                norm: "Franja".to_string(),
                vehicles: 1,
                fleet_share: "20.00".to_string(),
            },
        ]
    }

    #[test]
    fn csv_uses_renamed_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = output_path(dir.path().to_str().unwrap(), "missing.csv").unwrap();
        write_csv(&path, &rows()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Rank,Norm,Vehicles,FleetShare"));
        assert_eq!(lines.next(), Some("1,Logo lateral,3,60.00"));
    }

    #[test]
    fn json_round_trips_through_serde_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = output_path(dir.path().to_str().unwrap(), "missing.json").unwrap();
        write_json(&path, &rows()).unwrap();
        let v: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v[1]["Norm"], "Franja");
    }

    #[test]
    fn output_path_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let path = output_path(nested.to_str().unwrap(), "x.txt").unwrap();
        write_text(&path, "hello").unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn markdown_preview_is_truncated() {
        let s = render_table(&rows(), 1);
        assert!(s.contains("Logo lateral"));
        assert!(!s.contains("Franja"));
        assert_eq!(render_table::<MissingNormRow>(&[], 5), "(no rows)");
    }

    #[test]
    fn write_into_missing_directory_fails() {
        let res = write_text("/nonexistent/dir/report.txt", "x");
        assert!(matches!(res, Err(NormsError::WritingFile { .. })));
    }
}
