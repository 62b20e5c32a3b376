use crate::error::*;
use crate::types::AmbiguityPolicy;

use log::debug;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::fs;

/// Settings for one analysis session. Every field has a default so a config
/// file only needs to list what differs.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    #[serde(rename = "internalNumberColumn")]
    pub internal_number_column: String,
    #[serde(rename = "plateColumn")]
    pub plate_column: String,
    #[serde(rename = "terminalColumn")]
    pub terminal_column: String,
    #[serde(rename = "subclassColumn")]
    pub subclass_column: String,
    /// Additional column names that never hold norms.
    #[serde(rename = "extraMetadataColumns")]
    pub extra_metadata_columns: Vec<String>,
    #[serde(rename = "ambiguityPolicy")]
    pub ambiguity_policy: AmbiguityPolicy,
    #[serde(rename = "missingSampleSize")]
    pub missing_sample_size: usize,
    #[serde(rename = "criticalThreshold")]
    pub critical_threshold: f64,
    #[serde(rename = "outputDirectory")]
    pub output_directory: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            internal_number_column: "N° Interno".to_string(),
            plate_column: "PPU".to_string(),
            terminal_column: "Terminal".to_string(),
            subclass_column: "Subclase".to_string(),
            extra_metadata_columns: Vec::new(),
            ambiguity_policy: AmbiguityPolicy::InstalledPriority,
            missing_sample_size: 3,
            critical_threshold: 50.0,
            output_directory: ".".to_string(),
        }
    }
}

pub fn read_config(path: &str) -> NormsResult<AnalysisConfig> {
    let contents = fs::read_to_string(path).context(OpeningConfigSnafu { path })?;
    let config: AnalysisConfig =
        serde_json::from_str(&contents).context(ParsingConfigSnafu { path })?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let c: AnalysisConfig = serde_json::from_str(
            r#"{"plateColumn": "Patente", "ambiguityPolicy": "independentAccumulation"}"#,
        )
        .unwrap();
        assert_eq!(c.plate_column, "Patente");
        assert_eq!(c.ambiguity_policy, AmbiguityPolicy::IndependentAccumulation);
        assert_eq!(c.internal_number_column, "N° Interno");
        assert_eq!(c.missing_sample_size, 3);
    }

    #[test]
    fn unreadable_config_is_an_error() {
        let res = read_config("/nonexistent/norm_tracker.json");
        assert!(matches!(res, Err(NormsError::OpeningConfig { .. })));
    }

    #[test]
    fn malformed_config_is_an_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut f, b"{ not json").unwrap();
        let res = read_config(f.path().to_str().unwrap());
        assert!(matches!(res, Err(NormsError::ParsingConfig { .. })));
    }
}
