use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum NormsError {
    #[snafu(display("Error opening workbook {path}: {source}"))]
    OpeningWorkbook {
        source: calamine::Error,
        path: String,
    },
    #[snafu(display("Workbook {path} has no worksheet with data"))]
    EmptyWorkbook { path: String },
    #[snafu(display("Error reading delimited file {path}: {source}"))]
    ReadingCsv { source: csv::Error, path: String },
    #[snafu(display("Unsupported input format for {path} (expected xlsx, xls, ods or csv)"))]
    UnsupportedFormat { path: String },

    /// The only schema problem that cannot be patched over with a placeholder.
    #[snafu(display("No norm columns found. Columns present: {}", columns.join(", ")))]
    EmptyNormSet { columns: Vec<String> },

    #[snafu(display("No information found for bus {vehicle_id}"))]
    VehicleNotFound { vehicle_id: String },

    #[snafu(display("Error opening config file {path}: {source}"))]
    OpeningConfig {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing config file {path}: {source}"))]
    ParsingConfig {
        source: serde_json::Error,
        path: String,
    },

    #[snafu(display("Error writing {path}: {source}"))]
    WritingCsv { source: csv::Error, path: String },
    #[snafu(display("Error serializing {path}: {source}"))]
    WritingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error writing {path}: {source}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },

    #[snafu(display("No data loaded. Please load a file first."))]
    NoTableLoaded {},
}

pub type NormsResult<T> = Result<T, NormsError>;
