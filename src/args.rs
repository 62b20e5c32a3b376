use crate::filters::{SortOrder, StatusFilter};
use clap::Parser;

/// Tracks the installation of graphic norms across a bus fleet.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The fleet spreadsheet: xlsx, xls, ods or csv. If given, it is loaded at startup.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (file path, optional) A JSON configuration file. Missing keys keep their defaults.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (directory) Where reports are written. Overrides `outputDirectory` from the config.
    #[clap(short, long, value_parser)]
    pub out_dir: Option<String>,

    /// Only keep vehicles of this terminal. May be repeated.
    #[clap(long, value_parser)]
    pub terminal: Vec<String>,

    /// Only keep vehicles of this subclass. May be repeated.
    #[clap(long, value_parser)]
    pub subclass: Vec<String>,

    /// (percent, default 0) Lowest completion progress listed.
    #[clap(long, value_parser)]
    pub min_progress: Option<f64>,

    /// (percent, default 100) Highest completion progress listed.
    #[clap(long, value_parser)]
    pub max_progress: Option<f64>,

    /// (default 0) Minimum number of missing norms of a listed vehicle. The
    /// pending list always needs at least one.
    #[clap(long, value_parser)]
    pub min_missing: Option<usize>,

    /// (all, complete, incomplete or critical) Vehicle status listed.
    #[clap(long, value_parser)]
    pub status: Option<StatusFilter>,

    /// (id, progress-desc, progress-asc, missing-desc, missing-asc) Order of the vehicle listing.
    #[clap(long, value_parser)]
    pub sort: Option<SortOrder>,

    /// (vehicle id) Writes the detailed report of this bus. May be repeated.
    #[clap(long, value_parser)]
    pub bus: Vec<String>,

    /// Generates every report for --input and exits instead of showing the menu.
    #[clap(long, takes_value = false)]
    pub batch: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
