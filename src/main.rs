// Entry point and high-level CLI flow.
//
// - Option [1] loads a fleet spreadsheet and resolves its columns.
// - Option [2] generates the fleet reports, chart data and a JSON summary.
// - Option [3] writes the detailed report of one bus.
// - Option [4] changes the terminal/subclass and listing filters.
// With --batch the same reports are generated once for --input and the
// program exits.
mod args;
mod bus_report;
mod charts;
mod classifier;
mod config;
mod error;
mod filters;
mod loader;
mod metrics;
mod output;
mod reports;
mod schema;
mod session;
mod types;
mod util;

use args::Args;
use chrono::Local;
use clap::Parser;
use config::AnalysisConfig;
use error::NormsResult;
use filters::{RowFilter, SortOrder, VehicleFilter};
use log::{debug, warn};
use session::Session;
use std::collections::BTreeSet;
use std::io::{self, Write};
use types::Severity;

const MISSING_TOP: usize = 10;

/// Everything the menu loop carries between choices.
struct App {
    session: Session,
    row_filter: RowFilter,
    vehicle_filter: VehicleFilter,
    sort: SortOrder,
}

/// Read a single line of input after printing `prompt`.
fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

fn read_choice() -> String {
    read_line("Enter choice: ")
}

/// Ask the user whether to go back to the menu after generating reports.
///
/// Returns `true` if the user chose `Y`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        match read_line("Back to Report Selection (Y/N): ")
            .to_uppercase()
            .as_str()
        {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn comma_set(s: &str) -> BTreeSet<String> {
    s.split(',')
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| p.to_string())
        .collect()
}

/// Option [1]: load a file and make it the session's table.
fn handle_load(app: &mut App, path: &str) -> NormsResult<()> {
    let (table, load_report) = loader::load_table(path, app.session.config())?;
    println!(
        "Processing dataset... ({} rows loaded, {} blank rows skipped)",
        util::format_int(load_report.loaded_rows),
        util::format_int(load_report.blank_rows)
    );
    if load_report.parse_errors > 0 {
        println!(
            "Note: {} rows skipped due to parse errors.",
            util::format_int(load_report.parse_errors)
        );
    }
    let loaded = app.session.load(table)?;
    debug!("handle_load: {} is generation {}", path, loaded.generation);
    println!(
        "{} norm columns detected: {}",
        loaded.schema.norm_columns.len(),
        loaded.schema.norm_names().join(", ")
    );
    for d in loaded.schema.diagnostics.iter() {
        match d.severity {
            Severity::Info => println!("Info: {}", d.message),
            Severity::Warning => println!("Warning: {}", d.message),
        }
    }
    println!();
    Ok(())
}

fn report_path(app: &App, name: &str) -> NormsResult<String> {
    output::output_path(&app.session.config().output_directory, name)
}

/// Option [2]: generate all reports, chart data and the JSON summary.
///
/// Writes CSV and JSON files and prints Markdown previews of each report.
fn handle_generate_reports(app: &mut App) -> NormsResult<()> {
    let analysis = app.session.analyze(&app.row_filter)?;
    let loaded = app.session.loaded()?;
    let sample = app.session.config().missing_sample_size;
    debug!(
        "handle_generate_reports: {} cached analyses",
        app.session.cached_analyses()
    );

    for d in analysis.diagnostics.iter() {
        if d.severity == Severity::Warning {
            println!("Warning: {}", d.message);
        }
    }
    println!("Generating reports...");
    println!("Outputs saved to individual files...\n");

    let mut vehicles = filters::filter_vehicles(&analysis.vehicles, &app.vehicle_filter);
    let fleet = reports::fleet_export_rows(&vehicles, sample);
    let file1 = report_path(app, "report1_fleet_progress.csv")?;
    output::write_csv(&file1, &fleet)?;
    output::write_json(&report_path(app, "report1_fleet_progress.json")?, &fleet)?;
    println!("Report 1: Fleet Progress by Vehicle\n");
    println!(
        "({} of {} vehicles listed)\n",
        util::format_int(vehicles.len()),
        util::format_int(analysis.vehicles.len())
    );
    filters::sort_vehicles(&mut vehicles, app.sort);
    output::preview_table_rows(&reports::vehicle_rows(&vehicles, sample), 5);
    println!("(Full table exported to {})\n", file1);

    let pending = reports::pending_rows(&vehicles, app.vehicle_filter.min_missing, sample);
    let file2 = report_path(app, "report2_pending_vehicles.csv")?;
    output::write_csv(&file2, &pending)?;
    println!("Report 2: Vehicles With Pending Norms\n");
    println!(
        "(At least {} missing norms)\n",
        app.vehicle_filter.min_missing.max(1)
    );
    output::preview_table_rows(&pending, 3);
    println!("(Full table exported to {})\n", file2);

    let norms = reports::norm_progress_rows(&analysis);
    let file3 = report_path(app, "report3_norm_progress.csv")?;
    output::write_csv(&file3, &norms)?;
    println!("Report 3: Progress by Norm\n");
    output::preview_table_rows(&norms, 3);
    println!("(Full table exported to {})\n", file3);

    let missing = reports::missing_norm_rows(&analysis.missing_ranking, MISSING_TOP);
    let file4 = report_path(app, "report4_missing_norms.csv")?;
    output::write_csv(&file4, &missing)?;
    println!("Report 4: Most Frequently Missing Norms\n");
    output::preview_table_rows(&missing, 3);
    println!("(Full table exported to {})\n", file4);

    for (no, title, name, groups) in [
        (
            5,
            "Progress by Terminal",
            "report5_terminal_progress.csv",
            &analysis.terminal_progress,
        ),
        (
            6,
            "Progress by Subclass",
            "report6_subclass_progress.csv",
            &analysis.subclass_progress,
        ),
    ] {
        let rows = reports::group_rows(groups);
        let file = report_path(app, name)?;
        output::write_csv(&file, &rows)?;
        println!("Report {}: {}\n", no, title);
        output::preview_table_rows(&rows, 5);
        println!("(Full table exported to {})\n", file);
    }

    output::write_json(
        &report_path(app, "charts.json")?,
        &charts::chart_series(&analysis),
    )?;

    let summary = reports::generate_summary(&analysis, &loaded.schema);
    output::write_json(&report_path(app, "summary.json")?, &summary)?;
    println!("Summary Stats (summary.json):");
    println!(
        "{{\"total_vehicles\": {}, \"efficiency\": {}, \"complete_vehicles\": {}, \"pending_cells\": {}}}\n",
        util::format_int(summary.total_vehicles),
        util::format_percent(summary.efficiency),
        util::format_int(summary.complete_vehicles),
        util::format_int(summary.pending_cells)
    );
    if summary.synthetic_identity {
        println!("Warning: some vehicle identifiers are synthetic placeholders.\n");
    }
    Ok(())
}

fn file_safe(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

/// Option [3]: print and export the report of one bus.
fn handle_bus_report(app: &App, vehicle_id: &str) -> NormsResult<()> {
    let loaded = app.session.loaded()?;
    let report = bus_report::build_report(&loaded.table, &loaded.schema, vehicle_id);
    let now = Local::now();
    let doc = bus_report::ReportDocument::new(report, now);
    let text = doc.render_text();
    println!("{}", text);
    let stem = format!(
        "bus_report_{}_{}",
        file_safe(vehicle_id),
        now.format("%Y%m%d_%H%M")
    );
    let txt = report_path(app, &format!("{}.txt", stem))?;
    output::write_text(&txt, &text)?;
    output::write_json(&report_path(app, &format!("{}.json", stem))?, &doc)?;
    println!("(Report exported to {})\n", txt);
    Ok(())
}

/// Option [4]: change filters. Blank answers keep the current value.
fn handle_filters(app: &mut App) -> NormsResult<()> {
    let loaded = app.session.loaded()?;
    let terminals = filters::distinct_values(&loaded.table, loaded.schema.terminal);
    let subclasses = filters::distinct_values(&loaded.table, loaded.schema.subclass);
    println!("Terminals: {}", terminals.join(", "));
    let t = read_line("Terminals (comma separated, '-' for all): ");
    println!("Subclasses: {}", subclasses.join(", "));
    let s = read_line("Subclasses (comma separated, '-' for all): ");
    match t.as_str() {
        "" => {}
        "-" => app.row_filter.terminals.clear(),
        _ => app.row_filter.terminals = comma_set(&t),
    }
    match s.as_str() {
        "" => {}
        "-" => app.row_filter.subclasses.clear(),
        _ => app.row_filter.subclasses = comma_set(&s),
    }

    let f = &mut app.vehicle_filter;
    if let Ok(v) = read_line("Minimum progress %: ").parse::<f64>() {
        f.min_progress = v;
    }
    if let Ok(v) = read_line("Maximum progress %: ").parse::<f64>() {
        f.max_progress = v;
    }
    match read_line("Status (all/complete/incomplete/critical): ").as_str() {
        "" => {}
        other => match other.parse() {
            Ok(st) => f.status = st,
            Err(e) => println!("{}", e),
        },
    }
    if let Ok(v) = read_line("Minimum missing norms: ").parse::<usize>() {
        f.min_missing = v;
    }
    debug!(
        "handle_filters: {:?} {:?}",
        app.row_filter, app.vehicle_filter
    );
    println!();
    Ok(())
}

fn run_batch(app: &mut App, args: &Args) -> NormsResult<()> {
    handle_generate_reports(app)?;
    for id in args.bus.iter() {
        handle_bus_report(app, id)?;
    }
    Ok(())
}

fn build_app(args: &Args) -> NormsResult<App> {
    let mut config = match &args.config {
        Some(path) => config::read_config(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(dir) = &args.out_dir {
        config.output_directory = dir.clone();
    }
    let defaults = VehicleFilter::default();
    let vehicle_filter = VehicleFilter {
        min_progress: args.min_progress.unwrap_or(defaults.min_progress),
        max_progress: args.max_progress.unwrap_or(defaults.max_progress),
        min_missing: args.min_missing.unwrap_or(defaults.min_missing),
        status: args.status.unwrap_or_default(),
        critical_threshold: config.critical_threshold,
    };
    Ok(App {
        session: Session::new(config),
        row_filter: RowFilter {
            terminals: args.terminal.iter().cloned().collect(),
            subclasses: args.subclass.iter().cloned().collect(),
        },
        vehicle_filter,
        sort: args.sort.unwrap_or_default(),
    })
}

fn main() {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut app = match build_app(&args) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if let Some(path) = &args.input {
        if let Err(e) = handle_load(&mut app, path) {
            eprintln!("Failed to load file: {}\n", e);
            if args.batch {
                std::process::exit(1);
            }
        }
    }

    if args.batch {
        if let Err(e) = run_batch(&mut app, &args) {
            eprintln!("{}", e);
            std::process::exit(1);
        }
        return;
    }

    loop {
        println!("Graphic Norm Installation Tracker:");
        println!("[1] Load a file");
        println!("[2] Generate Reports");
        println!("[3] Bus Report");
        println!("[4] Filters");
        println!("[5] Exit\n");
        match read_choice().as_str() {
            "1" => {
                let default = args.input.clone().unwrap_or_default();
                let mut path = read_line(&format!("File path [{}]: ", default));
                if path.is_empty() {
                    path = default;
                }
                if let Err(e) = handle_load(&mut app, &path) {
                    eprintln!("Failed to load file: {}\n", e);
                }
            }
            "2" => {
                println!();
                if let Err(e) = handle_generate_reports(&mut app) {
                    eprintln!("Error: {}\n", e);
                }
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            "3" => {
                let id = read_line("Bus id: ");
                if let Err(e) = handle_bus_report(&app, &id) {
                    eprintln!("Error: {}\n", e);
                }
            }
            "4" => {
                if let Err(e) = handle_filters(&mut app) {
                    eprintln!("Error: {}\n", e);
                }
            }
            "5" => {
                println!("Exiting the program.");
                break;
            }
            other => {
                warn!("main: invalid menu choice {:?}", other);
                println!("Invalid choice. Please enter 1 to 5.\n");
            }
        }
    }
}
