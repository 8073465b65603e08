// Entry point and interactive menu.
//
// One `Session` lives for the whole run. Loading goes through a content
// cache so reloading the same file is cheap; every other menu action
// recomputes the dashboard from the loaded table and the current filters.
mod error;
mod filter;
mod loader;
mod output;
mod period;
mod reports;
mod session;
mod types;
mod util;

use clap::Parser;
use error::ReportError;
use filter::FilterOptions;
use session::{FilterField, Session};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

const DEFAULT_DATA: &str = "data/data_narapidana_cirebon_clean.xlsx";
const PREVIEW_ROWS: usize = 10;

#[derive(Parser)]
#[command(
    name = "lapas-report",
    version,
    about = "Inmate population report for a single correctional facility"
)]
struct Cli {
    /// Data file (xlsx or csv) loaded by default
    #[arg(short, long, default_value = DEFAULT_DATA)]
    data: PathBuf,

    /// Facility capacity used for the occupancy rate
    #[arg(short, long, default_value_t = 1200, value_parser = clap::value_parser!(u32).range(1..))]
    capacity: u32,

    /// Keep only rows whose region name contains this text
    #[arg(short, long, default_value = "CIREBON")]
    region: String,

    /// Directory for CSV/XLSX/JSON exports
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Load, print the dashboard and export once, without the menu
    #[arg(long)]
    batch: bool,
}

/// One trimmed line, or `None` once the input is closed or unreadable.
fn read_line_from(input: &mut impl BufRead) -> Option<String> {
    let mut buf = String::new();
    match input.read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// Print `label`, then read one line from stdin.
fn prompt(label: &str) -> Option<String> {
    print!("{label}");
    let _ = io::stdout().flush();
    read_line_from(&mut io::stdin().lock())
}

fn read_choice() -> Option<String> {
    prompt("Enter choice: ")
}

/// Diagnostic lines for a failed load. The default file is always named so
/// the operator can tell whether the fallback source is usable.
fn load_failure_lines(path: &Path, default: &Path, err: &ReportError) -> Vec<String> {
    let mut lines = vec![
        "Data could not be read. Check the file format and columns.".to_string(),
        format!("Path: {}", path.display()),
        format!("File exists: {}", path.exists()),
    ];
    if path != default {
        lines.push(format!("Default path: {}", default.display()));
        lines.push(format!("Default file exists: {}", default.exists()));
    }
    lines.push(format!("Error: {err}"));
    lines
}

fn report_load(
    result: Result<&loader::LoadReport, ReportError>,
    path: &Path,
    default: &Path,
) {
    match result {
        Ok(r) => {
            println!(
                "Processing dataset... ({} rows read, {} kept)",
                util::format_int(r.total_rows as u64),
                util::format_int(r.kept_rows as u64)
            );
            if r.defaulted_counts + r.negative_counts > 0 {
                println!(
                    "Note: {} counts set to 0 (non-numeric or negative).",
                    util::format_int((r.defaulted_counts + r.negative_counts) as u64)
                );
            }
            if r.oversized_counts > 0 {
                println!(
                    "Note: {} counts above {} clamped.",
                    util::format_int(r.oversized_counts as u64),
                    util::format_int(loader::MAX_COUNT)
                );
            }
            println!();
        }
        Err(e) => {
            for line in load_failure_lines(path, default, &e) {
                eprintln!("{line}");
            }
            eprintln!();
        }
    }
}

fn handle_select(session: &mut Session) {
    let opts = match session.options() {
        Ok(o) => o,
        Err(e) => {
            println!("Error: {e}\n");
            return;
        }
    };
    println!("[1] Gender:   ALL, {}", opts.genders.join(", "));
    println!("[2] Category: ALL, {}", opts.categories.join(", "));
    println!(
        "[3] Year:     ALL, {}",
        opts.years
            .iter()
            .map(|y| y.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("[4] Month:    ALL, {}", FilterOptions::months().join(", "));
    let field = match read_choice().unwrap_or_default().as_str() {
        "1" => FilterField::Gender,
        "2" => FilterField::Category,
        "3" => FilterField::Year,
        "4" => FilterField::Month,
        _ => {
            println!("Invalid choice.\n");
            return;
        }
    };
    let value = prompt("Value: ").unwrap_or_default();
    match session.select(field, &value) {
        Ok(()) => println!("Filter: {}\n", session.filter()),
        Err(e) => println!("Error: {e}\n"),
    }
}

fn handle_capacity(session: &mut Session) {
    let value = prompt("Capacity (people): ").unwrap_or_default();
    match value.parse::<u32>() {
        Ok(c) => match session.set_capacity(c) {
            Ok(()) => println!("Capacity set to {}\n", util::format_int(c)),
            Err(e) => println!("Error: {e}\n"),
        },
        Err(_) => println!("Invalid number.\n"),
    }
}

fn handle_dashboard(session: &Session) {
    match session.dashboard() {
        Ok(d) => output::print_dashboard(&d, PREVIEW_ROWS),
        Err(e) => println!("Error: {e}\n"),
    }
}

fn handle_records(session: &Session) {
    if !session.query().is_empty() {
        println!("Category search: {}", session.query());
    }
    match session.listed_records() {
        Ok(rows) => output::preview_records(&rows, session.has_region(), PREVIEW_ROWS),
        Err(e) => println!("Error: {e}\n"),
    }
}

fn handle_export(session: &Session, out_dir: &Path) {
    match session.export(out_dir) {
        Ok(paths) => {
            for p in paths {
                println!("Saved {}", p.display());
            }
            println!();
        }
        Err(e) => eprintln!("Write error: {e}\n"),
    }
}

fn run_batch(cli: &Cli, session: &mut Session) -> Result<(), ReportError> {
    session.load(&cli.data)?;
    let d = session.dashboard()?;
    output::print_dashboard(&d, PREVIEW_ROWS);
    for p in session.export(&cli.out_dir)? {
        println!("Saved {}", p.display());
    }
    Ok(())
}

fn main() {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();
    let mut session = Session::new(&cli.region, cli.capacity);

    if cli.batch {
        if let Err(e) = run_batch(&cli, &mut session) {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        return;
    }

    let result = session.load(&cli.data);
    report_load(result, &cli.data, &cli.data);

    loop {
        println!("Inmate Population Report");
        match session.source() {
            Some(src) if session.is_loaded() => {
                println!("Source: {}  |  Filter: {}", src.display(), session.filter())
            }
            _ => println!("No data loaded yet."),
        }
        println!("[1] Load the default file");
        println!("[2] Upload a file");
        println!("[3] Set a filter");
        println!("[4] Reset filters");
        println!("[5] Set capacity");
        println!("[6] Search categories");
        println!("[7] Show dashboard");
        println!("[8] Show records");
        println!("[9] Export (CSV, XLSX, JSON)");
        println!("[0] Exit\n");
        let Some(choice) = read_choice() else {
            println!("\nInput closed. Exiting the program.");
            break;
        };
        match choice.as_str() {
            "1" => {
                let result = session.load(&cli.data);
                report_load(result, &cli.data, &cli.data);
            }
            "2" => {
                let Some(path) = prompt("Path to xlsx/csv file: ") else {
                    continue;
                };
                let path = PathBuf::from(path);
                let result = session.upload(&path);
                report_load(result, &path, &cli.data);
            }
            "3" => handle_select(&mut session),
            "4" => {
                session.reset_filters();
                println!("Filters reset.\n");
            }
            "5" => handle_capacity(&mut session),
            "6" => {
                let query = prompt("Category contains (empty clears): ").unwrap_or_default();
                session.set_query(&query);
                println!();
            }
            "7" => handle_dashboard(&session),
            "8" => handle_records(&session),
            "9" => handle_export(&session, &cli.out_dir),
            "0" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 0-9.\n"),
        }
    }
}
