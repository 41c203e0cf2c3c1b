//! # Loadset CLI
//!
//! Transfers uniform load sets and their area assignments between two model
//! snapshot files.
//!
//! ```text
//! loadset inspect podium.model.json
//! loadset transfer-sets podium.model.json tower.model.json --set ULoadSet1
//! loadset transfer-assignments podium.model.json tower.model.json
//! loadset convert 0.003 --from N,mm --to lb,in
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc::Receiver;

use clap::{Parser, Subcommand};
use serde::Serialize;

use loadset_core::errors::{TransferError, TransferResult};
use loadset_core::snapshot::file_io::load_snapshot_with_lock_check;
use loadset_core::transfer::{
    collect_slab_assignments, load_source_tree, transfer_assignments, transfer_load_sets, LoadSetTree,
};
use loadset_core::units::{ConversionPolicy, QuantityKind, UnitSystem};
use loadset_core::{
    load_snapshot, save_snapshot, spawn_transfer, FileLock, ModelInfo, ModelSnapshot, ProgressReporter,
    ProgressUpdate, TransferSettings, UnitConverter,
};

#[derive(Parser)]
#[command(name = "loadset", version, about = "Transfer load sets between structural model snapshots")]
struct Cli {
    /// Settings file (defaults to <config dir>/loadset/settings.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    /// Read a source snapshot even while another transfer holds its lock
    #[arg(long, global = true)]
    force: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a model's units and load sets
    Inspect {
        /// Model snapshot file
        model: PathBuf,
    },

    /// Copy load sets into the target model, converting magnitudes
    TransferSets {
        source: PathBuf,
        target: PathBuf,

        /// Load set to transfer, repeatable; all sets when omitted
        #[arg(long = "set", value_name = "NAME")]
        sets: Vec<String>,
    },

    /// Copy the load sets assigned to the selected source areas onto the
    /// matching target areas
    TransferAssignments { source: PathBuf, target: PathBuf },

    /// Convert an area load between unit systems
    Convert {
        value: f64,

        /// Source units as FORCE,LENGTH, e.g. kN,m
        #[arg(long)]
        from: String,

        /// Target units as FORCE,LENGTH
        #[arg(long)]
        to: String,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Commands::Inspect { model } => cmd_inspect(&cli, model),
        Commands::TransferSets { source, target, sets } => cmd_transfer_sets(&cli, source, target, sets),
        Commands::TransferAssignments { source, target } => cmd_transfer_assignments(&cli, source, target),
        Commands::Convert { value, from, to } => cmd_convert(&cli, *value, from, to),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Ok(json) = serde_json::to_string_pretty(&e) {
                eprintln!();
                eprintln!("Error JSON:");
                eprintln!("{}", json);
            }
            ExitCode::FAILURE
        }
    }
}

fn load_settings(cli: &Cli) -> TransferResult<TransferSettings> {
    match &cli.config {
        Some(path) => TransferSettings::load_from(path),
        None => TransferSettings::load(),
    }
}

fn user_id() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "loadset".to_string())
}

fn print_json<T: Serialize>(value: &T) -> TransferResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| TransferError::serialization(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

/// Parse `FORCE,LENGTH`; temperature does not enter area load conversion
fn parse_units(field: &str, text: &str) -> TransferResult<UnitSystem> {
    match text.split_once(',') {
        Some((force, length)) if !force.trim().is_empty() && !length.trim().is_empty() => {
            Ok(UnitSystem::new(force.trim(), length.trim(), "C"))
        }
        _ => Err(TransferError::invalid_input(field, text, "expected FORCE,LENGTH")),
    }
}

/// Echo progress to stderr until the worker hangs up
fn drain_progress(rx: Receiver<ProgressUpdate>, quiet: bool) {
    for update in rx {
        if !quiet {
            eprintln!("[{:>3}%] {}", update.percent, update.stage);
        }
    }
}

/// Load the source, refusing one that is being written unless forced, and
/// the target under an exclusive lock
fn open_pair(cli: &Cli, source: &Path, target: &Path) -> TransferResult<(ModelSnapshot, ModelSnapshot, FileLock)> {
    let source_model = load_snapshot_with_lock_check(source, cli.force)?;
    let lock = FileLock::acquire(target, user_id())?;
    let target_model = load_snapshot(target)?;
    Ok((source_model, target_model, lock))
}

#[derive(Serialize)]
struct InspectOutput<'a> {
    model: &'a ModelInfo,
    area_load_unit: String,
    load_sets: Vec<SetSummary<'a>>,
}

#[derive(Serialize)]
struct SetSummary<'a> {
    name: &'a str,
    rows: usize,
}

fn cmd_inspect(cli: &Cli, path: &Path) -> TransferResult<()> {
    let settings = load_settings(cli)?;
    let model = load_snapshot(path)?;
    let (info, tree) = load_source_tree(&model, &settings, &ProgressReporter::silent())?;

    if cli.json {
        return print_json(&InspectOutput {
            model: &info,
            area_load_unit: info.area_load_label(),
            load_sets: tree
                .groups()
                .map(|g| SetSummary {
                    name: &g.name,
                    rows: g.records.len(),
                })
                .collect(),
        });
    }

    println!("Model:  {}", info.file_name);
    println!("Units:  {} ({})", info.units.summary(), info.area_load_label());
    print_tree(&tree);
    Ok(())
}

fn print_tree(tree: &LoadSetTree) {
    if tree.is_empty() {
        println!("No load sets.");
        return;
    }
    println!("Load sets:");
    for group in tree.groups() {
        println!("  {}", group.name);
        for record in &group.records {
            println!("    {:<16} {} {}", record.load_pattern, record.magnitude, record.unit_label);
        }
    }
}

fn cmd_transfer_sets(cli: &Cli, source: &Path, target: &Path, sets: &[String]) -> TransferResult<()> {
    let settings = load_settings(cli)?;
    let (source_model, mut target_model, lock) = open_pair(cli, source, target)?;
    let sets = sets.to_vec();

    let (handle, rx) = spawn_transfer(move |progress| {
        let converter = UnitConverter::standard();
        let (info, mut tree) = load_source_tree(&source_model, &settings, progress)?;
        if sets.is_empty() {
            tree.select_all();
        } else {
            tree.select_only(sets.as_slice())?;
        }
        let summary = transfer_load_sets(
            &tree.selected_records(),
            &info.units,
            &mut target_model,
            &converter,
            &settings,
            progress,
        )?;
        Ok((summary, target_model))
    });
    drain_progress(rx, cli.json);
    let (summary, mut target_model) = handle.join()?;

    if summary.report.is_some() {
        save_snapshot(&mut target_model, lock.snapshot_path())?;
    }
    drop(lock);

    if cli.json {
        return print_json(&summary);
    }
    println!(
        "{} row(s) in {} set(s) written to {} ({} → {}, factor {})",
        summary.rows_written,
        summary.sets.len(),
        summary.target_model,
        summary.source_units,
        summary.target_units,
        summary.scale_factor
    );
    if let Some(report) = summary.report.as_ref().filter(|r| !r.import_log.is_empty()) {
        println!("{}", report.import_log);
    }
    Ok(())
}

fn cmd_transfer_assignments(cli: &Cli, source: &Path, target: &Path) -> TransferResult<()> {
    let settings = load_settings(cli)?;
    let (source_model, mut target_model, lock) = open_pair(cli, source, target)?;

    let (handle, rx) = spawn_transfer(move |progress| {
        progress.report(0, "matching");
        let slabs = collect_slab_assignments(&source_model, &target_model, &settings)?;
        let summary = transfer_assignments(&slabs, &mut target_model, &settings, progress)?;
        Ok((summary, slabs, target_model))
    });
    drain_progress(rx, cli.json);
    let (summary, slabs, mut target_model) = handle.join()?;

    if summary.report.is_some() {
        save_snapshot(&mut target_model, lock.snapshot_path())?;
    }
    drop(lock);

    if cli.json {
        return print_json(&summary);
    }
    for slab in &slabs {
        let target_name = if slab.target_unique_name.is_empty() {
            "(no match)"
        } else {
            slab.target_unique_name.as_str()
        };
        let set = if slab.assigned_set.is_empty() {
            "(none)"
        } else {
            slab.assigned_set.as_str()
        };
        println!("  {:<12} {:<20} → {}", slab.source_label, set, target_name);
    }
    println!(
        "{} of {} selected area(s) assigned in {}",
        summary.rows_written, summary.selected, summary.target_model
    );
    Ok(())
}

#[derive(Serialize)]
struct ConvertOutput {
    value: f64,
    from: String,
    to: String,
    factor: f64,
    converted: f64,
}

fn cmd_convert(cli: &Cli, value: f64, from: &str, to: &str) -> TransferResult<()> {
    let source = parse_units("from", from)?;
    let target = parse_units("to", to)?;
    let factor = UnitConverter::standard().quantity_scale_factor(
        QuantityKind::AreaLoad,
        &source,
        &target,
        ConversionPolicy::Strict,
    )?;
    let output = ConvertOutput {
        value,
        from: QuantityKind::AreaLoad.unit_label(&source),
        to: QuantityKind::AreaLoad.unit_label(&target),
        factor,
        converted: value * factor,
    };

    if cli.json {
        return print_json(&output);
    }
    println!("{} {} = {} {} (factor {})", output.value, output.from, output.converted, output.to, output.factor);
    Ok(())
}
