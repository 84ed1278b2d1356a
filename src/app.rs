//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - runs the requested pipeline
//! - prints the report
//! - writes optional exports

use clap::Parser;

use crate::audit::AuditLog;
use crate::cli::{Cli, Command, MapArgs, RemanenceArgs, SequenceArgs, SequenceKind, SynthArgs};
use crate::domain::{ColumnNames, MapConfig};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `forc` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Map(args) => handle_map(args),
        Command::Remanence(args) => handle_remanence(args),
        Command::Sequence(args) => handle_sequence(args),
        Command::Synth(args) => handle_synth(args),
    }
}

fn handle_map(args: MapArgs) -> Result<(), AppError> {
    let config = map_config_from_args(&args);

    // Echo audit events live so long scans stay observable.
    let mut audit = AuditLog::with_echo(true);
    let run = pipeline::run_map(&config, &mut audit)?;

    println!(
        "{}",
        crate::report::format_map_summary(&run.grid, &run.distribution, &run.rotated, &config, &audit)
    );

    if let Some(path) = &config.export_csv {
        crate::io::export::write_rotated_csv(path, &run.rotated)?;
    }
    if let Some(path) = &config.export_distribution {
        crate::io::export::write_distribution_csv(path, &run.distribution)?;
    }
    if let Some(path) = &config.export_map {
        let map_file = crate::io::export::to_map_file(&run.distribution, &run.rotated, &config);
        crate::io::export::write_map_json(path, &map_file)?;
    }

    Ok(())
}

fn handle_remanence(args: RemanenceArgs) -> Result<(), AppError> {
    use crate::io::irmdcd::{delta_m, parse_remanence_dat, RemanenceSpec};

    let spec = RemanenceSpec {
        marker_irm: args.marker_irm.clone(),
        marker_dcd: args.marker_dcd.clone(),
        columns: ColumnNames::default(),
    };

    let mut audit = AuditLog::with_echo(true);
    audit.push(format!("Opening {}", args.input.display()));
    let file = std::fs::File::open(&args.input).map_err(|e| {
        AppError::new(2, format!("Failed to open '{}': {e}", args.input.display()))
    })?;
    let data = parse_remanence_dat(std::io::BufReader::new(file), &spec, &mut audit)?;

    println!(
        "Remanence curves: {} IRM points, {} DCD points",
        data.irm.len(),
        data.dcd.len()
    );

    if let Some(m_s) = args.saturation_moment {
        let dm = delta_m(&data, m_s);
        println!("Delta-M curve: {} points (M_s = {m_s} milli-emu)", dm.len());
        if let Some(path) = &args.export {
            crate::io::export::write_delta_m_csv(path, &dm)?;
        }
    } else if args.export.is_some() {
        return Err(AppError::new(
            2,
            "`--export` for remanence data requires `--saturation-moment`.",
        ));
    }

    Ok(())
}

fn handle_sequence(args: SequenceArgs) -> Result<(), AppError> {
    use crate::io::sequence::{write_forc_sequence, write_irmdcd_sequence, SequenceSpec};

    let spec = SequenceSpec {
        storage_folder: args.storage_folder.clone(),
        savefile_name: args.savefile.clone(),
        saturation_field: args.sat_field,
        field_step: args.field_step,
        sweep_rate: args.sweep_rate,
        averaging_time: args.averaging_time,
    };

    let out = match args.kind {
        SequenceKind::Forc => write_forc_sequence(&args.prefix, &spec)?,
        SequenceKind::Irmdcd => write_irmdcd_sequence(&args.prefix, &spec)?,
    };

    println!(
        "Generated sequence for {} measurements in {} file(s).",
        out.measurements,
        out.files.len()
    );
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    use crate::data::synthetic::{write_synthetic_dat, SyntheticSpec};

    let spec = SyntheticSpec {
        sat_field: args.sat_field,
        field_step: args.field_step,
        noise: args.noise,
        seed: args.seed,
    };
    let branches = write_synthetic_dat(&args.out, &spec)?;
    println!(
        "Wrote synthetic measurement with {branches} branches to {}.",
        args.out.display()
    );
    Ok(())
}

pub fn map_config_from_args(args: &MapArgs) -> MapConfig {
    MapConfig {
        dat_path: args.input.clone(),
        sat_field: args.sat_field,
        field_step: args.field_step,
        smoothing_factor: args.smoothing,
        branch_marker: args.marker.clone(),
        columns: ColumnNames::default(),
        verbose: args.verbose,
        progress: !args.no_progress,
        export_csv: args.export.clone(),
        export_distribution: args.export_distribution.clone(),
        export_map: args.export_map.clone(),
    }
}
