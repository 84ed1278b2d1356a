//! Command-line parsing for the FORC evaluation tool.
//!
//! The goal of this module is to keep **argument parsing** and **command
//! dispatch** separate from the parsing/fitting/rotation code.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::domain::DEFAULT_BRANCH_MARKER;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "forc", version, about = "FORC measurement evaluation for PPMS VSM data")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compute the FORC distribution map from a measurement file.
    Map(MapArgs),
    /// Parse an IRM/DCD remanence file and export the delta-M curve.
    Remanence(RemanenceArgs),
    /// Generate instrument sequence files for a measurement run.
    Sequence(SequenceArgs),
    /// Generate a synthetic measurement file for pipeline testing.
    Synth(SynthArgs),
}

/// Options for the full map pipeline.
#[derive(Debug, Parser, Clone)]
pub struct MapArgs {
    /// Measurement `.dat` file.
    pub input: PathBuf,

    /// Saturation field of the protocol (tesla).
    #[arg(long)]
    pub sat_field: f64,

    /// Field step between reversal fields (tesla).
    #[arg(long)]
    pub field_step: f64,

    /// Half-width of the local fit window in grid steps.
    #[arg(short = 'k', long, default_value_t = 2)]
    pub smoothing: usize,

    /// Literal marking the start of a reversal branch.
    #[arg(long, default_value = DEFAULT_BRANCH_MARKER)]
    pub marker: String,

    /// Record per-cell fit diagnostics in the audit log.
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable the progress line during the distribution scan.
    #[arg(long)]
    pub no_progress: bool,

    /// Export the rotated map to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export the raw-axes distribution to CSV.
    #[arg(long = "export-distribution")]
    pub export_distribution: Option<PathBuf>,

    /// Export the full run (axes + both grids) to JSON.
    #[arg(long = "export-map")]
    pub export_map: Option<PathBuf>,
}

/// Options for remanence-curve evaluation.
#[derive(Debug, Parser, Clone)]
pub struct RemanenceArgs {
    /// Remanence `.dat` file.
    pub input: PathBuf,

    /// Literal marking the IRM section.
    #[arg(long, default_value = "IRM MEASUREMENT")]
    pub marker_irm: String,

    /// Literal marking the DCD section.
    #[arg(long, default_value = "DCD MEASUREMENT")]
    pub marker_dcd: String,

    /// Saturation remanent moment (milli-emu) for the delta-M curve.
    #[arg(long)]
    pub saturation_moment: Option<f64>,

    /// Export the delta-M curve to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

/// Which measurement protocol to generate a sequence for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SequenceKind {
    Forc,
    Irmdcd,
}

/// Options for sequence generation.
#[derive(Debug, Parser, Clone)]
pub struct SequenceArgs {
    /// Protocol to generate.
    #[arg(value_enum)]
    pub kind: SequenceKind,

    /// Output path prefix; files are written as `<prefix>_<n>.seq`.
    pub prefix: PathBuf,

    /// Windows folder on the instrument host holding the chained files.
    #[arg(long)]
    pub storage_folder: String,

    /// Data-file name the instrument records into.
    #[arg(long)]
    pub savefile: String,

    /// Saturation field (oersted).
    #[arg(long)]
    pub sat_field: i64,

    /// Field step (oersted).
    #[arg(long)]
    pub field_step: i64,

    /// Field sweep rate (oersted/second).
    #[arg(long, default_value_t = 25)]
    pub sweep_rate: i64,

    /// Averaging time per point (seconds).
    #[arg(long, default_value_t = 1)]
    pub averaging_time: i64,
}

/// Options for synthetic file generation.
#[derive(Debug, Parser, Clone)]
pub struct SynthArgs {
    /// Output `.dat` path.
    pub out: PathBuf,

    /// Saturation field (tesla).
    #[arg(long, default_value_t = 1.0)]
    pub sat_field: f64,

    /// Field step (tesla).
    #[arg(long, default_value_t = 0.05)]
    pub field_step: f64,

    /// Moment noise standard deviation (emu).
    #[arg(long, default_value_t = 1e-5)]
    pub noise: f64,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}
