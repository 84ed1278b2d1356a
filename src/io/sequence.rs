//! Instrument control-sequence generation.
//!
//! The Evercool/PPMS sequence editor executes `.seq` command files but
//! refuses very long ones, so a measurement is split into a chain of files
//! linked by `CHN` commands: whenever a file exceeds 100 lines the writer
//! closes it with a `CHN` pointing at the next file and continues there.
//!
//! Fields here are in raw device units (oersted) because the values are
//! written verbatim into instrument commands.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::AppError;

/// Maximum command lines per `.seq` file before chaining.
const CHAIN_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub struct SequenceSpec {
    /// Windows folder on the instrument host where the chain will live.
    pub storage_folder: String,
    /// Data-file name the instrument will record into.
    pub savefile_name: String,
    /// Saturation field (oersted).
    pub saturation_field: i64,
    /// Field step (oersted).
    pub field_step: i64,
    /// Field sweep rate (oersted/second).
    pub sweep_rate: i64,
    /// Averaging time per point (seconds).
    pub averaging_time: i64,
}

/// Result of writing one sequence chain.
#[derive(Debug, Clone)]
pub struct SequenceOutput {
    pub files: Vec<PathBuf>,
    /// Number of measurement steps the chain performs.
    pub measurements: usize,
}

/// Writer for one chain of `.seq` files.
struct SeqChain<'a> {
    prefix: &'a Path,
    spec: &'a SequenceSpec,
    file: File,
    lines: usize,
    index: usize,
    written: Vec<PathBuf>,
}

impl<'a> SeqChain<'a> {
    fn start(prefix: &'a Path, spec: &'a SequenceSpec, initial_lines: usize) -> Result<Self, AppError> {
        let path = chain_path(prefix, 0);
        let file = create(&path)?;
        Ok(Self {
            prefix,
            spec,
            file,
            lines: initial_lines,
            index: 0,
            written: vec![path],
        })
    }

    fn push(&mut self, line: impl AsRef<str>) -> Result<(), AppError> {
        writeln!(self.file, "{}", line.as_ref()).map_err(io_err)
    }

    /// Chain to the next file if the current one is over the line limit.
    fn chain_if_needed(&mut self) -> Result<(), AppError> {
        if self.lines <= CHAIN_LIMIT {
            return Ok(());
        }
        self.index += 1;
        let path = chain_path(self.prefix, self.index);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        // The instrument resolves chained files inside its own storage
        // folder; `CHN` is the last command and carries no newline.
        write!(self.file, "CHN {}\\{}", self.spec.storage_folder, name).map_err(io_err)?;
        self.file = create(&path)?;
        self.push(format!(
            "VSMDF \"{}\\{}\" 0 1 \"\"",
            self.spec.storage_folder, self.spec.savefile_name
        ))?;
        self.lines = 1;
        self.written.push(path);
        Ok(())
    }

    fn finish(self, measurements: usize) -> SequenceOutput {
        SequenceOutput {
            files: self.written,
            measurements,
        }
    }
}

/// Write the sequence chain for a FORC measurement.
///
/// Saturate once, then for each of `N = 2 * H_sat / H_step` reversal fields:
/// ramp down, wait, and measure stepwise back up to saturation.
pub fn write_forc_sequence(prefix: &Path, spec: &SequenceSpec) -> Result<SequenceOutput, AppError> {
    let sat = spec.saturation_field;
    let step = spec.field_step;
    if step <= 0 || sat <= 0 {
        return Err(AppError::new(2, "Saturation field and field step must be positive."));
    }
    let n = (2 * sat / step) as usize;

    let mut chain = SeqChain::start(prefix, spec, 8)?;
    chain.push("WAI WAITFOR 5 0 0 0 0 0")?;
    chain.push(format!(
        "VSMDF \"{}\\{}\" 0 0 \"\"",
        spec.storage_folder, spec.savefile_name
    ))?;
    chain.push("VSMLS 1 0 0 0 0 0")?;
    chain.push("VSMCM \"Saturate sample\"")?;
    chain.push(format!("FLD FIELD {sat} 100.0 0 0"))?;
    chain.push("WAI WAITFOR 5 0 1 0 0 0")?;

    for i in 1..=n as i64 {
        chain.chain_if_needed()?;
        let min_field = sat - i * step;
        chain.push(format!(
            "VSMCM \"Measure step wise from {min_field} to {sat}\""
        ))?;
        chain.push(format!("FLD FIELD {min_field} {} 0 1", spec.sweep_rate))?;
        chain.push("WAI WAITFOR 1 0 1 0 0 0")?;
        chain.push(format!(
            "VSMMH 1 36208647 0 1 0 2 40 {} 0 2 0 1 2 -90000 {min_field} {sat} {} 0 2 {step} 0 1 0 0 1 0 \"A/C,0,10,10,0\" \"Q/M,0,\" ",
            spec.averaging_time, spec.sweep_rate
        ))?;
        chain.lines += 4;
    }
    chain.push("FLD FIELD 0.0 100.0 0 0")?;

    Ok(chain.finish(n))
}

/// Write the sequence chain for an IRM/DCD measurement.
///
/// IRM loop: prepare at `+i * H_step`, measure at zero. DCD loop: prepare at
/// `-i * H_step`, measure at zero. `N = H_sat / H_step` steps each.
pub fn write_irmdcd_sequence(prefix: &Path, spec: &SequenceSpec) -> Result<SequenceOutput, AppError> {
    let sat = spec.saturation_field;
    let step = spec.field_step;
    if step <= 0 || sat <= 0 {
        return Err(AppError::new(2, "Saturation field and field step must be positive."));
    }
    let n = (sat / step) as usize;

    let mut chain = SeqChain::start(prefix, spec, 4)?;
    chain.push("WAI WAITFOR 5 0 0 0 0 0")?;
    chain.push(format!(
        "VSMDF \"{}\\{}\" 0 0 \"\"",
        spec.storage_folder, spec.savefile_name
    ))?;
    chain.push("VSMLS 1 0 0 0 0 0")?;
    chain.push("VSMCM \"IRM Measurement\"")?;

    for i in 1..=n as i64 {
        chain.chain_if_needed()?;
        write_remanence_step(&mut chain, i * step)?;
    }

    chain.push("VSMCM \"DCD Measurement\"")?;
    chain.lines += 1;
    for i in 1..=n as i64 {
        chain.chain_if_needed()?;
        write_remanence_step(&mut chain, -i * step)?;
    }

    chain.push("FLD FIELD 0.0 100.0 0 0")?;

    Ok(chain.finish(2 * n))
}

/// One IRM/DCD step: set the field and measure once, return to zero and
/// measure once.
fn write_remanence_step(chain: &mut SeqChain<'_>, field: i64) -> Result<(), AppError> {
    let rate = chain.spec.sweep_rate;
    let avg = chain.spec.averaging_time;
    chain.push(format!("FLD FIELD {field} {rate} 0 1"))?;
    chain.push("WAI WAITFOR 1 0 1 0 0 0")?;
    chain.push(format!(
        "VSMCO 200 36208647 0 1 0 2 40 {avg} 0 2 0 \"A/C,0,10,10,0\" \"Q/M,0,\""
    ))?;
    chain.push(format!("FLD FIELD 0.0 {rate} 0 1"))?;
    chain.push("WAI WAITFOR 1 0 1 0 0 0")?;
    chain.push(format!(
        "VSMCO 200 36208647 0 1 0 2 40 {avg} 0 2 0 \"A/C,0,10,10,0\" \"Q/M,0,\""
    ))?;
    chain.lines += 6;
    Ok(())
}

fn chain_path(prefix: &Path, index: usize) -> PathBuf {
    let stem = prefix
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sequence".to_string());
    match prefix.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(format!("{stem}_{index}.seq")),
        _ => PathBuf::from(format!("{stem}_{index}.seq")),
    }
}

fn create(path: &Path) -> Result<File, AppError> {
    File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create sequence file '{}': {e}", path.display())))
}

fn io_err(e: std::io::Error) -> AppError {
    AppError::new(2, format!("Failed to write sequence file: {e}"))
}
