//! FORC `.dat` ingest.
//!
//! This module turns a raw PPMS VSM export into a list of reversal-branch
//! records that are safe to assemble into a grid.
//!
//! Design goals:
//! - **Strict schema** for the data section (clear errors, immediate abort)
//! - **Line-level recovery** (skip irregular lines, but report what happened)
//! - **Deterministic behavior** (an explicit state machine, not ad hoc flags)
//! - **Separation of concerns**: no grid assembly or fitting logic here
//!
//! The file layout is: an arbitrary preamble terminated by a `[Data]` line,
//! one comma-separated header line, then comma-separated data lines. A
//! configurable marker embedded in a line signals the start of a new
//! reversal branch; everything before the first marker is the saturation
//! sweep and is not part of any branch.

use std::collections::HashMap;
use std::io::BufRead;

use crate::audit::AuditLog;
use crate::domain::{Branch, BranchPoint, ColumnNames};
use crate::error::LoadError;
use crate::io::cursor::LineCursor;
use crate::math::round_dp;

/// Literal terminating the preamble of an instrument export.
pub const DATA_SENTINEL: &str = "[Data]";

/// Resolved input conventions for one FORC `.dat` load.
#[derive(Debug, Clone)]
pub struct DatSpec {
    /// Saturation field of the protocol (tesla).
    pub sat_field: f64,
    /// Field step between successive reversal fields (tesla).
    pub field_step: f64,
    /// Literal marking the start of a reversal branch.
    pub branch_marker: String,
    pub columns: ColumnNames,
}

/// Scanner state over the data section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Before the `[Data]` sentinel.
    Preamble,
    /// Inside the data section, before the first branch marker
    /// (pre-measurement saturation sweep).
    AwaitingFirstMarker,
    /// Accumulating points of the current reversal branch.
    InBranch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    /// Blank or `#`-prefixed comment.
    Ignorable,
    /// Contains the branch marker.
    Marker,
    /// Contains the data-section sentinel.
    Sentinel,
    /// Anything else: a comma-separated measurement line.
    Data,
}

fn classify(line: &str, marker: &str) -> LineKind {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        LineKind::Ignorable
    } else if line.contains(marker) {
        LineKind::Marker
    } else if line.contains(DATA_SENTINEL) {
        LineKind::Sentinel
    } else {
        LineKind::Data
    }
}

/// Pure transition function of the scanner.
///
/// The sentinel is only meaningful in the preamble; markers only matter once
/// the data section has started; nothing ever leaves `InBranch`.
fn next_state(state: ScanState, kind: LineKind) -> ScanState {
    match (state, kind) {
        (ScanState::Preamble, LineKind::Sentinel) => ScanState::AwaitingFirstMarker,
        (ScanState::Preamble, _) => ScanState::Preamble,
        (ScanState::AwaitingFirstMarker, LineKind::Marker) => ScanState::InBranch,
        (ScanState::AwaitingFirstMarker, _) => ScanState::AwaitingFirstMarker,
        (ScanState::InBranch, _) => ScanState::InBranch,
    }
}

/// Column indices resolved from the data-section header.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResolvedColumns {
    pub field: usize,
    pub moment: usize,
    pub moment_err: usize,
}

pub(crate) fn resolve_columns(
    header: &str,
    names: &ColumnNames,
) -> Result<ResolvedColumns, LoadError> {
    let index: HashMap<&str, usize> = header
        .trim_end()
        .split(',')
        .enumerate()
        .map(|(idx, name)| (name, idx))
        .collect();

    let find = |name: &str| -> Result<usize, LoadError> {
        index
            .get(name)
            .copied()
            .ok_or_else(|| LoadError::MissingColumn(name.to_string()))
    };

    // Temperature is part of the required schema but carries no data we use.
    let _ = find(&names.temperature)?;

    Ok(ResolvedColumns {
        field: find(&names.field)?,
        moment: find(&names.moment)?,
        moment_err: find(&names.moment_err)?,
    })
}

/// Convert a raw field value (oersted) to tesla, snapped to 3 decimals.
pub(crate) fn field_from_device(raw: f64) -> f64 {
    round_dp(raw / 1e4, 3)
}

/// Convert a raw moment or moment error (emu) to milli-emu.
pub(crate) fn moment_from_device(raw: f64) -> f64 {
    raw * 1e3
}

pub(crate) fn parse_data_line(
    line: &str,
    columns: &ResolvedColumns,
    line_number: usize,
    names: &ColumnNames,
) -> Result<BranchPoint, LoadError> {
    let fields: Vec<&str> = line.trim().split(',').collect();

    let value_at = |idx: usize, column: &str| -> Result<f64, LoadError> {
        let raw = fields.get(idx).copied().unwrap_or("");
        raw.trim().parse::<f64>().map_err(|_| LoadError::MalformedValue {
            line: line_number,
            column: column.to_string(),
            value: raw.to_string(),
        })
    };

    Ok(BranchPoint {
        field: field_from_device(value_at(columns.field, &names.field)?),
        moment: moment_from_device(value_at(columns.moment, &names.moment)?),
        moment_err: moment_from_device(value_at(columns.moment_err, &names.moment_err)?),
    })
}

/// Parse a FORC `.dat` stream into reversal branches.
///
/// Branches are returned in file order, i.e. descending nominal reversal
/// field: the n-th closed branch (n from 1) gets `sat_field - n * field_step`.
/// Every recovered irregularity is appended to `audit`; structural problems
/// abort with a [`LoadError`].
pub fn parse_forc_dat<R: BufRead>(
    reader: R,
    spec: &DatSpec,
    audit: &mut AuditLog,
) -> Result<Vec<Branch>, LoadError> {
    let mut cursor = LineCursor::new(reader);
    let mut state = ScanState::Preamble;

    // Preamble: skip everything until the section sentinel.
    while state == ScanState::Preamble {
        let Some(line) = cursor.next_line()? else {
            return Err(LoadError::MissingDataSection(DATA_SENTINEL));
        };
        state = next_state(state, classify(&line, &spec.branch_marker));
    }
    audit.push(format!("data section at line {}", cursor.line_number()));

    // Header: one comma-separated line naming all columns.
    let Some(header) = cursor.next_line()? else {
        return Err(LoadError::MissingColumn(spec.columns.temperature.clone()));
    };
    let columns = resolve_columns(&header, &spec.columns)?;
    audit.push(format!(
        "header resolved: field/moment/error at columns {}/{}/{}",
        columns.field, columns.moment, columns.moment_err
    ));

    let mut branches: Vec<Branch> = Vec::new();
    let mut buffer: Vec<BranchPoint> = Vec::new();

    while let Some(line) = cursor.next_line()? {
        let kind = classify(&line, &spec.branch_marker);
        let prev = state;
        state = next_state(state, kind);

        match kind {
            LineKind::Ignorable => {}
            LineKind::Marker => {
                if prev == ScanState::InBranch {
                    let n = branches.len() + 1;
                    branches.push(Branch {
                        reversal_field: spec.sat_field - n as f64 * spec.field_step,
                        points: std::mem::take(&mut buffer),
                    });
                }
                // In `AwaitingFirstMarker` the marker just opens branch 1.
            }
            LineKind::Data | LineKind::Sentinel => match prev {
                ScanState::AwaitingFirstMarker => {
                    audit.push(format!(
                        "line {}: data before first branch marker skipped (pre-measurement sweep)",
                        cursor.line_number()
                    ));
                }
                ScanState::InBranch => {
                    buffer.push(parse_data_line(
                        &line,
                        &columns,
                        cursor.line_number(),
                        &spec.columns,
                    )?);
                }
                ScanState::Preamble => unreachable!("preamble was fully consumed"),
            },
        }
    }

    // End of stream with an open branch. The file never closes its last
    // branch with a marker, so a trailing buffer is expected; keeping it only
    // when it outgrew the previous branch mirrors the instrument's habit of
    // truncating an aborted final sweep.
    if !buffer.is_empty() {
        let prev_len = branches.last().map_or(0, Branch::len);
        if buffer.len() > prev_len {
            let n = branches.len() + 1;
            audit.push(format!(
                "end of stream inside a branch: keeping trailing {} points as branch {n} \
                 (previous branch had {prev_len})",
                buffer.len()
            ));
            branches.push(Branch {
                reversal_field: spec.sat_field - n as f64 * spec.field_step,
                points: buffer,
            });
        } else {
            audit.push(format!(
                "end of stream inside a branch: dropping trailing {} points \
                 (previous branch had {prev_len})",
                buffer.len()
            ));
        }
    }

    Ok(branches)
}
