//! Branch-to-grid assembly.
//!
//! Branches come out of the parser in measurement order: descending nominal
//! reversal field, each sweeping up to saturation. The outermost branch (the
//! lowest reversal field, collected last) spans the full measurement-field
//! axis; every earlier branch is a suffix of it, shrunk from the low-field
//! side. Assembly therefore right-aligns each branch against the axis of the
//! longest branch and zero-fills the leading cells, then reverses the
//! reversal-field axis so both axes ascend.
//!
//! Zero-filled cells are physically invalid, not true zeros; the fit domain
//! downstream never reaches them.

use nalgebra::DMatrix;

use crate::audit::AuditLog;
use crate::domain::{Branch, MeasurementGrid};
use crate::error::AppError;

/// Align variable-length branches into a rectangular measurement grid.
pub fn assemble(branches: &[Branch], audit: &mut AuditLog) -> Result<MeasurementGrid, AppError> {
    if branches.is_empty() {
        return Err(AppError::new(3, "No branches to assemble."));
    }

    // Measurement-field axis: the longest branch (last on ties, which is the
    // outermost sweep in well-formed files).
    let axis_branch = branches
        .iter()
        .enumerate()
        .max_by_key(|(idx, b)| (b.len(), *idx))
        .map(|(_, b)| b)
        .expect("branches is non-empty");
    if axis_branch.is_empty() {
        return Err(AppError::new(3, "All branches are empty."));
    }

    let rows = branches.len();
    let cols = axis_branch.len();
    let h_b: Vec<f64> = axis_branch.points.iter().map(|p| p.field).collect();

    let mut m = DMatrix::<f64>::zeros(rows, cols);
    let mut s_m = DMatrix::<f64>::zeros(rows, cols);
    let mut h_a = vec![0.0; rows];

    for (i, branch) in branches.iter().enumerate() {
        // Reverse row order so the reversal-field axis ascends.
        let row = rows - 1 - i;
        h_a[row] = branch.reversal_field;

        let offset = cols - branch.len();
        for (idx, p) in branch.points.iter().enumerate() {
            m[(row, offset + idx)] = p.moment;
            s_m[(row, offset + idx)] = p.moment_err;
        }
    }

    audit.push(format!(
        "assembled measurement grid: {rows} branches x {cols} field steps"
    ));

    debug_assert_eq!(m.shape(), (h_a.len(), h_b.len()));
    debug_assert_eq!(s_m.shape(), m.shape());

    Ok(MeasurementGrid { h_a, h_b, m, s_m })
}
