//! Per-cell distribution fitting.
//!
//! For every fittable cell a `2k x 2k` window of measurements around it is
//! fit to the local quadratic surface, minimizing the error-weighted
//! residual `(M - model) / sM`. The negated mixed coefficient is the FORC
//! density of the cell.
//!
//! The model is linear in its coefficients, so each window is one weighted
//! least-squares solve. Cells are mutually independent given the read-only
//! input grids; the scan parallelizes over rows with disjoint output writes
//! and the per-row anomaly notes are merged in row order afterwards, keeping
//! the audit log deterministic.

use std::sync::atomic::{AtomicUsize, Ordering};

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::audit::AuditLog;
use crate::domain::{ForcDistribution, MeasurementGrid};
use crate::error::AppError;
use crate::fit::window::FitDomain;
use crate::math::{fill_design_row, solve_least_squares, COEFF_COUNT, CROSS_COEFF};

/// Options controlling one distribution scan.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Half-width of the fit window in grid steps (`k`); must be >= 1.
    pub smoothing_factor: usize,
    /// Record per-cell fit diagnostics in the audit log.
    pub verbose: bool,
    /// Print a rate-limited progress line to stderr.
    pub progress: bool,
}

struct RowResult {
    row: usize,
    /// `(column, density)` for every successfully fitted cell.
    values: Vec<(usize, f64)>,
    notes: Vec<String>,
    failed: usize,
}

/// Compute the FORC distribution of an assembled measurement grid.
pub fn compute_distribution(
    grid: &MeasurementGrid,
    opts: &EngineOptions,
    audit: &mut AuditLog,
) -> Result<ForcDistribution, AppError> {
    let k = opts.smoothing_factor;
    if k < 1 {
        return Err(AppError::new(2, "Smoothing factor must be >= 1."));
    }

    let rows = grid.rows();
    let cols = grid.cols();
    let domain = FitDomain::new(rows, cols, k);
    if domain.is_empty() {
        audit.push(format!(
            "no fittable cells: grid {rows}x{cols} is too small for smoothing factor {k}"
        ));
    }

    let progress = ProgressLine::new(rows, opts.progress);

    // Row-parallel scan; `collect` preserves row order.
    let row_results: Vec<RowResult> = (0..rows)
        .into_par_iter()
        .map(|i| {
            let mut result = RowResult {
                row: i,
                values: Vec::new(),
                notes: Vec::new(),
                failed: 0,
            };
            for j in 0..cols {
                if !domain.contains(i, j) {
                    continue;
                }
                match fit_cell(grid, i, j, k) {
                    Ok(coeffs) => {
                        if opts.verbose {
                            result.notes.push(format!(
                                "cell ({i},{j}): a1={:.6e} a6={:.6e}",
                                coeffs[0], coeffs[CROSS_COEFF]
                            ));
                        }
                        result.values.push((j, -coeffs[CROSS_COEFF]));
                    }
                    Err(reason) => {
                        result.failed += 1;
                        result.notes.push(format!(
                            "cell ({i},{j}): fit rejected, cell left at default: {reason}"
                        ));
                    }
                }
            }
            progress.tick();
            result
        })
        .collect();

    progress.finish();

    let mut rho = DMatrix::<f64>::zeros(rows, cols);
    let mut fitted_cells = 0;
    let mut failed_cells = 0;
    for r in row_results {
        for (j, value) in &r.values {
            rho[(r.row, *j)] = *value;
        }
        fitted_cells += r.values.len();
        failed_cells += r.failed;
        audit.extend(r.notes);
    }

    audit.push(format!(
        "distribution fit: {fitted_cells} cells fitted, {failed_cells} rejected (k={k})"
    ));

    Ok(ForcDistribution {
        h_a: grid.h_a.clone(),
        h_b: grid.h_b.clone(),
        rho,
        smoothing_factor: k,
        fitted_cells,
        failed_cells,
    })
}

/// Weighted surface fit of the `2k x 2k` window centered on `(i, j)`.
///
/// Rows of the design matrix and the observation vector are scaled by
/// `1 / sM`, turning the error-weighted objective into an ordinary
/// least-squares problem.
fn fit_cell(grid: &MeasurementGrid, i: usize, j: usize, k: usize) -> Result<DVector<f64>, String> {
    let n_obs = 4 * k * k;
    let mut x = DMatrix::<f64>::zeros(n_obs, COEFF_COUNT);
    let mut y = DVector::<f64>::zeros(n_obs);
    let mut design = [0.0; COEFF_COUNT];

    let mut r = 0;
    for wi in (i - k)..(i + k) {
        for wj in (j - k)..(j + k) {
            let s_m = grid.s_m[(wi, wj)];
            if !(s_m.is_finite() && s_m > 0.0) {
                return Err(format!("non-positive moment error at ({wi},{wj})"));
            }
            let m = grid.m[(wi, wj)];
            if !m.is_finite() {
                return Err(format!("non-finite moment at ({wi},{wj})"));
            }
            let w = 1.0 / s_m;

            fill_design_row(grid.h_a[wi], grid.h_b[wj], &mut design);
            for c in 0..COEFF_COUNT {
                x[(r, c)] = design[c] * w;
            }
            y[r] = m * w;
            r += 1;
        }
    }

    solve_least_squares(&x, &y).ok_or_else(|| "singular weighted system".to_string())
}

/// Rate-limited `\r` progress line, safe under the row-parallel scan: each
/// update is a single atomic counter read plus one stderr write.
struct ProgressLine {
    total: usize,
    step: usize,
    done: AtomicUsize,
    enabled: bool,
}

impl ProgressLine {
    fn new(total: usize, enabled: bool) -> Self {
        Self {
            total,
            step: (total / 20).max(1),
            done: AtomicUsize::new(0),
            enabled,
        }
    }

    fn tick(&self) {
        if !self.enabled {
            return;
        }
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if done % self.step == 0 || done == self.total {
            eprint!("\rFitting row {done}/{}", self.total);
        }
    }

    fn finish(&self) {
        if self.enabled && self.total > 0 {
            eprintln!();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::predict;

    /// Grid whose moments lie exactly on a known quadratic surface with
    /// uniform unit errors.
    fn quadratic_grid(rows: usize, cols: usize, coeffs: &[f64; COEFF_COUNT]) -> MeasurementGrid {
        let h_a: Vec<f64> = (0..rows).map(|i| -0.5 + 0.1 * i as f64).collect();
        let h_b: Vec<f64> = (0..cols).map(|j| -0.5 + 0.1 * j as f64).collect();
        let m = DMatrix::from_fn(rows, cols, |i, j| predict(h_a[i], h_b[j], coeffs));
        let s_m = DMatrix::from_element(rows, cols, 1.0);
        MeasurementGrid { h_a, h_b, m, s_m }
    }

    fn opts(k: usize) -> EngineOptions {
        EngineOptions {
            smoothing_factor: k,
            verbose: false,
            progress: false,
        }
    }

    #[test]
    fn recovers_known_mixed_coefficient() {
        let coeffs = [2.0, -1.0, 0.5, 3.0, -0.75, 4.25];
        let grid = quadratic_grid(12, 20, &coeffs);

        for k in [1usize, 2] {
            let mut audit = AuditLog::new();
            let dist = compute_distribution(&grid, &opts(k), &mut audit).unwrap();
            let domain = FitDomain::new(12, 20, k);

            let mut checked = 0;
            for i in 0..12 {
                for j in 0..20 {
                    if domain.contains(i, j) {
                        assert!(
                            (dist.rho[(i, j)] - (-coeffs[CROSS_COEFF])).abs() < 1e-6,
                            "k={k} cell ({i},{j}): got {}",
                            dist.rho[(i, j)]
                        );
                        checked += 1;
                    }
                }
            }
            assert!(checked > 0);
            assert_eq!(dist.fitted_cells, checked);
            assert_eq!(dist.failed_cells, 0);
        }
    }

    #[test]
    fn cells_outside_domain_stay_at_default() {
        let coeffs = [1.0, 0.0, 0.0, 0.0, 0.0, 2.0];
        let grid = quadratic_grid(12, 20, &coeffs);

        for k in [1usize, 2] {
            let mut audit = AuditLog::new();
            let dist = compute_distribution(&grid, &opts(k), &mut audit).unwrap();
            let domain = FitDomain::new(12, 20, k);

            for i in 0..12 {
                for j in 0..20 {
                    if !domain.contains(i, j) {
                        assert_eq!(dist.rho[(i, j)], 0.0, "k={k} cell ({i},{j})");
                    }
                }
            }
        }
    }

    #[test]
    fn zero_error_window_rejects_cell_and_logs() {
        let coeffs = [1.0, 0.0, 0.0, 0.0, 0.0, 2.0];
        let mut grid = quadratic_grid(12, 20, &coeffs);
        // Poison one measurement error inside the window of cell (4, 8).
        grid.s_m[(4, 8)] = 0.0;

        let mut audit = AuditLog::new();
        let dist = compute_distribution(&grid, &opts(2), &mut audit).unwrap();

        assert_eq!(dist.rho[(4, 8)], 0.0);
        assert!(dist.failed_cells >= 1);
        assert!(audit.events().iter().any(|e| e.contains("fit rejected")));
    }

    #[test]
    fn smoothing_factor_zero_is_an_error() {
        let grid = quadratic_grid(6, 10, &[0.0; COEFF_COUNT]);
        let mut audit = AuditLog::new();
        assert!(compute_distribution(&grid, &opts(0), &mut audit).is_err());
    }

    #[test]
    fn tiny_grid_yields_all_default_cells() {
        let grid = quadratic_grid(4, 4, &[1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        let mut audit = AuditLog::new();
        let dist = compute_distribution(&grid, &opts(2), &mut audit).unwrap();

        assert_eq!(dist.fitted_cells, 0);
        assert!(dist.rho.iter().all(|&v| v == 0.0));
        assert!(audit.events().iter().any(|e| e.contains("no fittable cells")));
    }
}
