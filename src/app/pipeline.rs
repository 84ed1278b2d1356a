//! Shared map pipeline used by the CLI (and tests) end to end:
//!
//! parse -> assemble -> distribution fit -> rotation
//!
//! Keeping this in one place avoids duplicating the core workflow; the CLI
//! focuses on presentation and exports.

use std::fs::File;
use std::io::{BufRead, BufReader};

use crate::assemble::assemble;
use crate::audit::AuditLog;
use crate::domain::{ForcDistribution, MapConfig, MeasurementGrid, RotatedMap};
use crate::error::AppError;
use crate::fit::{compute_distribution, EngineOptions};
use crate::io::dat::{parse_forc_dat, DatSpec};
use crate::rotate::rotate_distribution;

/// All computed outputs of a single `forc map` run.
#[derive(Debug, Clone)]
pub struct MapRun {
    pub grid: MeasurementGrid,
    pub distribution: ForcDistribution,
    pub rotated: RotatedMap,
}

/// Execute the full map pipeline on a measurement file.
pub fn run_map(config: &MapConfig, audit: &mut AuditLog) -> Result<MapRun, AppError> {
    audit.push(format!("Opening {}", config.dat_path.display()));
    let file = File::open(&config.dat_path).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to open '{}': {e}", config.dat_path.display()),
        )
    })?;
    run_map_from_reader(BufReader::new(file), config, audit)
}

/// Execute the map pipeline on an already-open measurement stream.
///
/// This is the testable core of [`run_map`]; it performs no filesystem
/// access of its own.
pub fn run_map_from_reader<R: BufRead>(
    reader: R,
    config: &MapConfig,
    audit: &mut AuditLog,
) -> Result<MapRun, AppError> {
    let spec = DatSpec {
        sat_field: config.sat_field,
        field_step: config.field_step,
        branch_marker: config.branch_marker.clone(),
        columns: config.columns.clone(),
    };

    let branches = parse_forc_dat(reader, &spec, audit)?;
    audit.push(format!("parsed {} reversal branches", branches.len()));

    let grid = assemble(&branches, audit)?;

    let opts = EngineOptions {
        smoothing_factor: config.smoothing_factor,
        verbose: config.verbose,
        progress: config.progress,
    };
    let distribution = compute_distribution(&grid, &opts, audit)?;

    let rotated = rotate_distribution(&distribution, config.field_step, audit)?;

    Ok(MapRun {
        grid,
        distribution,
        rotated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::{synthetic_dat, SyntheticSpec};
    use crate::domain::ColumnNames;
    use crate::fit::FitDomain;

    fn config(sat: f64, step: f64, k: usize) -> MapConfig {
        MapConfig {
            dat_path: "test.dat".into(),
            sat_field: sat,
            field_step: step,
            smoothing_factor: k,
            branch_marker: "MEASURE STEP WISE".to_string(),
            columns: ColumnNames::default(),
            verbose: false,
            progress: false,
            export_csv: None,
            export_distribution: None,
            export_map: None,
        }
    }

    /// Hand-written file with 5 markers; each branch sweeps from its reversal
    /// field back to saturation at the field step. The trailing branch is
    /// longer than the last closed one, so it is flushed as branch 5.
    fn minimal_file(sat: f64, step: f64, markers: usize) -> String {
        let mut out = String::from("preamble\n[Data]\n");
        out.push_str("Comment,Temperature (K),Magnetic Field (Oe),Moment (emu),M. Std. Err. (emu)\n");
        for n in 1..=markers {
            out.push_str("\"MEASURE STEP WISE\",,,,\n");
            let reversal = sat - n as f64 * step;
            let points = ((sat - reversal) / step).round() as usize;
            for p in 0..=points {
                let h_b = reversal + p as f64 * step;
                // A moment with a mild field dependence and uniform errors.
                out.push_str(&format!(",300.0,{},{},0.0001\n", h_b * 1e4, 0.001 * h_b));
            }
        }
        out
    }

    #[test]
    fn minimal_run_yields_expected_axes_and_default_borders() {
        // 5 markers at H_sat=12, H_step=2: closed branches at 10/8/6/4 plus
        // the flushed trailing branch at 2.
        let text = minimal_file(12.0, 2.0, 5);
        let config = config(12.0, 2.0, 1);
        let mut audit = AuditLog::new();
        let run = run_map_from_reader(text.as_bytes(), &config, &mut audit).unwrap();

        assert_eq!(run.grid.h_a, vec![2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(run.grid.h_b, vec![2.0, 4.0, 6.0, 8.0, 10.0, 12.0]);
        assert_eq!(run.grid.m.shape(), (5, 6));

        // With k=1 this grid has no fittable interior: every cell stays at
        // the default.
        assert_eq!(run.distribution.fitted_cells, 0);
        assert!(run.distribution.rho.iter().all(|&v| v == 0.0));
        assert!(audit.events().iter().any(|e| e.contains("no fittable cells")));

        // The rotation still produces the full axis spans.
        assert_eq!(run.rotated.half_step, 1.0);
        assert_eq!(run.rotated.h_c.first().copied(), Some(-4.0));
        assert_eq!(run.rotated.h_c.last().copied(), Some(5.0));
        assert_eq!(run.rotated.h_u.first().copied(), Some(2.0));
        assert_eq!(run.rotated.h_u.last().copied(), Some(11.0));
    }

    #[test]
    fn synthetic_run_fits_interior_cells_and_rotates() {
        let spec = SyntheticSpec {
            sat_field: 1.0,
            field_step: 0.1,
            noise: 0.0,
            seed: 3,
        };
        let text = synthetic_dat(&spec);
        let config = config(1.0, 0.1, 1);
        let mut audit = AuditLog::new();
        let run = run_map_from_reader(text.as_bytes(), &config, &mut audit).unwrap();

        // 2 * 1.0 / 0.1 = 20 branches; the longest spans 21 field steps.
        assert_eq!(run.grid.rows(), 20);
        assert_eq!(run.grid.cols(), 21);
        assert!(run.distribution.fitted_cells > 0);
        assert_eq!(run.distribution.failed_cells, 0);

        // Non-zero densities appear only inside the triangular fit domain.
        let domain = FitDomain::new(20, 21, 1);
        for i in 0..20 {
            for j in 0..21 {
                if !domain.contains(i, j) {
                    assert_eq!(run.distribution.rho[(i, j)], 0.0);
                }
            }
        }
        assert!(run.distribution.rho.iter().any(|&v| v != 0.0));

        // The scatter landed on a single destination parity (fill ran).
        assert!(!audit
            .events()
            .iter()
            .any(|e| e.contains("both destination parities")));
        assert!(run.rotated.h_c.len() > 1);
        assert!(run.rotated.h_u.len() > 1);
    }

    #[test]
    fn structural_errors_abort_the_run() {
        let config = config(1.0, 0.1, 2);
        let mut audit = AuditLog::new();
        let err = run_map_from_reader("no data here\n".as_bytes(), &config, &mut audit).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
