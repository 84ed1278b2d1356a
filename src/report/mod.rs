//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the parsing/fitting code stays clean and testable
//! - output changes are localized (important for future snapshot tests)

use crate::audit::AuditLog;
use crate::domain::{ForcDistribution, MapConfig, MeasurementGrid, RotatedMap};

/// Format the full run summary (dataset stats + fit diagnostics + rotation).
pub fn format_map_summary(
    grid: &MeasurementGrid,
    dist: &ForcDistribution,
    map: &RotatedMap,
    config: &MapConfig,
    audit: &AuditLog,
) -> String {
    let mut out = String::new();

    out.push_str("=== forc - FORC distribution map ===\n");
    out.push_str(&format!("Input: {}\n", config.dat_path.display()));
    out.push_str(&format!(
        "Protocol: H_sat={} T, H_step={} T, marker=\"{}\"\n",
        config.sat_field, config.field_step, config.branch_marker
    ));

    out.push_str(&format!(
        "Grid: {} branches x {} field steps | H_a=[{:.3}, {:.3}] | H_b=[{:.3}, {:.3}]\n",
        grid.rows(),
        grid.cols(),
        span(&grid.h_a).0,
        span(&grid.h_a).1,
        span(&grid.h_b).0,
        span(&grid.h_b).1,
    ));

    out.push_str(&format!(
        "Fit: k={} | {} cells fitted, {} rejected\n",
        dist.smoothing_factor, dist.fitted_cells, dist.failed_cells
    ));

    out.push_str(&format!(
        "Rotated: {} H_c x {} H_u bins at half-step {} | H_c=[{:.3}, {:.3}] | H_u=[{:.3}, {:.3}]\n",
        map.h_c.len(),
        map.h_u.len(),
        map.half_step,
        span(&map.h_c).0,
        span(&map.h_c).1,
        span(&map.h_u).0,
        span(&map.h_u).1,
    ));

    out.push_str(&format!("Audit: {} events\n", audit.len()));

    out
}

fn span(values: &[f64]) -> (f64, f64) {
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;
    use std::path::PathBuf;

    #[test]
    fn summary_mentions_grid_and_fit_counts() {
        let grid = MeasurementGrid {
            h_a: vec![0.1, 0.2],
            h_b: vec![0.1, 0.2, 0.3],
            m: DMatrix::zeros(2, 3),
            s_m: DMatrix::zeros(2, 3),
        };
        let dist = ForcDistribution {
            h_a: grid.h_a.clone(),
            h_b: grid.h_b.clone(),
            rho: DMatrix::zeros(2, 3),
            smoothing_factor: 2,
            fitted_cells: 0,
            failed_cells: 0,
        };
        let map = RotatedMap {
            h_c: vec![0.0, 0.05],
            h_u: vec![0.1, 0.15],
            rho: DMatrix::zeros(2, 2),
            half_step: 0.05,
        };
        let config = MapConfig {
            dat_path: PathBuf::from("run.dat"),
            sat_field: 0.3,
            field_step: 0.1,
            smoothing_factor: 2,
            branch_marker: "MEASURE STEP WISE".to_string(),
            columns: Default::default(),
            verbose: false,
            progress: false,
            export_csv: None,
            export_distribution: None,
            export_map: None,
        };

        let text = format_map_summary(&grid, &dist, &map, &config, &AuditLog::new());
        assert!(text.contains("2 branches x 3 field steps"));
        assert!(text.contains("k=2"));
        assert!(text.contains("half-step 0.05"));
    }
}
