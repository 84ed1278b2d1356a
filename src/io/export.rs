//! Export computed grids to CSV and JSON.
//!
//! CSV exports are long-format (one row per cell) so they are easy to
//! consume in spreadsheets or downstream plotting scripts; the JSON map file
//! is the portable representation of a full run (axes + both grids).

use std::fs::File;
use std::io::Write;
use std::path::Path;

use nalgebra::DMatrix;

use crate::domain::{ForcDistribution, MapConfig, MapFile, RotatedMap};
use crate::error::AppError;
use crate::io::irmdcd::DeltaMPoint;

/// Write the raw-axes FORC distribution to a CSV file.
pub fn write_distribution_csv(path: &Path, dist: &ForcDistribution) -> Result<(), AppError> {
    let mut file = create(path)?;
    writeln!(file, "h_a,h_b,rho").map_err(|e| write_err(path, e))?;
    for (i, &ha) in dist.h_a.iter().enumerate() {
        for (j, &hb) in dist.h_b.iter().enumerate() {
            writeln!(file, "{ha},{hb},{:.10}", dist.rho[(i, j)]).map_err(|e| write_err(path, e))?;
        }
    }
    Ok(())
}

/// Write the rotated map to a CSV file.
pub fn write_rotated_csv(path: &Path, map: &RotatedMap) -> Result<(), AppError> {
    let mut file = create(path)?;
    writeln!(file, "h_c,h_u,rho").map_err(|e| write_err(path, e))?;
    for (i, &hc) in map.h_c.iter().enumerate() {
        for (j, &hu) in map.h_u.iter().enumerate() {
            writeln!(file, "{hc},{hu},{:.10}", map.rho[(i, j)]).map_err(|e| write_err(path, e))?;
        }
    }
    Ok(())
}

/// Write a delta-M curve to a CSV file.
pub fn write_delta_m_csv(path: &Path, points: &[DeltaMPoint]) -> Result<(), AppError> {
    let mut file = create(path)?;
    writeln!(file, "field,delta_m").map_err(|e| write_err(path, e))?;
    for p in points {
        writeln!(file, "{},{:.10}", p.field, p.delta).map_err(|e| write_err(path, e))?;
    }
    Ok(())
}

/// Assemble the portable map-file value for a completed run.
pub fn to_map_file(dist: &ForcDistribution, map: &RotatedMap, config: &MapConfig) -> MapFile {
    MapFile {
        tool: "forc".to_string(),
        sat_field: config.sat_field,
        field_step: config.field_step,
        smoothing_factor: dist.smoothing_factor,
        h_a: dist.h_a.clone(),
        h_b: dist.h_b.clone(),
        distribution: matrix_rows(&dist.rho),
        h_c: map.h_c.clone(),
        h_u: map.h_u.clone(),
        rotated: matrix_rows(&map.rho),
    }
}

/// Write a map JSON file.
pub fn write_map_json(path: &Path, map_file: &MapFile) -> Result<(), AppError> {
    let file = create(path)?;
    serde_json::to_writer_pretty(file, map_file)
        .map_err(|e| AppError::new(2, format!("Failed to write map JSON '{}': {e}", path.display())))?;
    Ok(())
}

fn matrix_rows(m: &DMatrix<f64>) -> Vec<Vec<f64>> {
    (0..m.nrows())
        .map(|i| (0..m.ncols()).map(|j| m[(i, j)]).collect())
        .collect()
}

fn create(path: &Path) -> Result<File, AppError> {
    File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export file '{}': {e}", path.display())))
}

fn write_err(path: &Path, e: std::io::Error) -> AppError {
    AppError::new(2, format!("Failed to write export file '{}': {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_rows_is_row_major() {
        let m = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(matrix_rows(&m), vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
    }
}
