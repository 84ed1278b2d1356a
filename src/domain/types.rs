//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - produced and consumed in-memory during the pipeline
//! - exported to CSV/JSON for plotting or comparisons
//!
//! Field values are in tesla, moments in milli-emu throughout; raw device
//! units (oersted, emu) exist only inside the `.dat` parsers.

use std::path::PathBuf;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// One measured point of a reversal branch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchPoint {
    /// Measurement field (tesla).
    pub field: f64,
    /// Magnetic moment (milli-emu).
    pub moment: f64,
    /// Reported standard error of the moment (milli-emu).
    pub moment_err: f64,
}

/// One reversal-to-saturation sweep of a FORC measurement.
///
/// The reversal field is nominal: it is derived from the configured
/// saturation field and field step, not read back from the file. The file's
/// own field values populate the measurement axis only.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    /// Nominal reversal field this branch started from (tesla).
    pub reversal_field: f64,
    pub points: Vec<BranchPoint>,
}

impl Branch {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Rectangular measurement grid assembled from variable-length branches.
///
/// `m[(i, j)]` is the moment measured at reversal field `h_a[i]` and
/// measurement field `h_b[j]`; `s_m` holds the matching standard errors.
/// Both axes ascend. Cells a short branch never reached are zero-filled and
/// physically invalid: zero here means "not measured", not "zero moment".
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementGrid {
    /// Reversal-field axis (tesla, ascending).
    pub h_a: Vec<f64>,
    /// Measurement-field axis (tesla, ascending).
    pub h_b: Vec<f64>,
    pub m: DMatrix<f64>,
    pub s_m: DMatrix<f64>,
}

impl MeasurementGrid {
    pub fn rows(&self) -> usize {
        self.h_a.len()
    }

    pub fn cols(&self) -> usize {
        self.h_b.len()
    }
}

/// FORC density on the raw (reversal, measurement) field grid.
///
/// Shares the shape of the measurement grid it was fit from. A border of
/// width `2 * smoothing_factor` on every axis is never fitted and stays at
/// the default 0, as do cells whose local fit failed.
#[derive(Debug, Clone, PartialEq)]
pub struct ForcDistribution {
    pub h_a: Vec<f64>,
    pub h_b: Vec<f64>,
    /// Local FORC density, `-a6` of the per-cell quadratic surface fit.
    pub rho: DMatrix<f64>,
    pub smoothing_factor: usize,
    /// Cells whose fit produced a finite density.
    pub fitted_cells: usize,
    /// Cells inside the fittable domain whose fit was rejected.
    pub failed_cells: usize,
}

/// FORC density regridded onto (coercive, interaction) field axes.
///
/// Known limitation inherited from the measurement geometry: an unpopulated
/// cell is numerically indistinguishable from a true zero.
#[derive(Debug, Clone, PartialEq)]
pub struct RotatedMap {
    /// Coercive-field axis `(h_b - h_a) / 2` (tesla, ascending).
    pub h_c: Vec<f64>,
    /// Interaction-field axis `(h_b + h_a) / 2` (tesla, ascending).
    pub h_u: Vec<f64>,
    pub rho: DMatrix<f64>,
    /// Bin width of both axes: half the native field step.
    pub half_step: f64,
}

/// Header names of the four required data columns.
///
/// These are a configuration constant of the instrument export, not parser
/// syntax; the defaults match the PPMS VSM `.dat` format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnNames {
    pub temperature: String,
    pub field: String,
    pub moment: String,
    pub moment_err: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            temperature: "Temperature (K)".to_string(),
            field: "Magnetic Field (Oe)".to_string(),
            moment: "Moment (emu)".to_string(),
            moment_err: "M. Std. Err. (emu)".to_string(),
        }
    }
}

/// Default marker signalling the start of a new reversal branch.
pub const DEFAULT_BRANCH_MARKER: &str = "MEASURE STEP WISE";

/// A full `forc map` run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct MapConfig {
    pub dat_path: PathBuf,
    /// Saturation field of the measurement protocol (tesla).
    pub sat_field: f64,
    /// Field step between successive reversal fields (tesla).
    pub field_step: f64,
    /// Half-width (in grid steps) of the local fit window; default 2.
    pub smoothing_factor: usize,
    /// Literal marking the start of a reversal branch in the file.
    pub branch_marker: String,
    pub columns: ColumnNames,
    /// Record per-cell fit diagnostics in the audit log.
    pub verbose: bool,
    /// Print a rate-limited progress line during the distribution scan.
    pub progress: bool,

    pub export_csv: Option<PathBuf>,
    pub export_distribution: Option<PathBuf>,
    pub export_map: Option<PathBuf>,
}

/// A saved map file (JSON).
///
/// The grids are stored row-major as nested vectors so the schema stays
/// readable from any plotting environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapFile {
    pub tool: String,
    pub sat_field: f64,
    pub field_step: f64,
    pub smoothing_factor: usize,
    pub h_a: Vec<f64>,
    pub h_b: Vec<f64>,
    pub distribution: Vec<Vec<f64>>,
    pub h_c: Vec<f64>,
    pub h_u: Vec<f64>,
    pub rotated: Vec<Vec<f64>>,
}
