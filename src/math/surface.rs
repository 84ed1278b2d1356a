//! The local quadratic surface model.
//!
//! Around each grid cell the magnetization is modelled as
//!
//! ```text
//! M(Ha, Hb) = a1 + a2*Ha + a3*Ha^2 + a4*Hb + a5*Hb^2 + a6*Ha*Hb
//! ```
//!
//! The fitter relies on two primitive operations:
//! - build a design row for a given (Ha, Hb) pair (for the weighted solve)
//! - predict M(Ha, Hb) given coefficients (for diagnostics/tests)
//!
//! The mixed term `a6` is the payload: the FORC density at a cell is the
//! negated mixed second derivative of M, which for this model is `-a6`.

/// Number of surface coefficients.
pub const COEFF_COUNT: usize = 6;

/// Index of the mixed `Ha*Hb` coefficient within a design row.
pub const CROSS_COEFF: usize = 5;

/// Fill a design row for the surface model.
///
/// The row includes the constant term first (intercept).
///
/// # Panics
/// Panics if `out` does not have length [`COEFF_COUNT`]. Callers should size
/// the array correctly.
pub fn fill_design_row(ha: f64, hb: f64, out: &mut [f64]) {
    out[0] = 1.0;
    out[1] = ha;
    out[2] = ha * ha;
    out[3] = hb;
    out[4] = hb * hb;
    out[5] = ha * hb;
}

/// Predict `M(Ha, Hb)` for the given coefficients.
pub fn predict(ha: f64, hb: f64, coeffs: &[f64]) -> f64 {
    coeffs[0]
        + coeffs[1] * ha
        + coeffs[2] * ha * ha
        + coeffs[3] * hb
        + coeffs[4] * hb * hb
        + coeffs[5] * ha * hb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn design_row_matches_predict() {
        let coeffs = [0.5, -1.0, 2.0, 3.0, -0.25, 1.5];
        let (ha, hb) = (-0.3, 0.7);

        let mut row = [0.0; COEFF_COUNT];
        fill_design_row(ha, hb, &mut row);
        let from_row: f64 = row.iter().zip(coeffs.iter()).map(|(r, c)| r * c).sum();

        assert!((from_row - predict(ha, hb, &coeffs)).abs() < 1e-12);
    }

    #[test]
    fn cross_coeff_indexes_mixed_term() {
        let mut row = [0.0; COEFF_COUNT];
        fill_design_row(2.0, 5.0, &mut row);
        assert_eq!(row[CROSS_COEFF], 10.0);
    }
}
