//! The fittable cell domain.
//!
//! Only points with measurement field at or above the reversal field are
//! physically meaningful, so the set of cells a local window fit may be
//! centered on is triangular, not rectangular: the lower column bound grows
//! with the row index. On top of that, a window of half-width `k` needs
//! `2k` cells of margin toward every border.
//!
//! The predicate lives here, separate from the scan loops, so the domain
//! shape is testable on its own.

/// The set of grid cells a `2k x 2k` window fit may be centered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitDomain {
    rows: usize,
    cols: usize,
    k: usize,
}

impl FitDomain {
    pub fn new(rows: usize, cols: usize, smoothing_factor: usize) -> Self {
        Self {
            rows,
            cols,
            k: smoothing_factor,
        }
    }

    /// Whether a window fit may be centered on `(i, j)`.
    ///
    /// Rows: `i in [2k, rows - 2k)`. Columns: `j in [i + 2k, cols - 2k)`;
    /// the row-dependent lower bound keeps the window inside the measured
    /// triangle.
    pub fn contains(&self, i: usize, j: usize) -> bool {
        let margin = 2 * self.k;
        i >= margin
            && i + margin < self.rows
            && j >= i + margin
            && j + margin < self.cols
    }

    /// Whether any cell of row `i` is fittable.
    pub fn row_is_fittable(&self, i: usize) -> bool {
        let margin = 2 * self.k;
        i >= margin && i + margin < self.rows && i + 2 * margin < self.cols
    }

    pub fn is_empty(&self) -> bool {
        !(0..self.rows).any(|i| self.row_is_fittable(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn border_cells_are_excluded() {
        let d = FitDomain::new(20, 30, 2);
        for i in 0..20 {
            for j in 0..30 {
                if i < 4 || i >= 16 || j >= 26 {
                    assert!(!d.contains(i, j), "({i},{j}) should be outside");
                }
            }
        }
        assert!(d.contains(4, 8));
        assert!(d.contains(15, 25));
    }

    #[test]
    fn column_bound_tracks_row_index() {
        let d = FitDomain::new(20, 30, 2);
        for i in 4..16 {
            assert!(!d.contains(i, i + 3));
            assert!(d.contains(i, i + 4));
        }
    }

    #[test]
    fn small_grids_have_empty_domain() {
        assert!(FitDomain::new(4, 4, 1).is_empty());
        assert!(FitDomain::new(8, 8, 2).is_empty());
        assert!(!FitDomain::new(5, 9, 1).is_empty());
    }

    #[test]
    fn minimal_grid_single_fittable_row() {
        // rows=5, cols=9, k=1: only row 2, columns [4, 7).
        let d = FitDomain::new(5, 9, 1);
        for i in 0..5 {
            assert_eq!(d.row_is_fittable(i), i == 2);
        }
        for j in 0..9 {
            assert_eq!(d.contains(2, j), (4..7).contains(&j));
        }
    }
}
