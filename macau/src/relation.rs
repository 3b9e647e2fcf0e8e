use sprs::{CsMat, CsVecView, TriMat};
use std::sync::Arc;

use crate::errors::{Axis, MacauError, Result};

/// A sparse two-dimensional relation of real-valued observations (e.g., user-item ratings).
///
/// Two compressed views are kept: one grouped by row and one grouped by column, so that
/// either side of the factorization can walk the observations of one of its entities
/// without scanning the whole relation. Both views are shared behind an `Arc`, so cloning
/// (or transposing) a relation is cheap.
///
/// Nonzeros are enumerated in row-major order, `(row, col)` ascending. This order does not
/// depend on the order of the triplets the relation was built from.
#[derive(Debug, Clone)]
pub struct Relation {
    by_row: Arc<CsMat<f64>>,
    by_col: Arc<CsMat<f64>>,
}

fn sorted_order(outer: &[usize], inner: &[usize]) -> Vec<usize> {
    let mut order = (0..outer.len()).collect::<Vec<_>>();
    order.sort_unstable_by_key(|&position| (outer[position], inner[position]));
    order
}

impl Relation {
    /// Builds a relation from parallel arrays of `(row, col, value)` triplets and explicit
    /// extents. Fails if an index falls outside `[0, extent)`, if the arrays have different
    /// lengths or if a `(row, col)` pair appears more than once.
    pub fn from_triplets(
        rows: &[usize],
        cols: &[usize],
        values: &[f64],
        nrows: usize,
        ncols: usize,
    ) -> Result<Relation> {
        if rows.len() != cols.len() || rows.len() != values.len() {
            return Err(MacauError::LengthMismatch {
                rows: rows.len(),
                cols: cols.len(),
                values: values.len(),
            });
        }

        let check = |axis, indices: &[usize], extent| {
            indices
                .iter()
                .find(|&&index| index >= extent)
                .map_or(Ok(()), |&index| {
                    Err(MacauError::InvalidDimension {
                        axis,
                        index,
                        extent,
                    })
                })
        };
        check(Axis::Row, rows, nrows)?;
        check(Axis::Column, cols, ncols)?;

        let row_order = sorted_order(rows, cols);
        if let Some(pair) = row_order
            .windows(2)
            .find(|pair| rows[pair[0]] == rows[pair[1]] && cols[pair[0]] == cols[pair[1]])
        {
            return Err(MacauError::DuplicateEntry {
                row: rows[pair[0]],
                col: cols[pair[0]],
            });
        }

        let by_row: CsMat<f64> =
            TriMat::from_triplets((nrows, ncols), rows.to_vec(), cols.to_vec(), values.to_vec())
                .to_csr();
        let by_col: CsMat<f64> = by_row.transpose_view().to_csr();

        Ok(Relation {
            by_row: Arc::new(by_row),
            by_col: Arc::new(by_col),
        })
    }

    /// A relation of the given shape without any observation.
    pub fn empty(nrows: usize, ncols: usize) -> Relation {
        Relation::from_triplets(&[], &[], &[], nrows, ncols)
            .expect("an empty relation is always valid")
    }

    pub fn nrows(&self) -> usize {
        self.by_row.rows()
    }

    pub fn ncols(&self) -> usize {
        self.by_row.cols()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }

    /// The number of observed entries.
    pub fn nnz(&self) -> usize {
        self.by_row.nnz()
    }

    /// Whether this relation has no observed entries.
    pub fn is_empty(&self) -> bool {
        self.nnz() == 0
    }

    /// The arithmetic mean of all observed values. Returns `NaN` for an empty relation.
    pub fn mean(&self) -> f64 {
        if self.is_empty() {
            return f64::NAN;
        }

        self.by_row.data().iter().sum::<f64>() / self.nnz() as f64
    }

    /// The compressed view grouped by row: outer index is the row, inner index the column.
    pub fn by_row(&self) -> &CsMat<f64> {
        &self.by_row
    }

    /// The compressed view grouped by column: outer index is the column, inner index the row.
    pub fn by_col(&self) -> &CsMat<f64> {
        &self.by_col
    }

    /// The observations of one side's entities: side `0` groups by row, side `1` by column.
    ///
    /// # Panics
    ///
    /// This function panics if `side` is not `0` or `1`.
    pub fn oriented(&self, side: usize) -> &CsMat<f64> {
        match side {
            0 => self.by_row(),
            1 => self.by_col(),
            _ => panic!("a relation has only two sides, got side {side}"),
        }
    }

    /// The observations of a single row, as `(col, value)` pairs.
    pub fn row(&self, row: usize) -> Option<CsVecView<'_, f64>> {
        self.by_row.outer_view(row)
    }

    /// The observations of a single column, as `(row, value)` pairs.
    pub fn col(&self, col: usize) -> Option<CsVecView<'_, f64>> {
        self.by_col.outer_view(col)
    }

    /// The transposed relation. This operation is cheap, since no data is copied.
    pub fn transpose(&self) -> Relation {
        Relation {
            by_row: self.by_col.clone(),
            by_col: self.by_row.clone(),
        }
    }

    /// Iterates over all `(row, col, value)` triplets in row-major order.
    pub fn iter(&self) -> impl '_ + Iterator<Item = (usize, usize, f64)> {
        self.by_row
            .outer_iterator()
            .enumerate()
            .flat_map(|(row, observed)| {
                observed
                    .iter()
                    .map(move |(col, &value)| (row, col, value))
                    .collect::<Vec<_>>()
            })
    }
}
