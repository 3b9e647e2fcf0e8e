use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde_derive::{Deserialize, Serialize};

use crate::relation::Relation;

/// Each unit of parallel work evaluates at least this many test entries.
const MIN_ENTRIES_PER_TASK: usize = 1024;

/// One held-out observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestEntry {
    pub row: usize,
    pub col: usize,
    pub value: f64,
}

/// Keeps, for each entry of the test relation, the running mean of the predictions and the
/// running sum of squared deviations from that mean (Welford's online algorithm). Entries are
/// indexed in the enumeration order of the test relation, which is fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineEvaluator {
    entries: Vec<TestEntry>,
    predictions: Vec<f64>,
    predictions_var: Vec<f64>,
}

impl OnlineEvaluator {
    /// Creates an evaluator with zeroed accumulators for the entries of `test`.
    pub fn new(test: &Relation) -> OnlineEvaluator {
        let entries = test
            .iter()
            .map(|(row, col, value)| TestEntry { row, col, value })
            .collect::<Vec<_>>();

        OnlineEvaluator {
            predictions: vec![0.0; entries.len()],
            predictions_var: vec![0.0; entries.len()],
            entries,
        }
    }

    /// The number of test entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The test entries, in enumeration order.
    pub fn entries(&self) -> &[TestEntry] {
        &self.entries
    }

    /// The running mean of the predictions of each test entry.
    pub fn predictions(&self) -> &[f64] {
        &self.predictions
    }

    /// The running sum of squared deviations of the predictions of each test entry.
    pub fn predictions_var(&self) -> &[f64] {
        &self.predictions_var
    }

    /// Evaluates the factorization `col_latents^T * row_latents + mean_rating` on every test
    /// entry and folds the predictions into the running statistics. See
    /// [`OnlineEvaluator::accumulate`].
    pub fn eval(
        &mut self,
        n: usize,
        col_latents: &DMatrix<f64>,
        row_latents: &DMatrix<f64>,
        mean_rating: f64,
    ) -> (f64, f64) {
        self.accumulate(n, |entry| {
            col_latents
                .column(entry.col)
                .dot(&row_latents.column(entry.row))
                + mean_rating
        })
    }

    /// Folds one prediction per test entry into the running statistics, `n` being the number
    /// of samples accumulated so far. For `n == 0`, the running mean is reset to the current
    /// prediction. Returns the RMSE of the current predictions and the RMSE of the running
    /// means, both `NaN` if there are no test entries.
    pub fn accumulate<F>(&mut self, n: usize, predict: F) -> (f64, f64)
    where
        F: Fn(&TestEntry) -> f64 + Sync,
    {
        if self.is_empty() {
            return (f64::NAN, f64::NAN);
        }

        let (square_error, square_error_avg) = self
            .entries
            .par_iter()
            .zip(self.predictions.par_iter_mut())
            .zip(self.predictions_var.par_iter_mut())
            .with_min_len(MIN_ENTRIES_PER_TASK)
            .map(|((entry, mean), var)| {
                let pred = predict(entry);
                let pred_avg = if n == 0 {
                    pred
                } else {
                    let delta = pred - *mean;
                    let pred_avg = *mean + delta / (n + 1) as f64;
                    *var += delta * (pred - pred_avg);
                    pred_avg
                };
                *mean = pred_avg;

                ((entry.value - pred).powi(2), (entry.value - pred_avg).powi(2))
            })
            .reduce(
                || (0.0, 0.0),
                |(square_error, square_error_avg), (square_error_, square_error_avg_)| {
                    (
                        square_error + square_error_,
                        square_error_avg + square_error_avg_,
                    )
                },
            );

        let total = self.len() as f64;
        ((square_error / total).sqrt(), (square_error_avg / total).sqrt())
    }

    /// The standard deviation of the predictions of each test entry over `nsamples`
    /// accumulated samples. All `NaN` if `nsamples <= 1`.
    pub fn stds(&self, nsamples: usize) -> DVector<f64> {
        if nsamples <= 1 {
            return DVector::from_element(self.len(), f64::NAN);
        }

        let inorm = 1.0 / (nsamples - 1) as f64;
        self.predictions_var
            .par_iter()
            .map(|var| (var * inorm).sqrt())
            .collect::<Vec<_>>()
            .into()
    }

    /// The test entries as a `len x 3` matrix of `(row, col, value)`, aligned with
    /// `predictions` and `stds`.
    pub fn test_data(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.len(), 3, |idx, field| {
            let entry = &self.entries[idx];
            match field {
                0 => entry.row as f64,
                1 => entry.col as f64,
                _ => entry.value,
            }
        })
    }
}
