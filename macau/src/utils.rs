use nalgebra::{DMatrix, DVector};
use rand::distributions::Distribution;
use rand::Rng;
use rand_distr::{ChiSquared, StandardNormal};

use crate::errors::{MacauError, Result};

pub(crate) fn standard_noise<R: Rng + ?Sized>(rng: &mut R, size: usize) -> DVector<f64> {
    DVector::from(
        StandardNormal
            .sample_iter(rng)
            .take(size)
            .collect::<Vec<f64>>(),
    )
}

pub(crate) fn standard_noise_matrix<R: Rng + ?Sized>(
    rng: &mut R,
    rows: usize,
    cols: usize,
) -> DMatrix<f64> {
    DMatrix::from_vec(
        rows,
        cols,
        StandardNormal.sample_iter(rng).take(rows * cols).collect(),
    )
}

/// Forces exact symmetry on a matrix that is symmetric up to rounding.
pub(crate) fn symmetrize(matrix: DMatrix<f64>) -> DMatrix<f64> {
    (&matrix + matrix.transpose()) * 0.5
}

pub(crate) fn cholesky_l(matrix: DMatrix<f64>, context: &str) -> Result<DMatrix<f64>> {
    matrix
        .cholesky()
        .map(|cholesky| cholesky.l())
        .ok_or_else(|| MacauError::Numerical(format!("{context} is not positive definite")))
}

/// Draws `ncols` independent columns from `N(0, precision^-1)`.
///
/// With `precision = L * L^T`, the draw `L^-T * z` has covariance `(L * L^T)^-1`.
pub(crate) fn mv_normal_prec_matrix<R: Rng + ?Sized>(
    rng: &mut R,
    precision: &DMatrix<f64>,
    ncols: usize,
) -> Result<DMatrix<f64>> {
    let l = cholesky_l(precision.clone(), "precision matrix")?;
    let standard = standard_noise_matrix(rng, precision.nrows(), ncols);
    l.tr_solve_lower_triangular(&standard)
        .ok_or_else(|| MacauError::Numerical("singular Cholesky factor".to_owned()))
}

/// Draws one vector from `N(mean, precision^-1)`.
pub(crate) fn mv_normal_prec<R: Rng + ?Sized>(
    rng: &mut R,
    mean: &DVector<f64>,
    precision: &DMatrix<f64>,
) -> Result<DVector<f64>> {
    let l = cholesky_l(precision.clone(), "precision matrix")?;
    let standard = standard_noise(rng, mean.len());
    let deviation = l
        .tr_solve_lower_triangular(&standard)
        .ok_or_else(|| MacauError::Numerical("singular Cholesky factor".to_owned()))?;

    Ok(deviation + mean)
}

/// Samples a Wishart matrix with the given scale and degrees of freedom using the Bartlett
/// decomposition:
/// ```text
/// W = L * A * A^T * L^T,    scale = L * L^T
/// A_ii ~ sqrt(chi2(df - i)),    A_ij ~ N(0, 1) for j < i
/// ```
pub(crate) fn wishart<R: Rng + ?Sized>(
    rng: &mut R,
    scale: &DMatrix<f64>,
    df: f64,
) -> Result<DMatrix<f64>> {
    let dim = scale.nrows();
    if dim == 0 || df <= (dim - 1) as f64 {
        return Err(MacauError::Numerical(format!(
            "Wishart needs more than {} degrees of freedom, got {df}",
            dim.saturating_sub(1)
        )));
    }

    let l = cholesky_l(symmetrize(scale.clone()), "Wishart scale")?;
    let mut bartlett = DMatrix::<f64>::zeros(dim, dim);

    for row in 0..dim {
        let chi_squared = ChiSquared::new(df - row as f64)
            .map_err(|err| MacauError::Numerical(err.to_string()))?;
        bartlett[(row, row)] = chi_squared.sample(rng).sqrt();
        for col in 0..row {
            bartlett[(row, col)] = StandardNormal.sample(rng);
        }
    }

    let factor = l * bartlett;
    Ok(&factor * factor.transpose())
}

/// Draws `(mu, Lambda)` from a Normal-Wishart distribution:
/// ```text
/// Lambda ~ W(scale, df)
/// mu ~ N(mu0, (kappa * Lambda)^-1)
/// ```
pub(crate) fn normal_wishart<R: Rng + ?Sized>(
    rng: &mut R,
    mu0: &DVector<f64>,
    kappa: f64,
    scale: &DMatrix<f64>,
    df: f64,
) -> Result<(DVector<f64>, DMatrix<f64>)> {
    let lambda = wishart(rng, scale, df)?;
    let mu = mv_normal_prec(rng, mu0, &(&lambda * kappa))?;

    Ok((mu, lambda))
}

/// Draws `(mu, Lambda)` from the Normal-Wishart posterior given the columns of `samples` as
/// observations. `inverse_scale` is the inverse of the Wishart scale of the hyperprior.
pub(crate) fn conditional_normal_wishart<R: Rng + ?Sized>(
    rng: &mut R,
    samples: &DMatrix<f64>,
    mu0: &DVector<f64>,
    kappa: f64,
    inverse_scale: &DMatrix<f64>,
    df: f64,
) -> Result<(DVector<f64>, DMatrix<f64>)> {
    let n = samples.ncols() as f64;
    if samples.ncols() == 0 {
        return normal_wishart(rng, mu0, kappa, &invert_spd(inverse_scale)?, df);
    }

    let sample_mean = samples.column_mean();
    let mut centered = samples.clone();
    for mut column in centered.column_iter_mut() {
        column -= &sample_mean;
    }
    let scatter = &centered * centered.transpose();

    let mu_c = (mu0 * kappa + &sample_mean * n) / (kappa + n);
    let kappa_c = kappa + n;
    let kappa_m = kappa * n / (kappa + n);
    let mean_gap = mu0 - &sample_mean;
    let posterior_inverse_scale =
        inverse_scale + scatter + (&mean_gap * mean_gap.transpose()) * kappa_m;
    let scale_c = invert_spd(&symmetrize(posterior_inverse_scale))?;

    normal_wishart(rng, &mu_c, kappa_c, &scale_c, df + n)
}

pub(crate) fn invert_spd(matrix: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    matrix
        .clone()
        .cholesky()
        .map(|cholesky| cholesky.inverse())
        .ok_or_else(|| MacauError::Numerical("matrix to invert is not positive definite".to_owned()))
}
