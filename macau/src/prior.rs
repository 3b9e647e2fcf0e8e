use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde_derive::{Deserialize, Serialize};
use sprs::{CsMat, CsVecView};
use std::fmt;

use crate::errors::{MacauError, Result};
use crate::utils::{cholesky_l, conditional_normal_wishart, standard_noise};

/// The number of entities sampled in a row by one unit of parallel work. Each chunk draws
/// from its own generator, seeded from the chunk index, so that results do not depend on the
/// number of worker threads.
const ENTITIES_PER_CHUNK: usize = 16;

/// The prior over the latent vectors of one side of the relation.
///
/// The sampler holds exactly two priors: side `0` owns the row latents and side `1` the
/// column latents. During one iteration, the sampler calls
/// ```text
/// side0.sample_latents -> side1.sample_latents -> side0.update_prior -> side1.update_prior
/// ```
/// in this order, each `sample_latents` seeing the latest latents of the other side.
pub trait LatentPrior: fmt::Debug + Send + Sync {
    /// The dimension of the latent vectors this prior is configured for.
    fn num_latent(&self) -> usize;

    /// Checks that this prior can drive `num_entities` latent vectors of dimension
    /// `num_latent` on the given side.
    fn validate(&self, side: usize, num_latent: usize, num_entities: usize) -> Result<()> {
        let _ = num_entities;
        if self.num_latent() != num_latent {
            return Err(MacauError::PriorShape {
                side,
                what: "num_latent",
                expected: num_latent,
                found: self.num_latent(),
            });
        }

        Ok(())
    }

    /// Draws a new latent vector for every entity of this side, overwriting the columns of
    /// `latents`. `relation` is grouped by this side's entities (outer index) and its inner
    /// indices point to columns of `other`, the current latents of the other side.
    fn sample_latents(
        &self,
        latents: &mut DMatrix<f64>,
        relation: &CsMat<f64>,
        mean_rating: f64,
        other: &DMatrix<f64>,
        alpha: f64,
        rng: &mut StdRng,
    ) -> Result<()>;

    /// Redraws the hyperparameters of this prior given the current latents of this side.
    fn update_prior(&mut self, latents: &DMatrix<f64>, rng: &mut StdRng) -> Result<()>;

    /// The norm of the learned link matrix to side features, or `NaN` if there is none.
    fn link_norm(&self) -> f64 {
        f64::NAN
    }

    /// The regularization strength of the link matrix, or `NaN` if there is none.
    fn link_lambda(&self) -> f64 {
        f64::NAN
    }
}

/// The Normal-Wishart hyperparameters shared by all latent priors: the latent vectors are
/// distributed as `N(mu, Lambda^-1)`, with `(mu, Lambda)` drawn from a Normal-Wishart with
/// location `mu0`, scale factor `b0`, inverse scale `wi` and `df` degrees of freedom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Hyperparams {
    pub(crate) mu: DVector<f64>,
    pub(crate) lambda: DMatrix<f64>,
    pub(crate) mu0: DVector<f64>,
    pub(crate) b0: f64,
    pub(crate) df: f64,
    pub(crate) wi: DMatrix<f64>,
}

impl Hyperparams {
    pub(crate) fn new(num_latent: usize) -> Hyperparams {
        Hyperparams {
            mu: DVector::zeros(num_latent),
            lambda: DMatrix::identity(num_latent, num_latent) * 10.0,
            mu0: DVector::zeros(num_latent),
            b0: 2.0,
            df: num_latent as f64,
            wi: DMatrix::identity(num_latent, num_latent),
        }
    }

    pub(crate) fn num_latent(&self) -> usize {
        self.mu.len()
    }

    /// Resamples `(mu, Lambda)` from the posterior given the columns of `latents`, using
    /// `wi` (plus `extra_inverse_scale`) as inverse scale and `df + extra_df` degrees of
    /// freedom.
    pub(crate) fn resample(
        &mut self,
        latents: &DMatrix<f64>,
        extra_inverse_scale: Option<&DMatrix<f64>>,
        extra_df: f64,
        rng: &mut StdRng,
    ) -> Result<()> {
        let inverse_scale = match extra_inverse_scale {
            Some(extra) => &self.wi + extra,
            None => self.wi.clone(),
        };
        let (mu, lambda) = conditional_normal_wishart(
            rng,
            latents,
            &self.mu0,
            self.b0,
            &inverse_scale,
            self.df + extra_df,
        )?;
        self.mu = mu;
        self.lambda = lambda;

        Ok(())
    }
}

/// Draws one latent vector from its conditional posterior:
/// ```text
/// precision = Lambda + alpha * sum_j v_j * v_j^T
/// u ~ N(precision^-1 * (Lambda * prior_mean + alpha * sum_j (y_j - mean_rating) * v_j), precision^-1)
/// ```
/// where `j` walks over the observations of the entity.
fn sample_latent<R: Rng + ?Sized>(
    rng: &mut R,
    observed: CsVecView<f64>,
    other: &DMatrix<f64>,
    mean_rating: f64,
    alpha: f64,
    lambda: &DMatrix<f64>,
    prior_mean: &DVector<f64>,
) -> Result<DVector<f64>> {
    let mut precision = lambda.clone();
    let mut rhs = lambda * prior_mean;

    for (idx, &value) in observed.iter() {
        let column = other.column(idx);
        precision.ger(alpha, &column, &column, 1.0);
        rhs.axpy((value - mean_rating) * alpha, &column, 1.0);
    }

    let l = cholesky_l(precision, "latent posterior precision")?;
    let mut draw = l
        .solve_lower_triangular(&rhs)
        .ok_or_else(|| MacauError::Numerical("singular Cholesky factor".to_owned()))?;
    draw += standard_noise(rng, draw.len());

    l.tr_solve_lower_triangular(&draw)
        .ok_or_else(|| MacauError::Numerical("singular Cholesky factor".to_owned()))
}

/// Samples every column of `latents` in parallel. `prior_mean` maps an entity to the mean of
/// its latent vector under the prior.
pub(crate) fn sample_latents_with<F>(
    latents: &mut DMatrix<f64>,
    relation: &CsMat<f64>,
    mean_rating: f64,
    other: &DMatrix<f64>,
    alpha: f64,
    lambda: &DMatrix<f64>,
    rng: &mut StdRng,
    prior_mean: F,
) -> Result<()>
where
    F: Fn(usize) -> DVector<f64> + Sync,
{
    let num_latent = latents.nrows();
    let num_entities = latents.ncols();
    if relation.rows() != num_entities || relation.cols() != other.ncols() {
        return Err(MacauError::ShapeMismatch {
            expected: (num_entities, other.ncols()),
            found: relation.shape(),
        });
    }
    if num_latent == 0 || num_entities == 0 {
        return Ok(());
    }

    let base_seed: u64 = rng.gen();

    latents
        .as_mut_slice()
        .par_chunks_mut(num_latent * ENTITIES_PER_CHUNK)
        .enumerate()
        .try_for_each(|(chunk_idx, chunk)| {
            let mut chunk_rng = StdRng::seed_from_u64(base_seed.wrapping_add(chunk_idx as u64));

            for (offset, column) in chunk.chunks_mut(num_latent).enumerate() {
                let entity = chunk_idx * ENTITIES_PER_CHUNK + offset;
                let observed = relation
                    .outer_view(entity)
                    .expect("relation has one outer index per entity");
                let draw = sample_latent(
                    &mut chunk_rng,
                    observed,
                    other,
                    mean_rating,
                    alpha,
                    lambda,
                    &prior_mean(entity),
                )?;
                column.copy_from_slice(draw.as_slice());
            }

            Ok(())
        })
}

/// The Bayesian Probabilistic Matrix Factorization (BPMF) prior: each latent vector is drawn
/// from `N(mu, Lambda^-1)`, with `(mu, Lambda)` under a Normal-Wishart hyperprior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalPrior {
    hyper: Hyperparams,
}

impl NormalPrior {
    pub fn new(num_latent: usize) -> NormalPrior {
        NormalPrior {
            hyper: Hyperparams::new(num_latent),
        }
    }

    /// The current mean of the latent vectors.
    pub fn mu(&self) -> &DVector<f64> {
        &self.hyper.mu
    }

    /// The current precision matrix of the latent vectors.
    pub fn lambda(&self) -> &DMatrix<f64> {
        &self.hyper.lambda
    }
}

impl LatentPrior for NormalPrior {
    fn num_latent(&self) -> usize {
        self.hyper.num_latent()
    }

    fn sample_latents(
        &self,
        latents: &mut DMatrix<f64>,
        relation: &CsMat<f64>,
        mean_rating: f64,
        other: &DMatrix<f64>,
        alpha: f64,
        rng: &mut StdRng,
    ) -> Result<()> {
        let mu = &self.hyper.mu;
        sample_latents_with(
            latents,
            relation,
            mean_rating,
            other,
            alpha,
            &self.hyper.lambda,
            rng,
            |_| mu.clone(),
        )
    }

    fn update_prior(&mut self, latents: &DMatrix<f64>, rng: &mut StdRng) -> Result<()> {
        self.hyper.resample(latents, None, 0.0, rng)
    }
}
