use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand_distr::{Distribution, Gamma};
use serde_derive::{Deserialize, Serialize};
use sprs::CsMat;

use crate::errors::{MacauError, Result};
use crate::prior::{sample_latents_with, Hyperparams, LatentPrior};
use crate::utils::{cholesky_l, mv_normal_prec_matrix};

/// A latent prior linked to side information about the entities (the _Macau_ prior).
///
/// Each entity `i` comes with a feature vector `f_i` (a row of `features`), and its latent
/// vector is modelled as
/// ```text
/// u_i ~ N(mu + beta * f_i, Lambda^-1)
/// ```
/// where the link matrix `beta` (`num_latent x num_features`) is learned jointly with the
/// latents under a Gaussian prior of precision `lambda_beta * Lambda`. Optionally,
/// `lambda_beta` itself is resampled under a Gamma hyperprior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacauPrior {
    hyper: Hyperparams,
    /// Entity features, one row per entity.
    features: DMatrix<f64>,
    /// Cached `features^T * features`.
    ftf: DMatrix<f64>,
    beta: DMatrix<f64>,
    /// Cached `beta * features^T`: the linked part of the mean of each latent vector.
    uhat: DMatrix<f64>,
    lambda_beta: f64,
    lambda_beta_mu0: f64,
    lambda_beta_nu0: f64,
    lambda_beta_sampling: bool,
}

impl MacauPrior {
    /// Creates a new prior for latent vectors of size `num_latent` linked to the rows of
    /// `features`. The link starts at zero, with regularization `lambda_beta`.
    pub fn new(num_latent: usize, features: DMatrix<f64>, lambda_beta: f64) -> MacauPrior {
        let num_features = features.ncols();
        let num_entities = features.nrows();

        MacauPrior {
            hyper: Hyperparams::new(num_latent),
            ftf: features.transpose() * &features,
            features,
            beta: DMatrix::zeros(num_latent, num_features),
            uhat: DMatrix::zeros(num_latent, num_entities),
            lambda_beta,
            lambda_beta_mu0: 1e-3,
            lambda_beta_nu0: 1e-3,
            lambda_beta_sampling: false,
        }
    }

    /// Enables resampling of `lambda_beta` from its Gamma posterior after each link update,
    /// with hyperprior mean `mu0` and shape-like parameter `nu0`, both checked by `validate`.
    pub fn with_lambda_beta_sampling(mut self, mu0: f64, nu0: f64) -> Self {
        self.lambda_beta_sampling = true;
        self.lambda_beta_mu0 = mu0;
        self.lambda_beta_nu0 = nu0;

        self
    }

    pub fn num_features(&self) -> usize {
        self.features.ncols()
    }

    /// The link matrix from features to latent means.
    pub fn beta(&self) -> &DMatrix<f64> {
        &self.beta
    }

    pub fn lambda_beta(&self) -> f64 {
        self.lambda_beta
    }

    pub fn mu(&self) -> &DVector<f64> {
        &self.hyper.mu
    }

    pub fn lambda(&self) -> &DMatrix<f64> {
        &self.hyper.lambda
    }

    /// Samples the link matrix given the latents, by perturbing the least squares problem:
    /// ```text
    /// (F^T F + lambda_beta * I) * beta^T = F^T * (U + e1 - mu)^T + sqrt(lambda_beta) * e2^T
    /// ```
    /// with `e1` and `e2` having `N(0, Lambda^-1)` columns.
    fn sample_beta(&mut self, latents: &DMatrix<f64>, rng: &mut StdRng) -> Result<()> {
        let num_features = self.num_features();
        let mut perturbed =
            latents + mv_normal_prec_matrix(rng, &self.hyper.lambda, latents.ncols())?;
        for mut column in perturbed.column_iter_mut() {
            column -= &self.hyper.mu;
        }

        let mut ft_y = (perturbed * &self.features).transpose();
        ft_y += mv_normal_prec_matrix(rng, &self.hyper.lambda, num_features)?.transpose()
            * self.lambda_beta.sqrt();

        let regularized =
            &self.ftf + DMatrix::identity(num_features, num_features) * self.lambda_beta;
        let l = cholesky_l(regularized, "regularized feature cross product")?;
        let beta_t = l
            .solve_lower_triangular(&ft_y)
            .and_then(|partial| l.tr_solve_lower_triangular(&partial))
            .ok_or_else(|| MacauError::Numerical("singular Cholesky factor".to_owned()))?;
        self.beta = beta_t.transpose();

        Ok(())
    }

    /// Samples `lambda_beta` from its Gamma posterior given the link matrix.
    fn sample_lambda_beta(&mut self, rng: &mut StdRng) -> Result<()> {
        let nu = self.lambda_beta_nu0;
        let mu = self.lambda_beta_mu0;
        let nux = nu + (self.beta.nrows() * self.beta.ncols()) as f64;
        let weighted_norm = (self.beta.transpose() * &self.hyper.lambda * &self.beta).trace();
        let mux = mu * nux / (nu + mu * weighted_norm);
        let gamma = Gamma::new(nux / 2.0, 2.0 * mux / nux)
            .map_err(|err| MacauError::Numerical(err.to_string()))?;
        self.lambda_beta = gamma.sample(rng);

        Ok(())
    }
}

impl LatentPrior for MacauPrior {
    fn num_latent(&self) -> usize {
        self.hyper.num_latent()
    }

    fn validate(&self, side: usize, num_latent: usize, num_entities: usize) -> Result<()> {
        if self.num_latent() != num_latent {
            return Err(MacauError::PriorShape {
                side,
                what: "num_latent",
                expected: num_latent,
                found: self.num_latent(),
            });
        }
        if self.features.nrows() != num_entities {
            return Err(MacauError::PriorShape {
                side,
                what: "feature rows",
                expected: num_entities,
                found: self.features.nrows(),
            });
        }
        if !(self.lambda_beta.is_finite() && self.lambda_beta > 0.0) {
            return Err(MacauError::InvalidConfig(format!(
                "lambda_beta must be positive, got {}",
                self.lambda_beta
            )));
        }
        if self.lambda_beta_sampling {
            for (name, value) in [("mu0", self.lambda_beta_mu0), ("nu0", self.lambda_beta_nu0)] {
                if !(value.is_finite() && value > 0.0) {
                    return Err(MacauError::InvalidConfig(format!(
                        "lambda_beta hyperprior {name} must be positive, got {value}"
                    )));
                }
            }
        }

        Ok(())
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
        let uhat = &self.uhat;
        sample_latents_with(
            latents,
            relation,
            mean_rating,
            other,
            alpha,
            &self.hyper.lambda,
            rng,
            |entity| mu + uhat.column(entity),
        )
    }

    fn update_prior(&mut self, latents: &DMatrix<f64>, rng: &mut StdRng) -> Result<()> {
        let residual = latents - &self.uhat;
        let link_scale = &self.beta * self.beta.transpose() * self.lambda_beta;
        self.hyper.resample(
            &residual,
            Some(&link_scale),
            self.num_features() as f64,
            rng,
        )?;

        self.sample_beta(latents, rng)?;
        self.uhat = &self.beta * self.features.transpose();

        if self.lambda_beta_sampling {
            self.sample_lambda_beta(rng)?;
        }

        Ok(())
    }

    fn link_norm(&self) -> f64 {
        self.beta.norm()
    }

    fn link_lambda(&self) -> f64 {
        self.lambda_beta
    }
}
