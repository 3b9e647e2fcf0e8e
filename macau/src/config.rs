use serde_derive::{Deserialize, Serialize};

use crate::errors::{MacauError, Result};

/// The configuration of a sampling run. Use the builder methods to change the defaults:
/// ```
/// let config = macau::SamplerConfig::default()
///     .with_num_latent(16)
///     .with_samples(100, 800)
///     .with_seed(42);
/// assert_eq!(config.num_latent, 16);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// The dimension of the latent vectors.
    pub num_latent: usize,
    /// The precision of the observation noise.
    pub alpha: f64,
    /// Iterations run before predictions start being averaged.
    pub burnin: usize,
    /// Iterations whose predictions are averaged.
    pub nsamples: usize,
    /// Log the status of every iteration at `info` level.
    pub verbose: bool,
    /// Seed of the random generator. If `None`, a seed is derived from the system clock.
    pub seed: Option<u64>,
}

impl Default for SamplerConfig {
    fn default() -> SamplerConfig {
        SamplerConfig {
            num_latent: 10,
            alpha: 2.0,
            burnin: 50,
            nsamples: 400,
            verbose: false,
            seed: None,
        }
    }
}

impl SamplerConfig {
    pub fn with_num_latent(mut self, num_latent: usize) -> Self {
        self.num_latent = num_latent;
        self
    }

    /// Sets the precision of the observation noise (`1 / sigma ^ 2`).
    pub fn with_precision(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_samples(mut self, burnin: usize, nsamples: usize) -> Self {
        self.burnin = burnin;
        self.nsamples = nsamples;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// The total number of iterations of a run.
    pub fn n_iterations(&self) -> usize {
        self.burnin + self.nsamples
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_latent == 0 {
            return Err(MacauError::InvalidConfig(
                "num_latent must be at least 1".to_owned(),
            ));
        }
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(MacauError::InvalidConfig(format!(
                "precision alpha must be positive and finite, got {}",
                self.alpha
            )));
        }

        Ok(())
    }
}
