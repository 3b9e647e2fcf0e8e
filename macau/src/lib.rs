//! This crate implements _Bayesian Probabilistic Matrix Factorization_ (BPMF) in pure Rust,
//! together with its extension to side information, the _Macau_ prior.
//!
//! A sparse relation `Y` (say, user-item ratings) is factorized as `Y ~ U^T V + mean`, where each
//! row entity and each column entity gets a latent vector. The latents and the hyperparameters
//! of their priors are sampled by Gibbs sampling, and predictions for a held-out test relation
//! are averaged over the samples drawn after burn-in, together with their standard deviations.
//!
//! ```no_run
//! use macau::{Macau, NormalPrior, SamplerConfig};
//!
//! let mut macau = Macau::new(SamplerConfig::default().with_num_latent(2).with_samples(10, 100));
//! macau.add_prior(Box::new(NormalPrior::new(2)));
//! macau.add_prior(Box::new(NormalPrior::new(2)));
//! macau.set_relation_data(&[0, 1, 1], &[0, 0, 1], &[4.0, 3.0, 5.0], 2, 2)?;
//! macau.set_relation_data_test(&[0], &[1], &[2.0], 2, 2)?;
//!
//! let result = macau.run()?;
//! println!("test RMSE {}", result.rmse_test);
//! # Ok::<(), macau::MacauError>(())
//! ```
//!
//! To get to know more about the model, please check the references below:
//! * <https://www.cs.toronto.edu/~amnih/papers/bpmf.pdf>: Salakhutdinov and Mnih, _Bayesian
//! Probabilistic Matrix Factorization using Markov Chain Monte Carlo_.
//! * <https://arxiv.org/abs/1509.04610>: Simm et al., _Macau: Scalable Bayesian Multi-relational
//! Factorization with Side Information using MCMC_.

mod config;
mod errors;
mod evaluator;
mod macau_prior;
mod prior;
mod relation;
mod sampler;
mod utils;

pub use config::SamplerConfig;
pub use errors::{Axis, MacauError, Result};
pub use evaluator::{OnlineEvaluator, TestEntry};
pub use macau_prior::MacauPrior;
pub use prior::{LatentPrior, NormalPrior};
pub use relation::Relation;
pub use sampler::{IterationStatus, Macau, Sampler, SamplingResult};
