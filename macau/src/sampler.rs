use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_derive::{Deserialize, Serialize};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::config::SamplerConfig;
use crate::errors::{MacauError, Result};
use crate::evaluator::{OnlineEvaluator, TestEntry};
use crate::prior::LatentPrior;
use crate::relation::Relation;

/// Collects the configuration, the data and the two latent priors of a run.
///
/// Side `0` is the row side of the relation and side `1` the column side. Priors are
/// registered in this order with [`Macau::add_prior`]. Once everything is set,
/// [`Macau::init`] validates the setup and returns a [`Sampler`] ready to iterate.
#[derive(Debug)]
pub struct Macau {
    config: SamplerConfig,
    priors: Vec<Box<dyn LatentPrior>>,
    relation: Option<Relation>,
    test: Option<Relation>,
}

impl Macau {
    pub fn new(config: SamplerConfig) -> Macau {
        Macau {
            config,
            priors: vec![],
            relation: None,
            test: None,
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Registers the prior for the next side: first the rows, then the columns.
    pub fn add_prior(&mut self, prior: Box<dyn LatentPrior>) {
        self.priors.push(prior);
    }

    /// Sets the precision of the observation noise.
    pub fn set_precision(&mut self, alpha: f64) {
        self.config.alpha = alpha;
    }

    pub fn set_samples(&mut self, burnin: usize, nsamples: usize) {
        self.config.burnin = burnin;
        self.config.nsamples = nsamples;
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.config.verbose = verbose;
    }

    /// Sets the training relation from `(row, col, value)` triplets.
    pub fn set_relation_data(
        &mut self,
        rows: &[usize],
        cols: &[usize],
        values: &[f64],
        nrows: usize,
        ncols: usize,
    ) -> Result<()> {
        self.relation = Some(Relation::from_triplets(rows, cols, values, nrows, ncols)?);
        Ok(())
    }

    /// Sets the held-out relation whose entries are predicted and scored on every iteration.
    pub fn set_relation_data_test(
        &mut self,
        rows: &[usize],
        cols: &[usize],
        values: &[f64],
        nrows: usize,
        ncols: usize,
    ) -> Result<()> {
        self.test = Some(Relation::from_triplets(rows, cols, values, nrows, ncols)?);
        Ok(())
    }

    pub fn set_relation(&mut self, relation: Relation) {
        self.relation = Some(relation);
    }

    pub fn set_test_relation(&mut self, test: Relation) {
        self.test = Some(test);
    }

    /// Validates the setup and allocates zeroed latent matrices. Without a test relation,
    /// an empty one of the right shape is used.
    pub fn init(self) -> Result<Sampler> {
        self.config.validate()?;

        let priors: [Box<dyn LatentPrior>; 2] = self
            .priors
            .try_into()
            .map_err(|priors: Vec<_>| MacauError::PriorCount {
                found: priors.len(),
            })?;

        let relation = self.relation.ok_or(MacauError::MissingRelation)?;
        if relation.is_empty() {
            return Err(MacauError::EmptyRelation);
        }
        let (nrows, ncols) = relation.shape();

        let test = self.test.unwrap_or_else(|| Relation::empty(nrows, ncols));
        if test.shape() != relation.shape() {
            return Err(MacauError::ShapeMismatch {
                expected: relation.shape(),
                found: test.shape(),
            });
        }

        let num_latent = self.config.num_latent;
        priors[0].validate(0, num_latent, nrows)?;
        priors[1].validate(1, num_latent, ncols)?;

        let seed = self.config.seed.unwrap_or_else(clock_seed);
        log::debug!(
            "Initialized {nrows}x{ncols} relation with {} observations, {} test entries, seed {seed}",
            relation.nnz(),
            test.nnz(),
        );

        Ok(Sampler {
            priors,
            mean_rating: relation.mean(),
            latents: [
                DMatrix::zeros(num_latent, nrows),
                DMatrix::zeros(num_latent, ncols),
            ],
            evaluator: OnlineEvaluator::new(&test),
            relation,
            rng: StdRng::seed_from_u64(seed),
            seed,
            config: self.config,
            iteration: 0,
            started: None,
            rmse_test: f64::NAN,
            last_status: None,
        })
    }

    /// Initializes and runs the full chain, returning the averaged predictions.
    pub fn run(self) -> Result<SamplingResult> {
        let mut sampler = self.init()?;
        sampler.run()?;
        Ok(sampler.result())
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|since_epoch| since_epoch.as_nanos() as u64)
        .unwrap_or_default()
}

/// What happened in one iteration of the sampler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationStatus {
    pub iteration: usize,
    /// RMSE of the predictions of this iteration alone.
    pub rmse: f64,
    /// RMSE of the running mean of the predictions.
    pub rmse_avg: f64,
    /// Frobenius norms of the row and column latents.
    pub latent_norms: [f64; 2],
    /// Wall-clock seconds spent in this iteration.
    pub seconds: f64,
    /// Latent vectors sampled per second, cumulated since the first iteration.
    pub samples_per_sec: f64,
    /// Norm of the link matrix of each side (`NaN` for sides without side information).
    pub link_norms: [f64; 2],
    /// Regularization of the link matrix of each side (`NaN` for sides without side
    /// information).
    pub link_lambdas: [f64; 2],
}

/// The outcome of a sampling run, aligned with the enumeration order of the test relation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamplingResult {
    /// RMSE of the averaged predictions at the last iteration.
    pub rmse_test: f64,
    pub mean_rating: f64,
    pub predictions: Vec<f64>,
    pub stds: Vec<f64>,
    pub test_entries: Vec<TestEntry>,
}

/// A Gibbs sampler over the latent vectors of both sides of a relation.
///
/// Each iteration draws the row latents given the column latents, then the column latents
/// given the freshly drawn row latents, then the hyperparameters of both priors. Predictions
/// for the test entries are averaged over the iterations after burn-in.
#[derive(Debug)]
pub struct Sampler {
    config: SamplerConfig,
    priors: [Box<dyn LatentPrior>; 2],
    relation: Relation,
    mean_rating: f64,
    latents: [DMatrix<f64>; 2],
    evaluator: OnlineEvaluator,
    rng: StdRng,
    seed: u64,
    iteration: usize,
    started: Option<Instant>,
    rmse_test: f64,
    last_status: Option<IterationStatus>,
}

impl Sampler {
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// The seed the random generator was initialized with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The mean of the training observations, added back to every prediction.
    pub fn mean_rating(&self) -> f64 {
        self.mean_rating
    }

    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    /// The current latents of one side, one column per entity.
    ///
    /// # Panics
    ///
    /// This function panics if `side` is not `0` or `1`.
    pub fn latents(&self, side: usize) -> &DMatrix<f64> {
        &self.latents[side]
    }

    /// # Panics
    ///
    /// This function panics if `side` is not `0` or `1`.
    pub fn prior(&self, side: usize) -> &dyn LatentPrior {
        self.priors[side].as_ref()
    }

    pub fn evaluator(&self) -> &OnlineEvaluator {
        &self.evaluator
    }

    /// The number of iterations run so far.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn is_complete(&self) -> bool {
        self.iteration >= self.config.n_iterations()
    }

    /// The index of the sample collected at `iteration`: `0` during burn-in, then counting up
    /// from `0` at the first iteration after burn-in.
    pub fn sample_index(&self, iteration: usize) -> usize {
        iteration.saturating_sub(self.config.burnin)
    }

    /// The number of iterations whose predictions were averaged so far.
    pub fn samples_accumulated(&self) -> usize {
        self.iteration.saturating_sub(self.config.burnin)
    }

    /// The RMSE of the averaged predictions at the last iteration, `NaN` before the first one.
    pub fn rmse_test(&self) -> f64 {
        self.rmse_test
    }

    pub fn last_status(&self) -> Option<&IterationStatus> {
        self.last_status.as_ref()
    }

    /// The averaged prediction of each test entry.
    pub fn predictions(&self) -> &[f64] {
        self.evaluator.predictions()
    }

    /// The standard deviation of the prediction of each test entry over the accumulated
    /// samples. All `NaN` while fewer than two samples were accumulated.
    pub fn stds(&self) -> DVector<f64> {
        self.evaluator.stds(self.samples_accumulated())
    }

    /// The test entries as a `n_test x 3` matrix of `(row, col, value)`.
    pub fn test_data(&self) -> DMatrix<f64> {
        self.evaluator.test_data()
    }

    /// Runs one iteration of the chain. Iterations past the configured count keep
    /// accumulating samples.
    pub fn step(&mut self) -> Result<IterationStatus> {
        let iteration = self.iteration;
        if self.config.verbose && iteration == self.config.burnin {
            log::info!(" ====== Burn-in complete, averaging samples ====== ");
        }

        let started = *self.started.get_or_insert_with(Instant::now);
        let started_iteration = Instant::now();
        let alpha = self.config.alpha;
        let [row_latents, col_latents] = &mut self.latents;

        self.priors[0].sample_latents(
            row_latents,
            self.relation.oriented(0),
            self.mean_rating,
            col_latents,
            alpha,
            &mut self.rng,
        )?;
        self.priors[1].sample_latents(
            col_latents,
            self.relation.oriented(1),
            self.mean_rating,
            row_latents,
            alpha,
            &mut self.rng,
        )?;

        self.priors[0].update_prior(row_latents, &mut self.rng)?;
        self.priors[1].update_prior(col_latents, &mut self.rng)?;

        let sample_index = iteration.saturating_sub(self.config.burnin);
        let (rmse, rmse_avg) =
            self.evaluator
                .eval(sample_index, col_latents, row_latents, self.mean_rating);

        let (nrows, ncols) = self.relation.shape();
        let status = IterationStatus {
            iteration,
            rmse,
            rmse_avg,
            latent_norms: [row_latents.norm(), col_latents.norm()],
            seconds: started_iteration.elapsed().as_secs_f64(),
            samples_per_sec: ((iteration + 1) * (nrows + ncols)) as f64
                / started.elapsed().as_secs_f64(),
            link_norms: [self.priors[0].link_norm(), self.priors[1].link_norm()],
            link_lambdas: [self.priors[0].link_lambda(), self.priors[1].link_lambda()],
        };

        self.iteration += 1;
        self.rmse_test = rmse_avg;
        self.log_status(&status);
        self.last_status = Some(status.clone());

        Ok(status)
    }

    /// Runs the remaining iterations and returns the final RMSE of the averaged predictions.
    pub fn run(&mut self) -> Result<f64> {
        if self.config.verbose {
            log::info!("Sampling");
        }

        while !self.is_complete() {
            self.step()?;
        }

        Ok(self.rmse_test)
    }

    /// Collects the averaged predictions and their standard deviations.
    pub fn result(&self) -> SamplingResult {
        SamplingResult {
            rmse_test: self.rmse_test,
            mean_rating: self.mean_rating,
            predictions: self.predictions().to_vec(),
            stds: self.stds().iter().copied().collect(),
            test_entries: self.evaluator.entries().to_vec(),
        }
    }

    fn log_status(&self, status: &IterationStatus) {
        if !self.config.verbose {
            log::debug!(
                "Iter {}: RMSE: {:.4} avg RMSE: {:.4}",
                status.iteration,
                status.rmse,
                status.rmse_avg
            );
            return;
        }

        log::info!(
            "Iter {}: RMSE: {:.4}\tavg RMSE: {:.4}  FU({:.2e}) FV({:.2e}) [took {:.1}s, Samples/sec: {:.1}]",
            status.iteration,
            status.rmse,
            status.rmse_avg,
            status.latent_norms[0],
            status.latent_norms[1],
            status.seconds,
            status.samples_per_sec,
        );

        let side_info = ["U", "V"]
            .iter()
            .zip(status.link_norms.iter().zip(&status.link_lambdas))
            .filter(|(_, (norm, _))| !norm.is_nan())
            .map(|(name, (norm, lambda))| format!("{name}.link({norm:.2e}) {name}.lambda({lambda:.1})"))
            .collect::<Vec<_>>();
        if !side_info.is_empty() {
            log::info!("          [Side info] {}", side_info.join(" "));
        }
    }
}

#[cfg(test)]
mod test {
    use nalgebra::DMatrix;
    use sprs::CsMat;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::macau_prior::MacauPrior;
    use crate::prior::NormalPrior;

    /// Records every call, then fills its latents with `7 + side`.
    #[derive(Debug)]
    struct RecordingPrior {
        side: usize,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl LatentPrior for RecordingPrior {
        fn num_latent(&self) -> usize {
            1
        }

        fn sample_latents(
            &self,
            latents: &mut DMatrix<f64>,
            _relation: &CsMat<f64>,
            _mean_rating: f64,
            other: &DMatrix<f64>,
            _alpha: f64,
            _rng: &mut StdRng,
        ) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("sample{} other={}", self.side, other[(0, 0)]));
            latents.fill(7.0 + self.side as f64);
            Ok(())
        }

        fn update_prior(&mut self, latents: &DMatrix<f64>, _rng: &mut StdRng) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("update{} latents={}", self.side, latents[(0, 0)]));
            Ok(())
        }
    }

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// A fully observed 3x3 relation `y_ij = a_i * a_j + 10` with `a = [1, 2, 3]`.
    fn rank_one_triplets() -> (Vec<usize>, Vec<usize>, Vec<f64>) {
        let a = [1.0, 2.0, 3.0];
        let mut rows = vec![];
        let mut cols = vec![];
        let mut values = vec![];
        for i in 0..3 {
            for j in 0..3 {
                rows.push(i);
                cols.push(j);
                values.push(a[i] * a[j] + 10.0);
            }
        }
        (rows, cols, values)
    }

    fn rank_one_macau(config: SamplerConfig) -> Macau {
        let (rows, cols, values) = rank_one_triplets();
        let num_latent = config.num_latent;
        let mut macau = Macau::new(config);
        macau.add_prior(Box::new(NormalPrior::new(num_latent)));
        macau.add_prior(Box::new(NormalPrior::new(num_latent)));
        macau
            .set_relation_data(&rows, &cols, &values, 3, 3)
            .unwrap();
        macau
            .set_relation_data_test(&rows, &cols, &values, 3, 3)
            .unwrap();
        macau
    }

    fn instant_predictions(sampler: &Sampler) -> Vec<f64> {
        sampler
            .evaluator()
            .entries()
            .iter()
            .map(|entry| {
                sampler.latents(1).column(entry.col).dot(&sampler.latents(0).column(entry.row))
                    + sampler.mean_rating()
            })
            .collect()
    }

    #[test]
    fn test_gibbs_order() {
        let calls = Arc::new(Mutex::new(vec![]));
        let (rows, cols, values) = rank_one_triplets();
        let mut macau = Macau::new(SamplerConfig::default().with_num_latent(1).with_seed(4));
        for side in 0..2 {
            macau.add_prior(Box::new(RecordingPrior {
                side,
                calls: calls.clone(),
            }));
        }
        macau
            .set_relation_data(&rows, &cols, &values, 3, 3)
            .unwrap();
        let mut sampler = macau.init().unwrap();

        sampler.step().unwrap();
        sampler.step().unwrap();

        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                "sample0 other=0",
                "sample1 other=7",
                "update0 latents=7",
                "update1 latents=8",
                "sample0 other=8",
                "sample1 other=7",
                "update0 latents=7",
                "update1 latents=8",
            ]
        );
    }

    #[test]
    fn test_requires_two_priors() {
        for n_priors in [0, 1, 3] {
            let (rows, cols, values) = rank_one_triplets();
            let mut macau = Macau::new(SamplerConfig::default().with_num_latent(2));
            for _ in 0..n_priors {
                macau.add_prior(Box::new(NormalPrior::new(2)));
            }
            macau
                .set_relation_data(&rows, &cols, &values, 3, 3)
                .unwrap();

            let err = macau.init().unwrap_err();
            assert!(
                matches!(err, MacauError::PriorCount { found } if found == n_priors),
                "unexpected error {err}"
            );
        }
    }

    #[test]
    fn test_requires_relation() {
        let mut macau = Macau::new(SamplerConfig::default().with_num_latent(2));
        macau.add_prior(Box::new(NormalPrior::new(2)));
        macau.add_prior(Box::new(NormalPrior::new(2)));
        assert!(matches!(
            macau.init().unwrap_err(),
            MacauError::MissingRelation
        ));

        let mut macau = Macau::new(SamplerConfig::default().with_num_latent(2));
        macau.add_prior(Box::new(NormalPrior::new(2)));
        macau.add_prior(Box::new(NormalPrior::new(2)));
        macau.set_relation(Relation::empty(3, 3));
        assert!(matches!(macau.init().unwrap_err(), MacauError::EmptyRelation));
    }

    #[test]
    fn test_rejects_mismatched_shapes() {
        let mut macau = rank_one_macau(SamplerConfig::default().with_num_latent(2));
        macau.set_test_relation(Relation::empty(3, 4));
        assert!(matches!(
            macau.init().unwrap_err(),
            MacauError::ShapeMismatch {
                expected: (3, 3),
                found: (3, 4)
            }
        ));

        let (rows, cols, values) = rank_one_triplets();
        let mut macau = Macau::new(SamplerConfig::default().with_num_latent(2));
        macau.add_prior(Box::new(NormalPrior::new(2)));
        macau.add_prior(Box::new(NormalPrior::new(3)));
        macau
            .set_relation_data(&rows, &cols, &values, 3, 3)
            .unwrap();
        assert!(matches!(
            macau.init().unwrap_err(),
            MacauError::PriorShape { side: 1, .. }
        ));
    }

    #[test]
    fn test_init_allocates_zeroed_latents() {
        let sampler = rank_one_macau(SamplerConfig::default().with_num_latent(4).with_seed(1))
            .init()
            .unwrap();

        assert_eq!(sampler.latents(0), &DMatrix::zeros(4, 3));
        assert_eq!(sampler.latents(1), &DMatrix::zeros(4, 3));
        approx::assert_relative_eq!(sampler.mean_rating(), 14.0);
        assert_eq!(sampler.seed(), 1);
        assert_eq!(sampler.iteration(), 0);
        assert!(sampler.rmse_test().is_nan());
        assert!(!sampler.is_complete());
    }

    #[test]
    fn test_burnin_is_not_averaged() {
        init_logging();
        let burnin = 3;
        let mut sampler = rank_one_macau(
            SamplerConfig::default()
                .with_num_latent(2)
                .with_precision(5.0)
                .with_samples(burnin, 2)
                .with_seed(7),
        )
        .init()
        .unwrap();

        for iteration in 0..burnin {
            assert_eq!(sampler.sample_index(iteration), 0);
            let status = sampler.step().unwrap();
            assert_eq!(sampler.samples_accumulated(), 0);
            // Nothing accumulated yet: the running mean is the last prediction.
            assert_eq!(status.rmse, status.rmse_avg);
            assert_eq!(sampler.predictions(), instant_predictions(&sampler).as_slice());
        }

        // First accumulated sample.
        let status = sampler.step().unwrap();
        assert_eq!(sampler.samples_accumulated(), 1);
        assert_eq!(status.rmse, status.rmse_avg);
        let first = instant_predictions(&sampler);
        assert_eq!(sampler.predictions(), first.as_slice());
        assert!(sampler.stds().iter().all(|std| std.is_nan()));

        // Second accumulated sample: the running mean blends both.
        sampler.step().unwrap();
        assert_eq!(sampler.sample_index(burnin + 1), 1);
        assert_eq!(sampler.samples_accumulated(), 2);
        let second = instant_predictions(&sampler);
        for ((mean, first), second) in sampler.predictions().iter().zip(&first).zip(&second) {
            approx::assert_relative_eq!(*mean, (first + second) / 2.0, max_relative = 1e-12);
        }
        assert!(sampler
            .stds()
            .iter()
            .all(|std| std.is_finite() && *std >= 0.0));
        assert!(sampler.is_complete());
    }

    #[test]
    fn test_converges_on_low_rank_relation() {
        init_logging();
        // After subtracting the mean rating, the relation has rank two.
        let mut sampler = rank_one_macau(
            SamplerConfig::default()
                .with_num_latent(2)
                .with_precision(100.0)
                .with_samples(0, 50)
                .with_seed(2024)
                .with_verbose(true),
        )
        .init()
        .unwrap();

        let first = sampler.step().unwrap();
        let rmse = sampler.run().unwrap();

        assert!(rmse < 0.5, "running RMSE {rmse} did not converge");
        assert!(rmse < first.rmse_avg);
        assert_eq!(sampler.iteration(), 50);
        assert_eq!(sampler.samples_accumulated(), 50);

        let status = sampler.last_status().unwrap();
        assert_eq!(status.iteration, 49);
        assert_eq!(status.rmse_avg, rmse);
        assert!(status.samples_per_sec > 0.0);
        assert!(status.link_norms.iter().all(|norm| norm.is_nan()));
    }

    #[test]
    fn test_single_latent_reaches_rank_one_floor() {
        // The best rank one fit of the centered relation has an RMSE of 4/3.
        let mut sampler = rank_one_macau(
            SamplerConfig::default()
                .with_num_latent(1)
                .with_precision(100.0)
                .with_samples(0, 50)
                .with_seed(99),
        )
        .init()
        .unwrap();

        let first = sampler.step().unwrap();
        let rmse = sampler.run().unwrap();

        assert!(rmse < first.rmse_avg);
        assert!(rmse < 1.5, "running RMSE {rmse} did not converge");
    }

    #[test]
    fn test_side_information_prior() {
        init_logging();
        let (rows, cols, values) = rank_one_triplets();
        let features = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let mut macau = Macau::new(
            SamplerConfig::default()
                .with_num_latent(2)
                .with_precision(100.0)
                .with_samples(5, 50)
                .with_seed(5)
                .with_verbose(true),
        );
        macau.add_prior(Box::new(MacauPrior::new(2, features, 5.0)));
        macau.add_prior(Box::new(NormalPrior::new(2)));
        macau
            .set_relation_data(&rows, &cols, &values, 3, 3)
            .unwrap();
        macau
            .set_relation_data_test(&rows, &cols, &values, 3, 3)
            .unwrap();

        let mut sampler = macau.init().unwrap();
        let rmse = sampler.run().unwrap();
        let status = sampler.last_status().unwrap();

        assert!(rmse < 0.5, "running RMSE {rmse} did not converge");
        assert!(status.link_norms[0].is_finite());
        assert_eq!(status.link_lambdas[0], 5.0);
        assert!(status.link_norms[1].is_nan());
        assert!(status.link_lambdas[1].is_nan());
    }

    #[test]
    fn test_stds_need_two_samples() {
        for nsamples in [0, 1] {
            let result = rank_one_macau(
                SamplerConfig::default()
                    .with_num_latent(2)
                    .with_samples(2, nsamples)
                    .with_seed(3),
            )
            .run()
            .unwrap();
            assert_eq!(result.stds.len(), 9);
            assert!(result.stds.iter().all(|std| std.is_nan()));
        }

        let result = rank_one_macau(
            SamplerConfig::default()
                .with_num_latent(2)
                .with_samples(2, 4)
                .with_seed(3),
        )
        .run()
        .unwrap();
        assert!(result
            .stds
            .iter()
            .all(|std| std.is_finite() && *std >= 0.0));
    }

    #[test]
    fn test_reproducible_across_thread_counts() {
        let run_with_threads = |n_threads| {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n_threads)
                .build()
                .unwrap();
            pool.install(|| {
                let (rows, cols, values) = rank_one_triplets();
                // Tall relation so that sampling spans several chunks.
                let rows = rows.iter().map(|row| row * 20).collect::<Vec<_>>();
                let mut macau = Macau::new(
                    SamplerConfig::default()
                        .with_num_latent(3)
                        .with_samples(2, 3)
                        .with_seed(123),
                );
                macau.add_prior(Box::new(NormalPrior::new(3)));
                macau.add_prior(Box::new(NormalPrior::new(3)));
                macau
                    .set_relation_data(&rows, &cols, &values, 60, 3)
                    .unwrap();
                macau
                    .set_relation_data_test(&rows, &cols, &values, 60, 3)
                    .unwrap();
                macau.run().unwrap()
            })
        };

        let single = run_with_threads(1);
        let multi = run_with_threads(4);
        assert_eq!(single.predictions, multi.predictions);
        assert_eq!(single.test_entries, multi.test_entries);
    }

    #[test]
    fn test_result_alignment() {
        let (rows, cols, values) = rank_one_triplets();
        let mut sampler = rank_one_macau(
            SamplerConfig::default()
                .with_num_latent(2)
                .with_samples(1, 2)
                .with_seed(8),
        )
        .init()
        .unwrap();
        sampler.run().unwrap();

        let result = sampler.result();
        assert_eq!(result.rmse_test, sampler.rmse_test());
        assert_eq!(result.predictions.len(), result.test_entries.len());
        assert_eq!(result.stds.len(), result.test_entries.len());

        let test_data = sampler.test_data();
        for (idx, entry) in result.test_entries.iter().enumerate() {
            assert_eq!(test_data[(idx, 0)], entry.row as f64);
            assert_eq!(test_data[(idx, 1)], entry.col as f64);
            assert_eq!(test_data[(idx, 2)], entry.value);
            assert_eq!(values[entry.row * 3 + entry.col], entry.value);
            assert_eq!(rows[entry.row * 3 + entry.col], entry.row);
            assert_eq!(cols[entry.row * 3 + entry.col], entry.col);
        }

        let bytes = bincode::serialize(&result).unwrap();
        let restored: SamplingResult = bincode::deserialize(&bytes).unwrap();
        assert_eq!(restored.predictions, result.predictions);
        assert_eq!(restored.test_entries, result.test_entries);
    }
}
