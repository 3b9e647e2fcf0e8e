use macau::{Macau, MacauPrior, NormalPrior, Sampler, SamplerConfig, SamplingResult};
use nalgebra::DMatrix;
use numpy::{PyArray1, PyArray2, PyReadonlyArray1, PyReadonlyArray2, ToPyArray};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::{prelude::*, types::PyBytes};

use crate::utils::{to_indices, to_nalgebra, to_py_err, to_values};

/// This module is implemented in Rust.
#[pymodule]
pub fn macau_rs(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_class::<MacauWrapper>()?;
    m.add_class::<SamplingResultWrapper>()?;
    Ok(())
}

#[pyclass]
#[pyo3(name = "Macau", module = "macau_rs")]
struct MacauWrapper {
    num_latent: usize,
    /// Taken when the chain starts running.
    builder: Option<Macau>,
    sampler: Option<Sampler>,
}

impl MacauWrapper {
    fn builder(&mut self) -> PyResult<&mut Macau> {
        self.builder
            .as_mut()
            .ok_or_else(|| PyRuntimeError::new_err("sampling has already run"))
    }

    fn sampler(&self) -> PyResult<&Sampler> {
        self.sampler
            .as_ref()
            .ok_or_else(|| PyRuntimeError::new_err("sampling has not run yet"))
    }
}

#[pymethods]
impl MacauWrapper {
    #[new]
    #[pyo3(signature = (
        num_latent = 10,
        precision = 2.0,
        burnin = 50,
        nsamples = 400,
        verbose = false,
        seed = None,
    ))]
    fn new(
        num_latent: usize,
        precision: f64,
        burnin: usize,
        nsamples: usize,
        verbose: bool,
        seed: Option<u64>,
    ) -> PyResult<MacauWrapper> {
        let mut config = SamplerConfig::default()
            .with_num_latent(num_latent)
            .with_precision(precision)
            .with_samples(burnin, nsamples)
            .with_verbose(verbose);
        config.seed = seed;
        config.validate().map_err(to_py_err)?;

        if verbose {
            let _ = env_logger::builder()
                .filter_level(log::LevelFilter::Info)
                .try_init();
        }

        Ok(MacauWrapper {
            num_latent,
            builder: Some(Macau::new(config)),
            sampler: None,
        })
    }

    #[getter]
    fn num_latent(&self) -> usize {
        self.num_latent
    }

    fn add_normal_prior(&mut self) -> PyResult<()> {
        let num_latent = self.num_latent;
        self.builder()?
            .add_prior(Box::new(NormalPrior::new(num_latent)));
        Ok(())
    }

    /// Adds a prior linked to the rows of `features`, one row per entity.
    #[pyo3(signature = (features, lambda_beta = 5.0, sample_lambda_beta = false))]
    fn add_macau_prior(
        &mut self,
        features: PyReadonlyArray2<f64>,
        lambda_beta: f64,
        sample_lambda_beta: bool,
    ) -> PyResult<()> {
        let mut prior = MacauPrior::new(self.num_latent, to_nalgebra(features), lambda_beta);
        if sample_lambda_beta {
            prior = prior.with_lambda_beta_sampling(1.0, 1.0);
        }
        self.builder()?.add_prior(Box::new(prior));
        Ok(())
    }

    fn set_precision(&mut self, precision: f64) -> PyResult<()> {
        self.builder()?.set_precision(precision);
        Ok(())
    }

    fn set_samples(&mut self, burnin: usize, nsamples: usize) -> PyResult<()> {
        self.builder()?.set_samples(burnin, nsamples);
        Ok(())
    }

    fn set_relation_data(
        &mut self,
        rows: PyReadonlyArray1<i64>,
        cols: PyReadonlyArray1<i64>,
        values: PyReadonlyArray1<f64>,
        shape: (usize, usize),
    ) -> PyResult<()> {
        let rows = to_indices(rows, "row")?;
        let cols = to_indices(cols, "column")?;
        self.builder()?
            .set_relation_data(&rows, &cols, &to_values(values), shape.0, shape.1)
            .map_err(to_py_err)
    }

    fn set_relation_data_test(
        &mut self,
        rows: PyReadonlyArray1<i64>,
        cols: PyReadonlyArray1<i64>,
        values: PyReadonlyArray1<f64>,
        shape: (usize, usize),
    ) -> PyResult<()> {
        let rows = to_indices(rows, "row")?;
        let cols = to_indices(cols, "column")?;
        self.builder()?
            .set_relation_data_test(&rows, &cols, &to_values(values), shape.0, shape.1)
            .map_err(to_py_err)
    }

    /// Runs the whole chain and returns the test RMSE of the averaged predictions.
    fn run(&mut self, py: Python<'_>) -> PyResult<f64> {
        let builder = self
            .builder
            .take()
            .ok_or_else(|| PyRuntimeError::new_err("sampling has already run"))?;

        let sampler = py
            .allow_threads(|| -> macau::Result<Sampler> {
                let mut sampler = builder.init()?;
                sampler.run()?;
                Ok(sampler)
            })
            .map_err(to_py_err)?;

        let rmse_test = sampler.rmse_test();
        self.sampler = Some(sampler);
        Ok(rmse_test)
    }

    #[getter]
    fn rmse_test(&self) -> PyResult<f64> {
        Ok(self.sampler()?.rmse_test())
    }

    #[getter]
    fn mean_rating(&self) -> PyResult<f64> {
        Ok(self.sampler()?.mean_rating())
    }

    fn predictions(&self, py: Python<'_>) -> PyResult<Py<PyArray1<f64>>> {
        Ok(self.sampler()?.predictions().to_pyarray(py).to_owned())
    }

    fn stds(&self, py: Python<'_>) -> PyResult<Py<PyArray1<f64>>> {
        Ok(self.sampler()?.stds().as_slice().to_pyarray(py).to_owned())
    }

    fn test_data(&self, py: Python<'_>) -> PyResult<Py<PyArray2<f64>>> {
        Ok(self.sampler()?.test_data().to_pyarray(py).to_owned())
    }

    /// The latents of one side, one row per entity.
    fn latents(&self, py: Python<'_>, side: usize) -> PyResult<Py<PyArray2<f64>>> {
        if side > 1 {
            return Err(PyValueError::new_err(format!(
                "side must be 0 (rows) or 1 (columns), got {side}"
            )));
        }
        Ok(self
            .sampler()?
            .latents(side)
            .transpose()
            .to_pyarray(py)
            .to_owned())
    }

    fn result(&self) -> PyResult<SamplingResultWrapper> {
        Ok(SamplingResultWrapper(self.sampler()?.result()))
    }
}

#[pyclass]
#[pyo3(name = "MacauResult", module = "macau_rs")]
#[derive(Debug, Clone)]
struct SamplingResultWrapper(SamplingResult);

#[pymethods]
impl SamplingResultWrapper {
    #[new]
    fn new() -> SamplingResultWrapper {
        SamplingResultWrapper(SamplingResult::default())
    }

    #[getter]
    fn rmse_test(&self) -> f64 {
        self.0.rmse_test
    }

    #[getter]
    fn mean_rating(&self) -> f64 {
        self.0.mean_rating
    }

    #[getter]
    fn predictions(&self, py: Python<'_>) -> Py<PyArray1<f64>> {
        self.0.predictions.to_pyarray(py).to_owned()
    }

    #[getter]
    fn stds(&self, py: Python<'_>) -> Py<PyArray1<f64>> {
        self.0.stds.to_pyarray(py).to_owned()
    }

    #[getter]
    fn test_data(&self, py: Python<'_>) -> Py<PyArray2<f64>> {
        let entries = &self.0.test_entries;
        DMatrix::from_fn(entries.len(), 3, |idx, field| match field {
            0 => entries[idx].row as f64,
            1 => entries[idx].col as f64,
            _ => entries[idx].value,
        })
        .to_pyarray(py)
        .to_owned()
    }

    fn __len__(&self) -> usize {
        self.0.predictions.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "MacauResult(rmse_test={}, mean_rating={}, n_test={})",
            self.0.rmse_test,
            self.0.mean_rating,
            self.0.predictions.len()
        )
    }

    fn dump(&self, py: Python<'_>) -> PyResult<PyObject> {
        self.__getstate__(py)
    }

    #[staticmethod]
    fn load(bytes: &PyBytes) -> PyResult<SamplingResultWrapper> {
        bincode::deserialize(bytes.as_bytes())
            .map(SamplingResultWrapper)
            .map_err(|err| PyValueError::new_err(err.to_string()))
    }

    pub fn __setstate__(&mut self, py: Python, state: PyObject) -> PyResult<()> {
        let bytes = state.extract::<&PyBytes>(py)?;
        *self = Self::load(bytes)?;
        Ok(())
    }

    pub fn __getstate__(&self, py: Python) -> PyResult<PyObject> {
        let bytes =
            bincode::serialize(&self.0).map_err(|err| PyValueError::new_err(err.to_string()))?;
        Ok(PyBytes::new(py, &bytes).to_object(py))
    }
}
