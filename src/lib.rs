//! Python bindings for the `macau` crate, built with `maturin` and the `python` feature.

#[cfg(feature = "python")]
mod python_bindings;
#[cfg(feature = "python")]
mod utils;

pub use macau::*;
