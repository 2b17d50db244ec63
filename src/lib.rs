//! Convergence diagnostics for MCMC chains, analytic toy targets for testing
//! samplers, and parameter transforms between constrained and unconstrained
//! spaces.
//!
//! - [`results::McmcResults`] summarizes chains: mean, std, quantiles, rhat and ESS.
//! - [`stats`] holds the underlying estimators.
//! - [`toy`] provides [`toy::MultimodalGaussian`] and [`toy::NealsFunnel`].
//! - [`transform`] provides log and logit transforms of a [`distributions::LogPdf`].

pub mod distributions;
pub mod error;
pub mod io;
mod linalg;
pub mod results;
pub mod stats;
pub mod toy;
pub mod transform;

pub use error::{Error, Result};
