/*!
Toy target distributions with analytic log-densities, gradients and exact
samplers, used as ground truth when testing samplers.

- [`MultimodalGaussian`]: an unnormalized mixture of multivariate normals.
- [`NealsFunnel`]: Neal's hierarchical funnel.

Both implement [`ToyLogPdf`](crate::distributions::ToyLogPdf).
*/

mod multimodal_gaussian;
mod neals_funnel;

pub use multimodal_gaussian::MultimodalGaussian;
pub use neals_funnel::NealsFunnel;

use nalgebra::{DMatrix, DVector};
use ndarray::{ArrayBase, ArrayView2, Data, Dimension, Ix2};

use crate::error::{invalid, Error, Result};

/// `ln(2π)`.
const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// `ln(sqrt(2π))`.
const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_7;

/// Log-density of `N(mu, sigma)` at `x`.
pub(crate) fn normal_log_pdf(x: f64, mu: f64, sigma: f64) -> f64 {
    let z = (x - mu) / sigma;
    -0.5 * z * z - sigma.ln() - LN_SQRT_2PI
}

/// `KL(N(m0, s0) || N(m1, s1))` for scalar means and variances.
pub(crate) fn univariate_gaussian_kl(m0: f64, s0: f64, m1: f64, s1: f64) -> f64 {
    let s1_inv = 1.0 / s1;
    0.5 * (s1_inv * s0 + (m1 - m0) * s1_inv * (m1 - m0) - s0.ln() + s1.ln() - 1.0)
}

/// `KL(N(m0, s0) || N(m1, s1))` given the inverse and log-determinant of `s1`.
pub(crate) fn gaussian_kl(
    m0: &DVector<f64>,
    s0: &DMatrix<f64>,
    m1: &DVector<f64>,
    s1_inv: &DMatrix<f64>,
    s1_log_det: f64,
) -> f64 {
    let d = m0.len() as f64;
    let diff = m1 - m0;
    let quad = diff.dot(&(s1_inv * &diff));
    0.5 * ((s1_inv * s0).trace() + quad - s0.determinant().ln() + s1_log_det - d)
}

/// Views `samples` as an `(n, n_parameters)` matrix, rejecting other ranks and
/// column counts.
pub(crate) fn check_samples<S, D>(
    samples: &ArrayBase<S, D>,
    n_parameters: usize,
) -> Result<ArrayView2<'_, f64>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let ndim = samples.ndim();
    let view = samples.view().into_dimensionality::<Ix2>().map_err(|_| {
        Error::InvalidArgument(format!(
            "samples must be an (n, {n_parameters}) array, got {ndim} dimensions"
        ))
    })?;
    if view.ncols() != n_parameters {
        return invalid(format!(
            "samples must have {n_parameters} columns, got {}",
            view.ncols()
        ));
    }
    Ok(view)
}
