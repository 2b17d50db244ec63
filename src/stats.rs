//! Estimators behind the MCMC summary: pooling of chains, quantiles,
//! autocorrelation, effective sample size and the Gelman-Rubin statistic.

use ndarray::{concatenate, prelude::*, stack};
use ndarray_stats::{interpolate::Linear, QuantileExt};
use noisy_float::types::N64;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::error::{invalid, Error, Result};

/// Series up to this length use the direct autocovariance sum.
const BRUTE_FORCE_MAX_LEN: usize = 100;

/// Stacks chains on top of each other into one `(sum of draws, params)` array.
pub fn stack_chains(chains: &[Array2<f64>]) -> Result<Array2<f64>> {
    let views: Vec<ArrayView2<f64>> = chains.iter().map(|c| c.view()).collect();
    concatenate(Axis(0), &views).map_err(|e| Error::InvalidArgument(e.to_string()))
}

/// Per-column quantiles, one row per entry of `probs`.
///
/// Uses linear interpolation between order statistics: for probability `q`
/// and `n` values the position is `q (n - 1)`. NaN draws are skipped.
///
/// # Errors
/// [`Error::InvalidArgument`] if there are no draws or a probability lies
/// outside `[0, 1]`.
pub fn quantiles(samples: ArrayView2<f64>, probs: &[f64]) -> Result<Array2<f64>> {
    let mut draws = samples.to_owned();
    let mut out = Array2::<f64>::zeros((probs.len(), samples.ncols()));
    for (mut row, &q) in out.rows_mut().into_iter().zip(probs) {
        let q = N64::try_new(q)
            .ok_or_else(|| Error::InvalidArgument(format!("quantile {q} is NaN")))?;
        let values = draws
            .quantile_axis_skipnan_mut(Axis(0), q, &Linear)
            .map_err(|e| Error::InvalidArgument(e.to_string()))?;
        row.assign(&values);
    }
    Ok(out)
}

/// Normalized autocorrelation of `x` for lags `0..n`.
///
/// A constant series has no defined autocorrelation and yields NaN.
pub fn autocorrelation(x: ArrayView1<f64>) -> Array1<f64> {
    let acov = autocov(x);
    match acov.first() {
        Some(&c0) => acov / c0,
        None => acov,
    }
}

fn autocov(x: ArrayView1<f64>) -> Array1<f64> {
    if x.len() <= BRUTE_FORCE_MAX_LEN {
        autocov_bf(x)
    } else {
        autocov_fft(x)
    }
}

/// Autocovariance through the FFT, zero-padded to avoid circular wrap-around.
/// `rustfft` does not normalize, so the `1 / n_padded` factor is applied here.
fn autocov_fft(x: ArrayView1<f64>) -> Array1<f64> {
    let n = x.len();
    if n == 0 {
        return Array1::zeros(0);
    }
    let mut n_padded = 1;
    while n_padded < 2 * n - 1 {
        n_padded <<= 1;
    }
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n_padded);
    let ffti = planner.plan_fft_inverse(n_padded);

    let mean = x.sum() / n as f64;
    let mut buffer: Vec<Complex<f64>> = x
        .iter()
        .map(|xi| Complex::new(xi - mean, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)).take(n_padded - n))
        .collect();
    fft.process(&mut buffer);
    buffer
        .iter_mut()
        .for_each(|c| *c = Complex::new(c.norm_sqr(), 0.0));
    ffti.process(&mut buffer);
    buffer
        .iter()
        .take(n)
        .map(|c| c.re / n_padded as f64 / n as f64)
        .collect()
}

/// Direct autocovariance: `sum_t (x_t - m)(x_{t+lag} - m) / n` for every lag.
fn autocov_bf(x: ArrayView1<f64>) -> Array1<f64> {
    let n = x.len();
    if n == 0 {
        return Array1::zeros(0);
    }
    let centered = &x - x.sum() / n as f64;
    (0..n)
        .map(|lag| {
            let head = centered.slice(s![..n - lag]);
            let tail = centered.slice(s![lag..]);
            head.dot(&tail) / n as f64
        })
        .collect()
}

/// Effective sample size of every column of `samples` (rows are draws).
///
/// For a column of length `n` with autocorrelation `rho`, the estimate is
/// `n / (1 + 2 * sum_{k=1}^{T-1} rho_k)` where `T` is the first lag with a
/// negative autocorrelation. A constant column has no measurable correlation
/// and gets `n`.
pub fn effective_sample_size(samples: ArrayView2<f64>) -> Array1<f64> {
    samples
        .axis_iter(Axis(1))
        .map(effective_sample_size_single)
        .collect()
}

fn effective_sample_size_single(x: ArrayView1<f64>) -> f64 {
    let n = x.len() as f64;
    if x.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let rho = autocorrelation(x);
    if rho.is_empty() || !rho[0].is_finite() {
        return n;
    }
    let first_negative = rho
        .iter()
        .position(|&r| r < 0.0)
        .unwrap_or(rho.len());
    let tau = 1.0 + 2.0 * rho.slice(s![1..first_negative.max(1)]).sum();
    n / tau
}

/// Gelman-Rubin potential scale reduction factor of every parameter.
///
/// Each chain is a `(draws, params)` array; chains must share the number of
/// parameters and hold at least two draws. With `m` chains of average length
/// `n`, `W` the mean within-chain variance and `B` the between-chain variance
/// `n / (m - 1) * sum (mean_c - mean)^2`, the result is
/// `sqrt(((n - 1) / n * W + B / n) / W)`.
pub fn rhat(chains: &[ArrayView2<f64>]) -> Result<Array1<f64>> {
    if chains.len() < 2 {
        return invalid(format!(
            "rhat needs at least two chains, got {}",
            chains.len()
        ));
    }
    let n_params = chains[0].ncols();
    if chains.iter().any(|c| c.ncols() != n_params) {
        return invalid("all chains must have the same number of parameters");
    }
    if chains.iter().any(|c| c.nrows() < 2) {
        return invalid("every chain needs at least two draws");
    }

    let means: Vec<Array1<f64>> = chains
        .iter()
        .map(|c| {
            c.mean_axis(Axis(0))
                .ok_or_else(|| Error::InvalidArgument("chains must not be empty".to_string()))
        })
        .collect::<Result<_>>()?;
    let vars: Vec<Array1<f64>> = chains.iter().map(|c| c.var_axis(Axis(0), 1.0)).collect();
    let means_view: Vec<ArrayView1<f64>> = means.iter().map(|m| m.view()).collect();
    let vars_view: Vec<ArrayView1<f64>> = vars.iter().map(|v| v.view()).collect();
    let means = stack(Axis(0), &means_view).map_err(|e| Error::InvalidArgument(e.to_string()))?;
    let vars = stack(Axis(0), &vars_view).map_err(|e| Error::InvalidArgument(e.to_string()))?;

    let n_chains = chains.len() as f64;
    let n = chains.iter().map(|c| c.nrows() as f64).sum::<f64>() / n_chains;

    let within = vars.sum_axis(Axis(0)) / n_chains;
    let global_means = means.sum_axis(Axis(0)) / n_chains;
    let between = (&means - &global_means.insert_axis(Axis(0)))
        .pow2()
        .sum_axis(Axis(0))
        * (n / (n_chains - 1.0));

    let var = &within * ((n - 1.0) / n) + between / n;
    Ok((var / within).sqrt())
}
