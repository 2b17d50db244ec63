use nalgebra::{Cholesky, DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Dimension};
use ndarray_stats::CorrelationExt;
use rand::distributions::Uniform;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use super::{check_samples, gaussian_kl, univariate_gaussian_kl, LN_2PI};
use crate::distributions::{LogPdf, ToyLogPdf};
use crate::error::{invalid, Error, Result};
use crate::linalg::{to_array1, to_array2, to_dmatrix, to_dvector};

/// One mixture component with everything evaluation needs precomputed.
#[derive(Debug, Clone)]
struct Mode {
    mean: DVector<f64>,
    cov: DMatrix<f64>,
    cov_inv: DMatrix<f64>,
    chol_l: DMatrix<f64>,
    log_det: f64,
}

impl Mode {
    fn new(mean: DVector<f64>, cov: DMatrix<f64>) -> Result<Self> {
        let asymmetry = (&cov - cov.transpose()).amax();
        if asymmetry > 1e-12 * (1.0 + cov.amax()) {
            return invalid("covariance matrices must be symmetric");
        }
        let chol = Cholesky::new(cov.clone()).ok_or_else(|| {
            Error::InvalidArgument("covariance matrices must be positive definite".to_string())
        })?;
        let chol_l = chol.l();
        let log_det = 2.0 * chol_l.diagonal().iter().map(|v| v.ln()).sum::<f64>();
        Ok(Self {
            mean,
            cov_inv: chol.inverse(),
            cov,
            chol_l,
            log_det,
        })
    }

    fn log_pdf(&self, x: &DVector<f64>) -> f64 {
        let diff = x - &self.mean;
        let mahalanobis = diff.dot(&(&self.cov_inv * &diff));
        -0.5 * (self.mean.len() as f64 * LN_2PI + self.log_det + mahalanobis)
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> DVector<f64> {
        let z = DVector::<f64>::from_fn(self.mean.len(), |_, _| StandardNormal.sample(rng));
        &self.mean + &self.chol_l * z
    }
}

/**
An unnormalized mixture of multivariate normal densities with equal weights.

The log-density is `ln(sum_i N(x | mu_i, Sigma_i))`. By default the
distribution is two-dimensional with modes at `(0, 0)` and `(10, 10)` and unit
covariances.

# Examples

```rust
use mcmc_diagnostics::distributions::LogPdf;
use mcmc_diagnostics::toy::MultimodalGaussian;

// Three modes in 2-D, unit covariances.
let f = MultimodalGaussian::new(vec![vec![0.0, 0.0], vec![5.0, 5.0], vec![5.0, 0.0]], None).unwrap();
assert_eq!(f.n_parameters(), 2);
let (lp, grad) = f.evaluate_with_gradient(&[1.0, 1.0]).unwrap();
assert!(lp.is_finite());
assert_eq!(grad.len(), 2);
```
*/
#[derive(Debug, Clone)]
pub struct MultimodalGaussian {
    n_parameters: usize,
    modes: Vec<Mode>,
}

impl MultimodalGaussian {
    /// Builds the mixture from mode locations and, optionally, one covariance
    /// matrix per mode (identity matrices otherwise).
    pub fn new(modes: Vec<Vec<f64>>, covariances: Option<Vec<Array2<f64>>>) -> Result<Self> {
        let n_parameters = match modes.first() {
            Some(first) => first.len(),
            None => return invalid("modes must be a non-empty list"),
        };
        if modes.iter().any(|m| m.len() != n_parameters) {
            return invalid("all modes must have the same dimension");
        }

        let covariances: Vec<DMatrix<f64>> = match covariances {
            None => vec![DMatrix::identity(n_parameters, n_parameters); modes.len()],
            Some(covs) => {
                if covs.len() != modes.len() {
                    return invalid(format!(
                        "number of covariance matrices ({}) must equal number of modes ({})",
                        covs.len(),
                        modes.len()
                    ));
                }
                if covs.iter().any(|c| c.dim() != (n_parameters, n_parameters)) {
                    return invalid(format!(
                        "covariance matrices must have shape ({n_parameters}, {n_parameters})"
                    ));
                }
                covs.iter().map(|c| to_dmatrix(c.view())).collect()
            }
        };

        let modes = modes
            .into_iter()
            .zip(covariances)
            .map(|(mean, cov)| Mode::new(DVector::from_vec(mean), cov))
            .collect::<Result<Vec<_>>>()?;
        log::debug!(
            "Built multimodal Gaussian with {} modes in {} dimensions",
            modes.len(),
            n_parameters
        );

        Ok(Self {
            n_parameters,
            modes,
        })
    }

    /// Mode locations, in construction order.
    pub fn modes(&self) -> Vec<Array1<f64>> {
        self.modes.iter().map(|m| to_array1(&m.mean)).collect()
    }

    /// Covariance matrices, in construction order.
    pub fn covariances(&self) -> Vec<Array2<f64>> {
        self.modes.iter().map(|m| to_array2(&m.cov)).collect()
    }

    pub fn n_modes(&self) -> usize {
        self.modes.len()
    }

    fn point(&self, x: &[f64]) -> Result<DVector<f64>> {
        if x.len() != self.n_parameters {
            return invalid(format!(
                "expected a point of length {}, got {}",
                self.n_parameters,
                x.len()
            ));
        }
        Ok(DVector::from_column_slice(x))
    }

    /**
    Approximate KL divergence between `samples` and each mode.

    Every sample is assigned to the mode under which it has the highest
    log-density (the first such mode on ties). For each mode, the empirical mean
    and covariance of its samples are compared with the mode's true parameters
    using the Gaussian KL divergence. A mode with fewer than two assigned
    samples is compared against all samples instead.

    `samples` must be an `(n, d)` array with `n >= 2`.
    */
    pub fn kl_divergence<S, D>(&self, samples: &ArrayBase<S, D>) -> Result<Array1<f64>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let samples = check_samples(samples, self.n_parameters)?;
        if samples.nrows() < 2 {
            return invalid("at least two samples are needed to estimate a covariance");
        }

        let best_mode: Vec<Option<usize>> = samples
            .rows()
            .into_iter()
            .map(|row| {
                let x = to_dvector(row);
                let mut best = f64::NEG_INFINITY;
                let mut best_index = None;
                for (j, mode) in self.modes.iter().enumerate() {
                    let lp = mode.log_pdf(&x);
                    if lp > best {
                        best = lp;
                        best_index = Some(j);
                    }
                }
                best_index
            })
            .collect();

        self.modes
            .iter()
            .enumerate()
            .map(|(i, mode)| -> Result<f64> {
                let rows: Vec<usize> = best_mode
                    .iter()
                    .enumerate()
                    .filter(|(_, b)| **b == Some(i))
                    .map(|(r, _)| r)
                    .collect();
                let assigned = if rows.len() < 2 {
                    samples.to_owned()
                } else {
                    samples.select(Axis(0), &rows)
                };

                let m0 = assigned
                    .mean_axis(Axis(0))
                    .ok_or_else(|| Error::InvalidArgument("samples are empty".to_string()))?;
                let s0 = assigned
                    .t()
                    .cov(1.0)
                    .map_err(|e| Error::InvalidArgument(e.to_string()))?;

                let kl = if self.n_parameters == 1 {
                    univariate_gaussian_kl(m0[0], s0[[0, 0]], mode.mean[0], mode.cov[(0, 0)])
                } else {
                    gaussian_kl(
                        &to_dvector(m0.view()),
                        &to_dmatrix(s0.view()),
                        &mode.mean,
                        &mode.cov_inv,
                        mode.log_det,
                    )
                };
                Ok(kl)
            })
            .collect()
    }
}

impl Default for MultimodalGaussian {
    fn default() -> Self {
        Self::new(vec![vec![0.0, 0.0], vec![10.0, 10.0]], None)
            .expect("Expected the default modes to be valid")
    }
}

impl LogPdf for MultimodalGaussian {
    /// Returns `f64::NEG_INFINITY` where the summed density underflows to zero.
    fn evaluate(&self, x: &[f64]) -> Result<f64> {
        let x = self.point(x)?;
        let f: f64 = self.modes.iter().map(|m| m.log_pdf(&x).exp()).sum();
        Ok(if f == 0.0 { f64::NEG_INFINITY } else { f.ln() })
    }

    /// The gradient is the density-weighted average of the per-mode scores
    /// `-Sigma_i^-1 (x - mu_i)`. Weights are normalized in log space. Where
    /// every mode's log-density overflows to `-inf`, the modes are weighted
    /// equally, so the gradient still points back towards them.
    fn evaluate_with_gradient(&self, x: &[f64]) -> Result<(f64, Vec<f64>)> {
        let value = self.evaluate(x)?;
        let x = self.point(x)?;

        let log_pdfs: Vec<f64> = self.modes.iter().map(|m| m.log_pdf(&x)).collect();
        let max = log_pdfs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let weights: Vec<f64> = if max.is_finite() {
            let log_total = max + log_pdfs.iter().map(|lp| (lp - max).exp()).sum::<f64>().ln();
            log_pdfs.iter().map(|lp| (lp - log_total).exp()).collect()
        } else {
            vec![1.0 / self.modes.len() as f64; self.modes.len()]
        };

        let mut gradient = DVector::<f64>::zeros(self.n_parameters);
        for (mode, weight) in self.modes.iter().zip(weights) {
            gradient -= (&mode.cov_inv * (&x - &mode.mean)) * weight;
        }
        Ok((value, gradient.iter().copied().collect()))
    }

    fn n_parameters(&self) -> usize {
        self.n_parameters
    }
}

impl ToyLogPdf for MultimodalGaussian {
    /// Picks a mode uniformly at random for every draw, then samples it.
    fn sample<R: Rng + ?Sized>(&self, n_samples: usize, rng: &mut R) -> Result<Array2<f64>> {
        if n_samples < 1 {
            return invalid("number of samples must be at least 1");
        }
        let choose_mode = Uniform::new(0, self.modes.len());
        let mut samples = Array2::<f64>::zeros((n_samples, self.n_parameters));
        for mut row in samples.rows_mut() {
            let mode = choose_mode.sample(rng);
            let draw = self.modes[mode].draw(rng);
            row.iter_mut().zip(draw.iter()).for_each(|(r, v)| *r = *v);
        }
        Ok(samples)
    }

    /// The same box on every axis, three times as wide as the spread of all
    /// mode coordinates.
    fn suggested_bounds(&self) -> Array2<f64> {
        let coords = self.modes.iter().flat_map(|m| m.mean.iter().copied());
        let (min, max) = coords.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        let range = max - min;
        let (lower, upper) = (min - range, max + range);
        Array2::from_shape_fn((2, self.n_parameters), |(i, _)| if i == 0 { lower } else { upper })
    }

    /// Sum of the per-mode divergences from [`MultimodalGaussian::kl_divergence`].
    fn distance<S, D>(&self, samples: &ArrayBase<S, D>) -> Result<f64>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        Ok(self.kl_divergence(samples)?.sum())
    }
}
