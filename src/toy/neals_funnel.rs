use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Dimension};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use super::{check_samples, normal_log_pdf, univariate_gaussian_kl};
use crate::distributions::{LogPdf, ToyLogPdf};
use crate::error::{invalid, Result};

/// Standard deviation of the neck parameter `nu`.
const NU_SD: f64 = 3.0;
const NU_VAR: f64 = NU_SD * NU_SD;

/// Half-width of the suggested bounding box on every axis.
const BOUNDS_MAGNITUDE: f64 = 30.0;

/**
Neal's funnel in `d >= 2` dimensions.

The last coordinate `nu` follows `N(0, 3)`; the first `d - 1` coordinates are
independent `N(0, exp(nu / 2))` given `nu`:

```text
f(x_1, ..., x_{d-1}, nu) = prod_i N(x_i | 0, exp(nu / 2)) * N(nu | 0, 3)
```

R. Neal, "Slice sampling", Annals of Statistics 31 (2003), 705-767.

# Examples

```rust
use mcmc_diagnostics::distributions::LogPdf;
use mcmc_diagnostics::toy::NealsFunnel;

let funnel = NealsFunnel::default();
assert_eq!(funnel.n_parameters(), 10);
assert!(NealsFunnel::new(1).is_err());
```
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NealsFunnel {
    n_parameters: usize,
}

impl NealsFunnel {
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions < 2 {
            return invalid(format!("dimensions must exceed 1, got {dimensions}"));
        }
        Ok(Self {
            n_parameters: dimensions,
        })
    }

    /// Joint log-density `log p(x_i, nu)` of one funnel coordinate and the
    /// neck parameter.
    pub fn marginal_log_pdf(&self, x: f64, nu: f64) -> f64 {
        normal_log_pdf(x, 0.0, (nu / 2.0).exp()) + normal_log_pdf(nu, 0.0, NU_SD)
    }

    /// KL divergence between the `nu` column of `samples` and the analytic
    /// `N(0, 3)` marginal.
    pub fn kl_divergence<S, D>(&self, samples: &ArrayBase<S, D>) -> Result<f64>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let samples = check_samples(samples, self.n_parameters)?;
        if samples.nrows() == 0 {
            return invalid("samples are empty");
        }
        let nu = samples.index_axis(Axis(1), self.n_parameters - 1);
        let m0 = nu.sum() / nu.len() as f64;
        let s0 = nu.var(0.0);
        Ok(univariate_gaussian_kl(m0, s0, 0.0, NU_VAR))
    }

    /// Analytic mean of every coordinate.
    pub fn mean(&self) -> Array1<f64> {
        Array1::zeros(self.n_parameters)
    }

    /// Analytic marginal variances; `nu` is the last entry.
    pub fn var(&self) -> Array1<f64> {
        let mut var = Array1::from_elem(self.n_parameters, 90.0);
        var[self.n_parameters - 1] = NU_VAR;
        var
    }
}

impl Default for NealsFunnel {
    fn default() -> Self {
        Self { n_parameters: 10 }
    }
}

impl LogPdf for NealsFunnel {
    fn evaluate(&self, x: &[f64]) -> Result<f64> {
        if x.len() != self.n_parameters {
            return invalid(format!(
                "length of x ({}) must equal the number of parameters ({})",
                x.len(),
                self.n_parameters
            ));
        }
        let (rest, nu) = x.split_at(self.n_parameters - 1);
        let nu = nu[0];
        let sd = (nu / 2.0).exp();
        let lp: f64 = rest.iter().map(|&xi| normal_log_pdf(xi, 0.0, sd)).sum();
        Ok(lp + normal_log_pdf(nu, 0.0, NU_SD))
    }

    fn evaluate_with_gradient(&self, x: &[f64]) -> Result<(f64, Vec<f64>)> {
        let value = self.evaluate(x)?;
        let (rest, nu) = x.split_at(self.n_parameters - 1);
        let nu = nu[0];
        let precision = (-nu).exp();

        let mut gradient: Vec<f64> = rest.iter().map(|xi| -xi * precision).collect();
        let dnu = rest
            .iter()
            .map(|xi| 0.5 * (precision * xi * xi - 1.0))
            .sum::<f64>()
            - nu / NU_VAR;
        gradient.push(dnu);
        Ok((value, gradient))
    }

    fn n_parameters(&self) -> usize {
        self.n_parameters
    }
}

impl ToyLogPdf for NealsFunnel {
    /// Draws `nu` first, then the remaining coordinates given `nu`.
    fn sample<R: Rng + ?Sized>(&self, n_samples: usize, rng: &mut R) -> Result<Array2<f64>> {
        let d = self.n_parameters;
        let mut samples = Array2::<f64>::zeros((n_samples, d));
        for mut row in samples.rows_mut() {
            let z: f64 = StandardNormal.sample(rng);
            let nu = NU_SD * z;
            let sd = (nu / 2.0).exp();
            for xi in row.iter_mut().take(d - 1) {
                let z: f64 = StandardNormal.sample(rng);
                *xi = sd * z;
            }
            row[d - 1] = nu;
        }
        Ok(samples)
    }

    fn suggested_bounds(&self) -> Array2<f64> {
        Array2::from_shape_fn((2, self.n_parameters), |(i, _)| {
            if i == 0 {
                -BOUNDS_MAGNITUDE
            } else {
                BOUNDS_MAGNITUDE
            }
        })
    }

    /// Same as [`NealsFunnel::kl_divergence`].
    fn distance<S, D>(&self, samples: &ArrayBase<S, D>) -> Result<f64>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        self.kl_divergence(samples)
    }
}
