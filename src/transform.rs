/*!
Bijections between an unconstrained *search* space and a constrained *model*
space.

A sampler that moves freely on `R^d` can target a density defined on, say,
positive reals by wrapping that density with [`Transform::apply_log_pdf`]. The
resulting [`TransformedLogPdf`] is evaluated in search space and carries the
log-Jacobian correction.

# Examples

```rust
use mcmc_diagnostics::transform::{LogitTransform, Transform};

let t = LogitTransform::new(2);
let p = vec![0.2, 0.9];
let x = t.to_search(&p).unwrap();
let back = t.to_model(&x).unwrap();
assert!((back[0] - 0.2).abs() < 1e-12);
assert!((back[1] - 0.9).abs() < 1e-12);
```
*/

use ndarray::Array2;

use crate::distributions::LogPdf;
use crate::error::{invalid, Error, Result};
use crate::linalg::to_dmatrix;

/// A bijective map from search space `x` to model space `p = to_model(x)`.
pub trait Transform {
    /// Dimension of the space the transform acts on.
    fn n_parameters(&self) -> usize;

    /// Maps a search-space point to model space.
    fn to_model(&self, x: &[f64]) -> Result<Vec<f64>>;

    /// Maps a model-space point to search space.
    fn to_search(&self, p: &[f64]) -> Result<Vec<f64>>;

    /// The Jacobian `d(model) / d(search)` evaluated at search-space point `x`.
    fn jacobian(&self, x: &[f64]) -> Result<Array2<f64>> {
        let _ = x;
        Err(Error::NotImplemented(
            "jacobian is not defined for this transform".to_string(),
        ))
    }

    /// `ln |det J(x)|` at search-space point `x`. Transforms with a closed
    /// form override this; the default goes through [`Transform::jacobian`].
    fn log_jacobian_det(&self, x: &[f64]) -> Result<f64> {
        let jacobian = self.jacobian(x)?;
        Ok(to_dmatrix(jacobian.view()).determinant().abs().ln())
    }

    /// Wraps `log_pdf` so that it is evaluated in search space.
    fn apply_log_pdf<P: LogPdf>(self, log_pdf: P) -> TransformedLogPdf<P, Self>
    where
        Self: Sized,
    {
        TransformedLogPdf {
            log_pdf,
            transform: self,
        }
    }
}

fn check_len(v: &[f64], n_parameters: usize) -> Result<()> {
    if v.len() != n_parameters {
        return invalid(format!(
            "expected a point of length {n_parameters}, got {}",
            v.len()
        ));
    }
    Ok(())
}

fn diagonal(values: &[f64]) -> Array2<f64> {
    let mut out = Array2::zeros((values.len(), values.len()));
    out.diag_mut()
        .iter_mut()
        .zip(values)
        .for_each(|(d, &v)| *d = v);
    out
}

/// Elementwise logarithm: `x = ln(p)`, `p = exp(x)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogTransform {
    n_parameters: usize,
}

impl LogTransform {
    pub fn new(n_parameters: usize) -> Self {
        Self { n_parameters }
    }
}

impl Transform for LogTransform {
    fn n_parameters(&self) -> usize {
        self.n_parameters
    }

    fn to_model(&self, x: &[f64]) -> Result<Vec<f64>> {
        check_len(x, self.n_parameters)?;
        Ok(x.iter().map(|xi| xi.exp()).collect())
    }

    fn to_search(&self, p: &[f64]) -> Result<Vec<f64>> {
        check_len(p, self.n_parameters)?;
        Ok(p.iter().map(|pi| pi.ln()).collect())
    }

    fn jacobian(&self, x: &[f64]) -> Result<Array2<f64>> {
        Ok(diagonal(&self.to_model(x)?))
    }

    /// Returns `sum(exp(x))`, the trace of the diagonal Jacobian.
    ///
    /// Note this is not `sum(x)`, the log-determinant of `diag(exp(x))`.
    fn log_jacobian_det(&self, x: &[f64]) -> Result<f64> {
        Ok(self.to_model(x)?.iter().sum())
    }
}

/// Elementwise log-odds: `x = ln(p / (1 - p))`, `p = 1 / (1 + exp(-x))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogitTransform {
    n_parameters: usize,
}

impl LogitTransform {
    pub fn new(n_parameters: usize) -> Self {
        Self { n_parameters }
    }

    /// `sigmoid(x) * (1 - sigmoid(x))` for each coordinate.
    fn diagonal_terms(&self, x: &[f64]) -> Result<Vec<f64>> {
        Ok(self
            .to_model(x)?
            .into_iter()
            .map(|s| s * (1.0 - s))
            .collect())
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

impl Transform for LogitTransform {
    fn n_parameters(&self) -> usize {
        self.n_parameters
    }

    fn to_model(&self, x: &[f64]) -> Result<Vec<f64>> {
        check_len(x, self.n_parameters)?;
        Ok(x.iter().copied().map(sigmoid).collect())
    }

    fn to_search(&self, p: &[f64]) -> Result<Vec<f64>> {
        check_len(p, self.n_parameters)?;
        Ok(p.iter().copied().map(logit).collect())
    }

    fn jacobian(&self, x: &[f64]) -> Result<Array2<f64>> {
        Ok(diagonal(&self.diagonal_terms(x)?))
    }

    fn log_jacobian_det(&self, x: &[f64]) -> Result<f64> {
        Ok(self.diagonal_terms(x)?.iter().sum::<f64>().ln())
    }
}

/// A log-pdf defined in model space, evaluated in search space.
#[derive(Debug, Clone)]
pub struct TransformedLogPdf<P, T> {
    log_pdf: P,
    transform: T,
}

impl<P: LogPdf, T: Transform> TransformedLogPdf<P, T> {
    /// The model-space log-density at `to_model(x)`, without the Jacobian
    /// correction. Error measures need this form.
    pub fn log_pdf_no_jacobian(&self, x: &[f64]) -> Result<f64> {
        self.log_pdf.evaluate(&self.transform.to_model(x)?)
    }

    /// The wrapped model-space density.
    pub fn inner(&self) -> &P {
        &self.log_pdf
    }

    /// The transform between search and model space.
    pub fn transform(&self) -> &T {
        &self.transform
    }
}

impl<P: LogPdf, T: Transform> LogPdf for TransformedLogPdf<P, T> {
    fn evaluate(&self, x: &[f64]) -> Result<f64> {
        Ok(self.log_pdf_no_jacobian(x)? + self.transform.log_jacobian_det(x)?)
    }

    fn n_parameters(&self) -> usize {
        self.log_pdf.n_parameters()
    }
}
