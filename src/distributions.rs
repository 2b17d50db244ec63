/*!
Traits for log-densities that samplers query and for toy targets with known
ground truth.

A [`LogPdf`] returns the (possibly unnormalized) natural log of a density and,
optionally, its gradient. A [`ToyLogPdf`] additionally knows how to draw exact
samples from itself and how far a set of samples is from it, which is what makes
it useful for testing samplers.

# Examples

```rust
use mcmc_diagnostics::distributions::{LogPdf, ToyLogPdf};
use mcmc_diagnostics::toy::NealsFunnel;
use rand::rngs::SmallRng;
use rand::SeedableRng;

let funnel = NealsFunnel::new(3).unwrap();
let lp = funnel.evaluate(&[0.1, -0.2, 0.5]).unwrap();
assert!(lp.is_finite());

let mut rng = SmallRng::seed_from_u64(42);
let samples = funnel.sample(1000, &mut rng).unwrap();
assert_eq!(samples.dim(), (1000, 3));
let kl = funnel.distance(&samples).unwrap();
println!("KL divergence of exact samples: {kl}");
```
*/

use ndarray::{Array2, ArrayBase, Data, Dimension};
use rand::Rng;

use crate::error::{Error, Result};

/// A log-density over a fixed number of real parameters.
pub trait LogPdf {
    /// Returns the log of the density at `x`.
    fn evaluate(&self, x: &[f64]) -> Result<f64>;

    /// Returns the log-density at `x` together with its gradient.
    ///
    /// Densities without an analytic gradient keep this default, which fails
    /// with [`Error::NotImplemented`].
    fn evaluate_with_gradient(&self, x: &[f64]) -> Result<(f64, Vec<f64>)> {
        let _ = x;
        Err(Error::NotImplemented(
            "this log-pdf does not provide a gradient".to_string(),
        ))
    }

    /// Dimension of the parameter space.
    fn n_parameters(&self) -> usize;
}

/// A [`LogPdf`] with analytic properties that can be used to check samplers.
pub trait ToyLogPdf: LogPdf {
    /// Draws `n_samples` exact samples, one row per sample.
    fn sample<R: Rng + ?Sized>(&self, n_samples: usize, rng: &mut R) -> Result<Array2<f64>>;

    /// A box that holds most of the probability mass: row 0 is the lower
    /// bound and row 1 the upper bound of each dimension.
    fn suggested_bounds(&self) -> Array2<f64>;

    /// A scalar discrepancy between `samples` and this distribution. Zero
    /// for perfect sampling, growing as the samples drift away.
    fn distance<S, D>(&self, samples: &ArrayBase<S, D>) -> Result<f64>
    where
        S: Data<Elem = f64>,
        D: Dimension;
}

impl<P: LogPdf + ?Sized> LogPdf for &P {
    fn evaluate(&self, x: &[f64]) -> Result<f64> {
        (**self).evaluate(x)
    }

    fn evaluate_with_gradient(&self, x: &[f64]) -> Result<(f64, Vec<f64>)> {
        (**self).evaluate_with_gradient(x)
    }

    fn n_parameters(&self) -> usize {
        (**self).n_parameters()
    }
}

#[cfg(test)]
mod distributions_tests {
    use super::*;

    struct Flat(usize);

    impl LogPdf for Flat {
        fn evaluate(&self, _x: &[f64]) -> Result<f64> {
            Ok(0.0)
        }

        fn n_parameters(&self) -> usize {
            self.0
        }
    }

    #[test]
    fn default_gradient_is_not_implemented() {
        let flat = Flat(2);
        let err = flat.evaluate_with_gradient(&[0.0, 0.0]).unwrap_err();
        assert!(matches!(err, Error::NotImplemented(_)));
    }

    #[test]
    fn references_forward_to_the_density() {
        let flat = Flat(3);
        let by_ref = &flat;
        assert_eq!(by_ref.n_parameters(), 3);
        assert_eq!(by_ref.evaluate(&[1.0, 2.0, 3.0]).unwrap(), 0.0);
    }
}
