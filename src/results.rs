/*!
Posterior summaries and convergence diagnostics of a set of MCMC chains.

[`McmcResults`] takes one or more chains (each a `(draws, params)` array),
computes everything at construction and then only hands out the results:

- posterior mean, standard deviation and the 2.5%, 25%, 50%, 75% and 97.5%
  quantiles over all chains pooled together,
- the Gelman-Rubin `rhat` between the chains,
- the effective sample size (ESS) of the pooled draws and, if the run time is
  known, ESS per second.

If a single chain is given, it is split into two halves so that `rhat` can
still be computed; a warning is logged because such summaries are less
reliable.

# Examples

```rust
use mcmc_diagnostics::results::McmcResults;
use ndarray::Array2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

let mut rng = SmallRng::seed_from_u64(42);
let chains: Vec<Array2<f64>> = (0..3)
    .map(|_| Array2::from_shape_fn((500, 2), |_| rng.sample::<f64, _>(StandardNormal)))
    .collect();

let results = McmcResults::new(chains, Some(1.5), None).unwrap();
assert_eq!(results.parameter_names(), ["param 1", "param 2"]);
assert!(results.rhat().iter().all(|&r| r < 1.1));
println!("{results}");
```

References:
- A. Gelman and D. Rubin, "Inference from iterative simulation using multiple
  sequences", Statistical Science (1992).
- A. Gelman et al., "Bayesian Data Analysis", 3rd edition, CRC Press (2014).
*/

use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use ndarray_stats::QuantileExt;
use std::fmt;
use tabled::{builder::Builder, settings::Style};

use crate::error::{invalid, Error, Result};
use crate::stats::{effective_sample_size, quantiles, rhat, stack_chains};

/// Probabilities of the reported posterior quantiles.
pub const QUANTILE_PROBS: [f64; 5] = [0.025, 0.25, 0.5, 0.75, 0.975];

const HEADERS: [&str; 10] = [
    "param", "mean", "std.", "2.5%", "25%", "50%", "75%", "97.5%", "rhat", "ess",
];
const ESS_PER_SECOND_HEADER: &str = "ess per sec.";

/// Summary of one parameter, as shown in one row of the summary table.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub name: String,
    pub mean: f64,
    pub std: f64,
    /// Quantiles at [`QUANTILE_PROBS`].
    pub quantiles: [f64; 5],
    pub rhat: f64,
    pub ess: f64,
    pub ess_per_second: Option<f64>,
}

impl SummaryRow {
    fn cells(&self) -> Vec<String> {
        let mut cells = vec![
            self.name.clone(),
            format!("{:.2}", self.mean),
            format!("{:.2}", self.std),
        ];
        cells.extend(self.quantiles.iter().map(|q| format!("{q:.2}")));
        cells.push(format!("{:.2}", self.rhat));
        cells.push(format!("{:.2}", self.ess));
        if let Some(eps) = self.ess_per_second {
            cells.push(format!("{eps:.2}"));
        }
        cells
    }
}

/// Summary statistics and diagnostics of a set of chains.
#[derive(Debug, Clone)]
pub struct McmcResults {
    chains: Vec<Array2<f64>>,
    n_parameters: usize,
    time: Option<f64>,
    parameter_names: Vec<String>,
    mean: Array1<f64>,
    std: Array1<f64>,
    quantiles: Array2<f64>,
    rhat: Array1<f64>,
    ess: Array1<f64>,
    ess_per_second: Option<Array1<f64>>,
    summary: Vec<SummaryRow>,
}

impl McmcResults {
    /**
    Validates the input and computes all summaries.

    # Arguments
    * `chains` - One or more `(draws, params)` arrays with the same number of
      columns. A single chain is split into two equal halves (dropping the last
      draw if the length is odd).
    * `time` - Optional sampling run time in seconds; must be positive.
    * `parameter_names` - Optional labels, one per column. Defaults to
      `"param 1"`, `"param 2"`, ...

    # Errors
    [`Error::InvalidArgument`] if no chain is given, the chains disagree on the
    number of parameters, a chain has fewer than two draws, `time` is not
    positive, or the number of names does not match the number of parameters.
    */
    pub fn new(
        chains: Vec<Array2<f64>>,
        time: Option<f64>,
        parameter_names: Option<Vec<String>>,
    ) -> Result<Self> {
        let chains = normalize_chains(chains)?;
        let n_parameters = chains[0].ncols();

        if let Some(t) = time {
            if !(t > 0.0 && t.is_finite()) {
                return invalid(format!("elapsed time must be positive, got {t}"));
            }
        }

        let parameter_names = match parameter_names {
            Some(names) if names.len() != n_parameters => {
                return invalid(format!(
                    "parameter names list ({}) must be same length as number of sampled parameters ({})",
                    names.len(),
                    n_parameters
                ));
            }
            Some(names) => names,
            None => (1..=n_parameters).map(|i| format!("param {i}")).collect(),
        };

        let stacked = stack_chains(&chains)?;
        let mean = stacked
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::InvalidArgument("chains are empty".to_string()))?;
        let std = stacked.std_axis(Axis(0), 0.0);
        let quantiles = quantiles(stacked.view(), &QUANTILE_PROBS)?;
        let ess = effective_sample_size(stacked.view());
        let ess_per_second = time.map(|t| &ess / t);

        let views: Vec<ArrayView2<f64>> = chains.iter().map(|c| c.view()).collect();
        let rhat = rhat(&views)?;

        let summary = (0..n_parameters)
            .map(|i| SummaryRow {
                name: parameter_names[i].clone(),
                mean: mean[i],
                std: std[i],
                quantiles: [
                    quantiles[[0, i]],
                    quantiles[[1, i]],
                    quantiles[[2, i]],
                    quantiles[[3, i]],
                    quantiles[[4, i]],
                ],
                rhat: rhat[i],
                ess: ess[i],
                ess_per_second: ess_per_second.as_ref().map(|e| e[i]),
            })
            .collect();

        log::debug!(
            "Summarized {} chains with {} draws of {} parameters",
            chains.len(),
            stacked.nrows(),
            n_parameters
        );

        Ok(Self {
            chains,
            n_parameters,
            time,
            parameter_names,
            mean,
            std,
            quantiles,
            rhat,
            ess,
            ess_per_second,
            summary,
        })
    }

    /// The chains the statistics were computed from, after splitting a single
    /// input chain.
    pub fn chains(&self) -> &[Array2<f64>] {
        &self.chains
    }

    pub fn n_parameters(&self) -> usize {
        self.n_parameters
    }

    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    /// Sampling run time in seconds, if given.
    pub fn time(&self) -> Option<f64> {
        self.time
    }

    /// Posterior mean of each parameter.
    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    /// Posterior standard deviation (population, `ddof = 0`) of each parameter.
    pub fn std(&self) -> &Array1<f64> {
        &self.std
    }

    /// Quantiles at [`QUANTILE_PROBS`]: one row per probability, one column
    /// per parameter.
    pub fn quantiles(&self) -> &Array2<f64> {
        &self.quantiles
    }

    /// Gelman-Rubin `rhat` of each parameter. With a single input chain this
    /// compares its two halves.
    pub fn rhat(&self) -> &Array1<f64> {
        &self.rhat
    }

    /// The largest `rhat` over all parameters, `None` if undefined (no
    /// parameters or NaN values).
    pub fn max_rhat(&self) -> Option<f64> {
        self.rhat.max().ok().copied()
    }

    /// Effective sample size of each parameter.
    pub fn ess(&self) -> &Array1<f64> {
        &self.ess
    }

    /// Effective samples per second of run time, if the time was given.
    pub fn ess_per_second(&self) -> Option<&Array1<f64>> {
        self.ess_per_second.as_ref()
    }

    /// One [`SummaryRow`] per parameter, in parameter order.
    pub fn summary(&self) -> &[SummaryRow] {
        &self.summary
    }
}

/// Brings the input into a form with at least two chains sharing the number
/// of parameters, each with at least two draws.
fn normalize_chains(mut chains: Vec<Array2<f64>>) -> Result<Vec<Array2<f64>>> {
    let chains = match chains.len() {
        0 => return invalid("at least one chain is required"),
        1 => {
            log::warn!(
                "Summaries calculated with one chain may be unreliable. \
                 It is recommended that you rerun sampling with more than one chain"
            );
            let chain = chains.remove(0);
            let half = chain.nrows() / 2;
            let first = chain.slice(s![..half, ..]).to_owned();
            let second = chain.slice(s![half..2 * half, ..]).to_owned();
            vec![first, second]
        }
        _ => chains,
    };

    let n_parameters = chains[0].ncols();
    if chains.iter().any(|c| c.ncols() != n_parameters) {
        return invalid("all chains must have the same number of parameters");
    }
    if chains.iter().any(|c| c.nrows() < 2) {
        return invalid("every chain needs at least two draws (a single chain at least four)");
    }
    Ok(chains)
}

impl fmt::Display for McmcResults {
    /// Renders the summary as a table with one row per parameter.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = Builder::default();

        let mut headers: Vec<&str> = HEADERS.to_vec();
        if self.time.is_some() {
            headers.push(ESS_PER_SECOND_HEADER);
        }
        builder.push_record(headers);
        for row in &self.summary {
            builder.push_record(row.cells());
        }

        let mut table = builder.build();
        table.with(Style::psql());
        writeln!(f, "{table}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    use rand_distr::StandardNormal;

    fn two_chains() -> Vec<Array2<f64>> {
        vec![
            array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]],
            array![[4.0, 40.0], [5.0, 50.0], [6.0, 60.0], [7.0, 70.0]],
        ]
    }

    #[test]
    fn pooled_mean_and_std() {
        let results = McmcResults::new(two_chains(), None, None).unwrap();
        assert_abs_diff_eq!(*results.mean(), array![4.0, 40.0], epsilon = 1e-12);
        // Population std of 1..=7 is 2.
        assert_abs_diff_eq!(*results.std(), array![2.0, 20.0], epsilon = 1e-12);
        assert_abs_diff_eq!(
            results.quantiles().column(0).to_owned(),
            array![1.15, 2.5, 4.0, 5.5, 6.85],
            epsilon = 1e-12
        );
    }

    #[test]
    fn default_and_custom_names() {
        let results = McmcResults::new(two_chains(), None, None).unwrap();
        assert_eq!(results.parameter_names(), ["param 1", "param 2"]);

        let names = vec!["alpha".to_string(), "beta".to_string()];
        let results = McmcResults::new(two_chains(), None, Some(names)).unwrap();
        assert_eq!(results.summary()[1].name, "beta");

        let err = McmcResults::new(two_chains(), None, Some(vec!["alpha".to_string()]));
        assert!(matches!(err, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn time_must_be_positive() {
        for t in [0.0, -1.0, f64::NAN] {
            assert!(matches!(
                McmcResults::new(two_chains(), Some(t), None),
                Err(Error::InvalidArgument(_))
            ));
        }
        let results = McmcResults::new(two_chains(), Some(2.0), None).unwrap();
        assert_eq!(results.time(), Some(2.0));
        let eps = results.ess_per_second().unwrap();
        assert_abs_diff_eq!(*eps, results.ess() / 2.0, epsilon = 1e-12);
        assert_eq!(results.summary()[0].ess_per_second, Some(eps[0]));
    }

    #[test]
    fn without_time_there_is_no_ess_per_second() {
        let results = McmcResults::new(two_chains(), None, None).unwrap();
        assert!(results.ess_per_second().is_none());
        assert!(results.summary().iter().all(|r| r.ess_per_second.is_none()));
    }

    #[test]
    fn single_chain_is_split_in_equal_halves() {
        let chain = Array2::from_shape_fn((9, 2), |(i, j)| (i * 2 + j) as f64);
        let results = McmcResults::new(vec![chain], None, None).unwrap();
        let chains = results.chains();
        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0].dim(), (4, 2));
        assert_eq!(chains[1].dim(), (4, 2));
        assert_eq!(chains[1][[0, 0]], 8.0);
        // The odd trailing draw is not part of the pooled statistics.
        assert_abs_diff_eq!(results.mean()[0], 7.0, epsilon = 1e-12);
    }

    #[test]
    fn chain_set_errors() {
        assert!(matches!(
            McmcResults::new(vec![], None, None),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            McmcResults::new(vec![Array2::zeros((10, 2)), Array2::zeros((10, 3))], None, None),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            McmcResults::new(vec![Array2::zeros((3, 2))], None, None),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            McmcResults::new(vec![Array2::zeros((10, 2)), Array2::zeros((1, 2))], None, None),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn summary_table_lists_every_parameter() {
        let names = vec!["mu".to_string(), "sigma".to_string()];
        let results = McmcResults::new(two_chains(), Some(1.0), Some(names)).unwrap();
        let table = results.to_string();
        let lines: Vec<&str> = table.lines().map(str::trim).collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("param"));
        assert!(lines[0].ends_with("ess per sec."));
        assert!(lines[1].starts_with("-----"));
        assert!(lines[2].starts_with("mu "));
        assert!(lines[2].contains("4.00"));
        assert!(lines[3].starts_with("sigma"));
        assert!(lines[3].contains("40.00"));

        let without_time = McmcResults::new(two_chains(), None, None).unwrap().to_string();
        assert!(!without_time.contains("ess per sec."));
        assert!(without_time.lines().next().unwrap().trim().ends_with("ess"));
    }

    #[test]
    fn single_chain_matches_its_two_halves() {
        let mut rng = SmallRng::seed_from_u64(99);
        let chain = Array2::from_shape_fn((200, 3), |_| rng.sample::<f64, _>(StandardNormal));
        let halves = vec![
            chain.slice(s![..100, ..]).to_owned(),
            chain.slice(s![100.., ..]).to_owned(),
        ];

        let single = McmcResults::new(vec![chain], Some(2.0), None).unwrap();
        let split = McmcResults::new(halves, Some(2.0), None).unwrap();

        assert_eq!(single.chains(), split.chains());
        assert_eq!(single.parameter_names(), split.parameter_names());
        assert_eq!(single.mean(), split.mean());
        assert_eq!(single.std(), split.std());
        assert_eq!(single.quantiles().dim(), (QUANTILE_PROBS.len(), 3));
        assert_eq!(single.quantiles(), split.quantiles());
        assert_eq!(single.rhat(), split.rhat());
        assert_eq!(single.ess(), split.ess());
        assert_eq!(single.ess_per_second(), split.ess_per_second());
        assert_eq!(single.summary(), split.summary());
        assert_eq!(single.to_string(), split.to_string());
    }

    #[test]
    fn max_rhat_is_largest_entry() {
        let results = McmcResults::new(two_chains(), None, None).unwrap();
        let max = results.rhat().iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(results.max_rhat(), Some(max));
    }
}
