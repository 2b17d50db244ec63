//! End-to-end tests of the chain diagnostics: synthetic chains with known
//! behavior, and chains produced by a random-walk Metropolis sampler on a toy
//! target.

use mcmc_diagnostics::distributions::{LogPdf, ToyLogPdf};
use mcmc_diagnostics::results::{McmcResults, QUANTILE_PROBS};
use mcmc_diagnostics::toy::MultimodalGaussian;
use ndarray::{array, Array2};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

fn normal_chain(rng: &mut SmallRng, n: usize, d: usize, shift: f64) -> Array2<f64> {
    Array2::from_shape_fn((n, d), |_| shift + rng.sample::<f64, _>(StandardNormal))
}

/// Random-walk Metropolis with an isotropic Gaussian proposal.
fn random_walk_metropolis<P: LogPdf>(
    target: &P,
    start: &[f64],
    n_draws: usize,
    burn_in: usize,
    step: f64,
    rng: &mut SmallRng,
) -> Array2<f64> {
    let d = start.len();
    let mut current = start.to_vec();
    let mut current_lp = target.evaluate(&current).unwrap();
    let mut draws = Array2::zeros((n_draws, d));
    for i in 0..burn_in + n_draws {
        let proposal: Vec<f64> = current
            .iter()
            .map(|x| x + step * rng.sample::<f64, _>(StandardNormal))
            .collect();
        let proposal_lp = target.evaluate(&proposal).unwrap();
        if rng.gen::<f64>().ln() < proposal_lp - current_lp {
            current = proposal;
            current_lp = proposal_lp;
        }
        if i >= burn_in {
            for (j, x) in current.iter().enumerate() {
                draws[[i - burn_in, j]] = *x;
            }
        }
    }
    draws
}

#[test]
fn test_stationary_chains_converge() {
    let mut rng = SmallRng::seed_from_u64(42);
    let chains = vec![normal_chain(&mut rng, 1000, 2, 0.0), normal_chain(&mut rng, 1000, 2, 0.0)];
    let results = McmcResults::new(chains, None, None).unwrap();

    assert_eq!(results.n_parameters(), 2);
    assert!(results.max_rhat().unwrap() < 1.1);
    for i in 0..2 {
        assert!(results.mean()[i].abs() < 0.1, "mean = {}", results.mean()[i]);
        assert!((results.std()[i] - 1.0).abs() < 0.1, "std = {}", results.std()[i]);
        // Independent draws: ESS close to the 2000 pooled draws.
        assert!(results.ess()[i] > 1000.0, "ess = {}", results.ess()[i]);
    }

    let q = results.quantiles();
    assert_eq!(q.dim(), (QUANTILE_PROBS.len(), 2));
    for col in q.columns() {
        assert!(col.windows(2).into_iter().all(|w| w[0] <= w[1]));
        assert!((col[2]).abs() < 0.15);
        assert!((col[0] + 1.96).abs() < 0.2);
        assert!((col[4] - 1.96).abs() < 0.2);
    }
}

#[test]
fn test_disjoint_chains_are_flagged() {
    let mut rng = SmallRng::seed_from_u64(7);
    let chains = vec![
        normal_chain(&mut rng, 500, 1, 0.0),
        normal_chain(&mut rng, 500, 1, 5.0),
        normal_chain(&mut rng, 500, 1, -5.0),
    ];
    let results = McmcResults::new(chains, None, None).unwrap();
    assert!(results.rhat()[0] > 2.0, "rhat = {}", results.rhat()[0]);
}

#[test]
fn test_metropolis_on_correlated_gaussian() {
    let target = MultimodalGaussian::new(
        vec![vec![1.0, -1.0]],
        Some(vec![array![[1.0, 0.5], [0.5, 1.0]]]),
    )
    .unwrap();
    let mut rng = SmallRng::seed_from_u64(2024);
    let starts = [[-3.0, -3.0], [3.0, 3.0], [-3.0, 3.0], [3.0, -3.0]];
    let chains: Vec<Array2<f64>> = starts
        .iter()
        .map(|s| random_walk_metropolis(&target, s, 6000, 1000, 1.0, &mut rng))
        .collect();

    let results = McmcResults::new(chains.clone(), Some(0.5), None).unwrap();
    assert!(results.max_rhat().unwrap() < 1.1);
    assert!((results.mean()[0] - 1.0).abs() < 0.15);
    assert!((results.mean()[1] + 1.0).abs() < 0.15);

    // Correlated draws carry less information than independent ones.
    for &ess in results.ess() {
        assert!(ess > 100.0 && ess < 24_000.0, "ess = {ess}");
    }
    let eps = results.ess_per_second().unwrap();
    assert!((eps[0] - 2.0 * results.ess()[0]).abs() < 1e-9);

    let pooled = ndarray::concatenate(
        ndarray::Axis(0),
        &chains.iter().map(|c| c.view()).collect::<Vec<_>>(),
    )
    .unwrap();
    let distance = target.distance(&pooled).unwrap();
    assert!(distance < 0.05, "distance = {distance}");
}

#[test]
fn test_summary_table_renders_all_rows() {
    let mut rng = SmallRng::seed_from_u64(3);
    let chains = vec![normal_chain(&mut rng, 200, 3, 0.0), normal_chain(&mut rng, 200, 3, 0.0)];
    let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let results = McmcResults::new(chains, Some(1.0), Some(names)).unwrap();

    let table = format!("{results}");
    let lines: Vec<&str> = table.lines().map(str::trim).collect();
    assert_eq!(lines.len(), 5);
    for header in ["param", "mean", "std.", "2.5%", "97.5%", "rhat", "ess per sec."] {
        assert!(lines[0].contains(header), "missing {header}");
    }
    assert!(lines[1].chars().all(|c| c == '-' || c == '+'));
    assert!(lines[2].starts_with('a'));
    assert!(lines[4].starts_with('c'));
}
