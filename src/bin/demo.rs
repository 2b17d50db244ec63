//! A small demo: draws exact samples from the toy targets, splits them into
//! chains and prints the convergence summary and the distance to the target.

use mcmc_diagnostics::distributions::{LogPdf, ToyLogPdf};
use mcmc_diagnostics::results::McmcResults;
use mcmc_diagnostics::toy::{MultimodalGaussian, NealsFunnel};
use mcmc_diagnostics::transform::{LogTransform, Transform};
use ndarray::{s, Array2};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::error::Error;
use std::time::Instant;

/// Splits `samples` row-wise into `n_chains` chains of equal length.
fn split_chains(samples: &Array2<f64>, n_chains: usize) -> Vec<Array2<f64>> {
    let len = samples.nrows() / n_chains;
    (0..n_chains)
        .map(|i| samples.slice(s![i * len..(i + 1) * len, ..]).to_owned())
        .collect()
}

/// Main entry point: summarizes exact draws from Neal's funnel and a bimodal
/// Gaussian, then evaluates a log-transformed density.
fn main() -> Result<(), Box<dyn Error>> {
    const N_SAMPLES: usize = 40_000;
    const N_CHAINS: usize = 4;
    const SEED: u64 = 42;

    let mut rng = SmallRng::seed_from_u64(SEED);

    let funnel = NealsFunnel::new(3)?;
    let start = Instant::now();
    let samples = funnel.sample(N_SAMPLES, &mut rng)?;
    let elapsed = start.elapsed().as_secs_f64().max(f64::MIN_POSITIVE);

    let names = vec!["x1".to_string(), "x2".to_string(), "nu".to_string()];
    let results = McmcResults::new(split_chains(&samples, N_CHAINS), Some(elapsed), Some(names))?;
    println!("Neal's funnel, {N_CHAINS} chains of exact draws\n{results}");
    println!("KL divergence of nu: {:.5}\n", funnel.kl_divergence(&samples)?);

    let mixture = MultimodalGaussian::new(vec![vec![-3.0, 0.0], vec![3.0, 0.0]], None)?;
    let samples = mixture.sample(N_SAMPLES, &mut rng)?;
    let results = McmcResults::new(split_chains(&samples, N_CHAINS), None, None)?;
    println!("Bimodal Gaussian\n{results}");
    if let Some(max_rhat) = results.max_rhat() {
        println!("Max rhat: {max_rhat:.3}");
    }
    println!("Per-mode KL divergence: {}", mixture.kl_divergence(&samples)?);

    // Density of a positive-constrained funnel neck, evaluated on the log scale.
    let transformed = LogTransform::new(2).apply_log_pdf(NealsFunnel::new(2)?);
    println!(
        "Transformed log-pdf at (0, 0): {:.4}",
        transformed.evaluate(&[0.0, 0.0])?
    );

    Ok(())
}
