//! Model-agnostic RANSAC and least-median-of-squares drivers.
//!
//! Implement [`Estimator`] for a model and call [`ransac`] or [`lmeds`].
//! Neither driver panics: if no sample yields a model they return `None`.

use log::debug;
use rand::seq::IndexedRandom;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Outlier fraction LMedS assumes when sizing its sample budget.
const LMEDS_OUTLIER_RATIO: f64 = 0.45;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacOptions {
    /// Inlier residual threshold, in residual units (pixels for homographies).
    pub threshold: f64,
    pub max_iters: usize,
    /// Desired probability of drawing at least one all-inlier sample.
    pub confidence: f64,
    /// Fixed sampling seed; `None` draws a fresh one per call.
    pub seed: Option<u64>,
    /// Refit the model on its inliers before scoring it.
    pub refit_on_inliers: bool,
}

impl Default for RansacOptions {
    fn default() -> Self {
        Self {
            threshold: 3.0,
            max_iters: 2000,
            confidence: 0.995,
            seed: None,
            refit_on_inliers: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmedsOptions {
    pub max_iters: usize,
    pub confidence: f64,
    pub seed: Option<u64>,
}

impl Default for LmedsOptions {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            confidence: 0.995,
            seed: None,
        }
    }
}

/// Best model of a robust run together with its support.
#[derive(Debug, Clone)]
pub struct Consensus<M> {
    pub model: M,
    /// Sorted indices of inlier data.
    pub inliers: Vec<usize>,
    pub iterations: usize,
    /// Seed the sampler actually used.
    pub seed: u64,
}

/// Generic estimator for RANSAC-like methods.
pub trait Estimator {
    type Datum;
    type Model;

    /// Minimal number of samples needed to estimate a model.
    const MIN_SAMPLES: usize;

    /// Fit a model from a minimal subset; `None` if fitting fails.
    fn fit(data: &[Self::Datum], sample: &[usize]) -> Option<Self::Model>;

    /// Non-negative residual of one datum.
    fn residual(model: &Self::Model, datum: &Self::Datum) -> f64;

    fn is_degenerate(_data: &[Self::Datum], _sample: &[usize]) -> bool {
        false
    }

    /// Least-squares fit on a larger inlier set.
    fn refit(_data: &[Self::Datum], _inliers: &[usize]) -> Option<Self::Model> {
        None
    }
}

fn seeded_rng(seed: Option<u64>) -> (StdRng, u64) {
    let seed = seed.unwrap_or_else(|| {
        let fresh = rand::random::<u64>();
        debug!("robust sampler seed {fresh}");
        fresh
    });
    (StdRng::seed_from_u64(seed), seed)
}

fn draw_sample(all: &[usize], rng: &mut StdRng, sample: &mut [usize]) {
    all.choose_multiple(rng, sample.len())
        .zip(sample.iter_mut())
        .for_each(|(&idx, slot)| *slot = idx);
}

/// Iterations needed to hit an all-inlier sample with probability `confidence`.
fn required_iterations(confidence: f64, inlier_ratio: f64, min_samples: usize, max_iters: usize) -> usize {
    if confidence <= 0.0 || inlier_ratio <= 0.0 {
        return max_iters;
    }
    let denom = (1.0 - inlier_ratio.powi(min_samples as i32)).max(1e-12).ln();
    if denom >= 0.0 {
        return max_iters;
    }
    let num = (1.0 - confidence.min(1.0 - 1e-12)).ln();
    ((num / denom).ceil() as usize).clamp(1, max_iters)
}

fn collect_inliers<E: Estimator>(
    model: &E::Model,
    data: &[E::Datum],
    threshold: f64,
    inliers: &mut Vec<usize>,
) -> f64 {
    inliers.clear();
    let mut ss = 0.0;
    for (i, datum) in data.iter().enumerate() {
        let r = E::residual(model, datum);
        if r <= threshold {
            inliers.push(i);
            ss += r * r;
        }
    }
    ss
}

/// Maximize the number of data within `threshold` of the model.
///
/// Ties on inlier count go to the smaller inlier sum of squares. The sample
/// budget shrinks adaptively as better consensus sets are found.
pub fn ransac<E: Estimator>(data: &[E::Datum], opts: &RansacOptions) -> Option<Consensus<E::Model>> {
    if data.len() < E::MIN_SAMPLES {
        return None;
    }
    let (mut rng, seed) = seeded_rng(opts.seed);
    let all: Vec<usize> = (0..data.len()).collect();
    let mut sample = vec![0usize; E::MIN_SAMPLES];
    let mut inliers = Vec::with_capacity(data.len());
    let mut refit_inliers = Vec::with_capacity(data.len());

    let mut best: Option<(E::Model, Vec<usize>, f64)> = None;
    let mut budget = opts.max_iters;
    let mut iterations = 0;

    while iterations < budget {
        iterations += 1;
        draw_sample(&all, &mut rng, &mut sample);
        if E::is_degenerate(data, &sample) {
            continue;
        }
        let Some(mut model) = E::fit(data, &sample) else {
            continue;
        };
        let mut ss = collect_inliers::<E>(&model, data, opts.threshold, &mut inliers);
        if inliers.len() < E::MIN_SAMPLES {
            continue;
        }

        if opts.refit_on_inliers {
            if let Some(refined) = E::refit(data, &inliers) {
                let refined_ss =
                    collect_inliers::<E>(&refined, data, opts.threshold, &mut refit_inliers);
                if refit_inliers.len() >= inliers.len() {
                    model = refined;
                    ss = refined_ss;
                    std::mem::swap(&mut inliers, &mut refit_inliers);
                }
            }
        }

        let better = match &best {
            None => true,
            Some((_, best_inliers, best_ss)) => {
                inliers.len() > best_inliers.len()
                    || (inliers.len() == best_inliers.len() && ss < *best_ss)
            }
        };
        if better {
            let ratio = inliers.len() as f64 / data.len() as f64;
            budget = required_iterations(opts.confidence, ratio, E::MIN_SAMPLES, opts.max_iters)
                .max(iterations);
            best = Some((model, inliers.clone(), ss));
        }
    }

    let (model, inliers, _) = best?;
    debug!(
        "ransac: {} / {} inliers after {} iterations",
        inliers.len(),
        data.len(),
        iterations
    );
    Some(Consensus {
        model,
        inliers,
        iterations,
        seed,
    })
}

/// Minimize the median squared residual over random minimal samples.
///
/// Inliers are the data within `2.5 σ` of the winning model, where `σ` is the
/// robust standard deviation derived from the median.
pub fn lmeds<E: Estimator>(data: &[E::Datum], opts: &LmedsOptions) -> Option<Consensus<E::Model>> {
    let n = data.len();
    if n < E::MIN_SAMPLES {
        return None;
    }
    let (mut rng, seed) = seeded_rng(opts.seed);
    let all: Vec<usize> = (0..n).collect();
    let mut sample = vec![0usize; E::MIN_SAMPLES];
    let mut sq = vec![0.0f64; n];

    let budget = required_iterations(
        opts.confidence,
        1.0 - LMEDS_OUTLIER_RATIO,
        E::MIN_SAMPLES,
        opts.max_iters,
    );
    let mut best: Option<(E::Model, f64)> = None;

    for _ in 0..budget {
        draw_sample(&all, &mut rng, &mut sample);
        if E::is_degenerate(data, &sample) {
            continue;
        }
        let Some(model) = E::fit(data, &sample) else {
            continue;
        };
        for (s, datum) in sq.iter_mut().zip(data) {
            let r = E::residual(&model, datum);
            *s = r * r;
        }
        let mid = n / 2;
        let (_, median, _) = sq.select_nth_unstable_by(mid, f64::total_cmp);
        let median = *median;
        if !median.is_finite() {
            continue;
        }
        if best.as_ref().is_none_or(|(_, m)| median < *m) {
            best = Some((model, median));
        }
    }

    let (mut model, median) = best?;
    let dof = n.saturating_sub(E::MIN_SAMPLES).max(1) as f64;
    let sigma = (2.5 * 1.4826 * (1.0 + 5.0 / dof) * median.sqrt()).max(1e-3);
    let threshold = 2.5 * sigma;

    let mut inliers = Vec::with_capacity(n);
    collect_inliers::<E>(&model, data, threshold, &mut inliers);
    if inliers.len() >= E::MIN_SAMPLES {
        if let Some(refined) = E::refit(data, &inliers) {
            model = refined;
            collect_inliers::<E>(&model, data, threshold, &mut inliers);
        }
    }
    debug!(
        "lmeds: median {:.3e}, {} / {} inliers after {} samples",
        median,
        inliers.len(),
        n,
        budget
    );
    Some(Consensus {
        model,
        inliers,
        iterations: budget,
        seed,
    })
}
