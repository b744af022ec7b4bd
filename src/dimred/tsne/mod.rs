//! # t-Distributed Stochastic Neighbor Embedding
//!
//! Exact (all-pairs) t-SNE into two dimensions. Per-row Gaussian affinities are
//! calibrated to a target perplexity by binary search on the precision,
//! symmetrised, and matched by a Student-t kernel in the embedding through
//! momentum gradient descent with adaptive per-coordinate gains.
//!
//! The initial layout is random; pass a seed in [`TSNEConfig`] or use
//! [`run_with_rng`] for reproducible embeddings.

use crate::similarity::{DistanceMeasure, SquaredEuclidean};
use crate::utils::Standardize;
use anyhow::bail;
use ndarray::{Array2, ArrayView1, ArrayView2, Zip};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

const ROW_SUM_FLOOR: f64 = 1e-10;
const AFFINITY_FLOOR: f64 = 1e-100;
const ENTROPY_MASS_CUTOFF: f64 = 1e-7;

#[derive(Debug, Clone, PartialEq)]
pub struct TSNEConfig {
    /// Perplexity used when there are enough rows; capped at `floor(n / 3)`.
    pub max_perplexity: f64,
    pub epochs: usize,
    pub learning_rate: f64,
    pub initial_momentum: f64,
    pub final_momentum: f64,
    /// Iteration at which momentum switches from initial to final.
    pub momentum_switch: usize,
    pub min_gain: f64,
    /// Re-centre the embedding every this many iterations; `0` disables it.
    pub recenter_every: usize,
    /// Half-width of the uniform initial jitter around the origin.
    pub init_scale: f64,
    pub entropy_tolerance: f64,
    pub max_search_steps: usize,
    pub seed: Option<u64>,
}

impl Default for TSNEConfig {
    fn default() -> Self {
        Self {
            max_perplexity: 30.0,
            epochs: 1000,
            learning_rate: 200.0,
            initial_momentum: 0.5,
            final_momentum: 0.8,
            momentum_switch: 250,
            min_gain: 0.01,
            recenter_every: 10,
            init_scale: 1e-4,
            entropy_tolerance: 1e-5,
            max_search_steps: 50,
            seed: None,
        }
    }
}

impl TSNEConfig {
    pub fn epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn max_perplexity(mut self, perplexity: f64) -> Self {
        self.max_perplexity = perplexity;
        self
    }

    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Effective perplexity for `n` rows, never below `1`.
    pub fn perplexity_for(&self, n: usize) -> f64 {
        self.max_perplexity.min((n / 3) as f64).max(1.0)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !(self.max_perplexity > 0.0) {
            bail!("Perplexity must be positive, got {}", self.max_perplexity);
        }
        if !(self.init_scale >= 0.0 && self.init_scale.is_finite()) {
            bail!("Initial jitter must be finite and non-negative, got {}", self.init_scale);
        }
        if !self.learning_rate.is_finite() {
            bail!("Learning rate must be finite");
        }
        Ok(())
    }
}

/// Embeds the rows of `x` in 2D, seeding from `config.seed` or the thread RNG.
pub fn run(x: ArrayView2<f64>, config: &TSNEConfig) -> anyhow::Result<Array2<f64>> {
    let mut rng = match config.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_rng(&mut rand::rng()),
    };
    run_with_rng(x, config, &mut rng)
}

/// Embeds the rows of `x` in 2D, drawing the initial layout from `rng`.
pub fn run_with_rng<R: Rng>(
    x: ArrayView2<f64>,
    config: &TSNEConfig,
    rng: &mut R,
) -> anyhow::Result<Array2<f64>> {
    config.validate()?;
    let n = x.nrows();
    if n < 2 {
        return Ok(Array2::zeros((n, 2)));
    }

    let perplexity = config.perplexity_for(n);
    log::info!(
        "Running t-SNE on {} x {} (perplexity {}, {} epochs)",
        n,
        x.ncols(),
        perplexity,
        config.epochs
    );

    // The n x n distances are only needed to calibrate P.
    let p = {
        let distances = pairwise_squared_distances(x);
        joint_probabilities(&distances, perplexity, config)
    };

    let scale = config.init_scale;
    let mut y = Array2::from_shape_fn((n, 2), |_| rng.random_range(-scale..=scale));
    optimise(&p, &mut y, config);

    Ok(y)
}

fn pairwise_squared_distances(x: ArrayView2<f64>) -> Array2<f64> {
    let n = x.nrows();
    let rows: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| {
            (0..n)
                .map(|j| {
                    if i == j {
                        0.0
                    } else {
                        SquaredEuclidean.distance(x.row(i), x.row(j))
                    }
                })
                .collect()
        })
        .collect();
    Array2::from_shape_fn((n, n), |(i, j)| rows[i][j])
}

/// Symmetrised affinities `(P[i|j] + P[j|i]) / 2n`, floored, zero diagonal.
pub(crate) fn joint_probabilities(
    distances: &Array2<f64>,
    perplexity: f64,
    config: &TSNEConfig,
) -> Array2<f64> {
    let n = distances.nrows();
    let target_entropy = perplexity.ln();

    let conditional: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| calibrate_row(distances.row(i), i, target_entropy, config))
        .collect();

    let denom = 2.0 * n as f64;
    Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            0.0
        } else {
            ((conditional[i][j] + conditional[j][i]) / denom).max(AFFINITY_FLOOR)
        }
    })
}

/// Conditional distribution of row `i` whose entropy matches `target_entropy`.
fn calibrate_row(
    distances: ArrayView1<f64>,
    i: usize,
    target_entropy: f64,
    config: &TSNEConfig,
) -> Vec<f64> {
    let n = distances.len();
    let mut beta = 1.0;
    let mut beta_min = f64::NEG_INFINITY;
    let mut beta_max = f64::INFINITY;
    let mut row = vec![0.0; n];
    let mut entropy = 0.0;

    for _ in 0..config.max_search_steps.max(1) {
        entropy = row_distribution(distances, i, beta, &mut row);
        let diff = entropy - target_entropy;
        if diff.abs() < config.entropy_tolerance {
            break;
        }
        if diff > 0.0 {
            // Too flat: sharpen.
            beta_min = beta;
            beta = if beta_max.is_infinite() {
                beta * 2.0
            } else {
                (beta + beta_max) / 2.0
            };
        } else {
            beta_max = beta;
            beta = if beta_min.is_infinite() {
                beta / 2.0
            } else {
                (beta + beta_min) / 2.0
            };
        }
    }

    log::trace!(
        "Row {}: entropy {:.6} (target {:.6})",
        i,
        entropy,
        target_entropy
    );

    for (j, p) in row.iter_mut().enumerate() {
        if j != i {
            *p = p.max(AFFINITY_FLOOR);
        }
    }
    row
}

/// Fills `row` with the normalised Gaussian affinities for precision `beta`
/// and returns their Shannon entropy.
fn row_distribution(distances: ArrayView1<f64>, i: usize, beta: f64, row: &mut [f64]) -> f64 {
    let mut sum = 0.0;
    for (j, p) in row.iter_mut().enumerate() {
        *p = if j == i {
            0.0
        } else {
            (-distances[j] * beta).exp()
        };
        sum += *p;
    }
    let sum = sum.max(ROW_SUM_FLOOR);

    let mut entropy = 0.0;
    for p in row.iter_mut() {
        *p /= sum;
        if *p > ENTROPY_MASS_CUTOFF {
            entropy -= *p * p.ln();
        }
    }
    entropy
}

fn optimise(p: &Array2<f64>, y: &mut Array2<f64>, config: &TSNEConfig) {
    let n = y.nrows();
    let mut gains = Array2::<f64>::ones((n, 2));
    let mut steps = Array2::<f64>::zeros((n, 2));

    for iter in 0..config.epochs {
        let grad = gradient(p, y.view());
        let momentum = if iter < config.momentum_switch {
            config.initial_momentum
        } else {
            config.final_momentum
        };

        Zip::from(y.view_mut())
            .and(&mut gains)
            .and(&mut steps)
            .and(&grad)
            .for_each(|y, gain, step, &g| {
                let adjusted = if sign(g) == sign(*step) {
                    *gain * 0.8
                } else {
                    *gain + 0.2
                };
                *gain = adjusted.max(config.min_gain);
                *step = momentum * *step - config.learning_rate * *gain * g;
                *y += *step;
            });

        if config.recenter_every > 0 && iter % config.recenter_every == 0 {
            y.center_columns();
        }

        if log::log_enabled!(log::Level::Debug) && (iter + 1) % 100 == 0 {
            log::debug!(
                "t-SNE iteration {}: KL divergence {:.6}",
                iter + 1,
                kl_divergence(p, y.view())
            );
        }
    }
}

fn sign(v: f64) -> i8 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

fn student_t(y: ArrayView2<f64>, i: usize, j: usize) -> f64 {
    let dx = y[[i, 0]] - y[[j, 0]];
    let dy = y[[i, 1]] - y[[j, 1]];
    1.0 / (1.0 + dx * dx + dy * dy)
}

/// Unnormalised kernel sum `Σ_{i≠j} 1 / (1 + ‖y_i - y_j‖²)`.
fn kernel_sum(y: ArrayView2<f64>) -> f64 {
    let n = y.nrows();
    let row_sums: Vec<f64> = (0..n)
        .into_par_iter()
        .map(|i| (0..n).filter(|&j| j != i).map(|j| student_t(y, i, j)).sum::<f64>())
        .collect();
    row_sums.iter().sum::<f64>().max(ROW_SUM_FLOOR)
}

/// `4 Σ_j (P_ij - Q_ij) Q_ij Z (y_i - y_j)` per row.
fn gradient(p: &Array2<f64>, y: ArrayView2<f64>) -> Array2<f64> {
    let n = y.nrows();
    let q_sum = kernel_sum(y);

    let rows: Vec<[f64; 2]> = (0..n)
        .into_par_iter()
        .map(|i| {
            let mut g = [0.0; 2];
            for j in 0..n {
                if j == i {
                    continue;
                }
                let kernel = student_t(y, i, j);
                let q = (kernel / q_sum).max(AFFINITY_FLOOR);
                let mult = 4.0 * (p[[i, j]] - q) * kernel;
                g[0] += mult * (y[[i, 0]] - y[[j, 0]]);
                g[1] += mult * (y[[i, 1]] - y[[j, 1]]);
            }
            g
        })
        .collect();

    Array2::from_shape_fn((n, 2), |(i, d)| rows[i][d])
}

fn kl_divergence(p: &Array2<f64>, y: ArrayView2<f64>) -> f64 {
    let n = y.nrows();
    let q_sum = kernel_sum(y);
    let rows: Vec<f64> = (0..n)
        .into_par_iter()
        .map(|i| {
            (0..n)
                .filter(|&j| j != i)
                .map(|j| {
                    let q = (student_t(y, i, j) / q_sum).max(AFFINITY_FLOOR);
                    let pij = p[[i, j]];
                    pij * (pij / q).ln()
                })
                .sum::<f64>()
        })
        .collect();
    rows.iter().sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Axis;
    use rand::rngs::StdRng;

    fn two_blobs(per_blob: usize, seed: u64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let dims = 4;
        let mut x = Array2::zeros((2 * per_blob, dims));
        for i in 0..2 * per_blob {
            let centre = if i < per_blob { -5.0 } else { 5.0 };
            for d in 0..dims {
                x[[i, d]] = centre + rng.random_range(-0.5..0.5);
            }
        }
        x
    }

    fn centroid(y: &Array2<f64>, rows: std::ops::Range<usize>) -> [f64; 2] {
        let count = rows.len() as f64;
        let mut c = [0.0; 2];
        for i in rows {
            c[0] += y[[i, 0]] / count;
            c[1] += y[[i, 1]] / count;
        }
        c
    }

    fn dist(y: &Array2<f64>, i: usize, c: [f64; 2]) -> f64 {
        ((y[[i, 0]] - c[0]).powi(2) + (y[[i, 1]] - c[1]).powi(2)).sqrt()
    }

    #[test]
    fn test_perplexity_for_small_inputs() {
        let config = TSNEConfig::default();
        assert_eq!(config.perplexity_for(3000), 30.0);
        assert_eq!(config.perplexity_for(30), 10.0);
        assert_eq!(config.perplexity_for(2), 1.0);
    }

    #[test]
    fn test_row_calibration_matches_target_entropy() {
        let x = two_blobs(30, 1);
        let distances = pairwise_squared_distances(x.view());
        let config = TSNEConfig::default();
        let perplexity = config.perplexity_for(x.nrows());

        let row = calibrate_row(distances.row(3), 3, perplexity.ln(), &config);
        let entropy: f64 = row
            .iter()
            .filter(|&&p| p > ENTROPY_MASS_CUTOFF)
            .map(|&p| -p * p.ln())
            .sum();

        assert_relative_eq!(entropy, perplexity.ln(), epsilon = 1e-4);
        assert_relative_eq!(row.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        assert_eq!(row[3], 0.0);
    }

    #[test]
    fn test_joint_probabilities_are_symmetric_and_normalised() {
        let x = two_blobs(10, 2);
        let distances = pairwise_squared_distances(x.view());
        let config = TSNEConfig::default();
        let p = joint_probabilities(&distances, config.perplexity_for(20), &config);

        assert_relative_eq!(p.sum(), 1.0, epsilon = 1e-6);
        for i in 0..20 {
            assert_eq!(p[[i, i]], 0.0);
            for j in 0..20 {
                assert_eq!(p[[i, j]], p[[j, i]]);
            }
        }
    }

    #[test]
    fn test_separated_blobs_stay_separated() {
        let _ = env_logger::builder().is_test(true).try_init();
        let per_blob = 20;
        let x = two_blobs(per_blob, 9);
        let mut good_runs = 0;

        for seed in 0..5 {
            let config = TSNEConfig::default().epochs(400).seed(seed);
            let y = run(x.view(), &config).unwrap();

            let left = centroid(&y, 0..per_blob);
            let right = centroid(&y, per_blob..2 * per_blob);
            let correct = (0..2 * per_blob)
                .filter(|&i| {
                    let (own, other) = if i < per_blob { (left, right) } else { (right, left) };
                    dist(&y, i, own) < dist(&y, i, other)
                })
                .count();
            if correct == 2 * per_blob {
                good_runs += 1;
            }
        }

        assert!(good_runs >= 3, "only {} of 5 runs separated the blobs", good_runs);
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let x = two_blobs(8, 4);
        let config = TSNEConfig::default().epochs(50).seed(17);
        let a = run(x.view(), &config).unwrap();
        let b = run(x.view(), &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_embedding_is_centred() {
        let x = two_blobs(6, 5);
        // The last recentring happens on iteration 0 of 1.
        let config = TSNEConfig::default().epochs(1).seed(3);
        let y = run(x.view(), &config).unwrap();
        let means = y.mean_axis(Axis(0)).unwrap();
        assert!(means.iter().all(|m| m.abs() < 1e-12));
    }

    #[test]
    fn test_tiny_inputs() {
        let config = TSNEConfig::default().epochs(10).seed(0);

        let empty = Array2::<f64>::zeros((0, 3));
        assert_eq!(run(empty.view(), &config).unwrap().dim(), (0, 2));

        let single = Array2::<f64>::ones((1, 3));
        assert_eq!(run(single.view(), &config).unwrap(), Array2::<f64>::zeros((1, 2)));

        let pair = ndarray::array![[0.0, 0.0], [1.0, 1.0]];
        let y = run(pair.view(), &config).unwrap();
        assert!(y.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_identical_rows_do_not_produce_nan() {
        let x = Array2::<f64>::zeros((12, 3));
        let config = TSNEConfig::default().epochs(30).seed(8);
        let y = run(x.view(), &config).unwrap();
        assert!(y.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_invalid_config() {
        let x = two_blobs(3, 0);
        let config = TSNEConfig::default().max_perplexity(0.0);
        assert!(run(x.view(), &config).is_err());
    }
}
