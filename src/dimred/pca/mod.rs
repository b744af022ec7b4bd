//! # Principal Component Analysis by Power Iteration
//!
//! Two-axis truncated eigendecomposition of the covariance of an already
//! standardised matrix. The dominant axis is found by power iteration, its
//! contribution is deflated from the covariance, and the second axis is found
//! by power iteration on the residual with explicit re-orthogonalisation
//! against the first.

use anyhow::{anyhow, bail};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PCAConfig {
    /// Upper bound on power-iteration steps per axis.
    pub iterations: usize,
    /// Early exit once successive unit vectors differ by less than this.
    pub tolerance: f64,
    /// Below this norm an iterate is treated as converged rather than renormalised.
    pub min_norm: f64,
    /// Seed of the fixed start vectors.
    pub random_seed: u64,
}

impl Default for PCAConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            tolerance: 1e-12,
            min_norm: 1e-10,
            random_seed: 42,
        }
    }
}

pub struct PCABuilder {
    config: PCAConfig,
}

impl Default for PCABuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PCABuilder {
    pub fn new() -> Self {
        PCABuilder {
            config: PCAConfig::default(),
        }
    }

    pub fn iterations(mut self, iterations: usize) -> Self {
        self.config.iterations = iterations;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.config.tolerance = tolerance;
        self
    }

    pub fn min_norm(mut self, min_norm: f64) -> Self {
        self.config.min_norm = min_norm;
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = seed;
        self
    }

    pub fn config(mut self, config: PCAConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> PowerIterationPCA {
        PowerIterationPCA {
            config: self.config,
            components: None,
            eigenvalues: None,
            total_variance: None,
        }
    }
}

pub struct PowerIterationPCA {
    config: PCAConfig,
    components: Option<Array2<f64>>,
    eigenvalues: Option<[f64; 2]>,
    total_variance: Option<f64>,
}

impl PowerIterationPCA {
    pub fn fit(&mut self, x: ArrayView2<f64>) -> anyhow::Result<()> {
        let (n_samples, n_features) = x.dim();
        if n_features == 0 {
            bail!("PCA requires at least one feature column");
        }

        let covariance = covariance(x);
        let total_variance = covariance.diag().sum();

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_seed);
        let first_start = random_unit_vector(&mut rng, n_features);
        let second_start = random_unit_vector(&mut rng, n_features);

        let mut v1 = self.power_iteration(&covariance, first_start, None);
        flip_sign(&mut v1);
        let mut lambda1 = rayleigh_quotient(&covariance, &v1);

        let (mut v2, mut lambda2) = if n_features > 1 {
            let deflated = deflate(&covariance, &v1, lambda1);
            let start = orthogonal_start(second_start, &v1, self.config.min_norm);
            let mut v2 = self.power_iteration(&deflated, start, Some(&v1));
            flip_sign(&mut v2);
            // Eigenvalue against the full covariance, not the residual.
            let lambda2 = rayleigh_quotient(&covariance, &v2);
            (v2, lambda2)
        } else {
            (Array1::zeros(n_features), 0.0)
        };

        if lambda2 > lambda1 {
            std::mem::swap(&mut v1, &mut v2);
            std::mem::swap(&mut lambda1, &mut lambda2);
        }

        let mut components = Array2::zeros((2, n_features));
        components.row_mut(0).assign(&v1);
        components.row_mut(1).assign(&v2);

        self.components = Some(components);
        self.eigenvalues = Some([lambda1, lambda2]);
        self.total_variance = Some(total_variance);

        log::debug!(
            "PCA over {} x {}: eigenvalues {:.6} / {:.6}, trace {:.6}",
            n_samples,
            n_features,
            lambda1,
            lambda2,
            total_variance
        );

        Ok(())
    }

    fn power_iteration(
        &self,
        matrix: &Array2<f64>,
        start: Array1<f64>,
        against: Option<&Array1<f64>>,
    ) -> Array1<f64> {
        let mut v = start;

        for step in 0..self.config.iterations {
            let mut next = matrix.dot(&v);
            if let Some(u) = against {
                let projection = next.dot(u);
                next.scaled_add(-projection, u);
            }

            let norm = next.dot(&next).sqrt();
            if norm < self.config.min_norm {
                log::debug!("Power iteration stopped at step {} with residual norm {:e}", step, norm);
                break;
            }
            next /= norm;

            let delta = (&next - &v).mapv(|d| d * d).sum().sqrt();
            v = next;
            if delta < self.config.tolerance {
                log::trace!("Power iteration converged after {} steps", step + 1);
                break;
            }
        }

        v
    }

    pub fn transform(&self, x: ArrayView2<f64>) -> anyhow::Result<Array2<f64>> {
        let components = self
            .components
            .as_ref()
            .ok_or_else(|| anyhow!("PCA has not been fitted yet"))?;
        if x.ncols() != components.ncols() {
            bail!(
                "PCA was fitted on {} features but the input has {}",
                components.ncols(),
                x.ncols()
            );
        }
        Ok(x.dot(&components.t()))
    }

    pub fn fit_transform(&mut self, x: ArrayView2<f64>) -> anyhow::Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// The two principal axes as rows of a `2 x n_features` matrix.
    pub fn components(&self) -> Option<&Array2<f64>> {
        self.components.as_ref()
    }

    pub fn eigenvalues(&self) -> Option<[f64; 2]> {
        self.eigenvalues
    }

    /// Trace of the covariance matrix.
    pub fn total_variance(&self) -> Option<f64> {
        self.total_variance
    }

    /// Percentage of total variance carried by each axis.
    pub fn variance_explained(&self) -> Option<[f64; 2]> {
        let [l1, l2] = self.eigenvalues?;
        let total = self.total_variance?;
        let percent = |lambda: f64| {
            if total > 0.0 {
                (lambda.max(0.0) / total * 100.0).min(100.0)
            } else {
                0.0
            }
        };
        Some([percent(l1), percent(l2)])
    }
}

/// `XᵀX / n` of a column-centred matrix.
fn covariance(x: ArrayView2<f64>) -> Array2<f64> {
    let n_samples = x.len_of(Axis(0));
    if n_samples == 0 {
        return Array2::zeros((x.ncols(), x.ncols()));
    }
    x.t().dot(&x) / n_samples as f64
}

fn rayleigh_quotient(matrix: &Array2<f64>, v: &Array1<f64>) -> f64 {
    v.dot(&matrix.dot(v))
}

/// `C - λ·v·vᵀ`
fn deflate(matrix: &Array2<f64>, v: &Array1<f64>, lambda: f64) -> Array2<f64> {
    Array2::from_shape_fn(matrix.dim(), |(i, j)| matrix[[i, j]] - lambda * v[i] * v[j])
}

fn random_unit_vector<R: Rng>(rng: &mut R, dim: usize) -> Array1<f64> {
    let mut v: Array1<f64> = (0..dim).map(|_| rng.random_range(-1.0..1.0)).collect();
    let norm = v.dot(&v).sqrt();
    if norm > 0.0 {
        v /= norm;
    } else {
        v[0] = 1.0;
    }
    v
}

/// Projects `start` off `axis` and renormalises. When the residual collapses,
/// falls back to the basis vector least aligned with `axis`.
fn orthogonal_start(start: Array1<f64>, axis: &Array1<f64>, min_norm: f64) -> Array1<f64> {
    let mut v = start;
    let projection = v.dot(axis);
    v.scaled_add(-projection, axis);
    let norm = v.dot(&v).sqrt();
    if norm >= min_norm {
        return v / norm;
    }

    let k = axis
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
        .map(|(k, _)| k)
        .unwrap_or(0);
    let mut basis = Array1::zeros(axis.len());
    basis[k] = 1.0;
    let projection = basis.dot(axis);
    basis.scaled_add(-projection, axis);
    let norm = basis.dot(&basis).sqrt();
    if norm > 0.0 {
        basis / norm
    } else {
        basis
    }
}

/// Makes the largest-magnitude loading positive.
fn flip_sign(v: &mut Array1<f64>) {
    let pivot = v
        .iter()
        .copied()
        .max_by(|a, b| a.abs().total_cmp(&b.abs()))
        .unwrap_or(0.0);
    if pivot < 0.0 {
        v.mapv_inplace(|x| -x);
    }
}
