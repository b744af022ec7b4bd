//! # Preprocessing
//!
//! Turns sparse records into the dense, standardised matrix consumed by the
//! reduction engines: per-feature median imputation, removal of records with
//! no observed requested feature, then population standardisation.

use crate::dataset::{validate_feature_names, Dataset};
use crate::utils::{median, Standardize};
use ndarray::{Array1, Array2};

/// How missing values are filled in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImputationPolicy {
    /// Fill used for a feature that has no observed value anywhere in the
    /// dataset. A policy default, not something derived from the data.
    pub unobserved_fill: f64,
}

impl Default for ImputationPolicy {
    fn default() -> Self {
        Self {
            unobserved_fill: 0.0,
        }
    }
}

/// Dense standardised matrix, one row per kept record.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    data: Array2<f64>,
    valid_indices: Vec<usize>,
    feature_names: Vec<String>,
    medians: Array1<f64>,
    means: Array1<f64>,
    divisors: Array1<f64>,
}

impl FeatureMatrix {
    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// Original record index of every matrix row, strictly increasing.
    pub fn valid_indices(&self) -> &[usize] {
        &self.valid_indices
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Imputation value used per feature.
    pub fn medians(&self) -> &Array1<f64> {
        &self.medians
    }

    /// Column means of the imputed rows, before centring.
    pub fn means(&self) -> &Array1<f64> {
        &self.means
    }

    /// Column divisors: population standard deviation, or `1` for constant
    /// columns.
    pub fn divisors(&self) -> &Array1<f64> {
        &self.divisors
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    /// `true` when no record survived filtering: nothing to visualise.
    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    policy: ImputationPolicy,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn policy(mut self, policy: ImputationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn unobserved_fill(mut self, fill: f64) -> Self {
        self.policy.unobserved_fill = fill;
        self
    }

    pub fn imputation(&self) -> ImputationPolicy {
        self.policy
    }

    pub fn run<S: AsRef<str>>(
        &self,
        dataset: &Dataset,
        feature_names: &[S],
    ) -> anyhow::Result<FeatureMatrix> {
        let feature_names = validate_feature_names(dataset, feature_names)?;
        let n_features = feature_names.len();

        // Medians over the whole dataset, not just the rows that will be kept.
        let medians: Array1<f64> = feature_names
            .iter()
            .map(|name| {
                let present = dataset.present_values(name);
                let value = median(&present).unwrap_or(self.policy.unobserved_fill);
                log::debug!(
                    "Feature '{}': {} observed values, median {}",
                    name,
                    present.len(),
                    value
                );
                value
            })
            .collect();

        let mut values = Vec::with_capacity(dataset.len() * n_features);
        let mut valid_indices = Vec::with_capacity(dataset.len());

        for (index, record) in dataset.records().iter().enumerate() {
            let mut row = Vec::with_capacity(n_features);
            let mut all_missing = true;
            for (j, name) in feature_names.iter().enumerate() {
                match record.get(name) {
                    Some(v) => {
                        all_missing = false;
                        row.push(v);
                    }
                    None => row.push(medians[j]),
                }
            }
            if all_missing {
                continue;
            }
            values.extend(row);
            valid_indices.push(index);
        }

        let mut data = Array2::from_shape_vec((valid_indices.len(), n_features), values)?;
        let scaling = data.standardize_columns();

        log::info!(
            "Preprocessed {} of {} records over {} features ({} dropped)",
            valid_indices.len(),
            dataset.len(),
            n_features,
            dataset.len() - valid_indices.len()
        );

        Ok(FeatureMatrix {
            data,
            valid_indices,
            feature_names,
            medians,
            means: scaling.means,
            divisors: scaling.divisors,
        })
    }
}

/// Preprocesses with the default imputation policy.
pub fn preprocess<S: AsRef<str>>(
    dataset: &Dataset,
    feature_names: &[S],
) -> anyhow::Result<FeatureMatrix> {
    Preprocessor::new().run(dataset, feature_names)
}
