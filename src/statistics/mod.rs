//! # Subgroup Statistics
//!
//! Pure summaries of an index set over the dataset: means of continuous
//! measurements and percentages of binary indicators, computed the same way
//! for the whole cohort, the current selection and the pin.

use crate::dataset::schema::{
    AGE, BMI, CURRENT_SMOKER, DIABETES, MALE, PREVALENT_HYP, SYS_BP, TEN_YEAR_CHD, TOT_CHOL,
};
use crate::dataset::Dataset;
use crate::selection::{IndexSet, SelectionState};
use crate::utils::mean;

mod distribution;

pub use distribution::{distribution, CategoryCount, FeatureDistribution};

/// Mean of one feature over a subgroup; `None` when no member has a value.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMean {
    pub feature: String,
    pub mean: Option<f64>,
    /// Members with a non-missing value.
    pub observed: usize,
}

/// Percentage of a subgroup whose indicator equals `1`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRate {
    pub feature: String,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubgroupSummary {
    pub size: usize,
    pub means: Vec<FeatureMean>,
    pub rates: Vec<FeatureRate>,
}

impl SubgroupSummary {
    pub fn mean_of(&self, feature: &str) -> Option<f64> {
        self.means
            .iter()
            .find(|m| m.feature == feature)
            .and_then(|m| m.mean)
    }

    pub fn percent_of(&self, feature: &str) -> Option<f64> {
        self.rates
            .iter()
            .find(|r| r.feature == feature)
            .map(|r| r.percent)
    }
}

/// Side-by-side summaries; `None` marks an empty group.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub full: Option<SubgroupSummary>,
    pub selected: Option<SubgroupSummary>,
    pub pinned: Option<SubgroupSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregator {
    mean_features: Vec<String>,
    rate_features: Vec<String>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(
            [AGE, BMI, TOT_CHOL, SYS_BP],
            [MALE, CURRENT_SMOKER, DIABETES, PREVALENT_HYP, TEN_YEAR_CHD],
        )
    }
}

impl Aggregator {
    pub fn new<M, R, S, T>(mean_features: M, rate_features: R) -> Self
    where
        M: IntoIterator<Item = S>,
        R: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            mean_features: mean_features.into_iter().map(Into::into).collect(),
            rate_features: rate_features.into_iter().map(Into::into).collect(),
        }
    }

    pub fn mean_features(&self) -> &[String] {
        &self.mean_features
    }

    pub fn rate_features(&self) -> &[String] {
        &self.rate_features
    }

    /// Fails when a metric names a feature the dataset does not describe.
    fn check_metrics(&self, dataset: &Dataset) -> anyhow::Result<()> {
        for feature in self.mean_features.iter().chain(&self.rate_features) {
            dataset.require_descriptor(feature)?;
        }
        Ok(())
    }

    /// Summarises the records in `indices`. Returns `None` for an empty
    /// group. Indices beyond the dataset are ignored; an unknown metric
    /// feature is an error.
    pub fn summarize(
        &self,
        dataset: &Dataset,
        indices: &IndexSet,
    ) -> anyhow::Result<Option<SubgroupSummary>> {
        self.check_metrics(dataset)?;
        Ok(self.summarize_checked(dataset, indices))
    }

    fn summarize_checked(&self, dataset: &Dataset, indices: &IndexSet) -> Option<SubgroupSummary> {
        let members: Vec<_> = indices
            .iter()
            .filter_map(|&i| dataset.record(i))
            .collect();
        if members.len() != indices.len() {
            log::warn!(
                "Ignoring {} indices outside a dataset of {} records",
                indices.len() - members.len(),
                dataset.len()
            );
        }
        if members.is_empty() {
            return None;
        }
        let size = members.len();

        let means = self
            .mean_features
            .iter()
            .map(|feature| {
                let present: Vec<f64> = members.iter().filter_map(|r| r.get(feature)).collect();
                FeatureMean {
                    feature: feature.clone(),
                    mean: mean(&present),
                    observed: present.len(),
                }
            })
            .collect();

        let rates = self
            .rate_features
            .iter()
            .map(|feature| {
                let positives = members
                    .iter()
                    .filter(|r| r.get(feature) == Some(1.0))
                    .count();
                FeatureRate {
                    feature: feature.clone(),
                    percent: positives as f64 / size as f64 * 100.0,
                }
            })
            .collect();

        Some(SubgroupSummary { size, means, rates })
    }

    /// Independent summaries of the full cohort, the selection and the pin.
    pub fn compare(&self, dataset: &Dataset, state: &SelectionState) -> anyhow::Result<Comparison> {
        self.check_metrics(dataset)?;
        Ok(Comparison {
            full: self.summarize_checked(dataset, &dataset.all_indices()),
            selected: self.summarize_checked(dataset, state.selected()),
            pinned: self.summarize_checked(dataset, state.pinned()),
        })
    }
}

/// Summarises `indices` with the default cohort metrics.
pub fn summarize(dataset: &Dataset, indices: &IndexSet) -> anyhow::Result<Option<SubgroupSummary>> {
    Aggregator::default().summarize(dataset, indices)
}
