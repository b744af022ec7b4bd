//! # Personal Risk Estimate
//!
//! Nearest-neighbour risk for a synthetic profile: every continuous feature is
//! min-max normalised over the cohort's observed range, the `k` records
//! closest to the profile are found by Euclidean distance, and the share of
//! them with a positive outcome is reported.

use crate::dataset::schema::{
    AGE, BMI, CIGS_PER_DAY, DIA_BP, GLUCOSE, HEART_RATE, SYS_BP, TEN_YEAR_CHD, TOT_CHOL,
};
use crate::dataset::{validate_feature_names, Dataset, Record};
use crate::similarity::{DistanceMeasure, Euclidean};
use crate::utils::{median, value_range};
use ndarray::{Array1, Array2};
use rayon::prelude::*;

pub const RISK_FEATURES: [&str; 8] = [
    AGE,
    CIGS_PER_DAY,
    TOT_CHOL,
    SYS_BP,
    DIA_BP,
    BMI,
    HEART_RATE,
    GLUCOSE,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskScore {
    /// Percentage of the neighbours with a positive outcome.
    pub percent: f64,
    pub neighbours: usize,
    pub positives: usize,
}

pub struct RiskEstimatorBuilder {
    k: usize,
    features: Vec<String>,
    outcome: String,
}

impl Default for RiskEstimatorBuilder {
    fn default() -> Self {
        Self {
            k: 100,
            features: RISK_FEATURES.iter().map(|s| s.to_string()).collect(),
            outcome: TEN_YEAR_CHD.to_string(),
        }
    }
}

impl RiskEstimatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = features.into_iter().map(Into::into).collect();
        self
    }

    pub fn outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = outcome.into();
        self
    }

    pub fn fit(self, dataset: &Dataset) -> anyhow::Result<RiskEstimator> {
        let features = validate_feature_names(dataset, &self.features)?;
        dataset.require_descriptor(&self.outcome)?;
        if self.k == 0 {
            anyhow::bail!("k must be at least 1");
        }

        let mut fills = Array1::zeros(features.len());
        let mut lows = Array1::zeros(features.len());
        let mut spans = Array1::zeros(features.len());
        for (j, feature) in features.iter().enumerate() {
            let present = dataset.present_values(feature);
            let (low, high) = value_range(&present).unwrap_or((0.0, 0.0));
            fills[j] = median(&present).unwrap_or(0.0);
            lows[j] = low;
            spans[j] = high - low;
        }

        let mut normalised = Array2::zeros((dataset.len(), features.len()));
        for (i, record) in dataset.records().iter().enumerate() {
            let row = scale_record(record, &features, &fills, &lows, &spans);
            normalised.row_mut(i).assign(&row);
        }

        let outcomes = dataset
            .records()
            .iter()
            .map(|r| r.get(&self.outcome) == Some(1.0))
            .collect();

        log::debug!(
            "Risk estimator fitted on {} records over {} features (k = {})",
            dataset.len(),
            features.len(),
            self.k
        );

        Ok(RiskEstimator {
            k: self.k,
            features,
            fills,
            lows,
            spans,
            normalised,
            outcomes,
        })
    }
}

pub struct RiskEstimator {
    k: usize,
    features: Vec<String>,
    fills: Array1<f64>,
    lows: Array1<f64>,
    spans: Array1<f64>,
    normalised: Array2<f64>,
    outcomes: Vec<bool>,
}

impl RiskEstimator {
    /// Fits with the default features, outcome and `k = 100`.
    pub fn fit(dataset: &Dataset) -> anyhow::Result<Self> {
        RiskEstimatorBuilder::new().fit(dataset)
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Risk for `profile`. Features the profile lacks take the cohort median.
    /// Returns `None` when the cohort is empty.
    pub fn estimate(&self, profile: &Record) -> Option<RiskScore> {
        let n = self.normalised.nrows();
        if n == 0 {
            return None;
        }
        let query = scale_record(profile, &self.features, &self.fills, &self.lows, &self.spans);

        let mut distances: Vec<(f64, usize)> = (0..n)
            .into_par_iter()
            .map(|i| (Euclidean.distance(query.view(), self.normalised.row(i)), i))
            .collect();
        distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let neighbours = self.k.min(n);
        let positives = distances[..neighbours]
            .iter()
            .filter(|&&(_, i)| self.outcomes[i])
            .count();

        Some(RiskScore {
            percent: positives as f64 / neighbours as f64 * 100.0,
            neighbours,
            positives,
        })
    }
}

fn scale_record(
    record: &Record,
    features: &[String],
    fills: &Array1<f64>,
    lows: &Array1<f64>,
    spans: &Array1<f64>,
) -> Array1<f64> {
    features
        .iter()
        .enumerate()
        .map(|(j, feature)| {
            let value = record.get(feature).unwrap_or(fills[j]);
            if spans[j] > 0.0 {
                (value - lows[j]) / spans[j]
            } else {
                0.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cohort() -> Dataset {
        // Young, low-pressure records are negative; old, high-pressure ones positive.
        let mut records = Vec::new();
        for i in 0..10 {
            let f = i as f64;
            records.push(Record::from_pairs([
                (AGE, Some(35.0 + f)),
                (SYS_BP, Some(110.0 + f)),
                (TEN_YEAR_CHD, Some(0.0)),
            ]));
            records.push(Record::from_pairs([
                (AGE, Some(65.0 + f)),
                (SYS_BP, Some(160.0 + f)),
                (TEN_YEAR_CHD, Some(1.0)),
            ]));
        }
        Dataset::with_cohort_schema(records).unwrap()
    }

    #[test]
    fn test_neighbours_decide_the_score() {
        let ds = cohort();
        let estimator = RiskEstimatorBuilder::new().k(5).fit(&ds).unwrap();

        let old = Record::from_pairs([(AGE, Some(70.0)), (SYS_BP, Some(165.0))]);
        let score = estimator.estimate(&old).unwrap();
        assert_eq!(score.neighbours, 5);
        assert_relative_eq!(score.percent, 100.0);

        let young = Record::from_pairs([(AGE, Some(36.0)), (SYS_BP, Some(112.0))]);
        assert_relative_eq!(estimator.estimate(&young).unwrap().percent, 0.0);
    }

    #[test]
    fn test_k_larger_than_cohort() {
        let ds = cohort();
        let estimator = RiskEstimator::fit(&ds).unwrap();
        let score = estimator.estimate(&Record::new()).unwrap();

        assert_eq!(score.neighbours, 20);
        assert_eq!(score.positives, 10);
        assert_relative_eq!(score.percent, 50.0);
    }

    #[test]
    fn test_empty_cohort_and_bad_config() {
        let empty = Dataset::with_cohort_schema(Vec::new()).unwrap();
        let estimator = RiskEstimator::fit(&empty).unwrap();
        assert!(estimator.estimate(&Record::new()).is_none());

        let ds = cohort();
        assert!(RiskEstimatorBuilder::new().k(0).fit(&ds).is_err());
        assert!(RiskEstimatorBuilder::new().outcome("death").fit(&ds).is_err());
        assert!(RiskEstimatorBuilder::new().features(["height"]).fit(&ds).is_err());
    }
}
