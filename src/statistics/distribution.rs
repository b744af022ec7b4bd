use crate::dataset::{Dataset, FeatureKind};
use crate::selection::IndexSet;
use crate::utils::value_range;
use anyhow::bail;

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryCount {
    pub value: f64,
    pub label: Option<String>,
    pub count: usize,
}

/// Counts behind one per-feature distribution chart.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureDistribution {
    Categorical {
        feature: String,
        counts: Vec<CategoryCount>,
        missing: usize,
    },
    Numeric {
        feature: String,
        /// `bins + 1` edges spanning the full cohort's observed range.
        edges: Vec<f64>,
        counts: Vec<usize>,
        missing: usize,
    },
}

impl FeatureDistribution {
    pub fn total(&self) -> usize {
        match self {
            FeatureDistribution::Categorical { counts, missing, .. } => {
                counts.iter().map(|c| c.count).sum::<usize>() + missing
            }
            FeatureDistribution::Numeric {
                counts, missing, ..
            } => counts.iter().sum::<usize>() + missing,
        }
    }
}

/// Distribution of `feature` over the records in `indices`.
///
/// Numeric bin edges always come from the whole dataset so that the
/// histogram of a subgroup lines up with the cohort's.
pub fn distribution(
    dataset: &Dataset,
    feature: &str,
    indices: &IndexSet,
    bins: usize,
) -> anyhow::Result<FeatureDistribution> {
    let descriptor = dataset.require_descriptor(feature)?;
    let values: Vec<Option<f64>> = indices
        .iter()
        .filter_map(|&i| dataset.record(i))
        .map(|r| r.get(feature))
        .collect();
    if values.len() != indices.len() {
        log::warn!(
            "Ignoring {} indices outside a dataset of {} records",
            indices.len() - values.len(),
            dataset.len()
        );
    }
    let missing = values.iter().filter(|v| v.is_none()).count();

    match descriptor.kind() {
        FeatureKind::Categorical | FeatureKind::Ordinal => {
            let counts = descriptor
                .domain()
                .iter()
                .map(|&value| CategoryCount {
                    value,
                    label: descriptor.label_for(value).map(str::to_string),
                    count: values.iter().filter(|v| **v == Some(value)).count(),
                })
                .collect();
            Ok(FeatureDistribution::Categorical {
                feature: feature.to_string(),
                counts,
                missing,
            })
        }
        FeatureKind::Numeric => {
            if bins == 0 {
                bail!("A histogram needs at least one bin");
            }
            let Some((min, max)) = value_range(&dataset.present_values(feature)) else {
                return Ok(FeatureDistribution::Numeric {
                    feature: feature.to_string(),
                    edges: Vec::new(),
                    counts: Vec::new(),
                    missing,
                });
            };

            let width = (max - min) / bins as f64;
            let edges = (0..=bins).map(|k| min + width * k as f64).collect();
            let mut counts = vec![0; bins];
            for v in values.iter().flatten() {
                let bin = if width > 0.0 {
                    (((v - min) / width).floor() as usize).min(bins - 1)
                } else {
                    0
                };
                counts[bin] += 1;
            }

            Ok(FeatureDistribution::Numeric {
                feature: feature.to_string(),
                edges,
                counts,
                missing,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::schema::{AGE, EDUCATION, GLUCOSE};
    use crate::dataset::Record;

    fn cohort() -> Dataset {
        let ages = [30.0, 40.0, 50.0, 60.0, 70.0];
        let mut records: Vec<Record> = ages
            .iter()
            .enumerate()
            .map(|(i, &age)| {
                Record::from_pairs([(AGE, Some(age)), (EDUCATION, Some((i % 4 + 1) as f64))])
            })
            .collect();
        records.push(Record::new());
        Dataset::with_cohort_schema(records).unwrap()
    }

    #[test]
    fn test_numeric_edges_come_from_full_cohort() {
        let ds = cohort();
        let subgroup: IndexSet = [3, 4, 5].into_iter().collect();

        match distribution(&ds, AGE, &subgroup, 4).unwrap() {
            FeatureDistribution::Numeric {
                edges,
                counts,
                missing,
                ..
            } => {
                assert_eq!(edges, vec![30.0, 40.0, 50.0, 60.0, 70.0]);
                assert_eq!(counts, vec![0, 0, 0, 2]);
                assert_eq!(missing, 1);
            }
            other => panic!("unexpected distribution {:?}", other),
        }
    }

    #[test]
    fn test_categorical_counts_follow_domain() {
        let ds = cohort();
        let dist = distribution(&ds, EDUCATION, &ds.all_indices(), 10).unwrap();
        assert_eq!(dist.total(), 6);

        match dist {
            FeatureDistribution::Categorical { counts, missing, .. } => {
                let tallies: Vec<usize> = counts.iter().map(|c| c.count).collect();
                assert_eq!(tallies, vec![2, 1, 1, 1]);
                assert_eq!(counts[3].label.as_deref(), Some("College"));
                assert_eq!(missing, 1);
            }
            other => panic!("unexpected distribution {:?}", other),
        }
    }

    #[test]
    fn test_never_observed_numeric_feature() {
        let ds = cohort();
        let dist = distribution(&ds, GLUCOSE, &ds.all_indices(), 5).unwrap();
        assert_eq!(dist.total(), 6);
    }

    #[test]
    fn test_out_of_range_indices_are_ignored() {
        let ds = cohort();
        let indices: IndexSet = [0, 4, 17, 99].into_iter().collect();

        let ages = distribution(&ds, AGE, &indices, 4).unwrap();
        assert_eq!(ages.total(), 2);
        match ages {
            FeatureDistribution::Numeric { counts, missing, .. } => {
                assert_eq!(counts, vec![1, 0, 0, 1]);
                assert_eq!(missing, 0);
            }
            other => panic!("unexpected distribution {:?}", other),
        }

        let only_invalid: IndexSet = [6, 7].into_iter().collect();
        assert_eq!(distribution(&ds, EDUCATION, &only_invalid, 4).unwrap().total(), 0);
    }

    #[test]
    fn test_errors() {
        let ds = cohort();
        assert!(distribution(&ds, AGE, &ds.all_indices(), 0).is_err());
        assert!(distribution(&ds, "weight", &ds.all_indices(), 3).is_err());
    }
}
