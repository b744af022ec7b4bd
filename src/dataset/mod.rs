//! # Cohort Dataset
//!
//! Records, feature descriptors and the ordered record collection. A record's
//! position in the collection is its *original index*, the identity used by
//! selections, pins and projections.

use crate::selection::IndexSet;
use anyhow::{anyhow, bail};
use std::collections::{HashMap, HashSet};

pub mod schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    Numeric,
    Categorical,
    Ordinal,
}

/// Name, kind and (for categorical and ordinal features) the legal values of
/// one feature.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureDescriptor {
    name: String,
    kind: FeatureKind,
    domain: Vec<f64>,
    labels: Vec<String>,
}

impl FeatureDescriptor {
    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::Numeric,
            domain: Vec::new(),
            labels: Vec::new(),
        }
    }

    pub fn categorical(name: impl Into<String>, domain: impl Into<Vec<f64>>) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::Categorical,
            domain: domain.into(),
            labels: Vec::new(),
        }
    }

    pub fn ordinal(name: impl Into<String>, domain: impl Into<Vec<f64>>) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::Ordinal,
            domain: domain.into(),
            labels: Vec::new(),
        }
    }

    /// Attaches display labels, one per domain value in domain order.
    pub fn with_labels<I, S>(mut self, labels: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.len() != self.domain.len() {
            bail!(
                "Feature '{}' has {} domain values but {} labels were given",
                self.name,
                self.domain.len(),
                labels.len()
            );
        }
        self.labels = labels;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FeatureKind {
        self.kind
    }

    pub fn domain(&self) -> &[f64] {
        &self.domain
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Whether `value` is legal for this feature. Numeric features admit any
    /// finite value.
    pub fn admits(&self, value: f64) -> bool {
        match self.kind {
            FeatureKind::Numeric => value.is_finite(),
            FeatureKind::Categorical | FeatureKind::Ordinal => self.domain.contains(&value),
        }
    }

    pub fn label_for(&self, value: f64) -> Option<&str> {
        self.domain
            .iter()
            .position(|&v| v == value)
            .and_then(|pos| self.labels.get(pos))
            .map(String::as_str)
    }
}

/// One individual's measurements. A feature that is absent is missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: HashMap<String, f64>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a feature value; `None` and `NaN` both mark it missing.
    pub fn with(mut self, name: impl Into<String>, value: Option<f64>) -> Self {
        let name = name.into();
        match value.filter(|v| !v.is_nan()) {
            Some(v) => {
                self.values.insert(name, v);
            }
            None => {
                self.values.remove(&name);
            }
        }
        self
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Option<f64>)>,
        S: Into<String>,
    {
        pairs
            .into_iter()
            .fold(Self::new(), |record, (name, value)| record.with(name, value))
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn is_missing(&self, name: &str) -> bool {
        !self.values.contains_key(name)
    }

    pub fn features(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, &v)| (k.as_str(), v))
    }
}

/// The ordered, immutable record collection together with its schema.
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Vec<Record>,
    descriptors: Vec<FeatureDescriptor>,
    by_name: HashMap<String, usize>,
}

impl Dataset {
    /// Builds a dataset, checking that descriptor names are unique and that
    /// every categorical or ordinal value present belongs to its domain.
    pub fn new(records: Vec<Record>, descriptors: Vec<FeatureDescriptor>) -> anyhow::Result<Self> {
        let mut by_name = HashMap::with_capacity(descriptors.len());
        for (pos, descriptor) in descriptors.iter().enumerate() {
            if by_name.insert(descriptor.name.clone(), pos).is_some() {
                bail!("Duplicate feature descriptor '{}'", descriptor.name);
            }
        }

        for (index, record) in records.iter().enumerate() {
            for (name, value) in record.features() {
                let Some(&pos) = by_name.get(name) else {
                    continue;
                };
                let descriptor = &descriptors[pos];
                if !descriptor.admits(value) {
                    bail!(
                        "Record {} has value {} for feature '{}' outside its domain",
                        index,
                        value,
                        name
                    );
                }
            }
        }

        log::debug!(
            "Loaded dataset with {} records and {} features",
            records.len(),
            descriptors.len()
        );

        Ok(Self {
            records,
            descriptors,
            by_name,
        })
    }

    /// Builds a dataset over the fixed cohort schema.
    pub fn with_cohort_schema(records: Vec<Record>) -> anyhow::Result<Self> {
        Self::new(records, schema::cohort_descriptors())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn descriptors(&self) -> &[FeatureDescriptor] {
        &self.descriptors
    }

    pub fn descriptor(&self, name: &str) -> Option<&FeatureDescriptor> {
        self.by_name.get(name).map(|&pos| &self.descriptors[pos])
    }

    pub(crate) fn require_descriptor(&self, name: &str) -> anyhow::Result<&FeatureDescriptor> {
        self.descriptor(name)
            .ok_or_else(|| anyhow!("Unknown feature '{}'", name))
    }

    pub fn all_indices(&self) -> IndexSet {
        (0..self.records.len()).collect()
    }

    /// Non-missing values of a feature across the whole dataset, in record
    /// order.
    pub fn present_values(&self, name: &str) -> Vec<f64> {
        self.records.iter().filter_map(|r| r.get(name)).collect()
    }
}

/// Checks a feature list for emptiness, duplicates and unknown names.
pub(crate) fn validate_feature_names<S: AsRef<str>>(
    dataset: &Dataset,
    feature_names: &[S],
) -> anyhow::Result<Vec<String>> {
    if feature_names.is_empty() {
        bail!("At least one feature name is required");
    }
    let mut seen = HashSet::with_capacity(feature_names.len());
    let mut names = Vec::with_capacity(feature_names.len());
    for name in feature_names {
        let name = name.as_ref();
        dataset.require_descriptor(name)?;
        if !seen.insert(name) {
            bail!("Feature '{}' was requested more than once", name);
        }
        names.push(name.to_string());
    }
    Ok(names)
}
