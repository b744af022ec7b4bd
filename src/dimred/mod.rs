//! # Dimensionality Reduction
//!
//! Projects a standardised [`FeatureMatrix`] onto the plane. Two engines are
//! available behind one entry point, [`reduce`]:
//!
//! - **PCA** ([`pca`]): linear, deterministic, reports explained variance
//! - **t-SNE** ([`tsne`]): non-linear, stochastic, preserves local neighbourhoods
//!
//! Every projected point carries the original index of its record, so points
//! can be matched against selection and pin sets regardless of which records
//! were dropped during preprocessing.

use crate::preprocessing::FeatureMatrix;
use anyhow::bail;
use ndarray::Array2;
use std::fmt;
use std::str::FromStr;

pub mod pca;
pub mod tsne;

pub use pca::{PCABuilder, PCAConfig, PowerIterationPCA};
pub use tsne::TSNEConfig;

#[derive(Debug, Clone, PartialEq)]
pub enum ReductionMethod {
    Pca(PCAConfig),
    Tsne(TSNEConfig),
}

impl ReductionMethod {
    pub fn name(&self) -> &'static str {
        match self {
            ReductionMethod::Pca(_) => "pca",
            ReductionMethod::Tsne(_) => "tsne",
        }
    }
}

impl Default for ReductionMethod {
    fn default() -> Self {
        ReductionMethod::Pca(PCAConfig::default())
    }
}

impl fmt::Display for ReductionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReductionMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pca" => Ok(ReductionMethod::Pca(PCAConfig::default())),
            "tsne" | "t-sne" => Ok(ReductionMethod::Tsne(TSNEConfig::default())),
            other => bail!("Unknown reduction method '{}'", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionPoint {
    pub x: f64,
    pub y: f64,
    pub original_index: usize,
}

/// Result of one reduction run.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub method: &'static str,
    pub points: Vec<ProjectionPoint>,
    /// Percent of total variance on each axis; PCA only.
    pub variance_explained: Option<[f64; 2]>,
}

impl Projection {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Points whose record is in `indices`.
    pub fn points_in<'a>(
        &'a self,
        indices: &'a crate::selection::IndexSet,
    ) -> impl Iterator<Item = &'a ProjectionPoint> + 'a {
        self.points
            .iter()
            .filter(move |p| indices.contains(&p.original_index))
    }
}

/// Runs the chosen engine over the matrix and tags every row with its
/// original record index.
pub fn reduce(matrix: &FeatureMatrix, method: &ReductionMethod) -> anyhow::Result<Projection> {
    if matrix.is_empty() {
        log::info!("No rows to project with {}", method);
        return Ok(Projection {
            method: method.name(),
            points: Vec::new(),
            variance_explained: match method {
                ReductionMethod::Pca(_) => Some([0.0, 0.0]),
                ReductionMethod::Tsne(_) => None,
            },
        });
    }

    let (coordinates, variance_explained) = match method {
        ReductionMethod::Pca(config) => {
            let mut pca = PCABuilder::new().config(*config).build();
            let coordinates = pca.fit_transform(matrix.data().view())?;
            (coordinates, pca.variance_explained())
        }
        ReductionMethod::Tsne(config) => (tsne::run(matrix.data().view(), config)?, None),
    };

    Ok(Projection {
        method: method.name(),
        points: tag_points(&coordinates, matrix.valid_indices()),
        variance_explained,
    })
}

fn tag_points(coordinates: &Array2<f64>, valid_indices: &[usize]) -> Vec<ProjectionPoint> {
    coordinates
        .rows()
        .into_iter()
        .zip(valid_indices.iter())
        .map(|(row, &original_index)| ProjectionPoint {
            x: row[0],
            y: row[1],
            original_index,
        })
        .collect()
}
