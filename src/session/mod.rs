//! # Exploration Session
//!
//! Glue between the pure engines and interactive views. Projections are pure
//! functions of `(dataset, ProjectionConfig)`, memoised here by config; the
//! selection state is an explicit value owned by the session rather than
//! shared ambient state.

use crate::dataset::Dataset;
use crate::dimred::{reduce, Projection, ReductionMethod};
use crate::preprocessing::Preprocessor;
use crate::selection::{IndexSet, SelectionState, Transition};
use crate::statistics::{Aggregator, Comparison, SubgroupSummary};
use std::sync::Arc;

mod slot;

pub use slot::{spawn_projection, ProjectionSlot, Ticket};

/// Everything a projection depends on besides the dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionConfig {
    pub features: Vec<String>,
    pub method: ReductionMethod,
}

impl ProjectionConfig {
    pub fn new<I, S>(features: I, method: ReductionMethod) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            features: features.into_iter().map(Into::into).collect(),
            method,
        }
    }
}

/// Computes a projection from scratch.
pub fn project(
    dataset: &Dataset,
    preprocessor: &Preprocessor,
    config: &ProjectionConfig,
) -> anyhow::Result<Projection> {
    let matrix = preprocessor.run(dataset, &config.features)?;
    reduce(&matrix, &config.method)
}

/// Memoised projections of one dataset, keyed by [`ProjectionConfig`].
pub struct ProjectionCache {
    dataset: Arc<Dataset>,
    preprocessor: Preprocessor,
    entries: Vec<(ProjectionConfig, Arc<Projection>)>,
    capacity: usize,
}

impl ProjectionCache {
    pub fn new(dataset: Arc<Dataset>) -> Self {
        Self {
            dataset,
            preprocessor: Preprocessor::new(),
            entries: Vec::new(),
            capacity: 8,
        }
    }

    pub fn with_preprocessor(mut self, preprocessor: Preprocessor) -> Self {
        self.preprocessor = preprocessor;
        self.entries.clear();
        self
    }

    /// Number of configurations kept; the least recently used is evicted.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self.entries.truncate(self.capacity);
        self
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_or_compute(&mut self, config: &ProjectionConfig) -> anyhow::Result<Arc<Projection>> {
        if let Some(pos) = self.entries.iter().position(|(key, _)| key == config) {
            log::debug!("Projection cache hit for {} over {:?}", config.method, config.features);
            let entry = self.entries.remove(pos);
            let projection = Arc::clone(&entry.1);
            self.entries.insert(0, entry);
            return Ok(projection);
        }

        log::debug!("Projection cache miss for {} over {:?}", config.method, config.features);
        let projection = Arc::new(project(&self.dataset, &self.preprocessor, config)?);
        self.entries.insert(0, (config.clone(), Arc::clone(&projection)));
        self.entries.truncate(self.capacity);
        Ok(projection)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// One analyst's session over a loaded cohort.
pub struct Explorer {
    cache: ProjectionCache,
    state: SelectionState,
    aggregator: Aggregator,
}

impl Explorer {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            cache: ProjectionCache::new(Arc::new(dataset)),
            state: SelectionState::new(),
            aggregator: Aggregator::default(),
        }
    }

    pub fn with_aggregator(mut self, aggregator: Aggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Replaces the preprocessing used for projections, dropping any cached
    /// projection made with the previous one.
    pub fn with_preprocessor(mut self, preprocessor: Preprocessor) -> Self {
        self.cache = self.cache.with_preprocessor(preprocessor);
        self
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        self.cache.preprocessor()
    }

    pub fn dataset(&self) -> &Dataset {
        self.cache.dataset()
    }

    pub fn project(&mut self, config: &ProjectionConfig) -> anyhow::Result<Arc<Projection>> {
        self.cache.get_or_compute(config)
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn brush<I>(&mut self, indices: I)
    where
        I: IntoIterator<Item = usize>,
    {
        self.state.brush(indices);
    }

    pub fn pin(&mut self) {
        self.state.pin();
    }

    pub fn clear_pin(&mut self) {
        self.state.clear_pin();
    }

    pub fn clear_selection(&mut self) {
        self.state.clear_selection();
    }

    pub fn apply(&mut self, transition: Transition) {
        self.state.apply(transition);
    }

    pub fn summary_of(&self, indices: &IndexSet) -> anyhow::Result<Option<SubgroupSummary>> {
        self.aggregator.summarize(self.cache.dataset(), indices)
    }

    pub fn summary_of_selection(&self) -> anyhow::Result<Option<SubgroupSummary>> {
        self.summary_of(self.state.selected())
    }

    pub fn comparison(&self) -> anyhow::Result<Comparison> {
        self.aggregator.compare(self.cache.dataset(), &self.state)
    }
}
