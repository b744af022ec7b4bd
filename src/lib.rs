pub mod dataset;
pub mod dimred;
pub mod preprocessing;
pub mod risk;
pub mod selection;
pub mod session;
pub mod similarity;
pub mod statistics;
mod dense;
mod utils;

pub use dataset::{Dataset, FeatureDescriptor, FeatureKind, Record};
pub use dimred::{reduce, Projection, ProjectionPoint, ReductionMethod};
pub use preprocessing::{preprocess, FeatureMatrix, ImputationPolicy, Preprocessor};
pub use selection::{IndexSet, SelectionState, Transition};
pub use statistics::{summarize, Aggregator, Comparison, SubgroupSummary};
pub use utils::{ColumnScaling, Standardize};
pub use utils::{mean, median, quantile, value_range};
