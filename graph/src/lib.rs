pub mod builder;
pub mod index;
pub mod weighting;

pub use builder::{BuildReport, EdgeSet, GraphBuilder, MalformedRecord, Relation};
pub use index::GraphIndex;
pub use weighting::{EdgeWeighter, WeightError, WeightedEdgeSet};
