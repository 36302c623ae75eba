pub mod agtype;
pub mod builder;
pub mod cypher;
pub mod scores;
pub mod store;

pub use agtype::{AgValue, Scalar};
pub use builder::{BuildStats, GraphBuilder};
pub use cypher::{ParamValue, Params};
pub use scores::{GraphScores, GraphSignal};
pub use store::{GraphStore, Row};
