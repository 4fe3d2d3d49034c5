//! MCFL reachability over edge-labeled graphs.
//!
//! - [`graph`] / [`scc`]: the labeled multigraph and its component reachability
//! - [`solver`]: the worklist fixpoint for normal-form MCFGs, with provenance
//! - [`transform`]: graph rewrites between solver runs
//! - [`session`] / [`refinement`]: memoized alpha / beta runs and mutual refinement
//! - [`pipeline`]: the staged analysis and its report
//! - [`text_format`]: graph and path files

pub mod config;
pub mod derivation;
pub mod error;
pub mod graph;
pub mod pipeline;
pub mod provenance;
pub mod refinement;
pub mod scc;
pub mod session;
pub mod solver;
pub mod text_format;
pub mod transform;
pub mod union_find;

pub use config::{AnalysisFamily, SessionConfig};
pub use error::{AnalysisError, Result};
pub use graph::{Edge, Endpoint, Graph, Path, Vertex};
pub use pipeline::{AnalysisReport, Pipeline, StageResults};
pub use provenance::Provenance;
pub use scc::SccIndex;
pub use session::{AnalysisSession, SessionStats, SolvedGrammar};
pub use solver::{solve, Reachability, SolverOptions};
pub use union_find::DisjointSets;
