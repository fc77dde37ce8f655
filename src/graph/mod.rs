//! Operation graph.
//!
//! Operations are declared once at load time, validated into an
//! [`OperationGraph`], and never modified during an invocation.

mod dependency;
mod operation;

pub use dependency::OperationGraph;
pub use operation::{ArtifactLocation, Operation, OperationKind, Step};
pub(crate) use operation::rooted_glob;
