//! # wsgi_release
//!
//! Release orchestration for a small Python package.
//!
//! Named operations (`check`, `clean`, `output`, `test`, `tarball`, `wheel`,
//! `dist`) are declared with explicit prerequisites. Requesting an operation
//! runs every prerequisite first, each at most once per invocation, and skips
//! artifact operations whose output is already up to date.
//!
//! ## Usage
//!
//! ```bash
//! wsgi_release                 # run the default operation (check)
//! wsgi_release clean dist      # clean, then build the wheel
//! wsgi_release tarball --json  # export a source tarball, print the report
//! wsgi_release --list          # show declared operations
//! ```
//!
//! Commands and the graph itself can be adjusted through `release.toml`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod operations;
pub mod orchestrator;
pub mod process;

pub use cli::Args;
pub use config::{ProjectMetadata, ReleaseConfig, RunContext};
pub use error::{ReleaseError, Result};
pub use graph::{Operation, OperationGraph};
pub use operations::build_graph;
pub use orchestrator::{Orchestrator, RunObserver, RunReport};
pub use process::{CommandRunner, SystemRunner};
