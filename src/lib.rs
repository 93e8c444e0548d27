//! step-registry-lsp: editor navigation for CI pipeline configuration
//!
//! Resolves `workflow`, `chain`, `ref` and `commands` references in
//! `ci-operator` configuration to the step registry files that define them,
//! and serves the result over the Language Server Protocol.

pub mod agents;
pub mod document;
pub mod error;
pub mod logging;
pub mod lsp;
pub mod resolve;
pub mod session;

pub use error::{Error, Result};
