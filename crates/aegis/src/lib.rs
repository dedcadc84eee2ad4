//! Local AI-assistant orchestration runtime: wires the `aegis-*` subsystem
//! crates into a single bootstrapped `Runtime` (spec.md §1, §2).

mod error;
mod runtime;

pub use error::{Error, Result};
pub use runtime::Runtime;

// Re-exported so a consumer (the CLI, or an embedding host) only needs this
// one crate for the common per-request surface.
pub use aegis_config::Config;
pub use aegis_orchestrator::{OrchestratorError, ProcessRequest, ProcessResponse};
pub use aegis_types::{ErrorCategory, ErrorEnvelope, Intent, Pipeline, Stage};
