//! Per-request pipeline for the aegis runtime: intent classification, memory
//! retrieval, extension execution, generation, and post-processing, wired
//! into the explicit `aegis_types::Pipeline` state machine (spec.md §4.10).

mod error;
mod error_classifier;
mod events;
mod extensions;
mod orchestrator;
mod pipelines;
mod prompts;

pub use error::{OrchestratorError, Result};
pub use error_classifier::ErrorClassifier;
pub use events::{EventBus, RuntimeEvent};
pub use extensions::{Extension, ExtensionContext, ExtensionOutcome, ExtensionRegistry, FileSearchExtension};
pub use orchestrator::{Orchestrator, ProcessRequest, ProcessResponse};
pub use prompts::{capabilities_block, PromptMode};
