//! Extensions as opaque capability providers (spec.md §1, §4.10 step 3;
//! SPEC_FULL.md §4.13).
//!
//! The core never inspects what an extension does internally -- sandboxing
//! policy is explicitly out of scope (spec.md §1). What the orchestrator
//! needs is a named, enabled/disabled registry of async capability
//! providers it can invoke by name and fold the output of into the
//! generation context, grounded in `original_source/src/extensions/manager.py`
//! and `core/file_search.py`'s shape (a registry keyed by extension name,
//! each entry independently enabled/disabled, `execute(input, context)`
//! returning either an output string or an error).

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Context handed to an extension at call time.
#[derive(Debug, Clone)]
pub struct ExtensionContext {
    pub session_id: String,
}

/// One extension's result, as surfaced to the generation stage (spec.md
/// §4.10 step 3: `{output, status}` or `{error, status:error}`).
#[derive(Debug, Clone)]
pub enum ExtensionOutcome {
    Output(String),
    Error(String),
}

/// An opaque capability provider. The orchestrator only ever calls
/// `execute`; everything else (credentials, sandboxing, network access) is
/// the extension's own concern.
#[async_trait]
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;
    async fn execute(&self, input: &str, ctx: &ExtensionContext) -> Result<String, String>;
}

/// A minimal `file_search` extension satisfying `Intent::FileOperation`'s
/// required-extensions mapping (spec.md §4.5) so the orchestrator has a
/// concrete provider to invoke in tests; real deployments register their
/// own providers instead or in addition.
pub struct FileSearchExtension;

#[async_trait]
impl Extension for FileSearchExtension {
    fn name(&self) -> &str {
        "file_search"
    }

    async fn execute(&self, input: &str, _ctx: &ExtensionContext) -> Result<String, String> {
        Ok(format!("no indexed files matched {input:?}"))
    }
}

/// Registry of named extensions, each independently enabled/disabled
/// (spec.md §4.10 step 3: "if the extension is known and enabled").
pub struct ExtensionRegistry {
    providers: DashMap<String, Arc<dyn Extension>>,
    enabled: DashMap<String, bool>,
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { providers: DashMap::new(), enabled: DashMap::new() }
    }

    pub fn register(&self, extension: Arc<dyn Extension>) {
        let name = extension.name().to_string();
        self.enabled.insert(name.clone(), true);
        self.providers.insert(name, extension);
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) {
        self.enabled.insert(name.to_string(), enabled);
    }

    #[must_use]
    pub fn is_known(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.get(name).map(|e| *e).unwrap_or(false)
    }

    /// Run every extension named in `required`, skipping unknown or
    /// disabled names, never propagating a single extension's failure
    /// (spec.md §7: "extension failures are caught and logged; the
    /// pipeline continues with degraded inputs").
    pub async fn run_all(
        &self,
        required: &[String],
        input: &str,
        ctx: &ExtensionContext,
    ) -> HashMap<String, ExtensionOutcome> {
        let mut results = HashMap::new();
        for name in required {
            if !self.is_known(name) || !self.is_enabled(name) {
                continue;
            }
            let Some(extension) = self.providers.get(name).map(|e| e.clone()) else {
                continue;
            };
            let outcome = match extension.execute(input, ctx).await {
                Ok(output) => ExtensionOutcome::Output(output),
                Err(e) => {
                    tracing::warn!(extension = %name, error = %e, "extension execution failed");
                    ExtensionOutcome::Error(e)
                }
            };
            results.insert(name.clone(), outcome);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_extension_is_skipped() {
        let registry = ExtensionRegistry::new();
        let ctx = ExtensionContext { session_id: "s1".to_string() };
        let results = registry.run_all(&["nonexistent".to_string()], "hi", &ctx).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn disabled_extension_is_skipped() {
        let registry = ExtensionRegistry::new();
        registry.register(Arc::new(FileSearchExtension));
        registry.set_enabled("file_search", false);
        let ctx = ExtensionContext { session_id: "s1".to_string() };
        let results = registry.run_all(&["file_search".to_string()], "hi", &ctx).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn known_enabled_extension_runs() {
        let registry = ExtensionRegistry::new();
        registry.register(Arc::new(FileSearchExtension));
        let ctx = ExtensionContext { session_id: "s1".to_string() };
        let results = registry.run_all(&["file_search".to_string()], "report.pdf", &ctx).await;
        assert!(matches!(results.get("file_search"), Some(ExtensionOutcome::Output(_))));
    }
}
