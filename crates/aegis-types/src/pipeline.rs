//! The ephemeral per-request pipeline tracked by the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stage of the request pipeline. Variants are declared in the order
/// they must execute in; `aegis-orchestrator` asserts transitions are
/// monotone in this order (spec.md §5 "Ordering guarantees").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Intent,
    Memory,
    Extension,
    Llm,
    Post,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Intent,
        Stage::Memory,
        Stage::Extension,
        Stage::Llm,
        Stage::Post,
    ];
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Intent => "intent",
            Stage::Memory => "memory",
            Stage::Extension => "extension",
            Stage::Llm => "llm",
            Stage::Post => "post",
        };
        f.write_str(s)
    }
}

/// Status of a single stage within a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Active,
    Completed,
    Error,
    Skipped,
}

/// One stage's tracked state within a `Pipeline`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageState {
    pub stage: Stage,
    pub status: StageStatus,
    pub error: Option<String>,
}

impl StageState {
    #[must_use]
    pub fn pending(stage: Stage) -> Self {
        Self {
            stage,
            status: StageStatus::Pending,
            error: None,
        }
    }
}

/// Ephemeral per-request pipeline state (spec.md §3 "Pipeline").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub request_id: String,
    pub stages: Vec<StageState>,
    pub current_stage: Option<Stage>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Pipeline {
    #[must_use]
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            stages: Stage::ALL.iter().copied().map(StageState::pending).collect(),
            current_stage: None,
            started_at: Utc::now(),
            finished_at: None,
            error: None,
        }
    }

    fn stage_mut(&mut self, stage: Stage) -> &mut StageState {
        self.stages
            .iter_mut()
            .find(|s| s.stage == stage)
            .expect("Stage::ALL covers every Stage variant")
    }

    /// Enter `stage`, asserting it does not precede the previously active
    /// stage (stage transitions are monotone - spec.md §5).
    ///
    /// # Panics
    /// Panics if `stage` is strictly earlier than the current stage; this
    /// would indicate an orchestrator bug, not a runtime/user condition.
    pub fn enter_stage(&mut self, stage: Stage) {
        if let Some(current) = self.current_stage {
            assert!(
                stage >= current,
                "pipeline stage transitions must be monotone: {current} -> {stage}"
            );
        }
        self.current_stage = Some(stage);
        self.stage_mut(stage).status = StageStatus::Active;
    }

    pub fn complete_stage(&mut self, stage: Stage) {
        self.stage_mut(stage).status = StageStatus::Completed;
    }

    pub fn skip_stage(&mut self, stage: Stage) {
        self.stage_mut(stage).status = StageStatus::Skipped;
    }

    pub fn error_stage(&mut self, stage: Stage, message: impl Into<String>) {
        let message = message.into();
        self.stage_mut(stage).error = Some(message);
        self.stage_mut(stage).status = StageStatus::Error;
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
    }
}
