//! Personality data model (spec.md §3 "PersonalityFragment",
//! "PersonalityAudit").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a fragment entered the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    Explicit,
    Inferred,
}

impl FragmentKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FragmentKind::Explicit => "explicit",
            FragmentKind::Inferred => "inferred",
        }
    }
}

/// Review lifecycle state (spec.md §3 invariant: explicit fragments are
/// created with `status = approved`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentStatus {
    Pending,
    Approved,
    Rejected,
}

impl FragmentStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FragmentStatus::Pending => "pending",
            FragmentStatus::Approved => "approved",
            FragmentStatus::Rejected => "rejected",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(FragmentStatus::Pending),
            "approved" => Some(FragmentStatus::Approved),
            "rejected" => Some(FragmentStatus::Rejected),
            _ => None,
        }
    }
}

/// A single personality fact (spec.md §3 "PersonalityFragment").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalityFragment {
    pub id: String,
    pub content: String,
    pub kind: FragmentKind,
    pub category: Option<String>,
    pub confidence: f32,
    pub status: FragmentStatus,
    pub source: Option<String>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// An append-only audit row (spec.md §3 "PersonalityAudit").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalityAudit {
    pub id: i64,
    pub fragment_id: String,
    pub action: String,
    pub old_content: Option<String>,
    pub new_content: Option<String>,
    pub old_status: Option<FragmentStatus>,
    pub new_status: Option<FragmentStatus>,
    pub confidence: Option<f32>,
    pub reason: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// A candidate produced by the inference LLM before it is persisted
/// (spec.md §4.8 `inferFromConversation`).
#[derive(Debug, Clone, Deserialize)]
pub struct InferredCandidate {
    pub content: String,
    pub confidence: f32,
    #[serde(default)]
    pub category: Option<String>,
}
