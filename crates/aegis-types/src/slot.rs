//! Model slot names.

use serde::{Deserialize, Serialize};

/// A named role a configured model fills.
///
/// `Router` is special: per the registry interlock, it never has an
/// independent client — it always resolves to whatever client is loaded for
/// `Fast`. See `aegis-registry` for the interlock implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotName {
    Fast,
    Critical,
    Code,
    Reasoning,
    Router,
}

impl SlotName {
    pub const ALL: [SlotName; 5] = [
        SlotName::Fast,
        SlotName::Critical,
        SlotName::Code,
        SlotName::Reasoning,
        SlotName::Router,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SlotName::Fast => "fast",
            SlotName::Critical => "critical",
            SlotName::Code => "code",
            SlotName::Reasoning => "reasoning",
            SlotName::Router => "router",
        }
    }
}

impl std::fmt::Display for SlotName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
