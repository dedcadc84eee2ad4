//! `PersonalityManager`: fragment lifecycle, audit log, and the cached
//! system-prompt block (spec.md §4.8).

use crate::cache::BlockCache;
use crate::error::{PersonalityError, Result};
use crate::prompts::{compression_prompt, inference_prompt};
use crate::types::{FragmentKind, FragmentStatus, InferredCandidate, PersonalityAudit, PersonalityFragment};
use aegis_backend::{CallOverrides, ModelClient};
use aegis_config::PersonalityConfig;
use aegis_storage::Storage;
use aegis_types::Message;
use chrono::{DateTime, Utc};
use regex::Regex;
use rusqlite::types::Value;
use std::collections::HashMap;
use std::sync::Arc;

const PLACEHOLDER_BLOCK: &str =
    "You are still learning about this user. No personality profile has been established yet.";

/// Fragment lifecycle, audit log, and cached prompt block (spec.md §4.8).
pub struct PersonalityManager {
    storage: Arc<Storage>,
    fast_client: Arc<ModelClient>,
    config: PersonalityConfig,
    cache: BlockCache,
}

impl PersonalityManager {
    #[must_use]
    pub fn new(storage: Arc<Storage>, fast_client: Arc<ModelClient>, config: PersonalityConfig) -> Self {
        Self { storage, fast_client, config, cache: BlockCache::new() }
    }

    /// Create an explicit fragment, approved immediately at confidence 1.0
    /// (spec.md §4.8 `storeExplicit`).
    pub async fn store_explicit(
        &self,
        content: &str,
        category: Option<String>,
        source: Option<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Result<PersonalityFragment> {
        let now = Utc::now();
        let fragment = PersonalityFragment {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.to_string(),
            kind: FragmentKind::Explicit,
            category,
            confidence: 1.0,
            status: FragmentStatus::Approved,
            source,
            version: 1,
            created_at: now,
            updated_at: now,
            approved_at: Some(now),
            metadata,
        };

        self.insert_fragment(&fragment).await?;
        self.append_audit(
            &fragment.id,
            "explicit_stored",
            None,
            Some(&fragment.content),
            None,
            Some(FragmentStatus::Approved),
            Some(fragment.confidence),
            None,
        )
        .await?;
        self.cache.invalidate();

        Ok(fragment)
    }

    /// Infer candidate facts from a conversation via the fast LLM, parse,
    /// and persist the survivors (spec.md §4.8 `inferFromConversation`).
    pub async fn infer_from_conversation(
        &self,
        conversation_text: &str,
        source: Option<String>,
    ) -> Result<Vec<PersonalityFragment>> {
        if !self.config.inferential_learning_enabled {
            return Ok(Vec::new());
        }

        let approved = self.list_approved(usize::MAX).await?;
        let existing_contents: Vec<String> = approved.iter().map(|f| f.content.clone()).collect();
        let prompt = inference_prompt(conversation_text, &existing_contents);

        let response = self
            .fast_client
            .generate(
                &[Message::user(prompt)],
                CallOverrides { temperature: None, max_tokens: Some(512), stop: None },
            )
            .await?;

        let candidates = parse_inference_response(&response.content);
        if candidates.is_empty() {
            tracing::warn!("personality inference returned no usable candidates");
        }

        let mut created = Vec::new();
        let mut any_approved = false;

        for candidate in candidates {
            if candidate.confidence < 0.5 {
                continue;
            }

            let status = if self.config.auto_approve_enabled
                && !self.config.inferential_learning_requires_approval
                && candidate.confidence >= self.config.auto_approve_threshold
            {
                FragmentStatus::Approved
            } else {
                FragmentStatus::Pending
            };

            let now = Utc::now();
            let fragment = PersonalityFragment {
                id: uuid::Uuid::new_v4().to_string(),
                content: candidate.content,
                kind: FragmentKind::Inferred,
                category: candidate.category,
                confidence: candidate.confidence,
                status,
                source: source.clone(),
                version: 1,
                created_at: now,
                updated_at: now,
                approved_at: if status == FragmentStatus::Approved { Some(now) } else { None },
                metadata: HashMap::new(),
            };

            self.insert_fragment(&fragment).await?;
            self.append_audit(
                &fragment.id,
                "inferred",
                None,
                Some(&fragment.content),
                None,
                Some(status),
                Some(fragment.confidence),
                None,
            )
            .await?;

            if status == FragmentStatus::Approved {
                any_approved = true;
            }
            created.push(fragment);
        }

        if any_approved {
            self.cache.invalidate();
        }

        Ok(created)
    }

    pub async fn approve_fragment(&self, id: &str, reason: Option<String>) -> Result<bool> {
        let Some(fragment) = self.get_fragment(id).await? else {
            return Err(PersonalityError::NotFound(id.to_string()));
        };
        if fragment.status == FragmentStatus::Approved {
            return Ok(false);
        }

        let now = Utc::now();
        self.storage
            .update(
                "personality_fragments",
                vec![
                    ("status", Value::Text(FragmentStatus::Approved.as_str().to_string())),
                    ("approved_at", Value::Text(now.to_rfc3339())),
                    ("updated_at", Value::Text(now.to_rfc3339())),
                ],
                "id = ?1",
                vec![Value::Text(id.to_string())],
            )
            .await
            .map_err(PersonalityError::from)?;

        self.append_audit(
            id,
            "approved",
            None,
            None,
            Some(fragment.status),
            Some(FragmentStatus::Approved),
            None,
            reason,
        )
        .await?;
        self.cache.invalidate();
        Ok(true)
    }

    pub async fn reject_fragment(&self, id: &str, reason: Option<String>) -> Result<bool> {
        let Some(fragment) = self.get_fragment(id).await? else {
            return Err(PersonalityError::NotFound(id.to_string()));
        };
        if fragment.status == FragmentStatus::Rejected {
            return Ok(false);
        }

        self.storage
            .update(
                "personality_fragments",
                vec![
                    ("status", Value::Text(FragmentStatus::Rejected.as_str().to_string())),
                    ("updated_at", Value::Text(Utc::now().to_rfc3339())),
                ],
                "id = ?1",
                vec![Value::Text(id.to_string())],
            )
            .await
            .map_err(PersonalityError::from)?;

        self.append_audit(
            id,
            "rejected",
            None,
            None,
            Some(fragment.status),
            Some(FragmentStatus::Rejected),
            None,
            reason,
        )
        .await?;
        // Rejection never affects the approved set, so the cache need not
        // be invalidated.
        Ok(true)
    }

    pub async fn edit_and_approve(
        &self,
        id: &str,
        new_content: &str,
        reason: Option<String>,
    ) -> Result<PersonalityFragment> {
        let Some(fragment) = self.get_fragment(id).await? else {
            return Err(PersonalityError::NotFound(id.to_string()));
        };

        let now = Utc::now();
        self.storage
            .update(
                "personality_fragments",
                vec![
                    ("content", Value::Text(new_content.to_string())),
                    ("status", Value::Text(FragmentStatus::Approved.as_str().to_string())),
                    ("version", Value::Integer((fragment.version + 1) as i64)),
                    ("approved_at", Value::Text(now.to_rfc3339())),
                    ("updated_at", Value::Text(now.to_rfc3339())),
                ],
                "id = ?1",
                vec![Value::Text(id.to_string())],
            )
            .await
            .map_err(PersonalityError::from)?;

        self.append_audit(
            id,
            "edited_and_approved",
            Some(&fragment.content),
            Some(new_content),
            Some(fragment.status),
            Some(FragmentStatus::Approved),
            None,
            reason,
        )
        .await?;
        self.cache.invalidate();

        self.get_fragment(id).await?.ok_or_else(|| PersonalityError::NotFound(id.to_string()))
    }

    pub async fn delete_fragment(&self, id: &str, reason: Option<String>) -> Result<bool> {
        let Some(fragment) = self.get_fragment(id).await? else {
            return Ok(false);
        };

        let affected = self
            .storage
            .delete("personality_fragments", "id = ?1", vec![Value::Text(id.to_string())])
            .await
            .map_err(PersonalityError::from)?;

        self.append_audit(
            id,
            "deleted",
            Some(&fragment.content),
            None,
            Some(fragment.status),
            None,
            None,
            reason,
        )
        .await?;
        if fragment.status == FragmentStatus::Approved {
            self.cache.invalidate();
        }
        Ok(affected > 0)
    }

    /// Return the cached block, rebuilding on a dirty/forced miss (spec.md
    /// §4.8 `getPersonalityBlock`).
    pub async fn get_personality_block(&self, force_refresh: bool) -> Result<String> {
        if !force_refresh {
            if let Some(cached) = self.cache.get_if_clean() {
                return Ok(cached);
            }
        }

        let block = self.rebuild_block().await?;
        self.cache.store(block.clone());
        Ok(block)
    }

    /// Always rebuilds, bypassing the cache (spec.md §4.8 `getPreviewBlock`).
    pub async fn get_preview_block(&self) -> Result<String> {
        self.rebuild_block().await
    }

    async fn rebuild_block(&self) -> Result<String> {
        let fragments = self.list_approved(2 * self.config.max_fragments_in_prompt).await?;
        if fragments.is_empty() {
            return Ok(PLACEHOLDER_BLOCK.to_string());
        }

        if fragments.len() > self.config.compress_threshold {
            let contents: Vec<String> = fragments.iter().take(20).map(|f| f.content.clone()).collect();
            let prompt = compression_prompt(&contents, self.config.personality_token_budget);
            match self
                .fast_client
                .generate(
                    &[Message::user(prompt)],
                    CallOverrides {
                        temperature: None,
                        max_tokens: Some(self.config.personality_token_budget),
                        stop: None,
                    },
                )
                .await
            {
                Ok(response) => return Ok(response.content),
                Err(e) => {
                    tracing::warn!(error = %e, "personality compression failed, falling back to bullet list");
                    return Ok(bullet_list(&contents));
                }
            }
        }

        let contents: Vec<String> =
            fragments.iter().take(self.config.max_fragments_in_prompt).map(|f| f.content.clone()).collect();
        Ok(bullet_list(&contents))
    }

    async fn list_approved(&self, limit: usize) -> Result<Vec<PersonalityFragment>> {
        let rows = self
            .storage
            .fetch_all(
                "SELECT id, content, kind, category, confidence, status, source, version, \
                 created_at, updated_at, approved_at, metadata FROM personality_fragments \
                 WHERE status = 'approved' ORDER BY created_at DESC LIMIT ?1",
                vec![Value::Integer(limit as i64)],
                map_fragment_row,
            )
            .await
            .map_err(PersonalityError::from)?;
        Ok(rows)
    }

    async fn get_fragment(&self, id: &str) -> Result<Option<PersonalityFragment>> {
        self.storage
            .fetch_one(
                "SELECT id, content, kind, category, confidence, status, source, version, \
                 created_at, updated_at, approved_at, metadata FROM personality_fragments \
                 WHERE id = ?1",
                vec![Value::Text(id.to_string())],
                map_fragment_row,
            )
            .await
            .map_err(Into::into)
    }

    async fn insert_fragment(&self, fragment: &PersonalityFragment) -> Result<()> {
        self.storage
            .insert(
                "personality_fragments",
                vec![
                    ("id", Value::Text(fragment.id.clone())),
                    ("content", Value::Text(fragment.content.clone())),
                    ("kind", Value::Text(fragment.kind.as_str().to_string())),
                    ("category", fragment.category.clone().map_or(Value::Null, Value::Text)),
                    ("confidence", Value::Real(fragment.confidence as f64)),
                    ("status", Value::Text(fragment.status.as_str().to_string())),
                    ("source", fragment.source.clone().map_or(Value::Null, Value::Text)),
                    ("version", Value::Integer(fragment.version as i64)),
                    ("created_at", Value::Text(fragment.created_at.to_rfc3339())),
                    ("updated_at", Value::Text(fragment.updated_at.to_rfc3339())),
                    ("approved_at", fragment.approved_at.map_or(Value::Null, |d| Value::Text(d.to_rfc3339()))),
                    (
                        "metadata",
                        Value::Text(serde_json::to_string(&fragment.metadata).unwrap_or_default()),
                    ),
                ],
            )
            .await
            .map_err(PersonalityError::from)?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn append_audit(
        &self,
        fragment_id: &str,
        action: &str,
        old_content: Option<&str>,
        new_content: Option<&str>,
        old_status: Option<FragmentStatus>,
        new_status: Option<FragmentStatus>,
        confidence: Option<f32>,
        reason: Option<String>,
    ) -> Result<()> {
        self.storage
            .insert(
                "personality_audit",
                vec![
                    ("fragment_id", Value::Text(fragment_id.to_string())),
                    ("action", Value::Text(action.to_string())),
                    ("old_content", old_content.map_or(Value::Null, |c| Value::Text(c.to_string()))),
                    ("new_content", new_content.map_or(Value::Null, |c| Value::Text(c.to_string()))),
                    (
                        "old_status",
                        old_status.map_or(Value::Null, |s| Value::Text(s.as_str().to_string())),
                    ),
                    (
                        "new_status",
                        new_status.map_or(Value::Null, |s| Value::Text(s.as_str().to_string())),
                    ),
                    ("confidence", confidence.map_or(Value::Null, |c| Value::Real(c as f64))),
                    ("reason", reason.map_or(Value::Null, Value::Text)),
                    ("metadata", Value::Text("{}".to_string())),
                    ("created_at", Value::Text(Utc::now().to_rfc3339())),
                ],
            )
            .await
            .map_err(PersonalityError::from)?;
        Ok(())
    }

    /// Audit trail for one fragment, oldest first (used by the CLI and by
    /// tests asserting monotone audit ordering, spec.md §8).
    pub async fn audit_for(&self, fragment_id: &str) -> Result<Vec<PersonalityAudit>> {
        self.storage
            .fetch_all(
                "SELECT id, fragment_id, action, old_content, new_content, old_status, \
                 new_status, confidence, reason, metadata, created_at FROM personality_audit \
                 WHERE fragment_id = ?1 ORDER BY created_at ASC, id ASC",
                vec![Value::Text(fragment_id.to_string())],
                map_audit_row,
            )
            .await
            .map_err(Into::into)
    }
}

fn bullet_list(contents: &[String]) -> String {
    contents.iter().map(|c| format!("- {c}")).collect::<Vec<_>>().join("\n")
}

/// Strip markdown fences, extract the first JSON array via regex, discard
/// malformed items and items below confidence 0.5 (spec.md §4.8).
fn parse_inference_response(raw: &str) -> Vec<InferredCandidate> {
    let stripped = raw.replace("```json", "").replace("```", "");
    let re = Regex::new(r"(?s)\[.*\]").expect("static regex is valid");
    let Some(m) = re.find(&stripped) else {
        return Vec::new();
    };
    serde_json::from_str::<Vec<InferredCandidate>>(m.as_str()).unwrap_or_default()
}

fn map_fragment_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PersonalityFragment> {
    let kind: String = row.get("kind")?;
    let status: String = row.get("status")?;
    let approved_at: Option<String> = row.get("approved_at")?;
    let metadata_json: String = row.get("metadata")?;

    Ok(PersonalityFragment {
        id: row.get("id")?,
        content: row.get("content")?,
        kind: if kind == "explicit" { FragmentKind::Explicit } else { FragmentKind::Inferred },
        category: row.get("category")?,
        confidence: row.get::<_, f64>("confidence")? as f32,
        status: FragmentStatus::parse(&status).unwrap_or(FragmentStatus::Pending),
        source: row.get("source")?,
        version: row.get::<_, i64>("version")? as u32,
        created_at: parse_ts(row.get::<_, String>("created_at")?),
        updated_at: parse_ts(row.get::<_, String>("updated_at")?),
        approved_at: approved_at.map(parse_ts),
        metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
    })
}

fn map_audit_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PersonalityAudit> {
    let old_status: Option<String> = row.get("old_status")?;
    let new_status: Option<String> = row.get("new_status")?;
    let confidence: Option<f64> = row.get("confidence")?;
    let metadata_json: String = row.get("metadata")?;

    Ok(PersonalityAudit {
        id: row.get("id")?,
        fragment_id: row.get("fragment_id")?,
        action: row.get("action")?,
        old_content: row.get("old_content")?,
        new_content: row.get("new_content")?,
        old_status: old_status.and_then(|s| FragmentStatus::parse(&s)),
        new_status: new_status.and_then(|s| FragmentStatus::parse(&s)),
        confidence: confidence.map(|c| c as f32),
        reason: row.get("reason")?,
        metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
        created_at: parse_ts(row.get::<_, String>("created_at")?),
    })
}

fn parse_ts(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_inference_response_strips_markdown_fences() {
        let raw = "```json\n[{\"content\": \"likes tea\", \"confidence\": 0.9, \"category\": \"preference\"}]\n```";
        let candidates = parse_inference_response(raw);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].content, "likes tea");
    }

    #[test]
    fn parse_inference_response_malformed_json_yields_empty() {
        assert!(parse_inference_response("not json at all").is_empty());
    }

    #[test]
    fn parse_inference_response_handles_empty_array() {
        assert!(parse_inference_response("[]").is_empty());
    }
}
