//! `LongTermMemory`: persistent facts with embedding-ranked search and
//! keyword fallback (spec.md §4.7).

use crate::error::Result;
use aegis_backend::ModelClient;
use aegis_storage::Storage;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A stored long-term fact (spec.md §3 "LongTermMemory").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongTermMemoryRecord {
    pub id: String,
    pub content: String,
    pub category: Option<String>,
    pub importance: u8,
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub access_count: u64,
    pub last_accessed: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// A long-term memory paired with its search relevance (spec.md §4.7
/// `search`/`recent`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredLongTermMemory {
    pub memory: LongTermMemoryRecord,
    pub relevance: f32,
}

/// Aggregate counters returned by `stats` (spec.md §4.7 `stats`).
#[derive(Debug, Clone, Serialize)]
pub struct LongTermStats {
    pub total: i64,
    pub most_accessed: Vec<LongTermMemoryRecord>,
    pub most_recent: Vec<LongTermMemoryRecord>,
}

/// Similarities below this threshold are dropped from embedding-ranked
/// search results (spec.md §4.7 step 2).
const RELEVANCE_FLOOR: f32 = 0.30;
/// Keyword-fallback results always carry this static relevance (spec.md
/// §4.7 step 3).
const KEYWORD_FALLBACK_RELEVANCE: f32 = 0.5;

/// Stop words excluded when extracting search keywords from a query
/// (spec.md §4.7 step 3).
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "can",
    "this", "that", "these", "those", "i", "you", "he", "she", "it", "we", "they", "my", "your",
    "his", "her", "its", "our", "their", "of", "in", "on", "at", "to", "for", "with", "about",
    "what", "how", "why", "when", "where", "who",
];

pub struct LongTermMemory {
    storage: Arc<Storage>,
    embedding_client: Option<Arc<ModelClient>>,
    embedding_dimension: usize,
}

impl LongTermMemory {
    #[must_use]
    pub fn new(storage: Arc<Storage>, embedding_client: Option<Arc<ModelClient>>) -> Self {
        Self::with_embedding_dimension(storage, embedding_client, 768)
    }

    /// As `new`, but with an explicit expected embedding dimension (spec.md
    /// §9 "Embeddings as blobs or typed vectors": `memory.embeddings.dimension`
    /// configures the invariant `decode_embedding` enforces on read).
    #[must_use]
    pub fn with_embedding_dimension(
        storage: Arc<Storage>,
        embedding_client: Option<Arc<ModelClient>>,
        embedding_dimension: usize,
    ) -> Self {
        Self { storage, embedding_client, embedding_dimension }
    }

    /// Generate an embedding for `text` via the configured embedding
    /// client, if any (spec.md §4.9 `storeLearnings`: "compute embedding
    /// per line"). `None` when no embedding client is configured or the
    /// call fails -- callers fall back to storing without one.
    pub async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        match &self.embedding_client {
            Some(client) => client.embed(text).await.ok(),
            None => None,
        }
    }

    /// Persist a new fact, generating its id (spec.md §4.7 `add`).
    pub async fn add(
        &self,
        content: &str,
        metadata: HashMap<String, serde_json::Value>,
        embedding: Option<Vec<f32>>,
        category: Option<String>,
        importance: u8,
    ) -> Result<LongTermMemoryRecord> {
        let now = Utc::now();
        let record = LongTermMemoryRecord {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.to_string(),
            category,
            importance,
            embedding,
            created_at: now,
            updated_at: now,
            access_count: 0,
            last_accessed: None,
            metadata,
        };

        self.storage
            .insert(
                "long_term_memory",
                vec![
                    ("id", Value::Text(record.id.clone())),
                    ("content", Value::Text(record.content.clone())),
                    ("category", record.category.clone().map_or(Value::Null, Value::Text)),
                    ("importance", Value::Integer(record.importance as i64)),
                    (
                        "embedding",
                        record
                            .embedding
                            .as_ref()
                            .map_or(Value::Null, |e| Value::Text(serde_json::to_string(e).unwrap_or_default())),
                    ),
                    ("created_at", Value::Text(record.created_at.to_rfc3339())),
                    ("updated_at", Value::Text(record.updated_at.to_rfc3339())),
                    ("access_count", Value::Integer(0)),
                    ("last_accessed", Value::Null),
                    (
                        "metadata",
                        Value::Text(serde_json::to_string(&record.metadata).unwrap_or_default()),
                    ),
                ],
            )
            .await?;

        Ok(record)
    }

    /// Rank by cosine similarity when an embedding is available, else fall
    /// back to keyword `LIKE` search (spec.md §4.7 `search`).
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        metadata_filter: Option<&HashMap<String, serde_json::Value>>,
        query_embedding: Option<Vec<f32>>,
    ) -> Result<Vec<ScoredLongTermMemory>> {
        let embedding = match query_embedding {
            Some(e) => Some(e),
            None => match &self.embedding_client {
                Some(client) => client.embed(query).await.ok(),
                None => None,
            },
        };

        let results = match embedding {
            Some(query_vec) => self.search_by_embedding(&query_vec, k, metadata_filter).await?,
            None => self.search_by_keywords(query, k, metadata_filter).await?,
        };

        for r in &results {
            self.touch(&r.memory.id).await;
        }

        Ok(results)
    }

    async fn search_by_embedding(
        &self,
        query_vec: &[f32],
        k: usize,
        metadata_filter: Option<&HashMap<String, serde_json::Value>>,
    ) -> Result<Vec<ScoredLongTermMemory>> {
        let rows = self.fetch_with_embeddings().await?;
        let mut scored: Vec<ScoredLongTermMemory> = rows
            .into_iter()
            .filter_map(|record| {
                let embedding = record.embedding.as_ref()?;
                let similarity = cosine_similarity(query_vec, embedding);
                if similarity < RELEVANCE_FLOOR {
                    return None;
                }
                if !matches_filter(&record.metadata, metadata_filter) {
                    return None;
                }
                Some(ScoredLongTermMemory { memory: record, relevance: similarity })
            })
            .collect();

        scored.sort_by(|a, b| b.relevance.partial_cmp(&a.relevance).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn search_by_keywords(
        &self,
        query: &str,
        k: usize,
        metadata_filter: Option<&HashMap<String, serde_json::Value>>,
    ) -> Result<Vec<ScoredLongTermMemory>> {
        let keywords = extract_keywords(query);
        if keywords.is_empty() {
            return Ok(Vec::new());
        }

        let clauses: Vec<String> = keywords.iter().map(|_| "content LIKE ?".to_string()).collect();
        let sql = format!(
            "SELECT id, content, category, importance, embedding, created_at, updated_at, \
             access_count, last_accessed, metadata FROM long_term_memory WHERE {}",
            clauses.join(" OR ")
        );
        let params: Vec<Value> = keywords.iter().map(|kw| Value::Text(format!("%{kw}%"))).collect();

        let dim = self.embedding_dimension;
        let mut rows = self.storage.fetch_all(&sql, params, move |row| map_row(row, dim)).await?;
        rows.retain(|r| matches_filter(&r.metadata, metadata_filter));
        rows.truncate(k);

        Ok(rows
            .into_iter()
            .map(|memory| ScoredLongTermMemory { memory, relevance: KEYWORD_FALLBACK_RELEVANCE })
            .collect())
    }

    /// Most recent by `created_at`, relevance pinned to 1.0 (spec.md §4.7
    /// `recent`).
    pub async fn recent(&self, limit: usize) -> Result<Vec<ScoredLongTermMemory>> {
        let dim = self.embedding_dimension;
        let rows = self
            .storage
            .fetch_all(
                "SELECT id, content, category, importance, embedding, created_at, updated_at, \
                 access_count, last_accessed, metadata FROM long_term_memory \
                 ORDER BY created_at DESC LIMIT ?",
                vec![Value::Integer(limit as i64)],
                move |row| map_row(row, dim),
            )
            .await?;
        Ok(rows.into_iter().map(|memory| ScoredLongTermMemory { memory, relevance: 1.0 }).collect())
    }

    async fn touch(&self, id: &str) {
        let result = self
            .storage
            .execute(
                "UPDATE long_term_memory SET access_count = access_count + 1, last_accessed = ?1 \
                 WHERE id = ?2",
                vec![Value::Text(Utc::now().to_rfc3339()), Value::Text(id.to_string())],
            )
            .await;
        if let Err(e) = result {
            tracing::warn!(id, error = %e, "failed to bump long-term memory access count");
        }
    }

    pub async fn update(
        &self,
        id: &str,
        content: Option<String>,
        metadata: Option<HashMap<String, serde_json::Value>>,
    ) -> Result<bool> {
        let mut set = Vec::new();
        if let Some(c) = content {
            set.push(("content", Value::Text(c)));
        }
        if let Some(m) = metadata {
            set.push(("metadata", Value::Text(serde_json::to_string(&m).unwrap_or_default())));
        }
        if set.is_empty() {
            return Ok(false);
        }
        set.push(("updated_at", Value::Text(Utc::now().to_rfc3339())));
        let affected = self.storage.update("long_term_memory", set, "id = ?1", vec![Value::Text(id.to_string())]).await?;
        Ok(affected > 0)
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        let affected =
            self.storage.delete("long_term_memory", "id = ?1", vec![Value::Text(id.to_string())]).await?;
        Ok(affected > 0)
    }

    pub async fn stats(&self) -> Result<LongTermStats> {
        let dim = self.embedding_dimension;
        let total: i64 = self
            .storage
            .fetch_one("SELECT COUNT(*) FROM long_term_memory", vec![], |row| row.get(0))
            .await?
            .unwrap_or(0);

        let most_accessed = self
            .storage
            .fetch_all(
                "SELECT id, content, category, importance, embedding, created_at, updated_at, \
                 access_count, last_accessed, metadata FROM long_term_memory \
                 ORDER BY access_count DESC LIMIT 10",
                vec![],
                move |row| map_row(row, dim),
            )
            .await?;

        let most_recent = self
            .storage
            .fetch_all(
                "SELECT id, content, category, importance, embedding, created_at, updated_at, \
                 access_count, last_accessed, metadata FROM long_term_memory \
                 ORDER BY created_at DESC LIMIT 10",
                vec![],
                move |row| map_row(row, dim),
            )
            .await?;

        Ok(LongTermStats { total, most_accessed, most_recent })
    }

    async fn fetch_with_embeddings(&self) -> Result<Vec<LongTermMemoryRecord>> {
        let dim = self.embedding_dimension;
        self.storage
            .fetch_all(
                "SELECT id, content, category, importance, embedding, created_at, updated_at, \
                 access_count, last_accessed, metadata FROM long_term_memory \
                 WHERE embedding IS NOT NULL",
                vec![],
                move |row| map_row(row, dim),
            )
            .await
            .map_err(Into::into)
    }
}

fn map_row(row: &rusqlite::Row<'_>, expected_dimension: usize) -> rusqlite::Result<LongTermMemoryRecord> {
    let embedding_json: Option<String> = row.get("embedding")?;
    let metadata_json: String = row.get("metadata")?;
    let last_accessed: Option<String> = row.get("last_accessed")?;

    Ok(LongTermMemoryRecord {
        id: row.get("id")?,
        content: row.get("content")?,
        category: row.get("category")?,
        importance: row.get::<_, i64>("importance")? as u8,
        embedding: embedding_json.and_then(|j| decode_embedding(j.as_bytes(), expected_dimension)),
        created_at: parse_ts(row.get::<_, String>("created_at")?),
        updated_at: parse_ts(row.get::<_, String>("updated_at")?),
        access_count: row.get::<_, i64>("access_count")? as u64,
        last_accessed: last_accessed.map(parse_ts),
        metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
    })
}

fn parse_ts(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now())
}

/// Embedding dimension mismatches are refused at decode time, logged as a
/// warning, and treated as "no embedding" (spec.md §9 "Embeddings as blobs
/// or typed vectors").
#[must_use]
pub fn decode_embedding(raw: &[u8], expected_dimension: usize) -> Option<Vec<f32>> {
    let vec: Vec<f32> = serde_json::from_slice(raw).ok()?;
    if vec.len() != expected_dimension {
        tracing::warn!(
            actual = vec.len(),
            expected = expected_dimension,
            "stored embedding dimension mismatch, discarding"
        );
        return None;
    }
    Some(vec)
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn extract_keywords(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(w))
        .map(|w| w.to_string())
        .collect()
}

fn matches_filter(
    metadata: &HashMap<String, serde_json::Value>,
    filter: Option<&HashMap<String, serde_json::Value>>,
) -> bool {
    match filter {
        None => true,
        Some(filter) => filter.iter().all(|(k, v)| metadata.get(k) == Some(v)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal_is_zero() {
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
    }

    #[test]
    fn extract_keywords_drops_stop_words() {
        let kws = extract_keywords("What is the number I told you to remember?");
        assert!(kws.contains(&"number".to_string()));
        assert!(kws.contains(&"remember".to_string()));
        assert!(!kws.contains(&"the".to_string()));
        assert!(!kws.contains(&"what".to_string()));
    }

    #[test]
    fn metadata_filter_requires_all_keys() {
        let mut metadata = HashMap::new();
        metadata.insert("session_id".to_string(), serde_json::json!("session-3"));
        let mut filter = HashMap::new();
        filter.insert("session_id".to_string(), serde_json::json!("session-3"));
        assert!(matches_filter(&metadata, Some(&filter)));

        filter.insert("other".to_string(), serde_json::json!("x"));
        assert!(!matches_filter(&metadata, Some(&filter)));
    }

    #[test]
    fn decode_embedding_rejects_dimension_mismatch() {
        let raw = serde_json::to_vec(&vec![1.0_f32, 2.0, 3.0]).unwrap();
        assert!(decode_embedding(&raw, 3).is_some());
        assert!(decode_embedding(&raw, 768).is_none());
    }

    #[test]
    fn map_row_discards_embedding_with_wrong_dimension() {
        use rusqlite::Connection;

        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE long_term_memory (id TEXT, content TEXT, category TEXT, \
             importance INTEGER, embedding TEXT, created_at TEXT, updated_at TEXT, \
             access_count INTEGER, last_accessed TEXT, metadata TEXT)",
            [],
        )
        .unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO long_term_memory VALUES ('1', 'fact', NULL, 5, '[1.0,2.0,3.0]', ?1, ?1, 0, NULL, '{}')",
            [&now],
        )
        .unwrap();

        let mut stmt = conn.prepare("SELECT * FROM long_term_memory").unwrap();
        let record = stmt
            .query_row([], |row| map_row(row, 3))
            .unwrap();
        assert_eq!(record.embedding, Some(vec![1.0, 2.0, 3.0]));

        let mismatched = conn
            .prepare("SELECT * FROM long_term_memory")
            .unwrap()
            .query_row([], |row| map_row(row, 768))
            .unwrap();
        assert_eq!(mismatched.embedding, None);
    }
}
