//! Optional long-term memory: an external search index populated by a
//! flusher the Compactor calls with each summarized prefix (§4.3).
//!
//! The teacher's `search`/`vector_store` modules build a full tantivy+Qdrant
//! hybrid retrieval stack sized for indexing skill catalogs, far past what
//! this store needs: a handful of summarized-prefix snippets per session.
//! Rather than drag that machinery in behind an embedder that spec.md itself
//! says may not be available, this keeps the embedder pluggable behind a
//! small trait and leans on `KeywordIndex`'s tokenize-and-score approach
//! (grounded in `search/bm25.rs`'s term-overlap scoring idea, minus the
//! on-disk tantivy index) for the no-embedder fallback path.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// A stored unit of long-term memory: one summarized prefix (or other
/// durable fact) plus the metadata needed to retrieve and decay-score it.
#[derive(Debug, Clone)]
pub struct Snippet {
    pub id: String,
    pub text: String,
    pub created_at_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ScoredSnippet {
    pub snippet: Snippet,
    pub score: f64,
}

/// An embedding provider capable of turning text into a dense vector. Not
/// implemented by any adapter in this crate yet — `LongTermMemory` runs in
/// keyword-only mode whenever `embedder` is `None`, exactly as §4.1 step 11
/// and §4.3 describe.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Vec<f32>;
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)) as f64
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase().split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).map(String::from).collect()
}

/// Keyword-overlap search with exponential time-decay, used when no
/// embedder is configured. Score = (overlap-term count) * decay-factor,
/// where decay-factor halves every `half_life_days`.
pub struct KeywordIndex {
    half_life_days: f64,
    entries: Vec<(Snippet, Vec<String>)>,
}

impl KeywordIndex {
    pub fn new(half_life_days: f64) -> Self {
        Self { half_life_days, entries: Vec::new() }
    }

    pub fn insert(&mut self, snippet: Snippet) {
        let tokens = tokenize(&snippet.text);
        self.entries.push((snippet, tokens));
    }

    pub fn get(&self, id: &str) -> Option<Snippet> {
        self.entries.iter().find(|(s, _)| s.id == id).map(|(s, _)| s.clone())
    }

    fn decay(&self, created_at_secs: u64, now_secs: u64) -> f64 {
        if self.half_life_days <= 0.0 {
            return 1.0;
        }
        let age_days = now_secs.saturating_sub(created_at_secs) as f64 / 86_400.0;
        0.5_f64.powf(age_days / self.half_life_days)
    }

    pub fn search(&self, query: &str, top_k: usize, now_secs: u64) -> Vec<ScoredSnippet> {
        let query_terms: std::collections::HashSet<String> = tokenize(query).into_iter().collect();
        if query_terms.is_empty() {
            return Vec::new();
        }
        let mut scored: Vec<ScoredSnippet> = self
            .entries
            .iter()
            .filter_map(|(snippet, tokens)| {
                let overlap = tokens.iter().filter(|t| query_terms.contains(*t)).count();
                if overlap == 0 {
                    return None;
                }
                let score = overlap as f64 * self.decay(snippet.created_at_secs, now_secs);
                Some(ScoredSnippet { snippet: snippet.clone(), score })
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }
}

/// Public façade exposed to the model via the `memory-search`/`memory-get`
/// tools (§4.1 step 11): `Search(query, topK)` and `Get(id)`.
pub struct LongTermMemory {
    embedder: Option<Box<dyn Embedder>>,
    keyword: Mutex<KeywordIndex>,
    embeddings: Mutex<HashMap<String, Vec<f32>>>,
}

impl LongTermMemory {
    pub fn new(embedder: Option<Box<dyn Embedder>>, half_life_days: f64) -> Self {
        Self { embedder, keyword: Mutex::new(KeywordIndex::new(half_life_days)), embeddings: Mutex::new(HashMap::new()) }
    }

    pub fn is_keyword_only(&self) -> bool {
        self.embedder.is_none()
    }

    /// Called by the Compactor's flusher with each summarized prefix.
    pub fn flush(&self, id: impl Into<String>, text: impl Into<String>) {
        let id = id.into();
        let text = text.into();
        let created_at_secs = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
        if let Some(embedder) = &self.embedder {
            let vector = embedder.embed(&text);
            self.embeddings.lock().unwrap().insert(id.clone(), vector);
        }
        self.keyword.lock().unwrap().insert(Snippet { id, text, created_at_secs });
    }

    pub fn search(&self, query: &str, top_k: usize) -> Vec<ScoredSnippet> {
        let now_secs = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
        match &self.embedder {
            Some(embedder) => {
                let query_vec = embedder.embed(query);
                let embeddings = self.embeddings.lock().unwrap();
                let keyword = self.keyword.lock().unwrap();
                let mut scored: Vec<ScoredSnippet> = embeddings
                    .iter()
                    .filter_map(|(id, vector)| {
                        let snippet = keyword.get(id)?;
                        let score = cosine_similarity(&query_vec, vector);
                        Some(ScoredSnippet { snippet, score })
                    })
                    .collect();
                scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
                scored.truncate(top_k);
                scored
            }
            None => self.keyword.lock().unwrap().search(query, top_k, now_secs),
        }
    }

    pub fn get(&self, id: &str) -> Option<Snippet> {
        self.keyword.lock().unwrap().get(id)
    }
}
