use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::tokenizer::tokenize;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocEntry {
    doc_id: String,
    content: String,
    term_freq: FxHashMap<String, u32>,
    length: usize,
}

/// In-memory Okapi BM25 index over a tokenized corpus.
///
/// Public shape: `add_document` then `build` then `search`. The doc-id→content
/// map is retained alongside the inverted index (here, inside each
/// [`DocEntry`]) so callers can derive match context without a second lookup.
///
/// Standard parameters `k1 = 1.2`, `b = 0.75`. Scores may be negative — the
/// classic Robertson–Sparck Jones IDF term is used (no `+1` smoothing), so a
/// term occurring in more than half the corpus yields negative IDF. Callers
/// must rank, never filter, on sign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bm25Index {
    k1: f64,
    b: f64,
    docs: Vec<DocEntry>,
    doc_index: FxHashMap<String, usize>,
    doc_freq: FxHashMap<String, usize>,
    avg_doc_len: f64,
    built: bool,
}

impl Default for Bm25Index {
    fn default() -> Self {
        Bm25Index {
            k1: 1.2,
            b: 0.75,
            docs: Vec::new(),
            doc_index: FxHashMap::default(),
            doc_freq: FxHashMap::default(),
            avg_doc_len: 0.0,
            built: false,
        }
    }
}

impl Bm25Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn doc_count(&self) -> usize {
        self.docs.len()
    }

    pub fn content(&self, doc_id: &str) -> Option<&str> {
        self.doc_index
            .get(doc_id)
            .map(|&idx| self.docs[idx].content.as_str())
    }

    /// Add a document to the corpus. Must be called before [`Self::build`].
    pub fn add_document(&mut self, doc_id: impl Into<String>, content: impl Into<String>) {
        let content = content.into();
        let tokens = tokenize(&content);
        let mut term_freq: FxHashMap<String, u32> = FxHashMap::default();
        for t in &tokens {
            *term_freq.entry(t.clone()).or_insert(0) += 1;
        }
        let entry = DocEntry {
            doc_id: doc_id.into(),
            content,
            length: tokens.len(),
            term_freq,
        };
        self.doc_index.insert(entry.doc_id.clone(), self.docs.len());
        self.docs.push(entry);
        self.built = false;
    }

    /// Compute document frequencies and the corpus average length.
    pub fn build(&mut self) {
        self.doc_freq.clear();
        let mut total_len = 0usize;
        for doc in &self.docs {
            total_len += doc.length;
            for term in doc.term_freq.keys() {
                *self.doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
        }
        self.avg_doc_len = if self.docs.is_empty() {
            0.0
        } else {
            total_len as f64 / self.docs.len() as f64
        };
        self.built = true;
    }

    fn idf(&self, term: &str) -> f64 {
        let n = self.docs.len() as f64;
        let df = *self.doc_freq.get(term).unwrap_or(&0) as f64;
        (n - df + 0.5).ln() - (df + 0.5).ln()
    }

    fn score_one(&self, doc: &DocEntry, query_terms: &[String]) -> f64 {
        let mut score = 0.0;
        for term in query_terms {
            let tf = *doc.term_freq.get(term).unwrap_or(&0) as f64;
            if tf == 0.0 && !self.doc_freq.contains_key(term) {
                continue;
            }
            let idf = self.idf(term);
            let denom = tf + self.k1 * (1.0 - self.b + self.b * (doc.length as f64) / self.avg_doc_len.max(1e-9));
            score += idf * (tf * (self.k1 + 1.0)) / denom.max(1e-9);
        }
        score
    }

    /// Rank every document in the corpus against `query`, descending by
    /// score, truncated to `limit`. Returns `(doc_id, score, content)`.
    pub fn search(&self, query: &str, limit: usize) -> Vec<(String, f64, String)> {
        if !self.built || self.docs.is_empty() {
            return Vec::new();
        }
        let query_terms = tokenize(query);
        let mut scored: Vec<(usize, f64)> = self
            .docs
            .iter()
            .enumerate()
            .map(|(idx, doc)| (idx, self.score_one(doc, &query_terms)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(limit)
            .map(|(idx, score)| {
                let doc = &self.docs[idx];
                (doc.doc_id.clone(), score, doc.content.clone())
            })
            .collect()
    }
}
