//! Search facade: owns the index lifecycle and turns queries into ranked
//! [`ResultItem`]s.
//!
//! The index is built lazily by the first search (or explicitly through
//! [`SearchEngine::rebuild`]). Builds are serialized: a caller that finds a
//! build in progress waits for it instead of starting a second one. Once
//! published, an index is shared read-only behind an `Arc`.

use crate::error::EngineError;
use crate::index::{IndexStats, InvertedIndex};
use crate::scorer::{score_candidates, Bm25Params};
use crate::tokenizer::tokenize;
use crate::{Corpus, Document, ResultItem};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub params: Bm25Params,
    pub default_limit: usize,
    /// Path prefix of the detail link placed in every result.
    pub detail_path: String,
    /// Fail the build instead of publishing if it runs longer than this.
    pub build_deadline: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            params: Bm25Params::default(),
            default_limit: 20,
            detail_path: "doc_details".to_string(),
            build_deadline: None,
        }
    }
}

#[derive(Debug)]
enum IndexState {
    Unbuilt,
    Building,
    Built(Arc<InvertedIndex>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStats {
    #[serde(flatten)]
    pub index: IndexStats,
    pub builds: u64,
}

pub struct SearchEngine {
    config: EngineConfig,
    state: Mutex<IndexState>,
    built: Condvar,
    rebuilding: Mutex<()>,
    builds: AtomicU64,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl SearchEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            state: Mutex::new(IndexState::Unbuilt),
            built: Condvar::new(),
            rebuilding: Mutex::new(()),
            builds: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_built(&self) -> bool {
        matches!(*self.state.lock(), IndexState::Built(_))
    }

    /// Search with the configured default limit.
    pub fn search(&self, query: &str, context: &str, corpus: &Corpus) -> Result<Vec<ResultItem>, EngineError> {
        self.search_with_limit(query, context, corpus, self.config.default_limit)
    }

    /// Rank `corpus` against `query` and return at most `limit` results.
    ///
    /// Builds the index first if this is the first call. `context` is opaque
    /// and only ends up in the result detail links.
    pub fn search_with_limit(
        &self,
        query: &str,
        context: &str,
        corpus: &Corpus,
        limit: usize,
    ) -> Result<Vec<ResultItem>, EngineError> {
        let index = self.ensure_built(corpus)?;

        let tokens = tokenize(query);
        if tokens.is_empty() {
            tracing::debug!(query, "query has no terms");
            return Ok(Vec::new());
        }
        let terms: BTreeSet<&str> = tokens.iter().map(String::as_str).collect();

        // OR semantics: any matching term makes a document a candidate
        let mut candidates: BTreeSet<&str> = BTreeSet::new();
        for term in &terms {
            candidates.extend(index.postings(term).iter().map(|p| p.pid.as_str()));
        }
        if candidates.is_empty() {
            tracing::debug!(query, "no candidates");
            return Ok(Vec::new());
        }

        let mut ranked: Vec<(String, f64)> =
            score_candidates(&index, &terms, &candidates, self.config.params).into_iter().collect();
        ranked.sort_by(|a, b| rank_order((a.0.as_str(), a.1), (b.0.as_str(), b.1)));
        let total = ranked.len();
        ranked.truncate(limit);

        let results: Vec<ResultItem> = ranked
            .into_iter()
            .filter_map(|(pid, score)| corpus.get(&pid).map(|doc| self.result_item(doc, score, context)))
            .collect();
        tracing::debug!(query, candidates = total, returned = results.len(), "search done");
        Ok(results)
    }

    /// Replace the published index with one built from `corpus`.
    ///
    /// The current index stays readable until the new one is swapped in.
    /// Rebuilds are serialized among themselves.
    pub fn rebuild(&self, corpus: &Corpus) -> Result<EngineStats, EngineError> {
        let _rebuilding = self.rebuilding.lock();

        let mut state = self.state.lock();
        while matches!(*state, IndexState::Building) {
            self.built.wait(&mut state);
        }
        // nothing published yet: claim the build so lazy searches wait for it
        let claimed = matches!(*state, IndexState::Unbuilt);
        if claimed {
            *state = IndexState::Building;
        }
        drop(state);

        let result = self.build(corpus);
        let mut state = self.state.lock();
        let outcome = match result {
            Ok(index) => {
                let stats = index.stats();
                *state = IndexState::Built(index);
                Ok(EngineStats { index: stats, builds: self.builds.load(AtomicOrdering::SeqCst) })
            }
            Err(e) => {
                // a failed rebuild leaves the previous index in place
                if claimed {
                    *state = IndexState::Unbuilt;
                }
                Err(e)
            }
        };
        if claimed {
            self.built.notify_all();
        }
        outcome
    }

    /// Index statistics, or `None` while no index has been published.
    pub fn stats(&self) -> Option<EngineStats> {
        match &*self.state.lock() {
            IndexState::Built(index) => {
                Some(EngineStats { index: index.stats(), builds: self.builds.load(AtomicOrdering::SeqCst) })
            }
            _ => None,
        }
    }

    /// Number of builds that completed successfully.
    pub fn build_count(&self) -> u64 {
        self.builds.load(AtomicOrdering::SeqCst)
    }

    fn ensure_built(&self, corpus: &Corpus) -> Result<Arc<InvertedIndex>, EngineError> {
        let mut state = self.state.lock();
        loop {
            if let IndexState::Built(index) = &*state {
                return Ok(Arc::clone(index));
            }
            if matches!(*state, IndexState::Unbuilt) {
                break;
            }
            self.built.wait(&mut state);
        }
        *state = IndexState::Building;
        drop(state);

        let result = self.build(corpus);
        let mut state = self.state.lock();
        let outcome = match result {
            Ok(index) => {
                *state = IndexState::Built(Arc::clone(&index));
                Ok(index)
            }
            Err(e) => {
                *state = IndexState::Unbuilt;
                Err(e)
            }
        };
        self.built.notify_all();
        outcome
    }

    fn build(&self, corpus: &Corpus) -> Result<Arc<InvertedIndex>, EngineError> {
        let start = Instant::now();
        match InvertedIndex::build_with_deadline(corpus, self.config.build_deadline) {
            Ok(index) => {
                self.builds.fetch_add(1, AtomicOrdering::SeqCst);
                let stats = index.stats();
                tracing::info!(
                    num_docs = stats.num_docs,
                    num_terms = stats.num_terms,
                    avg_doc_len = stats.avg_doc_len,
                    took_ms = start.elapsed().as_millis() as u64,
                    "index build complete"
                );
                Ok(Arc::new(index))
            }
            Err(e) => {
                tracing::error!(error = %e, "index build failed");
                Err(e)
            }
        }
    }

    fn result_item(&self, doc: &Document, score: f64, context: &str) -> ResultItem {
        ResultItem {
            pid: doc.pid.clone(),
            title: doc.title.clone(),
            description: doc.description.clone(),
            brand: doc.brand.clone(),
            category: doc.category.clone(),
            ranking: score,
            url: detail_link(&self.config.detail_path, &doc.pid, context),
            source_url: doc.url.clone(),
            selling_price: doc.selling_price.clone(),
            discount: doc.discount.clone(),
            average_rating: doc.average_rating.clone(),
            images: doc.images.clone(),
        }
    }
}

/// Descending score, then ascending pid.
fn rank_order(a: (&str, f64), b: (&str, f64)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0))
}

/// `{path}?pid=..&search_id=..` with both values form-encoded.
pub fn detail_link(path: &str, pid: &str, context: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("pid", pid)
        .append_pair("search_id", context)
        .finish();
    format!("{path}?{query}")
}
