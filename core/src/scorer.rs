use crate::index::InvertedIndex;
use crate::Pid;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// BM25 model constants. Fixed per engine, never derived from the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f64,
    /// Length-normalization strength.
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// Per-term BM25 contribution of one document.
///
/// An `avgdl` of zero (empty corpus) is replaced by 1.
pub fn score(tf: u32, idf: f64, dl: u32, avgdl: f64, params: Bm25Params) -> f64 {
    let Bm25Params { k1, b } = params;
    let tf = tf as f64;
    let avgdl = if avgdl == 0.0 { 1.0 } else { avgdl };
    let norm = 1.0 - b + b * (dl as f64 / avgdl);
    idf * (tf * (k1 + 1.0)) / (tf + k1 * norm)
}

/// Sum per-term scores for every candidate. Query terms missing from the
/// index or from a document's postings add nothing.
pub fn score_candidates(
    index: &InvertedIndex,
    terms: &BTreeSet<&str>,
    candidates: &BTreeSet<&str>,
    params: Bm25Params,
) -> HashMap<Pid, f64> {
    let avgdl = index.avg_doc_len();
    let mut scores: HashMap<Pid, f64> = HashMap::with_capacity(candidates.len());
    for term in terms {
        let Some(idf) = index.idf(term) else { continue };
        for posting in index.postings(term) {
            if !candidates.contains(posting.pid.as_str()) {
                continue;
            }
            let dl = index.doc_len(&posting.pid).unwrap_or(0);
            *scores.entry(posting.pid.clone()).or_insert(0.0) += score(posting.tf, idf, dl, avgdl, params);
        }
    }
    scores
}
