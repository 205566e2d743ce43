use crate::error::EngineError;
use crate::tokenizer::tokenize;
use crate::{Corpus, Pid};
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub type TermId = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub pid: Pid,
    pub tf: u32,
}

/// Immutable BM25 index over one corpus snapshot.
///
/// Term ids are assigned in first-seen order while walking the corpus in pid
/// order, so two builds over the same corpus are identical.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InvertedIndex {
    dictionary: HashMap<String, TermId>,
    df: Vec<u32>,
    idf: Vec<f64>,
    postings: Vec<Vec<Posting>>, // indexed by term id, in pid order
    doc_len: HashMap<Pid, u32>,
    avg_doc_len: f64,
    num_docs: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub num_docs: usize,
    pub num_terms: usize,
    pub total_postings: usize,
    pub avg_doc_len: f64,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(corpus: &Corpus) -> Result<Self, EngineError> {
        Self::build_with_deadline(corpus, None)
    }

    /// Build the whole index in one pass. Either a complete index is returned
    /// or an error; there is no partially built state.
    pub fn build_with_deadline(corpus: &Corpus, deadline: Option<Duration>) -> Result<Self, EngineError> {
        let start = Instant::now();
        let mut index = InvertedIndex::new();
        let mut total_len: u64 = 0;

        for (key, doc) in corpus {
            if doc.pid.is_empty() {
                return Err(EngineError::EmptyPid);
            }
            if *key != doc.pid {
                return Err(EngineError::PidMismatch { key: key.clone(), pid: doc.pid.clone() });
            }
            if let Some(deadline) = deadline {
                let elapsed = start.elapsed();
                if elapsed >= deadline {
                    return Err(EngineError::BuildTimeout { elapsed, deadline });
                }
            }

            let tokens = tokenize(&doc.indexed_text());
            let dl = tokens.len() as u32;
            total_len += dl as u64;
            index.doc_len.insert(doc.pid.clone(), dl);

            // (term id, tf) in first-occurrence order
            let mut counts: Vec<(TermId, u32)> = Vec::new();
            let mut slot: HashMap<TermId, usize> = HashMap::new();
            for term in tokens {
                let tid = index.intern(term);
                match slot.get(&tid) {
                    Some(&i) => counts[i].1 += 1,
                    None => {
                        slot.insert(tid, counts.len());
                        counts.push((tid, 1));
                    }
                }
            }
            for (tid, tf) in counts {
                index.postings[tid as usize].push(Posting { pid: doc.pid.clone(), tf });
                index.df[tid as usize] += 1;
            }
        }

        index.num_docs = corpus.len();
        index.avg_doc_len = if index.num_docs == 0 { 0.0 } else { total_len as f64 / index.num_docs as f64 };
        let n = index.num_docs as f64;
        index.idf = index.df.iter().map(|&df| bm25_idf(n, df as f64)).collect();

        if let Some(deadline) = deadline {
            let elapsed = start.elapsed();
            if elapsed >= deadline {
                return Err(EngineError::BuildTimeout { elapsed, deadline });
            }
        }
        Ok(index)
    }

    fn intern(&mut self, term: String) -> TermId {
        if let Some(&tid) = self.dictionary.get(&term) {
            return tid;
        }
        let tid = self.df.len() as TermId;
        self.dictionary.insert(term, tid);
        self.df.push(0);
        self.postings.push(Vec::new());
        tid
    }

    pub fn term_id(&self, term: &str) -> Option<TermId> {
        self.dictionary.get(term).copied()
    }

    pub fn postings(&self, term: &str) -> &[Posting] {
        match self.term_id(term) {
            Some(tid) => &self.postings[tid as usize],
            None => &[],
        }
    }

    pub fn df(&self, term: &str) -> u32 {
        self.term_id(term).map(|tid| self.df[tid as usize]).unwrap_or(0)
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.term_id(term).map(|tid| self.idf[tid as usize])
    }

    pub fn doc_len(&self, pid: &str) -> Option<u32> {
        self.doc_len.get(pid).copied()
    }

    pub fn avg_doc_len(&self) -> f64 {
        self.avg_doc_len
    }

    pub fn num_docs(&self) -> usize {
        self.num_docs
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            num_docs: self.num_docs,
            num_terms: self.dictionary.len(),
            total_postings: self.postings.iter().map(Vec::len).sum(),
            avg_doc_len: self.avg_doc_len,
        }
    }
}

/// `ln((N - df + 0.5) / (df + 0.5) + 1)`. Not clamped.
pub fn bm25_idf(n: f64, df: f64) -> f64 {
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}
