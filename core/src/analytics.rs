//! Query and click recording for the surrounding application.
//!
//! The engine never calls into this module. Events are kept in memory and,
//! when a log path is configured, appended to a JSON-lines file.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub type QueryId = u64;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRecord {
    pub id: QueryId,
    pub ts: String,
    pub raw_query: String,
    pub num_terms: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentClicks {
    pub pid: String,
    pub clicks: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub total_queries: usize,
    pub total_clicks: u64,
    /// Clicks per query.
    pub ctr: f64,
    pub top_queries: Vec<(String, usize)>,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Event<'a> {
    Query { ts: &'a str, id: QueryId, query: &'a str },
    Click { ts: &'a str, pid: &'a str },
}

#[derive(Default)]
struct Tables {
    next_id: QueryId,
    queries: Vec<QueryRecord>,
    clicks: HashMap<String, u64>,
    log: Option<File>,
}

#[derive(Default)]
pub struct Analytics {
    tables: Mutex<Tables>,
}

impl Analytics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also append every event to `path` as one JSON object per line.
    pub fn with_log<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening analytics log {}", path.display()))?;
        let analytics = Self::new();
        analytics.tables.lock().log = Some(file);
        Ok(analytics)
    }

    pub fn record_query(&self, query: &str) -> QueryId {
        let ts = now();
        let mut tables = self.tables.lock();
        tables.next_id += 1;
        let id = tables.next_id;
        tables.queries.push(QueryRecord {
            id,
            ts: ts.clone(),
            raw_query: query.to_string(),
            num_terms: query.split_whitespace().count(),
        });
        append(&mut tables.log, &Event::Query { ts: &ts, id, query });
        id
    }

    pub fn record_click(&self, pid: &str) {
        let ts = now();
        let mut tables = self.tables.lock();
        *tables.clicks.entry(pid.to_string()).or_insert(0) += 1;
        append(&mut tables.log, &Event::Click { ts: &ts, pid });
    }

    pub fn metrics(&self) -> Metrics {
        let tables = self.tables.lock();
        let total_queries = tables.queries.len();
        let total_clicks: u64 = tables.clicks.values().sum();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for q in &tables.queries {
            *counts.entry(q.raw_query.as_str()).or_insert(0) += 1;
        }
        let mut top_queries: Vec<(String, usize)> = counts.into_iter().map(|(q, c)| (q.to_string(), c)).collect();
        top_queries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_queries.truncate(10);

        Metrics {
            total_queries,
            total_clicks,
            ctr: total_clicks as f64 / total_queries.max(1) as f64,
            top_queries,
        }
    }

    /// Click counts per document, most clicked first.
    pub fn document_clicks(&self) -> Vec<DocumentClicks> {
        let tables = self.tables.lock();
        let mut out: Vec<DocumentClicks> =
            tables.clicks.iter().map(|(pid, &clicks)| DocumentClicks { pid: pid.clone(), clicks }).collect();
        out.sort_by(|a, b| b.clicks.cmp(&a.clicks).then_with(|| a.pid.cmp(&b.pid)));
        out
    }

    pub fn query_log(&self) -> Vec<QueryRecord> {
        self.tables.lock().queries.clone()
    }
}

fn now() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

fn append(log: &mut Option<File>, event: &Event<'_>) {
    let Some(file) = log else { return };
    let line = match serde_json::to_string(event) {
        Ok(line) => line,
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode analytics event");
            return;
        }
    };
    if let Err(e) = writeln!(file, "{line}").and_then(|_| file.flush()) {
        tracing::warn!(error = %e, "failed to append analytics event");
    }
}
