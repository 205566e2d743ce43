pub mod analytics;
pub mod answer;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod index;
pub mod scorer;
pub mod tokenizer;

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub use engine::{EngineConfig, SearchEngine};
pub use error::EngineError;
pub use index::{IndexStats, InvertedIndex};
pub use scorer::Bm25Params;

pub type Pid = String;

/// Product corpus keyed by pid. Ordered so that builds iterate deterministically.
pub type Corpus = BTreeMap<Pid, Document>;

/// A product record. Optional text fields resolve to `""` at deserialization time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub pid: Pid,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub brand: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub category: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sub_category: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub selling_price: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub discount: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub average_rating: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<String>,
}

impl Document {
    pub fn new(pid: impl Into<Pid>) -> Self {
        Self { pid: pid.into(), ..Self::default() }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// The text that gets indexed: title, description, brand, category and
    /// sub_category joined by single spaces, in that order.
    pub fn indexed_text(&self) -> String {
        [
            self.title.as_str(),
            self.description.as_str(),
            self.brand.as_str(),
            self.category.as_str(),
            self.sub_category.as_str(),
        ]
        .join(" ")
    }
}

/// One ranked hit as handed to presentation and answer generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    pub pid: Pid,
    pub title: String,
    pub description: String,
    pub brand: String,
    pub category: String,
    /// Raw BM25 score. Not normalized per query.
    pub ranking: f64,
    /// Detail link built by the engine, embedding pid and requester context.
    pub url: String,
    pub source_url: Option<String>,
    pub selling_price: Option<String>,
    pub discount: Option<String>,
    pub average_rating: Option<String>,
    pub images: Vec<String>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(d)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
