//! Confidence gate and prompt assembly for downstream answer generation.
//!
//! The gate compares the raw top `ranking` against a fixed threshold. BM25
//! scores are unbounded and depend on corpus and query length, so the
//! threshold has no fixed meaning across corpora; scores are still passed
//! through unmodified.

use crate::ResultItem;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

pub const NO_GOOD_PRODUCTS: &str =
    "There are no good products that fit the request based on the retrieved results.";

pub const GENERATION_UNAVAILABLE: &str =
    "RAG is not available. Check your credentials (.env file) or account limits.";

const PROMPT_TEMPLATE: &str = "\
You are an expert product advisor helping users choose the best option from retrieved e-commerce products.

Rules:
- Use ONLY the retrieved products below. Do not invent products or attributes.
- If products are irrelevant or insufficient, return ONLY:
\"{fallback}\"
- Cite products using their PID like [PID].

Task:
1. Pick the single best product for the user's request.
2. Explain why, using concrete attributes (price, discount, rating, category, brand).
3. Optionally mention one alternative if clearly second-best.

Retrieved Products:
{retrieved_results}

User Request:
{user_query}

Output Format:
- Best Product: [PID] Title
- Why: ...
- Alternative (optional): [PID] Title - short reason
";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerGate {
    pub threshold: f64,
    pub top_n: usize,
}

impl Default for AnswerGate {
    fn default() -> Self {
        Self { threshold: 0.5, top_n: 20 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Prepared {
    /// Retrieval too weak; answer with this text without calling a model.
    Fallback(&'static str),
    /// Prompt ready for the generator.
    Prompt(String),
}

impl AnswerGate {
    pub fn prepare(&self, query: &str, results: &[ResultItem]) -> Prepared {
        let Some(top) = results.first() else {
            return Prepared::Fallback(NO_GOOD_PRODUCTS);
        };
        if top.ranking < self.threshold {
            return Prepared::Fallback(NO_GOOD_PRODUCTS);
        }
        let mut listing = String::new();
        for (i, r) in results.iter().take(self.top_n).enumerate() {
            if i > 0 {
                listing.push('\n');
            }
            let _ = write!(
                listing,
                "- PID: {} | Title: {} | Price: {} | Discount: {} | Rating: {} | Brand: {} | Category: {}",
                r.pid,
                r.title,
                or_na(r.selling_price.as_deref()),
                or_na(r.discount.as_deref()),
                or_na(r.average_rating.as_deref()),
                or_na(Some(r.brand.as_str())),
                or_na(Some(r.category.as_str())),
            );
        }
        Prepared::Prompt(
            PROMPT_TEMPLATE
                .replace("{fallback}", NO_GOOD_PRODUCTS)
                .replace("{retrieved_results}", &listing)
                .replace("{user_query}", query),
        )
    }
}

fn or_na(v: Option<&str>) -> &str {
    match v {
        Some(s) if !s.is_empty() => s,
        _ => "n/a",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(pid: &str, ranking: f64) -> ResultItem {
        ResultItem {
            pid: pid.into(),
            title: format!("Title {pid}"),
            description: String::new(),
            brand: "Acme".into(),
            category: String::new(),
            ranking,
            url: String::new(),
            source_url: None,
            selling_price: Some("921".into()),
            discount: None,
            average_rating: None,
            images: Vec::new(),
        }
    }

    #[test]
    fn empty_results_fall_back() {
        assert_eq!(AnswerGate::default().prepare("q", &[]), Prepared::Fallback(NO_GOOD_PRODUCTS));
    }

    #[test]
    fn weak_top_score_falls_back() {
        let gate = AnswerGate::default();
        assert_eq!(gate.prepare("q", &[item("1", 0.49)]), Prepared::Fallback(NO_GOOD_PRODUCTS));
        assert!(matches!(gate.prepare("q", &[item("1", 0.5)]), Prepared::Prompt(_)));
    }

    #[test]
    fn prompt_lists_top_n_with_na() {
        let gate = AnswerGate { threshold: 0.5, top_n: 2 };
        let results = vec![item("1", 3.0), item("2", 2.0), item("3", 1.0)];
        let Prepared::Prompt(prompt) = gate.prepare("red shoes", &results) else {
            panic!("expected prompt");
        };
        assert!(prompt.contains("- PID: 1 | Title: Title 1 | Price: 921 | Discount: n/a | Rating: n/a | Brand: Acme | Category: n/a"));
        assert!(prompt.contains("PID: 2"));
        assert!(!prompt.contains("PID: 3"));
        assert!(prompt.contains("User Request:\nred shoes"));
    }
}
