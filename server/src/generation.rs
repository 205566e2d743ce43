use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use shelf_core::answer::{AnswerGate, Prepared, GENERATION_UNAVAILABLE};
use shelf_core::ResultItem;

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

/// Client for an OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Deserialize)]
struct Completion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: String,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.into(), model: model.into(), api_key: api_key.into() }
    }

    /// Reads `GROQ_API_KEY`, `GROQ_MODEL` and `GROQ_BASE_URL`. None without a key.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("GROQ_API_KEY").ok().filter(|k| !k.is_empty())?;
        let model = std::env::var("GROQ_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let base_url = std::env::var("GROQ_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Some(Self::new(base_url, model, api_key))
    }

    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0.2,
        });
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?
            .error_for_status()?;
        let completion: Completion = resp.json().await.context("decoding completion")?;
        let content = completion.choices.into_iter().next().context("completion without choices")?.message.content;
        Ok(content.trim().to_string())
    }
}

/// Run the confidence gate and, if it passes, ask the model.
pub async fn answer(gate: &AnswerGate, client: &ChatClient, query: &str, results: &[ResultItem]) -> String {
    match gate.prepare(query, results) {
        Prepared::Fallback(text) => text.to_string(),
        Prepared::Prompt(prompt) => match client.complete(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "answer generation failed");
                GENERATION_UNAVAILABLE.to_string()
            }
        },
    }
}
