//! Boundary to the external question-answering service.
//!
//! The answer model is opaque: we hand it the question plus the retrieved
//! passages and print whatever it returns. In offline mode (fake embeddings)
//! no remote call is made and the passages themselves are shown.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

use repoqa_core::config::Config;
use repoqa_embed::offline_mode;
use repoqa_index::SearchHit;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub enum Answerer {
    Remote(RemoteAnswerer),
    Offline,
}

impl Answerer {
    pub fn from_config(config: &Config) -> Result<Self> {
        if offline_mode() {
            return Ok(Self::Offline);
        }
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY is not set (or set APP_USE_FAKE_EMBEDDINGS=1)"))?;
        let base_url: String = config
            .get("answer.base_url")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let model: String = config
            .get("answer.model")
            .unwrap_or_else(|_| "gpt-3.5-turbo".to_string());
        Ok(Self::Remote(RemoteAnswerer::new(base_url, model, api_key)?))
    }

    pub async fn answer(&self, question: &str, hits: &[SearchHit]) -> Result<String> {
        match self {
            Self::Remote(remote) => remote.answer(question, hits).await,
            Self::Offline => Ok(render_passages(hits)),
        }
    }
}

/// Client for an OpenAI-style `/chat/completions` endpoint.
pub struct RemoteAnswerer {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl RemoteAnswerer {
    pub fn new(base_url: String, model: String, api_key: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url,
            model,
            api_key,
        })
    }

    pub async fn answer(&self, question: &str, hits: &[SearchHit]) -> Result<String> {
        let mut context = String::new();
        for hit in hits {
            context.push_str(&format!("[{}]\n{}\n\n", hit.doc_path, hit.content));
        }
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: "Answer the user's question using only the provided context. \
                              If the context does not contain the answer, say so."
                        .to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: format!("Context:\n{context}\nQuestion: {question}"),
                },
            ],
        };
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            bail!(
                "answer service returned HTTP {} for {url}",
                response.status()
            );
        }
        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("answer service returned no choices"))
    }
}

fn render_passages(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No matching passages found.".to_string();
    }
    let mut out = String::from("(offline mode) Most relevant passages:\n");
    for (i, hit) in hits.iter().enumerate() {
        out.push_str(&format!(
            "\n{}. [{}] (score {:.3})\n{}\n",
            i + 1,
            hit.doc_path,
            hit.score,
            hit.content
        ));
    }
    out
}
