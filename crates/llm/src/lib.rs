use std::env;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::runtime::Builder;
use tokio::time::{timeout, Duration};
use tracing::debug;

const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Local,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Local => "local",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "openai" => Some(LlmProvider::OpenAi),
            "local" => Some(LlmProvider::Local),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub system: Option<String>,
    pub user: String,
    pub max_tokens: Option<u32>,
}

/// Short-text generator behind the retrieval summary. One attempt per call,
/// bounded by `request_timeout`; callers fall back to a template on error.
#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    provider: LlmProvider,
    model: String,
    request_timeout: Duration,
    endpoint: Option<Endpoint>,
}

#[derive(Clone)]
struct Endpoint {
    url: String,
    api_key: String,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatPayload<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl LlmClient {
    pub fn new(
        provider: LlmProvider,
        model: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build http client")?;
        let endpoint = match provider {
            LlmProvider::OpenAi => {
                let api_key = env::var("OPENAI_API_KEY")
                    .ok()
                    .filter(|key| !key.trim().is_empty())
                    .ok_or_else(|| anyhow!("OPENAI_API_KEY is not set"))?;
                let base =
                    env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_OPENAI_BASE.to_string());
                Some(Endpoint {
                    url: format!("{}/chat/completions", base.trim_end_matches('/')),
                    api_key,
                })
            }
            LlmProvider::Local => None,
        };
        Ok(Self {
            http,
            provider,
            model: model.into(),
            request_timeout,
            endpoint,
        })
    }

    pub fn local() -> Self {
        Self {
            http: Client::new(),
            provider: LlmProvider::Local,
            model: "local".to_string(),
            request_timeout: Duration::from_secs(1),
            endpoint: None,
        }
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn complete(&self, req: &LlmRequest) -> Result<String> {
        let Some(endpoint) = &self.endpoint else {
            return Ok(leading_words(&req.user, 40));
        };
        timeout(self.request_timeout, self.complete_remote(endpoint, req))
            .await
            .map_err(|_| anyhow!("{} request timed out after {:?}", self.model, self.request_timeout))?
    }

    pub fn complete_blocking(&self, req: &LlmRequest) -> Result<String> {
        let rt = Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to create tokio runtime")?;
        rt.block_on(self.complete(req))
    }

    async fn complete_remote(&self, endpoint: &Endpoint, req: &LlmRequest) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &req.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &req.user,
        });
        let response = self
            .http
            .post(&endpoint.url)
            .bearer_auth(&endpoint.api_key)
            .json(&ChatPayload {
                model: &self.model,
                messages,
                max_tokens: req.max_tokens,
            })
            .send()
            .await
            .context("chat completion request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("chat completion returned {status}: {body}");
        }
        let completion: ChatCompletion = response
            .json()
            .await
            .context("failed to decode chat completion")?;
        let text = first_reply(completion).ok_or_else(|| anyhow!("chat completion had no text"))?;
        debug!(model = %self.model, chars = text.len(), "summary generated");
        Ok(text)
    }
}

fn first_reply(completion: ChatCompletion) -> Option<String> {
    completion
        .choices
        .into_iter()
        .filter_map(|choice| choice.message.content)
        .map(|text| text.trim().to_string())
        .find(|text| !text.is_empty())
}

pub fn leading_words(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<&str>>()
        .join(" ")
}
