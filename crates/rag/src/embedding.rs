use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;

use ragconf_core::{ensure_dimensions, CoreError, HashVectorizer, Vectorizer};

use crate::config::{EmbeddingProvider, EmbeddingSettings};

pub fn build_vectorizer(settings: &EmbeddingSettings) -> Result<Arc<dyn Vectorizer>> {
    match settings.provider {
        EmbeddingProvider::Hash => Ok(Arc::new(HashVectorizer::new(settings.hash_config()))),
        EmbeddingProvider::OpenAi => Ok(Arc::new(OpenAiVectorizer::new(
            &settings.model,
            settings.dimensions,
            Duration::from_secs(settings.timeout_secs.max(1)),
        )?)),
    }
}

#[derive(Clone)]
pub struct OpenAiVectorizer {
    http: Client,
    model: String,
    api_key: String,
    base_url: String,
    dimensions: usize,
}

impl OpenAiVectorizer {
    pub fn new(model: &str, dimensions: usize, timeout: Duration) -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY is required for openai embeddings"))?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build embeddings http client")?;
        Ok(Self {
            http,
            model: model.to_string(),
            api_key,
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            dimensions,
        })
    }

    fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let payload = serde_json::json!({
            "model": self.model,
            "input": inputs,
            "dimensions": self.dimensions,
        });
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .context("openai embeddings request failed")?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "openai embeddings request failed: {}",
                response.status()
            ));
        }
        let parsed: OpenAiEmbeddingResponse = response.json()?;
        let mut data = parsed.data;
        data.sort_by_key(|item| item.index);
        Ok(data.into_iter().map(|item| item.embedding).collect())
    }

    fn wrap(&self, err: anyhow::Error) -> CoreError {
        CoreError::Vectorizer {
            backend: self.name().to_string(),
            message: format!("{err:#}"),
        }
    }
}

impl Vectorizer for OpenAiVectorizer {
    fn name(&self) -> &str {
        "openai"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn vectorize(&self, text: &str) -> ragconf_core::Result<Vec<f32>> {
        let mut output = self.vectorize_batch(&[text.to_string()])?;
        output.pop().ok_or_else(|| CoreError::Vectorizer {
            backend: self.name().to_string(),
            message: "empty embeddings response".to_string(),
        })
    }

    fn vectorize_batch(&self, inputs: &[String]) -> ragconf_core::Result<Vec<Vec<f32>>> {
        let vectors = self.request(inputs).map_err(|err| self.wrap(err))?;
        if vectors.len() != inputs.len() {
            return Err(self.wrap(anyhow!(
                "expected {} embeddings, got {}",
                inputs.len(),
                vectors.len()
            )));
        }
        for vector in &vectors {
            ensure_dimensions(vector, self.dimensions)?;
        }
        Ok(vectors)
    }
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}
