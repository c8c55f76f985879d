use crate::config::EmbeddingSettings;
use crate::error::BackendError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_BATCH_SIZE: usize = 32;

#[async_trait]
pub trait Embedder {
    fn dimensions(&self) -> usize;

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BackendError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, BackendError>;
}

#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    dimension: usize,
    batch_size: usize,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str, dimension: usize) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimension,
            batch_size: DEFAULT_BATCH_SIZE,
            client,
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BackendError> {
        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BackendError::BackendResponse {
                backend: "ollama".to_string(),
                details: format!("embedding request returned {}", response.status()),
            });
        }

        let payload: Value = response.json().await?;
        let rows = payload
            .pointer("/embeddings")
            .and_then(Value::as_array)
            .ok_or_else(|| BackendError::BackendResponse {
                backend: "ollama".to_string(),
                details: "response has no embeddings array".to_string(),
            })?;

        rows.iter().map(|row| parse_vector(row, "ollama")).collect()
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn dimensions(&self) -> usize {
        self.dimension
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BackendError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let mut rows = self.embed_batch(batch).await?;
            vectors.append(&mut rows);
        }
        check_shape(&vectors, texts.len(), self.dimension, "ollama")?;
        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, BackendError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        check_shape(&vectors, 1, self.dimension, "ollama")?;
        Ok(vectors.remove(0))
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
    batch_size: usize,
    client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        dimension: usize,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            dimension,
            batch_size: DEFAULT_BATCH_SIZE,
            client,
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BackendError> {
        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BackendError::BackendResponse {
                backend: "openai".to_string(),
                details: format!("embedding request returned {}", response.status()),
            });
        }

        let payload: Value = response.json().await?;
        let rows = payload
            .pointer("/data")
            .and_then(Value::as_array)
            .ok_or_else(|| BackendError::BackendResponse {
                backend: "openai".to_string(),
                details: "response has no data array".to_string(),
            })?;

        rows.iter()
            .map(|row| {
                let embedding = row.pointer("/embedding").ok_or_else(|| {
                    BackendError::BackendResponse {
                        backend: "openai".to_string(),
                        details: "data row has no embedding".to_string(),
                    }
                })?;
                parse_vector(embedding, "openai")
            })
            .collect()
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimension
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BackendError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let mut rows = self.embed_batch(batch).await?;
            vectors.append(&mut rows);
        }
        check_shape(&vectors, texts.len(), self.dimension, "openai")?;
        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, BackendError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        check_shape(&vectors, 1, self.dimension, "openai")?;
        Ok(vectors.remove(0))
    }
}

#[derive(Debug, Clone)]
pub enum EmbeddingClient {
    Ollama(OllamaEmbedder),
    OpenAi(OpenAiEmbedder),
}

impl EmbeddingClient {
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self, BackendError> {
        match settings {
            EmbeddingSettings::Ollama {
                url,
                model,
                dimension,
            } => Ok(Self::Ollama(OllamaEmbedder::new(url, model, *dimension)?)),
            EmbeddingSettings::OpenAi {
                api_key,
                api_url,
                model,
                dimension,
            } => Ok(Self::OpenAi(OpenAiEmbedder::new(
                api_url, api_key, model, *dimension,
            )?)),
        }
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    fn dimensions(&self) -> usize {
        match self {
            Self::Ollama(inner) => inner.dimensions(),
            Self::OpenAi(inner) => inner.dimensions(),
        }
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BackendError> {
        match self {
            Self::Ollama(inner) => inner.embed_documents(texts).await,
            Self::OpenAi(inner) => inner.embed_documents(texts).await,
        }
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, BackendError> {
        match self {
            Self::Ollama(inner) => inner.embed_query(text).await,
            Self::OpenAi(inner) => inner.embed_query(text).await,
        }
    }
}

fn parse_vector(value: &Value, backend: &str) -> Result<Vec<f32>, BackendError> {
    let numbers = value
        .as_array()
        .ok_or_else(|| BackendError::BackendResponse {
            backend: backend.to_string(),
            details: "embedding row is not an array".to_string(),
        })?;

    numbers
        .iter()
        .map(|number| {
            number
                .as_f64()
                .map(|v| v as f32)
                .ok_or_else(|| BackendError::BackendResponse {
                    backend: backend.to_string(),
                    details: "embedding value is not a number".to_string(),
                })
        })
        .collect()
}

fn check_shape(
    vectors: &[Vec<f32>],
    expected_count: usize,
    dimension: usize,
    backend: &str,
) -> Result<(), BackendError> {
    if vectors.len() != expected_count {
        return Err(BackendError::BackendResponse {
            backend: backend.to_string(),
            details: format!(
                "expected {expected_count} embeddings, got {}",
                vectors.len()
            ),
        });
    }

    if let Some(bad) = vectors.iter().find(|vector| vector.len() != dimension) {
        return Err(BackendError::BackendResponse {
            backend: backend.to_string(),
            details: format!("embedding has {} dimensions, expected {dimension}", bad.len()),
        });
    }

    Ok(())
}
