use crate::traits::VectorIndex;
use crate::{BackendError, IndexDescription, IndexSpec, MismatchPolicy, PageChunk, ScoredPassage};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use url::Url;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_secs(2);
const READY_TIMEOUT: Duration = Duration::from_secs(180);
// serverless spec the index is provisioned with when absent
const SERVERLESS_CLOUD: &str = "aws";
const SERVERLESS_REGION: &str = "us-east-1";
const UPSERT_BATCH: usize = 100;

pub struct PineconeClient {
    api_url: String,
    api_key: String,
    client: Client,
    poll_interval: Duration,
    ready_timeout: Duration,
}

impl PineconeClient {
    pub fn new(api_url: &str, api_key: &str) -> Result<Self, BackendError> {
        Url::parse(api_url)?;
        let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            poll_interval: POLL_INTERVAL,
            ready_timeout: READY_TIMEOUT,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_ready_timeout(mut self, ready_timeout: Duration) -> Self {
        self.ready_timeout = ready_timeout;
        self
    }

    pub async fn list_indexes(&self) -> Result<Vec<IndexDescription>, BackendError> {
        let response = self
            .client
            .get(format!("{}/indexes", self.api_url))
            .header("Api-Key", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BackendError::BackendResponse {
                backend: "pinecone".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let entries = parsed
            .pointer("/indexes")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        entries.iter().map(parse_index_description).collect()
    }

    pub async fn describe_index(&self, name: &str) -> Result<IndexDescription, BackendError> {
        let response = self
            .client
            .get(format!("{}/indexes/{}", self.api_url, name))
            .header("Api-Key", &self.api_key)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(BackendError::IndexNotFound(name.to_string()));
        }
        if !response.status().is_success() {
            return Err(BackendError::BackendResponse {
                backend: "pinecone".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        parse_index_description(&parsed)
    }

    pub async fn create_index(&self, spec: &IndexSpec) -> Result<(), BackendError> {
        let body = json!({
            "name": spec.name,
            "dimension": spec.dimension,
            "metric": spec.metric.as_str(),
            "spec": {
                "serverless": {
                    "cloud": SERVERLESS_CLOUD,
                    "region": SERVERLESS_REGION,
                }
            },
        });

        let response = self
            .client
            .post(format!("{}/indexes", self.api_url))
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() || response.status() == StatusCode::CONFLICT {
            return Ok(());
        }

        Err(BackendError::BackendResponse {
            backend: "pinecone".to_string(),
            details: response.status().to_string(),
        })
    }

    pub async fn delete_index(&self, name: &str) -> Result<(), BackendError> {
        let response = self
            .client
            .delete(format!("{}/indexes/{}", self.api_url, name))
            .header("Api-Key", &self.api_key)
            .send()
            .await?;

        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }

        Err(BackendError::BackendResponse {
            backend: "pinecone".to_string(),
            details: response.status().to_string(),
        })
    }

    pub async fn ensure_index(
        &self,
        spec: &IndexSpec,
        policy: MismatchPolicy,
    ) -> Result<PineconeIndex, BackendError> {
        let existing = self
            .list_indexes()
            .await?
            .into_iter()
            .find(|index| index.name == spec.name);

        match existing {
            None => {
                self.create_index(spec).await?;
                let description = self.wait_until_ready(&spec.name).await?;
                Ok(self.index_handle(description))
            }
            Some(found) if found.dimension == spec.dimension => {
                let description = if found.ready {
                    found
                } else {
                    self.wait_until_ready(&spec.name).await?
                };
                Ok(self.index_handle(description))
            }
            Some(found) => match policy {
                MismatchPolicy::Fail => Err(BackendError::DimensionMismatch {
                    name: spec.name.clone(),
                    stored: found.dimension,
                    expected: spec.dimension,
                }),
                MismatchPolicy::Recreate => {
                    self.delete_index(&spec.name).await?;
                    self.wait_until_deleted(&spec.name).await?;
                    self.create_index(spec).await?;
                    let description = self.wait_until_ready(&spec.name).await?;
                    Ok(self.index_handle(description))
                }
            },
        }
    }

    pub async fn open_index(
        &self,
        name: &str,
        expected_dimension: usize,
    ) -> Result<PineconeIndex, BackendError> {
        let description = self.describe_index(name).await?;

        if description.dimension != expected_dimension {
            return Err(BackendError::DimensionMismatch {
                name: name.to_string(),
                stored: description.dimension,
                expected: expected_dimension,
            });
        }

        Ok(self.index_handle(description))
    }

    async fn wait_until_ready(&self, name: &str) -> Result<IndexDescription, BackendError> {
        let started = Instant::now();
        loop {
            match self.describe_index(name).await {
                Ok(description) if description.ready => return Ok(description),
                Ok(_) => {}
                // the control plane can lag right after a create
                Err(BackendError::IndexNotFound(_)) => {}
                Err(error) => return Err(error),
            }

            if started.elapsed() >= self.ready_timeout {
                return Err(BackendError::NotReady {
                    name: name.to_string(),
                    waited_secs: self.ready_timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn wait_until_deleted(&self, name: &str) -> Result<(), BackendError> {
        let started = Instant::now();
        loop {
            match self.describe_index(name).await {
                Err(BackendError::IndexNotFound(_)) => return Ok(()),
                Err(error) => return Err(error),
                Ok(_) => {}
            }

            if started.elapsed() >= self.ready_timeout {
                return Err(BackendError::Request(format!(
                    "index {} still exists after {}s",
                    name,
                    self.ready_timeout.as_secs()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn index_handle(&self, description: IndexDescription) -> PineconeIndex {
        PineconeIndex {
            name: description.name,
            base_url: data_plane_url(&description.host),
            dimension: description.dimension,
            api_key: self.api_key.clone(),
            client: self.client.clone(),
        }
    }
}

pub struct PineconeIndex {
    name: String,
    base_url: String,
    dimension: usize,
    api_key: String,
    client: Client,
}

impl PineconeIndex {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert_chunks(
        &self,
        chunks: &[PageChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<usize, BackendError> {
        if chunks.len() != embeddings.len() {
            return Err(BackendError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let vectors = chunks
            .iter()
            .zip(embeddings.iter())
            .map(|(chunk, embedding)| {
                if embedding.len() != self.dimension {
                    return Err(BackendError::Request(format!(
                        "embedding dimension {} != {}",
                        embedding.len(),
                        self.dimension
                    )));
                }

                Ok(json!({
                    "id": chunk.chunk_id,
                    "values": embedding,
                    "metadata": {
                        "document_id": chunk.document_id,
                        "file_name": chunk.file_name,
                        "source_path": chunk.source_path,
                        "page_label": chunk.page_label,
                        "chunk_index": chunk.chunk_index,
                        "text": chunk.text,
                    },
                }))
            })
            .collect::<Result<Vec<_>, BackendError>>()?;

        let mut upserted = 0usize;
        for batch in vectors.chunks(UPSERT_BATCH) {
            let response = self
                .client
                .post(format!("{}/vectors/upsert", self.base_url))
                .header("Api-Key", &self.api_key)
                .json(&json!({ "vectors": batch }))
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(BackendError::BackendResponse {
                    backend: "pinecone".to_string(),
                    details: response.status().to_string(),
                });
            }

            let parsed: Value = response.json().await?;
            upserted += parsed
                .pointer("/upsertedCount")
                .and_then(Value::as_u64)
                .unwrap_or(batch.len() as u64) as usize;
        }

        Ok(upserted)
    }

    async fn query(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredPassage>, BackendError> {
        if query_vector.len() != self.dimension {
            return Err(BackendError::Request(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.dimension
            )));
        }

        let response = self
            .client
            .post(format!("{}/query", self.base_url))
            .header("Api-Key", &self.api_key)
            .json(&json!({
                "vector": query_vector,
                "topK": top_k,
                "includeMetadata": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BackendError::BackendResponse {
                backend: "pinecone".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let matches = parsed
            .pointer("/matches")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut passages = Vec::new();
        for hit in matches {
            let chunk_id = hit
                .pointer("/id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let score = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);
            let file_name = hit
                .pointer("/metadata/file_name")
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string();
            // records written by other tooling may predate page labels
            let page_label = hit
                .pointer("/metadata/page_label")
                .and_then(Value::as_str)
                .map(str::to_string);
            let text = hit
                .pointer("/metadata/text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            passages.push(ScoredPassage {
                chunk_id,
                score,
                file_name,
                page_label,
                text,
            });
        }

        Ok(passages)
    }
}

fn data_plane_url(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("https://{host}")
    }
}

fn parse_index_description(value: &Value) -> Result<IndexDescription, BackendError> {
    let name = value
        .pointer("/name")
        .and_then(Value::as_str)
        .ok_or_else(|| BackendError::BackendResponse {
            backend: "pinecone".to_string(),
            details: "index description has no name".to_string(),
        })?
        .to_string();
    let dimension = value
        .pointer("/dimension")
        .and_then(Value::as_u64)
        .ok_or_else(|| BackendError::BackendResponse {
            backend: "pinecone".to_string(),
            details: format!("index {name} has no dimension"),
        })? as usize;
    let metric = value
        .pointer("/metric")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let host = value
        .pointer("/host")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let ready = value
        .pointer("/status/ready")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(IndexDescription {
        name,
        dimension,
        metric,
        host,
        ready,
    })
}
