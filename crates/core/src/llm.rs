use crate::error::BackendError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

// answer synthesis can run long on big context blocks
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

#[async_trait]
pub trait ChatModel {
    async fn complete(&self, prompt: &str) -> Result<String, BackendError>;
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, BackendError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = json!({
            "contents": [
                { "role": "user", "parts": [{ "text": prompt }] }
            ]
        });

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BackendError::BackendResponse {
                backend: "gemini".to_string(),
                details: format!("generateContent returned {}", response.status()),
            });
        }

        let payload: Value = response.json().await?;
        let parts = payload
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
            .ok_or_else(|| BackendError::BackendResponse {
                backend: "gemini".to_string(),
                details: "response has no candidates".to_string(),
            })?;

        let text = parts
            .iter()
            .filter_map(|part| part.pointer("/text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(BackendError::BackendResponse {
                backend: "gemini".to_string(),
                details: "candidate has no text parts".to_string(),
            });
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn completes_prompt_and_joins_text_parts() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "g-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [
                    {
                        "content": {
                            "parts": [
                                { "text": "Take 500mg" },
                                { "text": " every 8 hours." }
                            ]
                        }
                    }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::new(&server.uri(), "g-key", "gemini-2.5-flash").unwrap();
        let answer = client.complete("What is the adult dose?").await.unwrap();

        assert_eq!(answer, "Take 500mg every 8 hours.");
    }

    #[tokio::test]
    async fn empty_candidates_are_a_backend_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&server.uri(), "g-key", "gemini-2.5-flash").unwrap();

        match client.complete("question").await {
            Err(BackendError::BackendResponse { backend, .. }) => assert_eq!(backend, "gemini"),
            other => panic!("expected BackendResponse, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_status_is_surfaced() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&server.uri(), "bad-key", "gemini-2.5-flash").unwrap();

        match client.complete("question").await {
            Err(BackendError::BackendResponse { details, .. }) => {
                assert!(details.contains("403"));
            }
            other => panic!("expected BackendResponse, got {other:?}"),
        }
    }
}
