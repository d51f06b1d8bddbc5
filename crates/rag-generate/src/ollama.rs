//! Ollama-compatible HTTP generator.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use rag_core::{GenerationConfig, Generator, RagError, Result};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    eval_count: Option<u64>,
}

/// A failed attempt, tagged with whether another attempt may succeed.
struct AttemptError {
    message: String,
    retryable: bool,
}

/// Generator backed by an Ollama server's `/api/generate` endpoint.
#[derive(Clone)]
pub struct OllamaGenerator {
    client: Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
    max_retries: u32,
    initial_backoff: Duration,
}

impl OllamaGenerator {
    /// Create a new generator from configuration.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| RagError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            initial_backoff: config.initial_backoff(),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.endpoint, path)
    }

    async fn execute(&self, request: &GenerateRequest<'_>) -> std::result::Result<String, AttemptError> {
        let response = self
            .client
            .post(self.api_url("/generate"))
            .json(request)
            .send()
            .await
            .map_err(|e| AttemptError {
                message: format!("request failed: {}", e),
                retryable: e.is_timeout() || e.is_connect(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // 5xx errors are retryable, 4xx are not
            return Err(AttemptError {
                message: format!("server returned {}: {}", status, body),
                retryable: status.is_server_error(),
            });
        }

        let body: GenerateResponse = response.json().await.map_err(|e| AttemptError {
            message: format!("invalid response: {}", e),
            retryable: false,
        })?;

        debug!("Generated {} tokens", body.eval_count.unwrap_or(0));
        Ok(body.response)
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String> {
        let start = Instant::now();
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature,
                num_predict: self.max_tokens,
            },
        };

        let mut backoff = self.initial_backoff;
        let mut attempt = 0;

        loop {
            match self.execute(&request).await {
                Ok(text) => {
                    debug!(
                        "{} responded in {}ms",
                        self.model,
                        start.elapsed().as_millis()
                    );
                    return Ok(text);
                }
                Err(e) if e.retryable && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "Generation failed ({}), retrying in {:?} (attempt {}/{})",
                        e.message, backoff, attempt, self.max_retries
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => {
                    return Err(RagError::generation(format!("{}: {}", self.model, e.message)));
                }
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_trims_slash() {
        let config = GenerationConfig {
            endpoint: "http://localhost:11434/".to_string(),
            ..Default::default()
        };
        let generator = OllamaGenerator::new(&config).unwrap();
        assert_eq!(generator.api_url("/generate"), "http://localhost:11434/api/generate");
        assert_eq!(generator.model_name(), "llama3.1");
    }

    #[test]
    fn test_request_body() {
        let request = GenerateRequest {
            model: "llama3.1",
            prompt: "hi",
            stream: false,
            options: GenerateOptions {
                temperature: 0.0,
                num_predict: 64,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 64);
        assert_eq!(json["options"]["temperature"], 0.0);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_generation_error() {
        let config = GenerationConfig {
            // port 9 (discard) is closed on test machines
            endpoint: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..Default::default()
        };
        let generator = OllamaGenerator::new(&config).unwrap();
        let err = generator.generate("hi", 0.0).await.unwrap_err();
        assert!(matches!(err, RagError::Generation { .. }));
        assert!(err.is_retryable());
    }
}
